use std::sync::{Mutex, PoisonError};

use sheetmirror_core::clock::physical_now;
use sheetmirror_storage::{DocumentStore, StorageError};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::remote::SheetsApi;
use crate::UpdateEngine;

/// The entry store façade: owns the document store and the update engine
/// and exposes the operations the GUI and webhook call.
///
/// Store access is serialized behind a mutex; remote calls are made without
/// holding it.
pub struct MirrorService<S: DocumentStore, C: SheetsApi> {
    store: Mutex<S>,
    engine: UpdateEngine<C>,
}

impl<S: DocumentStore, C: SheetsApi> MirrorService<S, C> {
    pub fn new(store: S, client: C, config: EngineConfig) -> Self {
        Self {
            store: Mutex::new(store),
            engine: UpdateEngine::new(client, config),
        }
    }

    pub fn engine(&self) -> &UpdateEngine<C> {
        &self.engine
    }

    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    /// Run `f` with exclusive access to the store.
    pub fn with_store<R>(
        &self,
        f: impl FnOnce(&mut S) -> Result<R, StorageError>,
    ) -> Result<R, EngineError> {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&mut store)?)
    }

    pub(crate) fn now(&self) -> Result<u64, EngineError> {
        Ok(physical_now()?)
    }
}
