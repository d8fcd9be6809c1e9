pub mod batch;
pub mod compile;
pub mod config;
pub mod entries;
pub mod error;
pub mod headers;
pub mod http;
pub mod ingest;
pub mod locate;
pub mod params;
pub mod remote;
pub mod service;

pub use batch::SubmitOutcome;
pub use compile::CompiledUpdate;
pub use config::{EngineConfig, SheetsClientConfig};
pub use error::EngineError;
pub use headers::{HeaderCache, SheetKey};
pub use remote::{RemoteError, SheetsApi};
pub use service::MirrorService;

use std::num::NonZeroU32;
use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;

use sheetmirror_core::{
    field_value::FieldMap,
    header::HeaderMap,
    ids::RecordId,
    locator::RowLocator,
    write::CompiledWrite,
};

use crate::remote::BatchUpdateResponse;

/// Everything needed to write a record's fields back to its sheet row.
#[derive(Debug, Clone)]
pub struct PropagateRequest {
    pub record_id: RecordId,
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub locator: RowLocator,
    pub fields: FieldMap,
}

/// Summary of a propagation, echoed to callers next to the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagateOutcome {
    pub ok: bool,
    pub row: u32,
    pub rows_updated: usize,
    pub updated_ranges: Vec<String>,
    pub dropped: Vec<String>,
    pub raw: Option<BatchUpdateResponse>,
}

/// The header-indexed update engine: header resolution, row location,
/// compilation and batched submission against one remote client.
pub struct UpdateEngine<C: SheetsApi> {
    client: C,
    headers: HeaderCache,
    config: EngineConfig,
}

impl<C: SheetsApi> UpdateEngine<C> {
    pub fn new(client: C, config: EngineConfig) -> Self {
        Self {
            client,
            headers: HeaderCache::new(),
            config,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn header_cache(&self) -> &HeaderCache {
        &self.headers
    }

    /// Header map of a sheet, from cache or row 1.
    pub fn resolve(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
    ) -> Result<Arc<HeaderMap>, EngineError> {
        headers::resolve_headers(&self.client, &self.headers, spreadsheet_id, sheet_name)
    }

    /// Forget a sheet's cached headers, e.g. after its header row changed.
    pub fn evict_headers(&self, spreadsheet_id: &str, sheet_name: &str) -> bool {
        let key = SheetKey::new(spreadsheet_id, sheet_name);
        let evicted = self.headers.evict(&key);
        debug!("evict {key}: {evicted}");
        evicted
    }

    pub fn clear_headers(&self) {
        self.headers.clear();
    }

    /// Locate using the configured identifier header.
    pub fn locate(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        locator: &RowLocator,
    ) -> Result<Option<u32>, EngineError> {
        self.locate_with(spreadsheet_id, sheet_name, locator, &self.config.id_header)
    }

    pub fn locate_with(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        locator: &RowLocator,
        id_header: &str,
    ) -> Result<Option<u32>, EngineError> {
        locate::locate_row(
            &self.client,
            &self.headers,
            spreadsheet_id,
            sheet_name,
            locator,
            id_header,
        )
    }

    pub fn compile(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        row: NonZeroU32,
        updates: &FieldMap,
    ) -> Result<CompiledUpdate, EngineError> {
        let headers = self.resolve(spreadsheet_id, sheet_name)?;
        let compiled = compile::compile_updates(&headers, sheet_name, row, updates)?;
        if !compiled.dropped.is_empty() {
            warn!(
                "{spreadsheet_id}::{sheet_name}: no column for {:?}; fields dropped",
                compiled.dropped
            );
        }
        Ok(compiled)
    }

    pub fn submit(
        &self,
        spreadsheet_id: &str,
        writes: &[CompiledWrite],
    ) -> Result<SubmitOutcome, EngineError> {
        batch::submit_batch(&self.client, spreadsheet_id, writes)
    }

    /// Locate, compile and submit one record's fields.
    pub fn propagate(&self, request: &PropagateRequest) -> Result<PropagateOutcome, EngineError> {
        let spreadsheet_id = request.spreadsheet_id.trim();
        if spreadsheet_id.is_empty() {
            return Err(EngineError::Validation(format!(
                "entry {} has no spreadsheet id",
                request.record_id
            )));
        }
        if request.sheet_name.is_empty() {
            return Err(EngineError::Validation(format!(
                "entry {} has no sheet name",
                request.record_id
            )));
        }

        let row = self
            .locate(spreadsheet_id, &request.sheet_name, &request.locator)?
            .and_then(NonZeroU32::new)
            .ok_or_else(|| EngineError::RowNotFound {
                sheet_name: request.sheet_name.clone(),
                correlation_id: match &request.locator {
                    RowLocator::CorrelationId(id) => id.clone(),
                    RowLocator::RowNumber(n) => n.to_string(),
                },
            })?;

        let compiled = self.compile(spreadsheet_id, &request.sheet_name, row, &request.fields)?;
        let outcome = self.submit(spreadsheet_id, &compiled.writes)?;

        Ok(PropagateOutcome {
            ok: true,
            row: row.get(),
            rows_updated: outcome.rows_updated,
            updated_ranges: compiled.writes.into_iter().map(|w| w.range).collect(),
            dropped: compiled.dropped,
            raw: outcome.response,
        })
    }
}
