use sheetmirror_core::CoreError;
use sheetmirror_storage::StorageError;
use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("remote fetch failed: {0}")]
    RemoteFetch(#[from] RemoteError),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("header not found: {0}")]
    HeaderNotFound(String),

    #[error("row not found for correlation id {correlation_id:?} in {sheet_name}")]
    RowNotFound {
        sheet_name: String,
        correlation_id: String,
    },

    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error("write #{index} rejected: {reason}")]
    InvalidWrite { index: usize, reason: String },

    /// The batched call failed; the remote may have applied some of the
    /// writes before failing.
    #[error("batch of {writes} writes failed and may be partially applied: {source}")]
    BatchSubmitFailed {
        writes: usize,
        #[source]
        source: RemoteError,
    },

    /// The mirrored record was updated locally but the write-back failed.
    #[error("entry {record_id} updated locally but not propagated: {source}")]
    PropagationFailed {
        record_id: String,
        #[source]
        source: Box<EngineError>,
    },

    #[error("unauthorized")]
    Unauthorized,
}

impl EngineError {
    /// True for conditions a caller should re-ingest or alert on rather than
    /// retry.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::HeaderNotFound(_) | Self::RowNotFound { .. } | Self::EntryNotFound(_) => true,
            Self::PropagationFailed { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// True when nothing was sent to the remote system.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Validation(_) | Self::InvalidWrite { .. } | Self::Core(_) => true,
            Self::PropagationFailed { source, .. } => source.is_validation(),
            _ => false,
        }
    }
}
