use log::info;

use sheetmirror_core::write::CompiledWrite;

use crate::error::EngineError;
use crate::remote::{BatchUpdateRequest, BatchUpdateResponse, SheetsApi};

/// Result of [`submit_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub rows_updated: usize,
    /// The remote acknowledgement; `None` when nothing was sent.
    pub response: Option<BatchUpdateResponse>,
}

impl SubmitOutcome {
    pub fn noop() -> Self {
        Self {
            rows_updated: 0,
            response: None,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.response.is_none()
    }
}

/// Reject writes that must never reach the remote system.
pub fn validate_batch(writes: &[CompiledWrite]) -> Result<(), EngineError> {
    for (index, write) in writes.iter().enumerate() {
        if let Some(reason) = write.problem() {
            return Err(EngineError::InvalidWrite {
                index,
                reason: format!("{reason} ({:?})", write.range),
            });
        }
    }
    Ok(())
}

/// Send `writes` as one batched, user-entered update.
///
/// The remote does not apply the batch transactionally: on failure some
/// ranges may already be written, and the error says so.
pub fn submit_batch<C: SheetsApi + ?Sized>(
    client: &C,
    spreadsheet_id: &str,
    writes: &[CompiledWrite],
) -> Result<SubmitOutcome, EngineError> {
    if spreadsheet_id.trim().is_empty() {
        return Err(EngineError::Validation("spreadsheet id is required".into()));
    }
    if writes.is_empty() {
        return Ok(SubmitOutcome::noop());
    }
    validate_batch(writes)?;

    let request = BatchUpdateRequest::user_entered(writes);
    let response = client
        .batch_update_values(spreadsheet_id, &request)
        .map_err(|source| EngineError::BatchSubmitFailed {
            writes: writes.len(),
            source,
        })?;
    info!(
        "batch update of {} ranges on {spreadsheet_id}: {} cells updated",
        writes.len(),
        response.total_updated_cells
    );
    Ok(SubmitOutcome {
        rows_updated: writes.len(),
        response: Some(response),
    })
}
