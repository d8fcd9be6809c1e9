//! Row ingestion from the sheet-side webhook.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::Deserialize;
use subtle::ConstantTimeEq;

use sheetmirror_core::{
    field_value::{FieldMap, FieldValue},
    header::HeaderMap,
    ids::RecordId,
};
use sheetmirror_storage::{DocumentStore, EntryPatch};

use crate::error::EngineError;
use crate::locate::FIRST_DATA_ROW;
use crate::remote::SheetsApi;
use crate::service::MirrorService;

/// Compare a presented webhook secret against the configured one in
/// constant time. An empty configured secret rejects every caller.
pub fn verify_shared_secret(expected: &str, presented: &str) -> Result<(), EngineError> {
    if expected.is_empty() {
        return Err(EngineError::Unauthorized);
    }
    if bool::from(expected.as_bytes().ct_eq(presented.as_bytes())) {
        Ok(())
    } else {
        Err(EngineError::Unauthorized)
    }
}

/// One webhook delivery: consecutive rows of one sheet.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestBatch {
    pub spreadsheet_id: String,
    #[serde(default)]
    pub sheet_name: Option<String>,
    /// Row number of `rows[0]`.
    #[serde(default)]
    pub from_row: Option<u32>,
    /// Correlation id stamped by the form, for single-response deliveries.
    #[serde(default)]
    pub form_response_id: Option<String>,
    #[serde(default)]
    pub rows: Vec<Vec<FieldValue>>,
    /// Form submissions deliver values keyed by question title.
    #[serde(default)]
    pub named_values: Option<BTreeMap<String, Vec<FieldValue>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub ids: Vec<RecordId>,
}

impl IngestSummary {
    pub fn count(&self) -> usize {
        self.ids.len()
    }
}

fn fields_from_named(named: &BTreeMap<String, Vec<FieldValue>>) -> FieldMap {
    named
        .iter()
        .map(|(key, values)| {
            let value = values.first().cloned().unwrap_or(FieldValue::Null);
            (key.clone(), value)
        })
        .collect()
}

/// Name positional cells after the header row. Cells without a header, and
/// cells under a header that repeats an earlier one, are dropped.
fn fields_from_cells(headers: &HeaderMap, cells: &[FieldValue]) -> FieldMap {
    headers
        .headers()
        .iter()
        .zip(cells)
        .enumerate()
        .filter(|(i, (name, _))| {
            !name.trim().is_empty() && headers.column_of(name) == Some(*i as u32 + 1)
        })
        .map(|(_, (name, value))| (name.clone(), value.clone()))
        .collect()
}

impl<S: DocumentStore, C: SheetsApi> MirrorService<S, C> {
    /// Mirror a batch of rows into the store in one commit.
    pub fn ingest_rows(&self, batch: &IngestBatch) -> Result<IngestSummary, EngineError> {
        let spreadsheet_id = batch.spreadsheet_id.trim();
        if spreadsheet_id.is_empty() {
            return Err(EngineError::Validation("spreadsheetId is required".into()));
        }
        let sheet_name = batch
            .sheet_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.config().default_sheet_name);
        let from_row = match batch.from_row {
            Some(0) => return Err(EngineError::Validation("fromRow must be at least 1".into())),
            Some(row) => row,
            None => FIRST_DATA_ROW,
        };
        let correlation_id = batch
            .form_response_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());

        if batch.named_values.is_some() && correlation_id.is_none() && batch.from_row.is_none() {
            return Err(EngineError::Validation(
                "namedValues needs a formResponseId or a fromRow to identify the row".into(),
            ));
        }

        let rows: Vec<FieldMap> = match &batch.named_values {
            Some(named) => vec![fields_from_named(named)],
            None if batch.rows.is_empty() => Vec::new(),
            None => {
                let headers = self.engine().resolve(spreadsheet_id, sheet_name)?;
                batch
                    .rows
                    .iter()
                    .map(|cells| fields_from_cells(&headers, cells))
                    .collect()
            }
        };
        if rows.is_empty() {
            return Err(EngineError::Validation("batch has no rows".into()));
        }
        if correlation_id.is_some() && rows.len() > 1 {
            return Err(EngineError::Validation(
                "formResponseId names a single row but the batch has several".into(),
            ));
        }

        let now = self.now()?;
        let mut writes = Vec::with_capacity(rows.len());
        for (offset, row) in rows.into_iter().enumerate() {
            let row_index = u32::try_from(offset)
                .ok()
                .and_then(|offset| from_row.checked_add(offset))
                .ok_or_else(|| EngineError::Validation("row index out of range".into()))?;
            let id = match correlation_id {
                Some(cid) => RecordId::new(cid),
                None => RecordId::for_row(spreadsheet_id, row_index),
            };
            debug!("ingest {id}: {} fields at row {row_index}", row.len());
            let patch = EntryPatch {
                sheet_id: Some(spreadsheet_id.to_string()),
                sheet_name: Some(sheet_name.to_string()),
                row_index: Some(row_index),
                correlation_id: correlation_id.map(str::to_string),
                row,
                created_at: Some(now),
                updated_at: Some(now),
                ..Default::default()
            };
            writes.push((id, patch));
        }

        self.with_store(|store| store.commit_entries(&writes))?;
        info!(
            "ingested {} rows from {spreadsheet_id}::{sheet_name} starting at row {from_row}",
            writes.len()
        );
        Ok(IngestSummary {
            ids: writes.into_iter().map(|(id, _)| id).collect(),
        })
    }
}
