use sheetmirror_core::{field_value::FieldValue, ids::RecordId};
use sheetmirror_engine::{ingest::IngestBatch, EngineConfig, MirrorService};
use sheetmirror_storage::{SqliteStorage, StorageError};

use crate::FakeSheets;

pub const SPREADSHEET_ID: &str = "1AbCdEfGhIjKlMnOpQrStUvWxYz";
pub const SHEET_NAME: &str = "Form Responses 1";

/// A façade over in-memory SQLite and a [`FakeSheets`] remote.
pub struct TestBench {
    pub sheets: FakeSheets,
    pub service: MirrorService<SqliteStorage, FakeSheets>,
}

impl TestBench {
    pub fn new() -> Result<Self, StorageError> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, StorageError> {
        let sheets = FakeSheets::new();
        let service = MirrorService::new(SqliteStorage::open_in_memory()?, sheets.clone(), config);
        Ok(Self { sheets, service })
    }

    /// A bench whose remote holds a form-response sheet with the given
    /// headers.
    pub fn with_sheet(headers: &[&str]) -> Result<Self, StorageError> {
        let bench = Self::new()?;
        bench.sheets.add_sheet(SPREADSHEET_ID, SHEET_NAME, headers);
        Ok(bench)
    }

    /// Put a row in the remote sheet and mirror it, returning its id.
    pub fn seed_row(
        &self,
        row: u32,
        cells: Vec<FieldValue>,
        form_response_id: Option<&str>,
    ) -> Result<RecordId, Box<dyn std::error::Error>> {
        self.sheets.set_row(SPREADSHEET_ID, SHEET_NAME, row, cells.clone());
        let summary = self.service.ingest_rows(&IngestBatch {
            spreadsheet_id: SPREADSHEET_ID.to_string(),
            sheet_name: Some(SHEET_NAME.to_string()),
            from_row: Some(row),
            form_response_id: form_response_id.map(str::to_string),
            rows: vec![cells],
            named_values: None,
        })?;
        summary
            .ids
            .into_iter()
            .next()
            .ok_or_else(|| "ingest returned no ids".into())
    }

    pub fn cell(&self, row: u32, column: u32) -> FieldValue {
        self.sheets.cell(SPREADSHEET_ID, SHEET_NAME, row, column)
    }
}
