//! The range-addressed values API of the remote spreadsheet service.
//!
//! Wire types mirror the Sheets v4 JSON shapes so the HTTP client can send
//! and receive them unchanged.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sheetmirror_core::{field_value::FieldValue, write::CompiledWrite};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("remote resource not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("remote returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            404 => Self::NotFound(body),
            401 | 403 => Self::PermissionDenied(body),
            429 => Self::RateLimited(body),
            _ => Self::Status { status, body },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MajorDimension {
    #[default]
    Rows,
    Columns,
}

impl MajorDimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rows => "ROWS",
            Self::Columns => "COLUMNS",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueInputOption {
    Raw,
    /// Values are parsed as if typed into the UI.
    #[default]
    UserEntered,
}

/// A block of cells. The remote omits `values` entirely for an empty range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(default)]
    pub range: String,
    #[serde(default)]
    pub major_dimension: MajorDimension,
    #[serde(default)]
    pub values: Vec<Vec<FieldValue>>,
}

impl ValueRange {
    /// The first row (or column, when column-major), empty if absent.
    pub fn first_vector(&self) -> &[FieldValue] {
        self.values.first().map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateRequest {
    pub value_input_option: ValueInputOption,
    pub data: Vec<ValueRange>,
}

impl BatchUpdateRequest {
    pub fn user_entered(writes: &[CompiledWrite]) -> Self {
        Self {
            value_input_option: ValueInputOption::UserEntered,
            data: writes
                .iter()
                .map(|w| ValueRange {
                    range: w.range.clone(),
                    major_dimension: MajorDimension::Rows,
                    values: w.values.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateValuesResponse {
    #[serde(default)]
    pub updated_range: String,
    #[serde(default)]
    pub updated_rows: u64,
    #[serde(default)]
    pub updated_columns: u64,
    #[serde(default)]
    pub updated_cells: u64,
}

/// Acknowledgement of a batched write. Kept whole for audit/debugging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateResponse {
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default)]
    pub total_updated_rows: u64,
    #[serde(default)]
    pub total_updated_columns: u64,
    #[serde(default)]
    pub total_updated_cells: u64,
    #[serde(default)]
    pub total_updated_sheets: u64,
    #[serde(default)]
    pub responses: Vec<UpdateValuesResponse>,
}

/// The two calls the engine needs from the remote service.
///
/// Implementations must be shareable across threads; the engine issues
/// concurrent calls without any locking of its own.
pub trait SheetsApi: Send + Sync {
    fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        major_dimension: MajorDimension,
    ) -> Result<ValueRange, RemoteError>;

    fn batch_update_values(
        &self,
        spreadsheet_id: &str,
        request: &BatchUpdateRequest,
    ) -> Result<BatchUpdateResponse, RemoteError>;
}

impl<T: SheetsApi + ?Sized> SheetsApi for Arc<T> {
    fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        major_dimension: MajorDimension,
    ) -> Result<ValueRange, RemoteError> {
        (**self).get_values(spreadsheet_id, range, major_dimension)
    }

    fn batch_update_values(
        &self,
        spreadsheet_id: &str,
        request: &BatchUpdateRequest,
    ) -> Result<BatchUpdateResponse, RemoteError> {
        (**self).batch_update_values(spreadsheet_id, request)
    }
}
