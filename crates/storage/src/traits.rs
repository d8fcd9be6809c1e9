use serde::{Deserialize, Serialize};

use sheetmirror_core::{
    field_value::{FieldMap, FieldValue},
    header::normalize_header,
    ids::RecordId,
    locator::RowLocator,
    CoreError,
};

use crate::error::StorageError;

/// The document-store copy of one spreadsheet row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirroredRecord {
    pub id: RecordId,
    pub sheet_id: String,
    pub sheet_name: String,
    pub row_index: u32,
    pub correlation_id: Option<String>,
    pub row: FieldMap,
    pub processed: bool,
    pub validated: bool,
    pub refusal_reason: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl MirroredRecord {
    /// An empty document, as a merge into a missing id would start from.
    pub fn empty(id: RecordId) -> Self {
        Self {
            id,
            sheet_id: String::new(),
            sheet_name: String::new(),
            row_index: 0,
            correlation_id: None,
            row: FieldMap::new(),
            processed: false,
            validated: false,
            refusal_reason: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Merge a patch. Fields the patch leaves unset are untouched; row
    /// entries are merged key by key. `created_at` is write-once.
    pub fn apply(&mut self, patch: &EntryPatch) {
        if let Some(sheet_id) = &patch.sheet_id {
            self.sheet_id = sheet_id.clone();
        }
        if let Some(sheet_name) = &patch.sheet_name {
            self.sheet_name = sheet_name.clone();
        }
        if let Some(row_index) = patch.row_index {
            self.row_index = row_index;
        }
        if let Some(correlation_id) = &patch.correlation_id {
            self.correlation_id = Some(correlation_id.clone());
        }
        for (key, value) in &patch.row {
            self.set_field(key, value.clone());
        }
        if let Some(processed) = patch.processed {
            self.processed = processed;
        }
        if let Some(validated) = patch.validated {
            self.validated = validated;
        }
        if let Some(reason) = &patch.refusal_reason {
            self.refusal_reason = reason.clone();
        }
        if let Some(created_at) = patch.created_at {
            if self.created_at == 0 {
                self.created_at = created_at;
            }
        }
        if let Some(updated_at) = patch.updated_at {
            self.updated_at = updated_at;
        }
    }

    /// Set a row field. A stored key naming the same header in another
    /// casing or spacing keeps its spelling and takes the new value.
    pub fn set_field(&mut self, key: &str, value: FieldValue) {
        let normalized = normalize_header(key);
        let existing = self
            .row
            .keys()
            .find(|stored| normalize_header(stored) == normalized)
            .cloned();
        self.row.insert(existing.unwrap_or_else(|| key.to_string()), value);
    }

    /// Where this record lives in its sheet: the correlation id when one was
    /// ingested, otherwise the stored row index.
    pub fn locator(&self) -> Result<RowLocator, CoreError> {
        match &self.correlation_id {
            Some(id) => RowLocator::correlation(id.clone()),
            None => RowLocator::row(self.row_index),
        }
    }
}

/// A set-with-merge payload for [`MirroredRecord`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    pub sheet_id: Option<String>,
    pub sheet_name: Option<String>,
    pub row_index: Option<u32>,
    pub correlation_id: Option<String>,
    pub row: FieldMap,
    pub processed: Option<bool>,
    pub validated: Option<bool>,
    /// `Some(None)` clears a stored reason.
    pub refusal_reason: Option<Option<String>>,
    pub created_at: Option<u64>,
    pub updated_at: Option<u64>,
}

impl EntryPatch {
    pub fn with_field(mut self, key: &str, value: FieldValue) -> Self {
        self.row.insert(key.to_string(), value);
        self
    }
}

/// Filter for [`DocumentStore::query_entries`]. Results are ordered by row
/// index.
#[derive(Debug, Clone, Default)]
pub struct EntryQuery {
    pub sheet_id: String,
    pub processed: Option<bool>,
    pub validated: Option<bool>,
    /// Only rows strictly after this row index.
    pub after: Option<u32>,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetRef {
    pub sheet_id: String,
    pub sheet_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserParams {
    pub user_id: String,
    pub username: String,
    pub default_spreadsheet_id: String,
    pub created_at: u64,
    pub updated_at: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserParamsPatch {
    pub username: Option<String>,
    pub default_spreadsheet_id: Option<String>,
    pub now: u64,
}

/// The keyed document collections the façade persists to.
pub trait DocumentStore {
    fn get_entry(&self, id: &RecordId) -> Result<Option<MirroredRecord>, StorageError>;

    /// Merge `patch` into the document, creating it when absent. Returns the
    /// stored document.
    fn merge_entry(
        &mut self,
        id: &RecordId,
        patch: &EntryPatch,
    ) -> Result<MirroredRecord, StorageError>;

    /// Apply several merges atomically.
    fn commit_entries(&mut self, writes: &[(RecordId, EntryPatch)]) -> Result<(), StorageError>;

    fn query_entries(&self, query: &EntryQuery) -> Result<Vec<MirroredRecord>, StorageError>;

    /// Distinct `(sheet_id, sheet_name)` pairs, ordered by id then name.
    fn sheet_refs(&self) -> Result<Vec<SheetRef>, StorageError>;

    fn get_user_params(&self, user_id: &str) -> Result<Option<UserParams>, StorageError>;

    fn merge_user_params(
        &mut self,
        user_id: &str,
        patch: &UserParamsPatch,
    ) -> Result<UserParams, StorageError>;
}
