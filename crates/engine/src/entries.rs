//! Review actions on mirrored records.
//!
//! Every state change is two steps: merge into the local document, then
//! write the record's whole field map back to the sheet. The second step
//! can fail after the first has committed; there is no rollback, and the
//! failure is reported as [`EngineError::PropagationFailed`].

use std::collections::BTreeMap;

use log::{info, warn};
use serde::Serialize;

use sheetmirror_core::{
    field_value::{FieldMap, FieldValue},
    header::normalize_header,
    ids::RecordId,
};
use sheetmirror_storage::{DocumentStore, EntryPatch, EntryQuery, MirroredRecord, SheetRef};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::remote::SheetsApi;
use crate::service::MirrorService;
use crate::{PropagateOutcome, PropagateRequest};

/// A named change to a record's review state.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Approve: processed and validated.
    Validate,
    /// Reject with a reason: processed, not validated.
    Refuse { reason: String },
    /// Merge arbitrary fields.
    Patch { fields: FieldMap },
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Refuse { .. } => "refuse",
            Self::Patch { .. } => "patch",
        }
    }

    /// The merge this transition applies to the mirrored record. Status
    /// flags are also written into the row under the configured headers.
    pub fn entry_patch(&self, config: &EngineConfig, now: u64) -> Result<EntryPatch, EngineError> {
        let base = EntryPatch {
            updated_at: Some(now),
            ..Default::default()
        };
        let patch = match self {
            Self::Validate => EntryPatch {
                processed: Some(true),
                validated: Some(true),
                refusal_reason: Some(None),
                ..base
            }
            .with_field(&config.processed_header, FieldValue::Boolean(true))
            .with_field(&config.validated_header, FieldValue::Boolean(true))
            .with_field(&config.refusal_reason_header, FieldValue::Text(String::new())),

            Self::Refuse { reason } => {
                let reason = reason.trim();
                if reason.is_empty() {
                    return Err(EngineError::Validation("a refusal needs a reason".into()));
                }
                EntryPatch {
                    processed: Some(true),
                    validated: Some(false),
                    refusal_reason: Some(Some(reason.to_string())),
                    ..base
                }
                .with_field(&config.processed_header, FieldValue::Boolean(true))
                .with_field(&config.validated_header, FieldValue::Boolean(false))
                .with_field(&config.refusal_reason_header, FieldValue::from(reason))
            }

            Self::Patch { fields } => {
                if fields.is_empty() {
                    return Err(EngineError::Validation("no fields to update".into()));
                }
                let mut seen = BTreeMap::new();
                for key in fields.keys() {
                    if let Some(first) = seen.insert(normalize_header(key), key) {
                        return Err(EngineError::Validation(format!(
                            "fields {first:?} and {key:?} name the same column"
                        )));
                    }
                }
                EntryPatch {
                    row: fields.clone(),
                    ..base
                }
            }
        };
        Ok(patch)
    }
}

/// The merged record plus what the write-back did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOutcome {
    pub record: MirroredRecord,
    pub propagation: PropagateOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct ListEntries {
    pub sheet_id: String,
    pub processed: Option<bool>,
    pub validated: Option<bool>,
    pub limit: Option<u32>,
    pub after: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPage {
    pub items: Vec<MirroredRecord>,
    /// Row index to pass as `after` for the next page.
    pub next_after: Option<u32>,
}

impl<S: DocumentStore, C: SheetsApi> MirrorService<S, C> {
    pub fn get_entry(&self, id: &RecordId) -> Result<MirroredRecord, EngineError> {
        self.with_store(|store| store.get_entry(id))?
            .ok_or_else(|| EngineError::EntryNotFound(id.to_string()))
    }

    pub fn list_entries(&self, query: &ListEntries) -> Result<EntryPage, EngineError> {
        let sheet_id = query.sheet_id.trim();
        if sheet_id.is_empty() {
            return Err(EngineError::Validation("sheetId is required".into()));
        }
        let store_query = EntryQuery {
            sheet_id: sheet_id.to_string(),
            processed: query.processed,
            validated: query.validated,
            after: query.after,
            limit: self.config().page_size(query.limit),
        };
        let items = self.with_store(|store| store.query_entries(&store_query))?;
        let next_after = items.last().map(|e| e.row_index);
        Ok(EntryPage { items, next_after })
    }

    /// Sheets that have mirrored entries, one per spreadsheet id.
    pub fn list_sheets(&self) -> Result<Vec<SheetRef>, EngineError> {
        let mut refs = self.with_store(|store| store.sheet_refs())?;
        refs.dedup_by(|next, kept| next.sheet_id == kept.sheet_id);
        Ok(refs)
    }

    pub fn validate_entry(&self, id: &RecordId) -> Result<TransitionOutcome, EngineError> {
        self.apply_transition(id, &Transition::Validate)
    }

    pub fn refuse_entry(&self, id: &RecordId, reason: &str) -> Result<TransitionOutcome, EngineError> {
        self.apply_transition(
            id,
            &Transition::Refuse {
                reason: reason.to_string(),
            },
        )
    }

    pub fn patch_entry(&self, id: &RecordId, fields: FieldMap) -> Result<TransitionOutcome, EngineError> {
        self.apply_transition(id, &Transition::Patch { fields })
    }

    /// Merge the transition locally, then propagate the full field map.
    pub fn apply_transition(
        &self,
        id: &RecordId,
        transition: &Transition,
    ) -> Result<TransitionOutcome, EngineError> {
        let patch = transition.entry_patch(self.config(), self.now()?)?;

        let record = self
            .with_store(|store| match store.get_entry(id)? {
                Some(_) => store.merge_entry(id, &patch).map(Some),
                None => Ok(None),
            })?
            .ok_or_else(|| EngineError::EntryNotFound(id.to_string()))?;
        info!("{} applied to entry {id}", transition.name());

        let propagation = self.propagate_record(&record).map_err(|source| {
            warn!(
                "{} on entry {id} stored locally but write-back failed: {source}",
                transition.name()
            );
            EngineError::PropagationFailed {
                record_id: id.to_string(),
                source: Box::new(source),
            }
        })?;

        Ok(TransitionOutcome {
            record,
            propagation,
        })
    }

    /// Write an entry's current fields back without changing it.
    pub fn write_back(&self, id: &RecordId) -> Result<PropagateOutcome, EngineError> {
        let record = self.get_entry(id)?;
        self.propagate_record(&record)
    }

    fn propagate_record(&self, record: &MirroredRecord) -> Result<PropagateOutcome, EngineError> {
        let request = PropagateRequest {
            record_id: record.id.clone(),
            spreadsheet_id: record.sheet_id.clone(),
            sheet_name: record.sheet_name.clone(),
            locator: record.locator()?,
            fields: record.row.clone(),
        };
        self.engine().propagate(&request)
    }
}
