use serde::{Deserialize, Serialize};

use crate::a1::has_sheet_qualifier;
use crate::field_value::FieldValue;

/// One range/value pair ready for a batched write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledWrite {
    pub range: String,
    pub values: Vec<Vec<FieldValue>>,
}

impl CompiledWrite {
    pub fn single(range: String, value: FieldValue) -> Self {
        Self {
            range,
            values: vec![vec![value]],
        }
    }

    /// Reason this write must not be sent, if any.
    pub fn problem(&self) -> Option<&'static str> {
        if !has_sheet_qualifier(&self.range) {
            return Some("range has no sheet qualifier");
        }
        if self.values.is_empty() || self.values.iter().any(|row| row.is_empty()) {
            return Some("values must be a non-empty 2D grid");
        }
        None
    }
}
