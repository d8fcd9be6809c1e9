use std::collections::BTreeMap;
use std::num::NonZeroU32;

use sheetmirror_core::{
    a1::A1Range,
    field_value::{FieldMap, FieldValue},
    header::HeaderMap,
    write::CompiledWrite,
    CoreError,
};

/// Output of [`compile_updates`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledUpdate {
    pub writes: Vec<CompiledWrite>,
    /// Update keys with no matching header. Dropped, not an error.
    pub dropped: Vec<String>,
}

impl CompiledUpdate {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Turn `{header -> value}` into one single-cell write per known header on
/// `row`. Pure: the header map must already be resolved.
///
/// Keys that resolve to the same column collapse into one write when their
/// values agree and are rejected otherwise. `Null` is written as an empty
/// string; the remote leaves a cell untouched for a null entry.
pub fn compile_updates(
    headers: &HeaderMap,
    sheet_name: &str,
    row: NonZeroU32,
    updates: &FieldMap,
) -> Result<CompiledUpdate, CoreError> {
    let mut compiled = CompiledUpdate::default();
    let mut targets: BTreeMap<u32, (&str, &FieldValue)> = BTreeMap::new();
    for (header, value) in updates {
        let Some(column) = headers.column_of(header) else {
            compiled.dropped.push(header.clone());
            continue;
        };
        match targets.get(&column) {
            Some((first, existing)) if *existing != value => {
                return Err(CoreError::InvalidData(format!(
                    "fields {first:?} and {header:?} both target column {column} with different values"
                )));
            }
            Some(_) => {}
            None => {
                targets.insert(column, (header.as_str(), value));
            }
        }
    }
    for (column, (_, value)) in targets {
        let range = A1Range::cell(sheet_name, column, row.get()).to_a1()?;
        let value = match value {
            FieldValue::Null => FieldValue::Text(String::new()),
            other => other.clone(),
        };
        compiled.writes.push(CompiledWrite::single(range, value));
    }
    Ok(compiled)
}
