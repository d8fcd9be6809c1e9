use std::collections::HashMap;

use crate::field_value::FieldValue;

/// Normalize a header cell: collapse whitespace runs to one space, trim,
/// lowercase.
pub fn normalize_header(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Column layout of one sheet, discovered from its header row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderMap {
    headers: Vec<String>,
    columns: HashMap<String, u32>,
    duplicates: Vec<(String, u32)>,
}

impl HeaderMap {
    /// Build from the raw header cells. The first occurrence of a normalized
    /// name wins; later ones are remembered in [`HeaderMap::duplicates`].
    pub fn from_cells(cells: &[FieldValue]) -> Self {
        let mut map = Self::default();
        for (i, cell) in cells.iter().enumerate() {
            let raw = cell.to_cell_string();
            let column = i as u32 + 1;
            let key = normalize_header(&raw);
            if map.columns.contains_key(&key) {
                map.duplicates.push((raw.clone(), column));
            } else {
                map.columns.insert(key, column);
            }
            map.headers.push(raw);
        }
        map
    }

    /// Column index for a header name, in any casing or spacing.
    pub fn column_of(&self, header: &str) -> Option<u32> {
        self.columns.get(&normalize_header(header)).copied()
    }

    /// Raw header cells in column order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Headers shadowed by an earlier column with the same normalized name.
    pub fn duplicates(&self) -> &[(String, u32)] {
        &self.duplicates
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
