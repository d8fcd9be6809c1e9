use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, warn};

use sheetmirror_core::{a1::A1Range, header::HeaderMap};

use crate::error::EngineError;
use crate::remote::{MajorDimension, SheetsApi};

/// Cache key: one sheet of one spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SheetKey {
    pub spreadsheet_id: String,
    pub sheet_name: String,
}

impl SheetKey {
    pub fn new(spreadsheet_id: &str, sheet_name: &str) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet_name: sheet_name.to_string(),
        }
    }
}

impl fmt::Display for SheetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.spreadsheet_id, self.sheet_name)
    }
}

/// Process-wide header cache.
///
/// Entries live until [`HeaderCache::evict`] or [`HeaderCache::clear`] is
/// called; a header-row edit in the sheet is not noticed otherwise.
/// Concurrent misses on one key may both fetch; the last insert wins.
#[derive(Default)]
pub struct HeaderCache {
    entries: RwLock<HashMap<SheetKey, Arc<HeaderMap>>>,
}

impl HeaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SheetKey) -> Option<Arc<HeaderMap>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn insert(&self, key: SheetKey, map: Arc<HeaderMap>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, map);
    }

    /// Drop one sheet's mapping. Returns whether it was cached.
    pub fn evict(&self, key: &SheetKey) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolve the header map of a sheet, fetching row 1 on a cache miss.
pub fn resolve_headers<C: SheetsApi + ?Sized>(
    client: &C,
    cache: &HeaderCache,
    spreadsheet_id: &str,
    sheet_name: &str,
) -> Result<Arc<HeaderMap>, EngineError> {
    let key = SheetKey::new(spreadsheet_id, sheet_name);
    if let Some(map) = cache.get(&key) {
        debug!("header cache hit for {key}");
        return Ok(map);
    }

    debug!("header cache miss for {key}; fetching row 1");
    let range = A1Range::header_row(sheet_name).to_a1()?;
    let response = client.get_values(spreadsheet_id, &range, MajorDimension::Rows)?;
    let map = HeaderMap::from_cells(response.first_vector());

    for (header, column) in map.duplicates() {
        warn!("{key}: header {header:?} in column {column} repeats an earlier header and is ignored");
    }

    let map = Arc::new(map);
    cache.insert(key, Arc::clone(&map));
    Ok(map)
}
