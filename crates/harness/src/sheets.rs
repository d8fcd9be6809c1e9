use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sheetmirror_core::{
    a1::{A1Range, RangeArea},
    field_value::FieldValue,
};
use sheetmirror_engine::remote::{
    BatchUpdateRequest, BatchUpdateResponse, MajorDimension, RemoteError, SheetsApi,
    UpdateValuesResponse, ValueRange,
};

type Grid = Vec<Vec<FieldValue>>;

#[derive(Default)]
struct State {
    /// `(spreadsheet_id, sheet_name)` -> rows, row 1 first.
    sheets: HashMap<(String, String), Grid>,
    reads: Vec<String>,
    batches: Vec<BatchUpdateRequest>,
    read_failure: Option<RemoteError>,
    /// Apply this many writes of the next batch, then fail.
    batch_failure: Option<(usize, RemoteError)>,
}

/// In-memory stand-in for the remote spreadsheet service.
///
/// Clones share state, so a test can keep a handle while the engine owns
/// another.
#[derive(Clone, Default)]
pub struct FakeSheets {
    state: Arc<Mutex<State>>,
}

impl FakeSheets {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create (or replace) a sheet with the given header row.
    pub fn add_sheet(&self, spreadsheet_id: &str, sheet_name: &str, headers: &[&str]) {
        let header_row = headers.iter().map(|h| FieldValue::from(*h)).collect();
        self.state().sheets.insert(
            (spreadsheet_id.to_string(), sheet_name.to_string()),
            vec![header_row],
        );
    }

    /// Overwrite one physical row (1-based).
    pub fn set_row(&self, spreadsheet_id: &str, sheet_name: &str, row: u32, cells: Vec<FieldValue>) {
        let mut state = self.state();
        let grid = state
            .sheets
            .entry((spreadsheet_id.to_string(), sheet_name.to_string()))
            .or_default();
        let index = row as usize - 1;
        if grid.len() <= index {
            grid.resize(index + 1, Vec::new());
        }
        grid[index] = cells;
    }

    /// Displayed value of one cell (1-based), `Null` when empty.
    pub fn cell(&self, spreadsheet_id: &str, sheet_name: &str, row: u32, column: u32) -> FieldValue {
        self.state()
            .sheets
            .get(&(spreadsheet_id.to_string(), sheet_name.to_string()))
            .and_then(|grid| grid.get(row as usize - 1))
            .and_then(|cells| cells.get(column as usize - 1))
            .cloned()
            .unwrap_or(FieldValue::Null)
    }

    /// Ranges read so far, in call order.
    pub fn reads(&self) -> Vec<String> {
        self.state().reads.clone()
    }

    pub fn value_reads(&self) -> usize {
        self.state().reads.len()
    }

    pub fn batches(&self) -> Vec<BatchUpdateRequest> {
        self.state().batches.clone()
    }

    pub fn batch_calls(&self) -> usize {
        self.state().batches.len()
    }

    /// Fail every read until cleared with `None`.
    pub fn fail_reads(&self, error: Option<RemoteError>) {
        self.state().read_failure = error;
    }

    /// Apply the first `applied` writes of the next batch, then fail it.
    pub fn fail_next_batch_after(&self, applied: usize, error: RemoteError) {
        self.state().batch_failure = Some((applied, error));
    }
}

fn trim_trailing_empty(cells: &mut Vec<FieldValue>) {
    while matches!(cells.last(), Some(FieldValue::Null)) {
        cells.pop();
    }
}

fn read_area(grid: &Grid, area: RangeArea, dimension: MajorDimension) -> Grid {
    let cell = |row: u32, column: u32| {
        grid.get(row as usize - 1)
            .and_then(|cells| cells.get(column as usize - 1))
            .cloned()
            .unwrap_or(FieldValue::Null)
    };
    let mut values: Grid = match area {
        RangeArea::Rows { start, end } => (start..=end)
            .map(|row| grid.get(row as usize - 1).cloned().unwrap_or_default())
            .collect(),
        RangeArea::ColumnFrom { column, start_row } => {
            let last = grid.len() as u32;
            let column_cells: Vec<FieldValue> =
                (start_row..=last).map(|row| cell(row, column)).collect();
            match dimension {
                MajorDimension::Columns => vec![column_cells],
                MajorDimension::Rows => column_cells.into_iter().map(|c| vec![c]).collect(),
            }
        }
        RangeArea::Cell { column, row } => vec![vec![cell(row, column)]],
    };
    for vector in &mut values {
        trim_trailing_empty(vector);
    }
    while values.last().is_some_and(Vec::is_empty) {
        values.pop();
    }
    values
}

fn write_area(grid: &mut Grid, area: RangeArea, values: &Grid) -> (u32, u32) {
    let (top, left) = match area {
        RangeArea::Cell { column, row } => (row, column),
        RangeArea::Rows { start, .. } => (start, 1),
        RangeArea::ColumnFrom { column, start_row } => (start_row, column),
    };
    let mut cells = 0;
    for (r, row_values) in values.iter().enumerate() {
        let index = top as usize - 1 + r;
        if grid.len() <= index {
            grid.resize(index + 1, Vec::new());
        }
        for (c, value) in row_values.iter().enumerate() {
            // A null entry means "leave this cell as it is".
            if value.is_null() {
                continue;
            }
            let column = left as usize - 1 + c;
            let row = &mut grid[index];
            if row.len() <= column {
                row.resize(column + 1, FieldValue::Null);
            }
            row[column] = value.clone();
            cells += 1;
        }
    }
    (values.len() as u32, cells)
}

impl SheetsApi for FakeSheets {
    fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        major_dimension: MajorDimension,
    ) -> Result<ValueRange, RemoteError> {
        let mut state = self.state();
        state.reads.push(range.to_string());
        if let Some(error) = &state.read_failure {
            return Err(error.clone());
        }
        let parsed = A1Range::parse(range).map_err(|e| RemoteError::Status {
            status: 400,
            body: e.to_string(),
        })?;
        let grid = state
            .sheets
            .get(&(spreadsheet_id.to_string(), parsed.sheet.clone()))
            .ok_or_else(|| RemoteError::NotFound(format!("{spreadsheet_id}/{range}")))?;
        Ok(ValueRange {
            range: range.to_string(),
            major_dimension,
            values: read_area(grid, parsed.area, major_dimension),
        })
    }

    fn batch_update_values(
        &self,
        spreadsheet_id: &str,
        request: &BatchUpdateRequest,
    ) -> Result<BatchUpdateResponse, RemoteError> {
        let mut state = self.state();
        state.batches.push(request.clone());
        let failure = state.batch_failure.take();

        let mut response = BatchUpdateResponse {
            spreadsheet_id: spreadsheet_id.to_string(),
            ..Default::default()
        };
        let mut rows = BTreeSet::new();
        let mut sheets = BTreeSet::new();
        for (index, data) in request.data.iter().enumerate() {
            if let Some((applied, error)) = &failure {
                if index >= *applied {
                    return Err(error.clone());
                }
            }
            let parsed = A1Range::parse(&data.range).map_err(|e| RemoteError::Status {
                status: 400,
                body: e.to_string(),
            })?;
            let grid = state
                .sheets
                .get_mut(&(spreadsheet_id.to_string(), parsed.sheet.clone()))
                .ok_or_else(|| RemoteError::NotFound(data.range.clone()))?;
            let (updated_rows, updated_cells) = write_area(grid, parsed.area, &data.values);
            if let RangeArea::Cell { row, .. } = parsed.area {
                rows.insert((parsed.sheet.clone(), row));
            }
            sheets.insert(parsed.sheet.clone());
            response.total_updated_cells += u64::from(updated_cells);
            response.responses.push(UpdateValuesResponse {
                updated_range: data.range.clone(),
                updated_rows: u64::from(updated_rows),
                updated_columns: 1,
                updated_cells: u64::from(updated_cells),
            });
        }
        if let Some((_, error)) = failure {
            return Err(error);
        }
        response.total_updated_rows = rows.len() as u64;
        response.total_updated_columns = request.data.len() as u64;
        response.total_updated_sheets = sheets.len() as u64;
        Ok(response)
    }
}
