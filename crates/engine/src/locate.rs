use log::debug;

use sheetmirror_core::{a1::A1Range, field_value::FieldValue, locator::RowLocator};

use crate::error::EngineError;
use crate::headers::{resolve_headers, HeaderCache};
use crate::remote::{MajorDimension, SheetsApi};

/// First physical row holding data; row 1 is the header row.
pub const FIRST_DATA_ROW: u32 = 2;

/// Index of the first cell equal to `correlation_id`, as a physical row.
///
/// Cells are compared by their displayed text, exact and case-sensitive.
pub fn scan_for_row(column: &[FieldValue], correlation_id: &str) -> Option<u32> {
    column
        .iter()
        .position(|cell| cell.to_cell_string() == correlation_id)
        .map(|i| i as u32 + FIRST_DATA_ROW)
}

/// Resolve a locator to a physical row. `Ok(None)` means the correlation id
/// is not in the identifier column.
///
/// A row-number locator is returned as-is without checking that the row
/// exists. A correlation id costs one full read of the identifier column;
/// nothing is indexed between calls.
pub fn locate_row<C: SheetsApi + ?Sized>(
    client: &C,
    cache: &HeaderCache,
    spreadsheet_id: &str,
    sheet_name: &str,
    locator: &RowLocator,
    id_header: &str,
) -> Result<Option<u32>, EngineError> {
    let correlation_id = match locator {
        RowLocator::RowNumber(row) => return Ok(Some(row.get())),
        RowLocator::CorrelationId(id) => id,
    };

    let headers = resolve_headers(client, cache, spreadsheet_id, sheet_name)?;
    let id_column = headers
        .column_of(id_header)
        .ok_or_else(|| EngineError::HeaderNotFound(id_header.to_string()))?;

    let range = A1Range::column_from(sheet_name, id_column, FIRST_DATA_ROW).to_a1()?;
    let response = client.get_values(spreadsheet_id, &range, MajorDimension::Columns)?;
    let row = scan_for_row(response.first_vector(), correlation_id);
    debug!("located {correlation_id:?} in {sheet_name} at {row:?}");
    Ok(row)
}
