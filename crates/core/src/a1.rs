//! A1-style range addressing for the remote sheet API.
//!
//! Ranges always carry a sheet qualifier (`Sheet1!B7`). Sheet names made of
//! anything but ASCII letters and digits are wrapped in single quotes with
//! embedded quotes doubled (`'Form Responses 1'!B7`, `'Bob''s'!A1`).
//!
//! Columns and rows are 1-based throughout this module.

use std::fmt;

use crate::CoreError;

/// Largest column the remote grid accepts (`ZZZ`).
pub const MAX_COLUMN: u32 = 18_278;

/// Convert a 1-based column index to its base-26 letters (1 -> `A`,
/// 27 -> `AA`).
pub fn column_letter(column: u32) -> Result<String, CoreError> {
    if column == 0 || column > MAX_COLUMN {
        return Err(CoreError::InvalidColumn(format!(
            "column index {column} out of range 1..={MAX_COLUMN}"
        )));
    }
    let mut n = column;
    let mut out = Vec::<u8>::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).map_err(|e| CoreError::InvalidColumn(e.to_string()))
}

/// Parse column letters (case-insensitive) back into a 1-based index.
pub fn column_number(letters: &str) -> Result<u32, CoreError> {
    if letters.is_empty() {
        return Err(CoreError::InvalidColumn("empty column letters".into()));
    }
    let mut col: u32 = 0;
    for b in letters.bytes() {
        if !b.is_ascii_alphabetic() {
            return Err(CoreError::InvalidColumn(format!(
                "non-letter in column {letters:?}"
            )));
        }
        let v = (b.to_ascii_uppercase() - b'A') as u32 + 1;
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(v))
            .filter(|c| *c <= MAX_COLUMN)
            .ok_or_else(|| CoreError::InvalidColumn(format!("column {letters:?} too large")))?;
    }
    Ok(col)
}

pub fn sheet_name_needs_quotes(name: &str) -> bool {
    name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Render a sheet name for embedding in a range string.
pub fn quote_sheet_name(name: &str) -> String {
    if !sheet_name_needs_quotes(name) {
        return name.to_string();
    }
    let escaped = name.replace('\'', "''");
    format!("'{escaped}'")
}

/// The rectangular part of a range after the `!`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeArea {
    /// Whole rows, e.g. `1:1`.
    Rows { start: u32, end: u32 },
    /// One column from a row downward, e.g. `C2:C`.
    ColumnFrom { column: u32, start_row: u32 },
    /// A single cell, e.g. `B7`.
    Cell { column: u32, row: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A1Range {
    pub sheet: String,
    pub area: RangeArea,
}

impl A1Range {
    pub fn header_row(sheet: &str) -> Self {
        Self {
            sheet: sheet.to_string(),
            area: RangeArea::Rows { start: 1, end: 1 },
        }
    }

    pub fn column_from(sheet: &str, column: u32, start_row: u32) -> Self {
        Self {
            sheet: sheet.to_string(),
            area: RangeArea::ColumnFrom { column, start_row },
        }
    }

    pub fn cell(sheet: &str, column: u32, row: u32) -> Self {
        Self {
            sheet: sheet.to_string(),
            area: RangeArea::Cell { column, row },
        }
    }

    /// Render the range. Fails only on a column outside the grid.
    pub fn to_a1(&self) -> Result<String, CoreError> {
        let sheet = quote_sheet_name(&self.sheet);
        Ok(match self.area {
            RangeArea::Rows { start, end } => format!("{sheet}!{start}:{end}"),
            RangeArea::ColumnFrom { column, start_row } => {
                let col = column_letter(column)?;
                format!("{sheet}!{col}{start_row}:{col}")
            }
            RangeArea::Cell { column, row } => {
                format!("{sheet}!{}{row}", column_letter(column)?)
            }
        })
    }

    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let (sheet, rest) = split_sheet_qualifier(input)?;
        let area = parse_area(rest)
            .ok_or_else(|| CoreError::InvalidRange(format!("unsupported area in {input:?}")))?;
        Ok(Self { sheet, area })
    }
}

impl fmt::Display for A1Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_a1() {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{}!<invalid>", quote_sheet_name(&self.sheet)),
        }
    }
}

/// True when `range` starts with a well-formed, non-empty sheet qualifier.
pub fn has_sheet_qualifier(range: &str) -> bool {
    matches!(split_sheet_qualifier(range), Ok((sheet, rest)) if !sheet.is_empty() && !rest.is_empty())
}

/// Split `Sheet!Area` into the unquoted sheet name and the area text.
pub fn split_sheet_qualifier(input: &str) -> Result<(String, &str), CoreError> {
    if let Some(quoted) = input.strip_prefix('\'') {
        let mut sheet = String::new();
        let mut chars = quoted.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c != '\'' {
                sheet.push(c);
                continue;
            }
            if matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                sheet.push('\'');
                continue;
            }
            // Closing quote: the next character must be the separator.
            let after = &quoted[i + 1..];
            return match after.strip_prefix('!') {
                Some(rest) => Ok((sheet, rest)),
                None => Err(CoreError::InvalidRange(format!(
                    "expected '!' after quoted sheet name in {input:?}"
                ))),
            };
        }
        return Err(CoreError::InvalidRange(format!(
            "unterminated sheet name in {input:?}"
        )));
    }

    match input.split_once('!') {
        Some((sheet, rest)) if !sheet.is_empty() => {
            if sheet_name_needs_quotes(sheet) {
                return Err(CoreError::InvalidRange(format!(
                    "sheet name {sheet:?} must be quoted"
                )));
            }
            Ok((sheet.to_string(), rest))
        }
        _ => Err(CoreError::InvalidRange(format!(
            "missing sheet qualifier in {input:?}"
        ))),
    }
}

fn parse_area(area: &str) -> Option<RangeArea> {
    match area.split_once(':') {
        Some((left, right)) => {
            if let (Ok(start), Ok(end)) = (left.parse::<u32>(), right.parse::<u32>()) {
                return (start > 0 && end >= start).then_some(RangeArea::Rows { start, end });
            }
            let (column, start_row) = parse_cell(left)?;
            let right_col = column_number(right).ok()?;
            (right_col == column).then_some(RangeArea::ColumnFrom { column, start_row })
        }
        None => {
            let (column, row) = parse_cell(area)?;
            Some(RangeArea::Cell { column, row })
        }
    }
}

fn parse_cell(cell: &str) -> Option<(u32, u32)> {
    let split = cell.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell.split_at(split);
    let column = column_number(letters).ok()?;
    let row = digits.parse::<u32>().ok().filter(|r| *r > 0)?;
    Some((column, row))
}
