mod bench;
mod sheets;

pub use bench::{TestBench, SHEET_NAME, SPREADSHEET_ID};
pub use sheets::FakeSheets;
