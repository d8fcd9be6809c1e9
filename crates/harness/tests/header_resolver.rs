use std::sync::Arc;
use std::thread;

use sheetmirror_engine::{remote::RemoteError, EngineConfig, EngineError, UpdateEngine};
use sheetmirror_harness::{FakeSheets, SHEET_NAME, SPREADSHEET_ID};

fn engine_with(headers: &[&str]) -> (FakeSheets, UpdateEngine<FakeSheets>) {
    let sheets = FakeSheets::new();
    sheets.add_sheet(SPREADSHEET_ID, SHEET_NAME, headers);
    let engine = UpdateEngine::new(sheets.clone(), EngineConfig::default());
    (sheets, engine)
}

#[test]
fn header_row_is_fetched_once() -> Result<(), Box<dyn std::error::Error>> {
    let (sheets, engine) = engine_with(&["Timestamp", "FormResponseID", "Name"]);

    let first = engine.resolve(SPREADSHEET_ID, SHEET_NAME)?;
    let second = engine.resolve(SPREADSHEET_ID, SHEET_NAME)?;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(sheets.value_reads(), 1);
    assert_eq!(sheets.reads(), vec!["'Form Responses 1'!1:1".to_string()]);
    assert_eq!(first.column_of("formresponseid"), Some(2));
    assert_eq!(first.column_of("  NAME "), Some(3));
    Ok(())
}

#[test]
fn eviction_forces_a_refetch() -> Result<(), Box<dyn std::error::Error>> {
    let (sheets, engine) = engine_with(&["Timestamp", "Name"]);
    engine.resolve(SPREADSHEET_ID, SHEET_NAME)?;

    // A column is inserted in the sheet; the cache still has the old layout.
    sheets.add_sheet(SPREADSHEET_ID, SHEET_NAME, &["Timestamp", "Email", "Name"]);
    assert_eq!(engine.resolve(SPREADSHEET_ID, SHEET_NAME)?.column_of("Name"), Some(2));

    assert!(engine.evict_headers(SPREADSHEET_ID, SHEET_NAME));
    assert!(!engine.evict_headers(SPREADSHEET_ID, SHEET_NAME));
    assert_eq!(engine.resolve(SPREADSHEET_ID, SHEET_NAME)?.column_of("Name"), Some(3));
    assert_eq!(sheets.value_reads(), 2);
    Ok(())
}

#[test]
fn failed_fetch_is_not_cached() -> Result<(), Box<dyn std::error::Error>> {
    let (sheets, engine) = engine_with(&["Name"]);
    sheets.fail_reads(Some(RemoteError::RateLimited("slow down".into())));

    let err = engine.resolve(SPREADSHEET_ID, SHEET_NAME).unwrap_err();
    assert!(matches!(err, EngineError::RemoteFetch(RemoteError::RateLimited(_))));
    assert!(engine.header_cache().is_empty());

    sheets.fail_reads(None);
    engine.resolve(SPREADSHEET_ID, SHEET_NAME)?;
    assert_eq!(engine.header_cache().len(), 1);
    assert_eq!(sheets.value_reads(), 2);
    Ok(())
}

#[test]
fn unknown_sheet_is_a_remote_error() {
    let (_sheets, engine) = engine_with(&["Name"]);
    let err = engine.resolve(SPREADSHEET_ID, "Sheet9").unwrap_err();
    assert!(matches!(err, EngineError::RemoteFetch(RemoteError::NotFound(_))));
}

#[test]
fn duplicate_headers_resolve_to_first_column() -> Result<(), Box<dyn std::error::Error>> {
    let (_sheets, engine) = engine_with(&["Name", "Notes", "name"]);
    let headers = engine.resolve(SPREADSHEET_ID, SHEET_NAME)?;
    assert_eq!(headers.column_of("Name"), Some(1));
    assert_eq!(headers.duplicates(), &[("name".to_string(), 3)]);
    Ok(())
}

#[test]
fn sheets_are_cached_independently() -> Result<(), Box<dyn std::error::Error>> {
    let (sheets, engine) = engine_with(&["Name"]);
    sheets.add_sheet(SPREADSHEET_ID, "Archive", &["Id", "Name"]);

    assert_eq!(engine.resolve(SPREADSHEET_ID, SHEET_NAME)?.column_of("Name"), Some(1));
    assert_eq!(engine.resolve(SPREADSHEET_ID, "Archive")?.column_of("Name"), Some(2));
    assert_eq!(engine.header_cache().len(), 2);

    engine.clear_headers();
    assert!(engine.header_cache().is_empty());
    Ok(())
}

#[test]
fn concurrent_resolution_agrees() {
    let (_sheets, engine) = engine_with(&["Timestamp", "FormResponseID", "Name"]);

    let columns: Vec<Option<u32>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    engine
                        .resolve(SPREADSHEET_ID, SHEET_NAME)
                        .map(|headers| headers.column_of("Name"))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });

    assert!(columns.iter().all(|c| *c == Some(3)));
    assert_eq!(engine.header_cache().len(), 1);
}
