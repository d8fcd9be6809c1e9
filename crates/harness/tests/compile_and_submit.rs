use std::num::NonZeroU32;

use sheetmirror_core::{
    field_value::{FieldMap, FieldValue},
    ids::RecordId,
    locator::RowLocator,
    write::CompiledWrite,
};
use sheetmirror_engine::{
    remote::{RemoteError, ValueInputOption},
    EngineConfig, EngineError, PropagateRequest, UpdateEngine,
};
use sheetmirror_harness::{FakeSheets, SHEET_NAME, SPREADSHEET_ID};

fn engine() -> (FakeSheets, UpdateEngine<FakeSheets>) {
    let sheets = FakeSheets::new();
    sheets.add_sheet(SPREADSHEET_ID, "Sheet1", &["Name", "Qty", "Price"]);
    sheets.add_sheet(SPREADSHEET_ID, SHEET_NAME, &["Timestamp", "FormResponseID", "Status", "Note"]);
    sheets.set_row(SPREADSHEET_ID, SHEET_NAME, 2, vec!["t1".into(), "r-1".into()]);
    sheets.set_row(SPREADSHEET_ID, SHEET_NAME, 3, vec!["t2".into(), "r-2".into()]);
    let engine = UpdateEngine::new(sheets.clone(), EngineConfig::default());
    (sheets, engine)
}

fn fields(pairs: &[(&str, FieldValue)]) -> FieldMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn request(locator: RowLocator, fields: FieldMap) -> PropagateRequest {
    PropagateRequest {
        record_id: RecordId::new("rec"),
        spreadsheet_id: SPREADSHEET_ID.to_string(),
        sheet_name: SHEET_NAME.to_string(),
        locator,
        fields,
    }
}

#[test]
fn known_header_becomes_a_single_cell_write() -> Result<(), Box<dyn std::error::Error>> {
    let (sheets, engine) = engine();
    let row = NonZeroU32::new(7).ok_or("zero row")?;

    let compiled = engine.compile(
        SPREADSHEET_ID,
        "Sheet1",
        row,
        &fields(&[("Qty", FieldValue::Integer(5))]),
    )?;
    assert_eq!(
        compiled.writes,
        vec![CompiledWrite::single("Sheet1!B7".into(), FieldValue::Integer(5))]
    );

    let outcome = engine.submit(SPREADSHEET_ID, &compiled.writes)?;
    assert_eq!(outcome.rows_updated, 1);
    assert_eq!(sheets.cell(SPREADSHEET_ID, "Sheet1", 7, 2), FieldValue::Integer(5));

    let batches = sheets.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].value_input_option, ValueInputOption::UserEntered);
    Ok(())
}

#[test]
fn unknown_headers_are_dropped() -> Result<(), Box<dyn std::error::Error>> {
    let (_sheets, engine) = engine();
    let row = NonZeroU32::new(2).ok_or("zero row")?;
    let compiled = engine.compile(
        SPREADSHEET_ID,
        "Sheet1",
        row,
        &fields(&[("Colour", "red".into()), ("price", FieldValue::Float(2.5))]),
    )?;
    assert_eq!(compiled.writes.len(), 1);
    assert_eq!(compiled.writes[0].range, "Sheet1!C2");
    assert_eq!(compiled.dropped, vec!["Colour".to_string()]);
    Ok(())
}

#[test]
fn empty_batch_makes_no_remote_call() -> Result<(), Box<dyn std::error::Error>> {
    let (sheets, engine) = engine();
    let outcome = engine.submit(SPREADSHEET_ID, &[])?;
    assert!(outcome.is_noop());
    assert_eq!(outcome.rows_updated, 0);
    assert_eq!(sheets.batch_calls(), 0);

    // Nothing matched, so propagation sends nothing either.
    let outcome = engine.propagate(&request(
        RowLocator::row(2)?,
        fields(&[("Unknown", "x".into())]),
    ))?;
    assert!(outcome.raw.is_none());
    assert_eq!(outcome.dropped, vec!["Unknown".to_string()]);
    assert_eq!(sheets.batch_calls(), 0);
    Ok(())
}

#[test]
fn malformed_write_never_reaches_the_remote() {
    let (sheets, engine) = engine();
    let writes = vec![
        CompiledWrite::single("Sheet1!A2".into(), "ok".into()),
        CompiledWrite::single("A2".into(), "no sheet".into()),
    ];
    let err = engine.submit(SPREADSHEET_ID, &writes).unwrap_err();
    assert!(matches!(err, EngineError::InvalidWrite { index: 1, .. }));
    assert!(err.is_validation());
    assert_eq!(sheets.batch_calls(), 0);
}

#[test]
fn missing_spreadsheet_id_is_rejected() {
    let (sheets, engine) = engine();
    let writes = vec![CompiledWrite::single("Sheet1!A2".into(), "x".into())];
    assert!(engine.submit(" ", &writes).unwrap_err().is_validation());
    assert_eq!(sheets.batch_calls(), 0);
}

#[test]
fn propagate_by_correlation_id() -> Result<(), Box<dyn std::error::Error>> {
    let (sheets, engine) = engine();
    let outcome = engine.propagate(&request(
        RowLocator::correlation("r-2")?,
        fields(&[("Status", "approved".into()), ("Note", "ok".into())]),
    ))?;

    assert!(outcome.ok);
    assert_eq!(outcome.row, 3);
    assert_eq!(outcome.rows_updated, 2);
    assert_eq!(
        outcome.updated_ranges,
        vec![
            "'Form Responses 1'!C3".to_string(),
            "'Form Responses 1'!D3".to_string(),
        ]
    );
    assert_eq!(sheets.cell(SPREADSHEET_ID, SHEET_NAME, 3, 3), FieldValue::from("approved"));
    assert_eq!(sheets.cell(SPREADSHEET_ID, SHEET_NAME, 2, 3), FieldValue::Null);
    Ok(())
}

#[test]
fn resubmitting_the_same_values_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let (sheets, engine) = engine();
    let req = request(RowLocator::correlation("r-1")?, fields(&[("Status", "done".into())]));

    engine.propagate(&req)?;
    engine.propagate(&req)?;

    assert_eq!(sheets.batch_calls(), 2);
    assert_eq!(sheets.batches()[0], sheets.batches()[1]);
    assert_eq!(sheets.cell(SPREADSHEET_ID, SHEET_NAME, 2, 3), FieldValue::from("done"));
    Ok(())
}

#[test]
fn unknown_correlation_id_is_row_not_found() -> Result<(), Box<dyn std::error::Error>> {
    let (sheets, engine) = engine();
    let err = engine
        .propagate(&request(
            RowLocator::correlation("r-404")?,
            fields(&[("Status", "x".into())]),
        ))
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::RowNotFound { ref correlation_id, .. } if correlation_id == "r-404"
    ));
    assert_eq!(sheets.batch_calls(), 0);
    Ok(())
}

#[test]
fn partial_batch_failure_is_surfaced() -> Result<(), Box<dyn std::error::Error>> {
    let (sheets, engine) = engine();
    sheets.fail_next_batch_after(1, RemoteError::RateLimited("quota".into()));

    let err = engine
        .propagate(&request(
            RowLocator::row(2)?,
            fields(&[("Note", "first".into()), ("Status", "second".into())]),
        ))
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::BatchSubmitFailed {
            writes: 2,
            source: RemoteError::RateLimited(_)
        }
    ));

    // Writes go out in column order; the remote applied Status before failing.
    assert_eq!(sheets.cell(SPREADSHEET_ID, SHEET_NAME, 2, 3), FieldValue::from("second"));
    assert_eq!(sheets.cell(SPREADSHEET_ID, SHEET_NAME, 2, 4), FieldValue::Null);

    // A retry of the whole batch converges.
    let outcome = engine.propagate(&request(
        RowLocator::row(2)?,
        fields(&[("Note", "first".into()), ("Status", "second".into())]),
    ))?;
    assert_eq!(outcome.rows_updated, 2);
    assert_eq!(sheets.cell(SPREADSHEET_ID, SHEET_NAME, 2, 4), FieldValue::from("first"));
    Ok(())
}

#[test]
fn empty_sheet_name_is_rejected_before_any_call() -> Result<(), Box<dyn std::error::Error>> {
    let (sheets, engine) = engine();
    let mut req = request(RowLocator::row(2)?, fields(&[("Status", "x".into())]));
    req.sheet_name = String::new();
    assert!(engine.propagate(&req).unwrap_err().is_validation());
    assert_eq!(sheets.value_reads(), 0);
    Ok(())
}

#[test]
fn null_update_clears_the_cell() -> Result<(), Box<dyn std::error::Error>> {
    let (sheets, engine) = engine();
    sheets.set_row(
        SPREADSHEET_ID,
        SHEET_NAME,
        2,
        vec!["t1".into(), "r-1".into(), "pending".into(), "call back".into()],
    );

    engine.propagate(&request(
        RowLocator::correlation("r-1")?,
        fields(&[("Note", FieldValue::Null), ("Status", "done".into())]),
    ))?;

    let sent = &sheets.batches()[0].data;
    assert_eq!(sent[1].values, vec![vec![FieldValue::from("")]]);
    assert_eq!(sheets.cell(SPREADSHEET_ID, SHEET_NAME, 2, 4), FieldValue::from(""));
    assert_eq!(sheets.cell(SPREADSHEET_ID, SHEET_NAME, 2, 3), FieldValue::from("done"));
    Ok(())
}

#[test]
fn raw_null_in_a_batch_leaves_the_cell_alone() -> Result<(), Box<dyn std::error::Error>> {
    let (sheets, engine) = engine();
    sheets.set_row(SPREADSHEET_ID, "Sheet1", 2, vec!["Ada".into()]);
    let writes = vec![CompiledWrite::single("Sheet1!A2".into(), FieldValue::Null)];
    engine.submit(SPREADSHEET_ID, &writes)?;
    assert_eq!(sheets.cell(SPREADSHEET_ID, "Sheet1", 2, 1), FieldValue::from("Ada"));
    Ok(())
}
