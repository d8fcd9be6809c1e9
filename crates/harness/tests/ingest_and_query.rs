use std::collections::BTreeMap;

use sheetmirror_core::{field_value::FieldValue, ids::RecordId};
use sheetmirror_engine::{
    entries::ListEntries,
    ingest::{verify_shared_secret, IngestBatch},
    EngineConfig, EngineError,
};
use sheetmirror_harness::{TestBench, SHEET_NAME, SPREADSHEET_ID};
use sheetmirror_storage::SheetRef;

fn positional(from_row: u32, rows: Vec<Vec<FieldValue>>) -> IngestBatch {
    IngestBatch {
        spreadsheet_id: SPREADSHEET_ID.to_string(),
        sheet_name: Some(SHEET_NAME.to_string()),
        from_row: Some(from_row),
        rows,
        ..Default::default()
    }
}

fn bench() -> TestBench {
    TestBench::with_sheet(&["Timestamp", "FormResponseID", "Name", "Qty"]).unwrap()
}

#[test]
fn positional_rows_are_named_after_headers() -> Result<(), Box<dyn std::error::Error>> {
    let bench = bench();
    let summary = bench.service.ingest_rows(&positional(
        2,
        vec![
            vec!["t1".into(), "".into(), "Ada".into(), FieldValue::Integer(1)],
            vec!["t2".into(), "".into(), "Grace".into(), FieldValue::Integer(2), "stray".into()],
            vec!["t3".into()],
        ],
    ))?;

    assert_eq!(summary.count(), 3);
    assert_eq!(summary.ids[1], RecordId::for_row(SPREADSHEET_ID, 3));

    let grace = bench.service.get_entry(&summary.ids[1])?;
    assert_eq!(grace.row_index, 3);
    assert_eq!(grace.sheet_name, SHEET_NAME);
    assert_eq!(grace.row.len(), 4);
    assert_eq!(grace.row.get("Qty"), Some(&FieldValue::Integer(2)));
    assert!(!grace.processed);
    assert_eq!(grace.created_at, grace.updated_at);

    let sparse = bench.service.get_entry(&summary.ids[2])?;
    assert_eq!(sparse.row.len(), 1);
    Ok(())
}

#[test]
fn named_values_with_form_response_id() -> Result<(), Box<dyn std::error::Error>> {
    let bench = bench();
    let mut named = BTreeMap::new();
    named.insert("Name".to_string(), vec![FieldValue::from("Ada")]);
    named.insert("Qty".to_string(), vec![FieldValue::from("3")]);

    let summary = bench.service.ingest_rows(&IngestBatch {
        spreadsheet_id: SPREADSHEET_ID.to_string(),
        sheet_name: Some(SHEET_NAME.to_string()),
        from_row: Some(9),
        form_response_id: Some("resp-123".into()),
        named_values: Some(named),
        ..Default::default()
    })?;

    assert_eq!(summary.ids, vec![RecordId::new("resp-123")]);
    let record = bench.service.get_entry(&summary.ids[0])?;
    assert_eq!(record.correlation_id.as_deref(), Some("resp-123"));
    assert_eq!(record.row_index, 9);
    assert_eq!(record.row.get("Qty"), Some(&FieldValue::from("3")));
    // Named values need no header lookup.
    assert_eq!(bench.sheets.value_reads(), 0);
    Ok(())
}

#[test]
fn form_response_id_needs_a_single_row() {
    let bench = bench();
    let mut batch = positional(2, vec![vec!["a".into()], vec!["b".into()]]);
    batch.form_response_id = Some("resp-1".into());
    assert!(bench.service.ingest_rows(&batch).unwrap_err().is_validation());
}

#[test]
fn named_values_without_a_row_identity_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let bench = bench();
    let mut named = BTreeMap::new();
    named.insert("Name".to_string(), vec![FieldValue::from("Ada")]);
    let batch = IngestBatch {
        spreadsheet_id: SPREADSHEET_ID.to_string(),
        named_values: Some(named),
        ..Default::default()
    };

    let err = bench.service.ingest_rows(&batch).unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    let stored = bench.service.list_entries(&ListEntries {
        sheet_id: SPREADSHEET_ID.into(),
        ..Default::default()
    })?;
    assert!(stored.items.is_empty());
    Ok(())
}

#[test]
fn repeated_header_cells_are_not_mirrored() -> Result<(), Box<dyn std::error::Error>> {
    let bench = TestBench::with_sheet(&["Name", "Qty", "name"])?;
    let summary = bench.service.ingest_rows(&positional(
        2,
        vec![vec!["Ada".into(), FieldValue::Integer(1), "shadow".into()]],
    ))?;
    let record = bench.service.get_entry(&summary.ids[0])?;
    assert_eq!(record.row.len(), 2);
    assert_eq!(record.row.get("Name"), Some(&FieldValue::from("Ada")));
    Ok(())
}

#[test]
fn invalid_batches_are_rejected() {
    let bench = bench();

    let mut no_id = positional(2, vec![vec!["a".into()]]);
    no_id.spreadsheet_id = "  ".into();
    assert!(bench.service.ingest_rows(&no_id).unwrap_err().is_validation());

    let empty = positional(2, Vec::new());
    assert!(bench.service.ingest_rows(&empty).unwrap_err().is_validation());

    let zero_row = positional(0, vec![vec!["a".into()]]);
    assert!(bench.service.ingest_rows(&zero_row).unwrap_err().is_validation());
}

#[test]
fn reingest_keeps_review_state_and_creation_time() -> Result<(), Box<dyn std::error::Error>> {
    let bench = bench();
    let id = bench.seed_row(2, vec!["t1".into(), "".into(), "Ada".into()], None)?;
    bench.service.validate_entry(&id)?;
    let before = bench.service.get_entry(&id)?;

    bench.service.ingest_rows(&positional(
        2,
        vec![vec!["t1".into(), "".into(), "Ada L.".into()]],
    ))?;
    let after = bench.service.get_entry(&id)?;

    assert!(after.processed);
    assert!(after.validated);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.row.get("Name"), Some(&FieldValue::from("Ada L.")));
    Ok(())
}

#[test]
fn sheet_name_defaults_from_config() -> Result<(), Box<dyn std::error::Error>> {
    let bench = TestBench::with_config(EngineConfig {
        default_sheet_name: "Responses".into(),
        ..Default::default()
    })?;
    let mut named = BTreeMap::new();
    named.insert("Name".to_string(), vec![FieldValue::from("Ada")]);

    let summary = bench.service.ingest_rows(&IngestBatch {
        spreadsheet_id: SPREADSHEET_ID.to_string(),
        form_response_id: Some("resp-9".into()),
        named_values: Some(named),
        ..Default::default()
    })?;
    let record = bench.service.get_entry(&summary.ids[0])?;
    assert_eq!(record.sheet_name, "Responses");
    assert_eq!(record.row_index, 2);
    Ok(())
}

#[test]
fn listing_filters_and_pages() -> Result<(), Box<dyn std::error::Error>> {
    let bench = bench();
    let rows = (0..5)
        .map(|i| vec![FieldValue::from(format!("t{i}")), "".into(), format!("n{i}").into()])
        .collect();
    let summary = bench.service.ingest_rows(&positional(2, rows))?;
    bench.service.validate_entry(&summary.ids[1])?;
    bench.service.refuse_entry(&summary.ids[3], "spam")?;

    let first = bench.service.list_entries(&ListEntries {
        sheet_id: SPREADSHEET_ID.into(),
        limit: Some(2),
        ..Default::default()
    })?;
    let rows: Vec<u32> = first.items.iter().map(|e| e.row_index).collect();
    assert_eq!(rows, vec![2, 3]);
    assert_eq!(first.next_after, Some(3));

    let second = bench.service.list_entries(&ListEntries {
        sheet_id: SPREADSHEET_ID.into(),
        limit: Some(2),
        after: first.next_after,
        ..Default::default()
    })?;
    let rows: Vec<u32> = second.items.iter().map(|e| e.row_index).collect();
    assert_eq!(rows, vec![4, 5]);

    let pending = bench.service.list_entries(&ListEntries {
        sheet_id: SPREADSHEET_ID.into(),
        processed: Some(false),
        ..Default::default()
    })?;
    assert_eq!(pending.items.len(), 3);

    let refused = bench.service.list_entries(&ListEntries {
        sheet_id: SPREADSHEET_ID.into(),
        processed: Some(true),
        validated: Some(false),
        ..Default::default()
    })?;
    assert_eq!(refused.items.len(), 1);
    assert_eq!(refused.items[0].refusal_reason.as_deref(), Some("spam"));

    let missing = bench.service.list_entries(&ListEntries::default()).unwrap_err();
    assert!(matches!(missing, EngineError::Validation(_)));
    Ok(())
}

#[test]
fn sheets_are_listed_once_per_spreadsheet() -> Result<(), Box<dyn std::error::Error>> {
    let bench = bench();
    let mut named = BTreeMap::new();
    named.insert("Name".to_string(), vec![FieldValue::from("x")]);
    for (sheet_id, sheet_name) in [
        ("bbbbbbbbbbbbbbbbbbbbbbbb", "Zed"),
        ("aaaaaaaaaaaaaaaaaaaaaaaa", "Second"),
        ("aaaaaaaaaaaaaaaaaaaaaaaa", "First"),
    ] {
        bench.service.ingest_rows(&IngestBatch {
            spreadsheet_id: sheet_id.into(),
            sheet_name: Some(sheet_name.into()),
            from_row: Some(2),
            named_values: Some(named.clone()),
            ..Default::default()
        })?;
    }

    assert_eq!(
        bench.service.list_sheets()?,
        vec![
            SheetRef {
                sheet_id: "aaaaaaaaaaaaaaaaaaaaaaaa".into(),
                sheet_name: "First".into(),
            },
            SheetRef {
                sheet_id: "bbbbbbbbbbbbbbbbbbbbbbbb".into(),
                sheet_name: "Zed".into(),
            },
        ]
    );
    Ok(())
}

#[test]
fn webhook_secret_gate() {
    let config = EngineConfig {
        webhook_secret: "hook-secret".into(),
        ..Default::default()
    };
    assert!(verify_shared_secret(&config.webhook_secret, "hook-secret").is_ok());
    assert!(matches!(
        verify_shared_secret(&config.webhook_secret, "guess"),
        Err(EngineError::Unauthorized)
    ));
    assert!(verify_shared_secret(&EngineConfig::default().webhook_secret, "").is_err());
}
