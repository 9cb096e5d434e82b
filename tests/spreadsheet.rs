mod common;

use std::fs;

use common::{fields, fixture_path};
use schema_sync::{
    adapter::{self, AdaptFailure, PipelineContext, ReshapedFile},
    config::{OracleSettings, ShortfallPolicy},
    decision::MappingDecision,
    error::{FileError, ReadError},
    oracle::Oracle,
    reader::{self, ReadOptions},
    table::Cell,
};

fn fixture(name: &str) -> Vec<u8> {
    fs::read(fixture_path(name)).expect("read fixture")
}

fn with_offline_context<T>(run: impl FnOnce(&PipelineContext<'_>) -> T) -> T {
    let oracle = Oracle::offline(OracleSettings::default());
    let ctx = PipelineContext {
        oracle: &oracle,
        read: ReadOptions::default(),
        shortfall: ShortfallPolicy::Warn,
    };
    run(&ctx)
}

#[test]
fn reads_every_sheet_in_workbook_order() {
    let workbook = reader::read_workbook(&fixture("ledger.xlsx"), "ledger.xlsx").expect("workbook");
    assert_eq!(workbook.sheet_names(), vec!["Summary", "Data"]);

    let data = &workbook.sheets[1];
    assert_eq!(data.origin(), "ledger.xlsx[Data]");
    assert_eq!(data.headers[0], "Vendor export");
    assert_eq!(data.width(), 3);
    assert_eq!(data.row_count(), 4);
    assert!(data.rows[0].iter().all(Cell::is_blank));
}

#[test]
fn missing_sheet_lists_available_names() {
    let bytes = fixture("people.xlsx");
    let outcome = with_offline_context(|ctx| {
        adapter::adapt(ctx, "people.xlsx", &bytes, &fields(&["first_name"]), Some("Sheet2"))
    });
    let AdaptFailure { error, decision } = outcome.expect_err("missing sheet");
    assert_eq!(
        error,
        FileError::Read(ReadError::SheetNotFound {
            sheet: "Sheet2".to_string(),
            available: vec!["Sheet1".to_string()],
        })
    );
    assert!(decision.is_none());
}

#[test]
fn spreadsheet_without_sheet_name_is_rejected() {
    let bytes = fixture("people.xlsx");
    let outcome = with_offline_context(|ctx| {
        adapter::adapt(ctx, "people.xlsx", &bytes, &fields(&["fname"]), None)
    });
    assert!(matches!(
        outcome,
        Err(AdaptFailure {
            error: FileError::Read(ReadError::SheetNotSpecified { .. }),
            ..
        })
    ));
}

#[test]
fn requested_sheet_is_replaced_and_others_pass_through() {
    let bytes = fixture("ledger.xlsx");
    let original = reader::read_workbook(&bytes, "ledger.xlsx").expect("workbook");
    let targets = fields(&["vendor_name", "invoice_date", "total"]);

    let adapted = with_offline_context(|ctx| {
        adapter::adapt(ctx, "ledger.xlsx", &bytes, &targets, Some("Data"))
    })
    .expect("adapt");
    assert_eq!(adapted.decision, MappingDecision::mapped(2, vec![1, 2, 0]));

    let ReshapedFile::Workbook(workbook) = adapted.output else {
        panic!("expected a workbook");
    };
    assert_eq!(workbook.sheet_names(), vec!["Summary", "Data"]);
    assert_eq!(workbook.sheets[0], original.sheets[0]);

    let data = &workbook.sheets[1];
    assert_eq!(data.headers, vec!["vendor_name", "invoice_date", "total"]);
    assert_eq!(
        data.display_rows(),
        vec![
            vec!["ACME", "2024-02-01", "12.5"],
            vec!["Globex", "2024-02-03", "7"],
        ]
    );
}

#[test]
fn semantic_headers_without_service_fail_the_sheet() {
    let bytes = fixture("people.xlsx");
    let outcome = with_offline_context(|ctx| {
        adapter::adapt(
            ctx,
            "people.xlsx",
            &bytes,
            &fields(&["first_name", "last_name", "amount"]),
            Some("Sheet1"),
        )
    });
    let failure = outcome.expect_err("no exact headers");
    assert!(matches!(failure.error, FileError::Reshape(_)));
    assert!(failure.decision.as_ref().is_some_and(MappingDecision::is_failed));
}
