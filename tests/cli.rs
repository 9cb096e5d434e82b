mod common;

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use common::{TestWorkspace, fixture_path};
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::Value;

const OWNER: &str = "owner-42";

fn schema_sync() -> Command {
    let mut cmd = Command::cargo_bin("schema-sync").expect("binary exists");
    cmd.env_remove("GROQ_API_KEY").env("RUST_LOG", "schema_sync=info");
    cmd
}

fn add_schema(store: &Path, owner: &str, fields: &str) -> String {
    let output = schema_sync()
        .args(["schema", "add", "--store"])
        .arg(store)
        .args(["--owner", owner, "--fields", fields])
        .output()
        .expect("run schema add");
    assert!(output.status.success(), "schema add failed: {output:?}");
    let id = String::from_utf8(output.stdout).expect("utf8 stdout");
    id.trim().to_string()
}

#[test]
fn schema_lifecycle_round_trips_through_the_store() {
    let workspace = TestWorkspace::new();
    let store = workspace.path().join("schemas.yaml");

    let id = add_schema(&store, OWNER, "order_id, customer_name");
    assert!(uuid::Uuid::parse_str(&id).is_ok(), "not a uuid: {id}");
    add_schema(&store, "other-owner", "sku");

    schema_sync()
        .args(["schema", "list", "--store"])
        .arg(&store)
        .args(["--owner", OWNER])
        .assert()
        .success()
        .stdout(contains(id.as_str()))
        .stdout(contains("order_id, customer_name"))
        .stdout(contains("sku").not());

    schema_sync()
        .args(["schema", "update", "--store"])
        .arg(&store)
        .args(["--id", id.as_str(), "-f", "order_id", "-f", "customer_name,total"])
        .assert()
        .success();

    schema_sync()
        .args(["schema", "show", "--store"])
        .arg(&store)
        .args(["--id", id.as_str()])
        .assert()
        .success()
        .stdout(contains("total"));

    schema_sync()
        .args(["schema", "remove", "--store"])
        .arg(&store)
        .args(["--id", id.as_str()])
        .assert()
        .success();

    schema_sync()
        .args(["schema", "show", "--store"])
        .arg(&store)
        .args(["--id", id.as_str()])
        .assert()
        .failure()
        .stderr(contains("not found"));
}

#[test]
fn schema_add_rejects_duplicate_fields() {
    let workspace = TestWorkspace::new();
    schema_sync()
        .args(["schema", "add", "--store"])
        .arg(workspace.path().join("schemas.yaml"))
        .args(["--owner", OWNER, "--fields", "a,b,a"])
        .assert()
        .failure()
        .stderr(contains("more than once"));
}

#[test]
fn offline_sync_writes_outputs_and_report() {
    let workspace = TestWorkspace::new();
    let store = workspace.path().join("schemas.yaml");
    let orders = add_schema(&store, OWNER, "customer_name,order_id");
    let ledger = add_schema(&store, OWNER, "vendor_name,invoice_date,total");

    let first = workspace.write("orders.csv", "Order ID,Customer Name\n1,Ada\n2,Grace\n");
    let second = workspace.write("stray.csv", "Order ID,Customer Name\n3,Alan\n");
    let metadata = workspace.write(
        "batch.yaml",
        &format!(
            "owner_id: {OWNER}\nfiles:\n  orders.csv: {{ schema_id: '{orders}' }}\n  ledger.xlsx: {{ schema_id: '{ledger}', sheet_name: Data }}\n"
        ),
    );
    let out_dir = workspace.path().join("out");
    let report = workspace.path().join("report.json");

    schema_sync()
        .args(["sync", "--offline", "--store"])
        .arg(&store)
        .arg("--metadata")
        .arg(&metadata)
        .arg("-i")
        .arg(&first)
        .arg("-i")
        .arg(&second)
        .arg("-i")
        .arg(fixture_path("ledger.xlsx"))
        .arg("--output-dir")
        .arg(&out_dir)
        .arg("--report")
        .arg(&report)
        .assert()
        .success();

    let orders_out = fs::read_to_string(out_dir.join("orders.csv")).expect("orders output");
    assert_eq!(
        orders_out,
        "\"customer_name\",\"order_id\"\n\"Ada\",\"1\"\n\"Grace\",\"2\"\n"
    );
    assert!(!out_dir.join("stray.csv").exists());

    let data = fs::read_to_string(out_dir.join("ledger").join("Data.csv")).expect("sheet output");
    assert!(data.starts_with("\"vendor_name\",\"invoice_date\",\"total\"\n\"ACME\",\"2024-02-01\",\"12.5\""));
    assert!(out_dir.join("ledger").join("Summary.csv").exists());

    let entries: Value =
        serde_json::from_str(&fs::read_to_string(&report).expect("report")).expect("json");
    let statuses = entries
        .as_array()
        .expect("array")
        .iter()
        .map(|entry| entry["status"].as_str().expect("status").to_string())
        .collect::<Vec<_>>();
    assert_eq!(statuses, vec!["PROCESSED", "METADATA_MISSING", "PROCESSED"]);
    assert_eq!(entries[0]["decision"]["column_order"], serde_json::json!([1, 0]));
    assert_eq!(entries[2]["rows"], 3, "Summary row plus two reshaped Data rows");
    for entry in [&entries[0], &entries[2]] {
        assert_eq!(entry["content_type"], "text/csv");
        for output in entry["outputs"].as_array().expect("outputs") {
            assert!(output.as_str().expect("path").ends_with(".csv"));
        }
    }
    assert!(entries[1].get("content_type").is_none());
}

#[test]
fn output_delimiter_changes_written_files_and_content_type() {
    let workspace = TestWorkspace::new();
    let store = workspace.path().join("schemas.yaml");
    let id = add_schema(&store, OWNER, "amount,label");
    let input = workspace.write("amounts.csv", "label;amount\nx;10\n");
    let metadata = workspace.write(
        "batch.yaml",
        &format!("owner_id: {OWNER}\nfiles:\n  amounts.csv: {{ schema_id: '{id}' }}\n"),
    );
    let out_dir = workspace.path().join("out");
    let report = workspace.path().join("report.json");

    schema_sync()
        .args(["sync", "--offline", "--delimiter", ";", "--output-delimiter", "tab", "--store"])
        .arg(&store)
        .arg("--metadata")
        .arg(&metadata)
        .arg("-i")
        .arg(&input)
        .arg("--output-dir")
        .arg(&out_dir)
        .arg("--report")
        .arg(&report)
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(out_dir.join("amounts.csv")).expect("output"),
        "\"amount\"\t\"label\"\n\"10\"\t\"x\"\n"
    );
    let entries: Value =
        serde_json::from_str(&fs::read_to_string(&report).expect("report")).expect("json");
    assert_eq!(entries[0]["content_type"], "text/tab-separated-values");
}

#[test]
fn inputs_sharing_a_file_name_are_rejected() {
    let workspace = TestWorkspace::new();
    let store = workspace.path().join("schemas.yaml");
    let id = add_schema(&store, OWNER, "a");
    fs::create_dir_all(workspace.path().join("one")).expect("dir");
    fs::create_dir_all(workspace.path().join("two")).expect("dir");
    let first = workspace.write("one/x.csv", "a\n1\n");
    let second = workspace.write("two/x.csv", "a\n2\n");
    let metadata = workspace.write(
        "batch.yaml",
        &format!("owner_id: {OWNER}\nfiles:\n  x.csv: {{ schema_id: '{id}' }}\n"),
    );

    schema_sync()
        .args(["sync", "--offline", "--store"])
        .arg(&store)
        .arg("--metadata")
        .arg(&metadata)
        .arg("-i")
        .arg(&first)
        .arg("-i")
        .arg(&second)
        .assert()
        .failure()
        .stderr(contains("'x.csv' appears more than once"));
}

#[test]
fn sync_without_output_dir_prints_tables_and_can_fail_the_run() {
    let workspace = TestWorkspace::new();
    let store = workspace.path().join("schemas.yaml");
    let id = add_schema(&store, OWNER, "amount");
    let input = workspace.write("amounts.csv", "Amount\n10\n20\n");
    let unmatched = workspace.write("other.csv", "value\n1\n");
    let metadata = workspace.write(
        "batch.json",
        &format!(
            r#"{{"user_uuid": "{OWNER}", "file_metadatas": {{"amounts.csv": {{"schema_uuid": "{id}"}}, "other.csv": {{"schema_uuid": "{id}"}}}}}}"#
        ),
    );

    schema_sync()
        .args(["sync", "--offline", "--store"])
        .arg(&store)
        .arg("--metadata")
        .arg(&metadata)
        .arg("-i")
        .arg(&input)
        .assert()
        .success()
        .stdout(contains("== amounts.csv =="))
        .stdout(contains("amount"))
        .stdout(contains("20"));

    schema_sync()
        .args(["sync", "--offline", "--fail-on-error", "--store"])
        .arg(&store)
        .arg("--metadata")
        .arg(&metadata)
        .arg("-i")
        .arg(&input)
        .arg("-i")
        .arg(&unmatched)
        .assert()
        .failure()
        .stderr(contains("1 of 2 file(s) could not be reshaped"));
}

#[test]
fn sync_requires_an_existing_store() {
    let workspace = TestWorkspace::new();
    let metadata = workspace.write("batch.yaml", "owner_id: someone\n");
    let input = workspace.write("a.csv", "a\n1\n");
    schema_sync()
        .args(["sync", "--offline", "--store"])
        .arg(workspace.path().join("missing.yaml"))
        .arg("--metadata")
        .arg(&metadata)
        .arg("-i")
        .arg(&input)
        .assert()
        .failure()
        .stderr(contains("does not exist"));
}

#[test]
fn preview_shows_csv_rows_and_spreadsheet_sheets() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.tsv", "fname\tlname\nAda\tLovelace\nAlan\tTuring\n");

    schema_sync()
        .args(["preview", "-i"])
        .arg(&input)
        .args(["--rows", "1"])
        .assert()
        .success()
        .stdout(contains("fname"))
        .stdout(contains("Lovelace"))
        .stdout(contains("Turing").not());

    schema_sync()
        .args(["preview", "-i"])
        .arg(fixture_path("ledger.xlsx"))
        .args(["--sheet", "Data"])
        .assert()
        .success()
        .stdout(contains("Vendor Name"))
        .stdout(contains("Globex"));

    schema_sync()
        .args(["preview", "-i"])
        .arg(fixture_path("people.xlsx"))
        .args(["--sheet", "Sheet2"])
        .assert()
        .failure()
        .stderr(contains("available sheets: Sheet1"));
}
