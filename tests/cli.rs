use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SCHEMA: &str = r#"{
  "entity_sets": [
    {
      "entity_set": "Customers",
      "fields": ["Id", "Name"],
      "key_fields": ["Id"],
      "label_fields": ["Name"]
    },
    {
      "entity_set": "Orders",
      "fields": ["Id", "CustomerId", "Status"],
      "key_fields": ["Id"],
      "relationships": [
        {
          "name": "Customer",
          "target_set": "Customers",
          "foreign_keys": [{ "field": "CustomerId", "target_field": "Id" }]
        }
      ]
    }
  ]
}"#;

fn txhistory(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("txhistory").unwrap();
    cmd.env("TXHISTORY_DATA_DIR", dir)
        .env_remove("TXHISTORY_USER")
        .env_remove("TXHISTORY_LOG");
    cmd
}

fn initialized() -> TempDir {
    let dir = TempDir::new().unwrap();
    txhistory(dir.path()).arg("init").assert().success();
    fs::write(dir.path().join("schema.json"), SCHEMA).unwrap();
    dir
}

fn write_request(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path.to_string_lossy().into_owned()
}

const NEW_ORDER: &str = r#"{"operations": [
  {"op": "add", "entity_set": "Customers", "values": {"Id": 1, "Name": "Ada"}},
  {"op": "add", "entity_set": "Orders", "values": {"Id": 7, "CustomerId": 1, "Status": "Open"}}
]}"#;

#[test]
fn init_creates_layout() {
    let dir = TempDir::new().unwrap();
    txhistory(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialization complete!"));

    assert!(dir.path().join("config.json").exists());
    assert!(dir.path().join("schema.json").exists());
    assert!(dir.path().join("data").is_dir());
}

#[test]
fn config_shows_log_table() {
    let dir = initialized();
    txhistory(dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[test].[TransactionHistory]"));
}

#[test]
fn apply_records_one_row() {
    let dir = initialized();
    let request = write_request(dir.path(), "new-order.json", NEW_ORDER);

    txhistory(dir.path())
        .args(["apply", &request, "--user", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("by alice"))
        .stdout(predicate::str::contains("0.Customers.Name"))
        .stdout(predicate::str::contains("0.Orders.Name"));

    txhistory(dir.path())
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("alice"))
        .stdout(predicate::str::contains("1 transaction(s)"));
}

#[test]
fn apply_takes_user_from_environment() {
    let dir = initialized();
    let request = write_request(dir.path(), "new-order.json", NEW_ORDER);

    txhistory(dir.path())
        .env("TXHISTORY_USER", "bob")
        .args(["apply", &request])
        .assert()
        .success()
        .stdout(predicate::str::contains("by bob"));
}

#[test]
fn apply_without_user_fails() {
    let dir = initialized();
    let request = write_request(dir.path(), "new-order.json", NEW_ORDER);

    txhistory(dir.path())
        .args(["apply", &request])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No changing user"));

    assert!(!dir.path().join("data").join("history.jsonl").exists());
}

#[test]
fn apply_modify_then_show() {
    let dir = initialized();
    let first = write_request(dir.path(), "new-order.json", NEW_ORDER);
    let second = write_request(
        dir.path(),
        "close.yaml",
        "user: carol\noperations:\n  - op: modify\n    entity_set: Orders\n    values: { Id: 7, Status: Closed }\n",
    );

    txhistory(dir.path())
        .args(["apply", &first, "-u", "alice"])
        .assert()
        .success();
    txhistory(dir.path())
        .args(["apply", &second])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"0.Orders.Status: "Open" -> "Closed""#));

    let log = fs::read_to_string(dir.path().join("data").join("history.jsonl")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 2);
    let row: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    let id = row["Id"].as_str().unwrap().to_string();

    txhistory(dir.path())
        .args(["show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("User:        carol"))
        .stdout(predicate::str::contains("0.Orders.Status"));
}

#[test]
fn show_unknown_id_fails() {
    let dir = initialized();
    txhistory(dir.path())
        .args(["show", "txh-00000000"])
        .assert()
        .failure();
}

#[test]
fn decode_prints_entries() {
    let dir = TempDir::new().unwrap();
    txhistory(dir.path())
        .args(["decode", r#"[["0.Orders.Id",null,1]]"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("0.Orders.Id: (none) -> 1"));
}
