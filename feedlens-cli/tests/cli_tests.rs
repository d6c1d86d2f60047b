use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

fn feedback_csv(rows: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "comment,date").unwrap();
    for i in 0..rows {
        writeln!(file, "\"comment {}, with a comma\",2024-03-0{}", i, i % 9 + 1).unwrap();
    }
    file.flush().unwrap();
    file
}

/// Config pointing the store and identity file into `dir`.
fn config_in(dir: &TempDir) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        "[store]\npath = \"{}\"\n\n[identity]\npath = \"{}\"",
        dir.path().join("reports").display(),
        dir.path().join("client_id").display()
    )
    .unwrap();
    file.flush().unwrap();
    file
}

fn dry_run_summary(stdout: &[u8]) -> Value {
    let stdout = String::from_utf8_lossy(stdout);
    let json_start = stdout.find('{').expect("JSON output not found");
    serde_json::from_str(&stdout[json_start..]).unwrap()
}

#[test]
fn test_dry_run_prints_batch_plan() {
    let csv = feedback_csv(32);

    let output = Command::cargo_bin("feedlens-cli")
        .unwrap()
        .args(["analyze", "--file"])
        .arg(csv.path())
        .args(["--text-column", "comment", "--dry-run"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("DRY RUN MODE"));

    let summary = dry_run_summary(&output.stdout);
    assert_eq!(summary["mode"], "dry-run");
    assert_eq!(summary["rows"], 32);
    assert_eq!(summary["batch_size"], 15);
    let batches = summary["batches"].as_array().unwrap();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[2]["first_row"], 30);
    assert_eq!(batches[2]["rows"], 2);
    assert_eq!(summary["output_would_be_written_to"], "stdout");
}

#[test]
fn test_dry_run_respects_batch_size_and_output() {
    let csv = feedback_csv(25);
    let dir = TempDir::new().unwrap();
    let output_path = dir.path().join("report.json");

    let output = Command::cargo_bin("feedlens-cli")
        .unwrap()
        .args(["analyze", "--file"])
        .arg(csv.path())
        .args(["--text-column", "comment", "--timestamp-column", "date"])
        .args(["--batch-size", "10", "--dry-run", "--output"])
        .arg(&output_path)
        .output()
        .unwrap();

    assert!(output.status.success());
    let summary = dry_run_summary(&output.stdout);
    assert_eq!(summary["batch_size"], 10);
    assert_eq!(summary["batches"].as_array().unwrap().len(), 3);
    assert_eq!(summary["timestamp_column"], "date");
    assert!(!output_path.exists(), "dry run must not write the report");
}

#[test]
fn test_unknown_column_is_reported() {
    let csv = feedback_csv(3);

    Command::cargo_bin("feedlens-cli")
        .unwrap()
        .args(["analyze", "--file"])
        .arg(csv.path())
        .args(["--text-column", "review", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Column 'review' not found"))
        .stderr(predicate::str::contains("comment, date"));
}

#[test]
fn test_zero_batch_size_is_rejected() {
    let csv = feedback_csv(3);

    Command::cargo_bin("feedlens-cli")
        .unwrap()
        .args(["analyze", "--file"])
        .arg(csv.path())
        .args(["--text-column", "comment", "--batch-size", "0", "--dry-run"])
        .assert()
        .failure();
}

#[test]
fn test_history_on_empty_store() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    Command::cargo_bin("feedlens-cli")
        .unwrap()
        .arg("--config")
        .arg(config.path())
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No saved reports."));

    // The client id is created on first use.
    assert!(dir.path().join("client_id").exists());
}

#[test]
fn test_show_unknown_report_fails() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    Command::cargo_bin("feedlens-cli")
        .unwrap()
        .arg("--config")
        .arg(config.path())
        .args(["show", "--id", "0123456789abcdef"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}
