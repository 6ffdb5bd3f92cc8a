use assert_cmd::Command;
use auditlens_testkit::{SAMPLE_REPORT, SAMPLE_REPORT_UPDATED};
use predicates::prelude::*;
use tempfile::TempDir;

fn auditlens_cmd() -> Command {
    Command::cargo_bin("auditlens").expect("binary builds")
}

fn write_file(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write file");
    path
}

fn ingest(report: &std::path::Path, state_dir: &std::path::Path) -> serde_json::Value {
    let output = auditlens_cmd()
        .arg("ingest")
        .arg(report)
        .arg("--host-id")
        .arg("web-1")
        .arg("--state-dir")
        .arg(state_dir)
        .arg("--no-default-rules")
        .output()
        .expect("run ingest");
    assert!(output.status.success(), "ingest failed: {output:?}");
    serde_json::from_slice(&output.stdout).expect("valid json")
}

#[test]
fn ingest_diffs_against_the_previous_upload() {
    let td = TempDir::new().expect("temp");
    let state = td.path().join("state");
    let first = write_file(td.path(), "first.dat", SAMPLE_REPORT);
    let second = write_file(td.path(), "second.dat", SAMPLE_REPORT_UPDATED);

    let outcome = ingest(&first, &state);
    assert_eq!(outcome["summary"]["hostname"], "web-1");
    assert_eq!(outcome["diff"], serde_json::Value::Null);

    let outcome = ingest(&second, &state);
    let diff = &outcome["diff"];
    assert!(diff["added"].get("installed_packages").is_some());
    assert!(diff["removed"].get("warning").is_some());
}

#[test]
fn activity_applies_silence_rules_at_read_time() {
    let td = TempDir::new().expect("temp");
    let state = td.path().join("state");
    let first = write_file(td.path(), "first.dat", SAMPLE_REPORT);
    let second = write_file(td.path(), "second.dat", SAMPLE_REPORT_UPDATED);

    ingest(&first, &state);
    let outcome = ingest(&second, &state);
    let diff_path = write_file(
        td.path(),
        "diff.json",
        &serde_json::to_string(&outcome["diff"]).expect("render diff"),
    );

    // With the built-in silence rules the volatile keys disappear.
    let output = auditlens_cmd()
        .arg("activity")
        .arg(&diff_path)
        .arg("--hostname")
        .arg("web-1")
        .output()
        .expect("run activity");
    assert!(output.status.success());
    let events: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let keys: Vec<&str> = events
        .as_array()
        .expect("events array")
        .iter()
        .map(|e| e["key"].as_str().expect("key"))
        .collect();
    assert!(keys.contains(&"hardening_index"));
    assert!(!keys.contains(&"uptime_in_seconds"));
    assert!(!keys.contains(&"report_datetime_end"));

    // Same stored diff, no rules: everything is visible again.
    let output = auditlens_cmd()
        .arg("activity")
        .arg(&diff_path)
        .arg("--no-default-rules")
        .output()
        .expect("run activity");
    assert!(output.status.success());
    let events: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let keys: Vec<&str> = events
        .as_array()
        .expect("events array")
        .iter()
        .map(|e| e["key"].as_str().expect("key"))
        .collect();
    assert!(keys.contains(&"uptime_in_seconds"));
}

#[test]
fn activity_rejects_malformed_diff_json() {
    let td = TempDir::new().expect("temp");
    let bad = write_file(td.path(), "diff.json", "{not json");

    auditlens_cmd()
        .arg("activity")
        .arg(&bad)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("parse diff json"));
}

#[test]
fn ingest_rejects_a_bad_host_id() {
    let td = TempDir::new().expect("temp");
    let report = write_file(td.path(), "report.dat", SAMPLE_REPORT);

    auditlens_cmd()
        .arg("ingest")
        .arg(&report)
        .arg("--host-id")
        .arg("../escape")
        .arg("--state-dir")
        .arg(td.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("host id"));
}
