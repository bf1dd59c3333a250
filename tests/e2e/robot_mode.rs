//! Robot-mode end-to-end tests.

use serde_json::Value;

use crate::common::assertions::assert_json_has_fields;
use crate::common::cli::CliRunner;
use crate::common::fixtures::TestWorkspace;
use crate::common::init_test_logging;

fn parse_json(text: &str) -> Value {
    serde_json::from_str(text)
        .unwrap_or_else(|_| panic!("Failed to parse JSON:\n{text}"))
}

#[test]
fn robot_quick_start_outputs_json() {
    init_test_logging();
    let cli = CliRunner::new();
    let result = cli.run(&["--robot"]);
    result.assert_success();

    let json = parse_json(result.stdout.trim());
    assert_eq!(json.get("tool").and_then(|v| v.as_str()), Some("cmux"));
    assert!(json.get("entries").is_some());
    assert!(json.get("activation").is_some());
    assert!(json.get("output_modes").is_some());
}

#[test]
fn robot_list_outputs_json_array() {
    init_test_logging();
    let ws = TestWorkspace::new();
    let cli = CliRunner::in_workspace(ws.path());
    let result = cli.run_robot(&["list"]);
    result.assert_success();

    let json = parse_json(result.stdout.trim());
    assert_eq!(json, Value::Array(Vec::new()));
}

#[test]
fn robot_format_flag_outputs_json() {
    init_test_logging();
    let cli = CliRunner::new();
    let result = cli.run(&["version", "--format=json"]);
    result.assert_success();
    let _ = assert_json_has_fields(result.stdout.trim(), &["version", "git_sha", "target"]);
}

#[test]
fn robot_error_includes_suggestion() {
    init_test_logging();
    let ws = TestWorkspace::new();
    let cli = CliRunner::in_workspace(ws.path());
    let result = cli.run_robot(&["activate", "3"]);
    result.assert_exit_code(1).assert_stdout_is_empty();

    let json = parse_json(result.stderr.trim());
    assert_eq!(json.get("error").and_then(Value::as_bool), Some(true));
    assert_eq!(json.get("recoverable").and_then(Value::as_bool), Some(true));
    assert_eq!(
        json.get("suggestion").and_then(Value::as_str),
        Some("Run: cmux list")
    );
}

#[test]
fn robot_invalid_pattern_is_rejected() {
    init_test_logging();
    let ws = TestWorkspace::new();
    let cli = CliRunner::in_workspace(ws.path());
    cli.run_robot(&["add", &ws.project_str("app")]).assert_success();

    let result = cli.run_robot(&["pattern", "add", "1", "deb(ug"]);
    result.assert_failure();
    let json = parse_json(result.stderr.trim());
    assert!(json["message"].as_str().unwrap_or_default().contains("deb(ug"));

    cli.run_robot(&["pattern", "list", "1"])
        .assert_success()
        .assert_json_array_len("/patterns", 0);
}
