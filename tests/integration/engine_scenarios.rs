//! Profile-enabling scenarios against the mock and workspace hosts.

use std::sync::Arc;

use serde_json::json;

use cmux::bus::EventBus;
use cmux::engine::ProfileEngine;
use cmux::host::mock::{HostOp, MockHost};
use cmux::host::{BuildHost, Target, WorkspaceHost};
use cmux::selection::SelectionTracker;
use cmux::store::EntryStore;

use crate::common::fixtures::TestWorkspace;
use crate::common::init_test_logging;

fn patterns(list: &[&str]) -> Vec<String> {
    list.iter().map(|p| (*p).to_string()).collect()
}

// ===== Mock host =====

#[test]
fn test_debug_prefix_enables_two_of_three() {
    init_test_logging();
    let host = MockHost::new().with_profiles(&[
        ("Debug", false),
        ("Release", false),
        ("Debug-ARM", false),
    ]);
    let engine = ProfileEngine::new(Arc::new(host.clone()));

    let report = engine.enable_matching(&patterns(&["^debug"]));
    assert_eq!(report.flipped, 2);
    assert_eq!(host.enabled_names(), vec!["Debug", "Debug-ARM"]);
}

#[test]
fn test_any_pattern_is_enough() {
    let host = MockHost::new().with_profiles(&[
        ("MyDebugConfig", false),
        ("Release", false),
        ("MinSizeRel", false),
        ("Coverage", false),
    ]);
    let engine = ProfileEngine::new(Arc::new(host.clone()));

    let report = engine.enable_matching(&patterns(&["deb", "^min"]));
    assert_eq!(report.flipped, 2);
    assert_eq!(host.enabled_names(), vec!["MyDebugConfig", "MinSizeRel"]);
}

#[test]
fn test_already_enabled_profiles_are_left_alone() {
    let host = MockHost::new().with_profiles(&[("Debug", true), ("Release", false)]);
    let engine = ProfileEngine::new(Arc::new(host.clone()));

    let report = engine.enable_matching(&patterns(&[".*"]));
    assert_eq!(report.matched, 2);
    assert_eq!(report.flipped, 1);

    let second = engine.enable_matching(&patterns(&[".*"]));
    assert_eq!(second.flipped, 0);
}

#[test]
fn test_no_profile_capability_leaves_session_state_alone() {
    let bus = EventBus::new();
    let store = EntryStore::in_memory(bus.clone());
    let tracker = SelectionTracker::new(bus);
    let host = MockHost::new().without_profiles();
    let engine = ProfileEngine::new(Arc::new(host.clone()));

    let report = engine.enable_matching(&patterns(&["debug"]));
    assert_eq!(report.flipped, 0);
    assert!(store.is_empty());
    assert_eq!(tracker.get_active(), None);
    assert!(!host
        .operations()
        .iter()
        .any(|op| matches!(op, HostOp::StoreProfiles { .. })));
}

// ===== Workspace host =====

#[test]
fn test_workspace_host_round_trip() {
    init_test_logging();
    let ws = TestWorkspace::new();
    ws.host_with_profiles(&[("Debug", false), ("Release", false), ("Debug-ARM", true)]);
    let host = WorkspaceHost::new(&ws.state_dir());
    let engine = ProfileEngine::new(Arc::new(host));

    let report = engine.enable_matching(&patterns(&["^debug"]));
    assert_eq!(report.flipped, 1);
    assert_eq!(report.source, Some("profiles"));
    assert_eq!(report.stored_via, Some("profiles"));
    assert_eq!(report.reload_via, Some("document"));

    assert_eq!(ws.enabled_profiles(), vec!["Debug", "Debug-ARM"]);
    assert!(ws.read_host().get("reloadRequestedAt").is_some());
}

#[test]
fn test_workspace_host_nested_shape() {
    let ws = TestWorkspace::new();
    ws.write_host(&json!({
        "state": {
            "profiles": [
                { "displayName": "Debug", "active": false },
                { "name": "", "displayName": "Release", "active": false },
                { "enabled": false }
            ]
        }
    }));
    let engine = ProfileEngine::new(Arc::new(WorkspaceHost::new(&ws.state_dir())));

    let report = engine.enable_matching(&patterns(&["rel"]));
    assert_eq!(report.flipped, 1);
    assert_eq!(report.source, Some("state.profiles"));

    let doc = ws.read_host();
    assert_eq!(doc["state"]["profiles"][0]["active"], json!(false));
    assert_eq!(doc["state"]["profiles"][1]["active"], json!(true));
    assert_eq!(doc["state"]["profiles"][2]["enabled"], json!(false));
}

#[test]
fn test_presets_are_imported_before_matching() {
    let ws = TestWorkspace::new();
    let root = ws.project("app");
    ws.presets("app", &["linux-debug", "linux-release", "windows-debug"]);

    let host = WorkspaceHost::new(&ws.state_dir());
    host.load_build_root(&Target::new(root).unwrap()).unwrap();
    let engine = ProfileEngine::new(Arc::new(host));

    let report = engine.enable_matching(&patterns(&["debug$"]));
    assert_eq!(report.flipped, 2);
    assert_eq!(ws.enabled_profiles(), vec!["linux-debug", "windows-debug"]);
}

#[test]
fn test_corrupt_host_document_is_a_silent_no_op() {
    let ws = TestWorkspace::new();
    std::fs::create_dir_all(ws.state_dir()).unwrap();
    std::fs::write(ws.state_dir().join("host.json"), "{ not json").unwrap();
    let engine = ProfileEngine::new(Arc::new(WorkspaceHost::new(&ws.state_dir())));

    let report = engine.enable_matching(&patterns(&["debug"]));
    assert_eq!(report.flipped, 0);
    assert_eq!(report.source, None);
}
