//! Session-level activation, detection and quick-pick.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cmux::activation::ActivationState;
use cmux::bus::Topic;
use cmux::config::MuxConfig;
use cmux::detect::Probe;
use cmux::error::MuxError;
use cmux::host::mock::{HostOp, MockHost};
use cmux::session::MuxSession;

use crate::common::fixtures::TestWorkspace;
use crate::common::init_test_logging;

fn fast_config() -> MuxConfig {
    MuxConfig {
        settle_delay_ms: 5,
        detect_interval_ms: 2,
        ..MuxConfig::default()
    }
}

fn open(ws: &TestWorkspace) -> MuxSession {
    MuxSession::open(ws.path(), fast_config()).unwrap()
}

#[test]
fn test_activation_loads_marks_and_enables() {
    init_test_logging();
    let ws = TestWorkspace::new();
    let root = ws.project_str("app");
    ws.host_with_profiles(&[("Debug", false), ("Release", false), ("Debug-ARM", false)]);

    let session = open(&ws);
    session.add(&root, None, &["^debug".to_string()], false).unwrap();

    let activation = session.activate("app").unwrap();
    assert!(activation.selection_changed());
    assert_eq!(session.tracker().get_active().as_deref(), Some(root.as_str()));
    // Profiles are untouched until the deferred pass runs.
    assert!(ws.enabled_profiles().is_empty());

    session.run_until_idle();
    assert_eq!(activation.state(), ActivationState::Done);
    assert_eq!(activation.report().map(|r| r.flipped), Some(2));
    assert_eq!(ws.enabled_profiles(), vec!["Debug", "Debug-ARM"]);
    assert_eq!(ws.read_host()["loadedRoot"], root.as_str());
}

#[test]
fn test_settle_delay_is_observed() {
    let ws = TestWorkspace::new();
    let root = ws.project_str("app");
    let session = MuxSession::open(
        ws.path(),
        MuxConfig {
            settle_delay_ms: 40,
            ..MuxConfig::default()
        },
    )
    .unwrap();
    session.add(&root, None, &["x".to_string()], false).unwrap();

    let start = Instant::now();
    let activation = session.activate("1").unwrap();
    session.run_until_idle();
    assert!(start.elapsed() >= Duration::from_millis(40));
    assert!(activation.report().is_some());
}

#[test]
fn test_selection_notifies_once_per_change() {
    let ws = TestWorkspace::new();
    let a = ws.project_str("a");
    let b = ws.project_str("b");
    let session = open(&ws);
    session.add(&a, None, &[], false).unwrap();
    session.add(&b, None, &[], false).unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let _sub = session
        .bus()
        .subscribe(Topic::ActiveSelectionChanged, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    session.activate("a").unwrap();
    session.activate("a").unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
    session.activate("b").unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
    session.run_until_idle();
}

#[test]
fn test_deleted_build_root_is_reported() {
    let ws = TestWorkspace::new();
    let root = ws.project("app");
    let session = open(&ws);
    session.add(&root.to_string_lossy(), None, &[], false).unwrap();
    std::fs::remove_file(&root).unwrap();

    let err = session.activate("1").unwrap_err();
    assert!(matches!(err, MuxError::TargetNotFound { .. }));
    assert!(err.is_user_recoverable());
    assert_eq!(session.tracker().get_active(), None);
    assert_eq!(session.store().len(), 1);
}

#[test]
fn test_host_without_load_reports_missing_capability() {
    let ws = TestWorkspace::new();
    let root = ws.project_str("app");
    let host = MockHost::new().without_load();
    let session = MuxSession::builder()
        .workspace(ws.path())
        .config(fast_config())
        .host(Arc::new(host.clone()))
        .build()
        .unwrap();
    session.add(&root, None, &["debug".to_string()], false).unwrap();

    let err = session.activate("1").unwrap_err();
    assert!(matches!(err, MuxError::HostCapabilityMissing { .. }));
    assert_eq!(session.run_until_idle(), 0);
    assert!(host.operations().is_empty());
}

#[test]
fn test_new_session_detects_previous_activation() {
    let ws = TestWorkspace::new();
    let a = ws.project_str("a");
    let b = ws.project_str("b");
    {
        let session = open(&ws);
        session.add(&a, Some("alpha"), &[], false).unwrap();
        session.add(&b, Some("beta"), &[], false).unwrap();
        session.activate("beta").unwrap();
        session.run_until_idle();
    }

    let session = open(&ws);
    assert_eq!(session.tracker().get_active(), None);
    assert_eq!(session.detect_now(), Probe::Found(b.clone()));

    let pick = session.quick_pick();
    assert_eq!(pick.selected, 1);
    assert_eq!(pick.items[1].title, "beta");
    assert!(pick.items[1].active);
}

#[test]
fn test_background_detection_gives_up_quietly() {
    let ws = TestWorkspace::new();
    let session = open(&ws);
    session.start_detection();
    let ran = session.run_until_idle();
    assert_eq!(ran, 6);
    assert_eq!(session.tracker().get_active(), None);
}

#[test]
fn test_mock_host_sees_load_then_profile_pass() {
    let ws = TestWorkspace::new();
    let root = ws.project_str("app");
    let host = MockHost::new().with_profiles(&[("Debug", false)]);
    let session = MuxSession::builder()
        .workspace(ws.path())
        .config(fast_config())
        .host(Arc::new(host.clone()))
        .build()
        .unwrap();
    session.add(&root, None, &["debug".to_string()], false).unwrap();

    session.activate("1").unwrap();
    assert_eq!(host.operations(), vec![HostOp::Load { path: root.clone() }]);

    session.run_until_idle();
    let ops = host.operations();
    assert_eq!(ops.len(), 5);
    assert_eq!(ops[1], HostOp::ImportPresets);
    assert_eq!(ops[4], HostOp::ScheduleReload);
}
