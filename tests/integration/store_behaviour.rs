//! Integration tests for the entry store and its notifications.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cmux::bus::{EventBus, Topic};
use cmux::entry::{Entry, Move};
use cmux::error::MuxError;
use cmux::store::EntryStore;

use crate::common::fixtures::TestWorkspace;
use crate::common::init_test_logging;

fn entry(nick: &str, path: &str, patterns: &[&str]) -> Entry {
    Entry::with_patterns(nick, path, patterns.iter().map(|p| (*p).to_string()).collect())
        .unwrap()
}

fn nicknames(store: &EntryStore) -> Vec<String> {
    store.list().into_iter().map(|e| e.nickname).collect()
}

// ===== Scenarios =====

#[test]
fn test_replace_keeps_single_entry_in_place() {
    init_test_logging();
    let store = EntryStore::in_memory(EventBus::new());

    store.add_or_replace(entry("app", "/p/CMakeLists.txt", &[])).unwrap();
    let list = store.list();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].nickname, "app");

    store
        .add_or_replace(entry("app2", "/p/CMakeLists.txt", &["rel.*"]))
        .unwrap();
    let list = store.list();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].nickname, "app2");
    assert_eq!(list[0].patterns, vec!["rel.*"]);
}

#[test]
fn test_paths_are_compared_normalized() {
    let store = EntryStore::in_memory(EventBus::new());
    store.add_or_replace(entry("a", "/w/app/CMakeLists.txt", &[])).unwrap();
    store.add_or_replace(entry("b", "/w/other/../app//CMakeLists.txt", &[])).unwrap();
    store.add_or_replace(entry("c", "/w/lib/CMakeLists.txt", &[])).unwrap();

    assert_eq!(nicknames(&store), vec!["b", "c"]);
    assert!(store.remove_by_path("/w/./app/CMakeLists.txt").unwrap());
    assert_eq!(nicknames(&store), vec!["c"]);
}

#[test]
fn test_no_duplicate_paths_across_mixed_operations() {
    let store = EntryStore::in_memory(EventBus::new());
    let paths = [
        "/w/a/CMakeLists.txt",
        "/w/b/CMakeLists.txt",
        "/w/c/CMakeLists.txt",
        "/w/./a/CMakeLists.txt",
        "/w/b/../b/CMakeLists.txt",
    ];

    // Deterministic mix of inserts, replacements and removals.
    let mut seed = 17usize;
    for step in 0..200 {
        seed = seed.wrapping_mul(31).wrapping_add(7) % 1009;
        let path = paths[seed % paths.len()];
        if seed % 4 == 0 {
            store.remove_by_path(path).unwrap();
        } else {
            store.add_or_replace(entry(&format!("n{step}"), path, &[])).unwrap();
        }

        let mut keys: Vec<String> = store.list().iter().map(Entry::key).collect();
        let before = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), before, "duplicate path after step {step}");
        assert!(before <= 3);
    }
}

// ===== Notifications =====

#[test]
fn test_notification_follows_durable_write() {
    init_test_logging();
    let ws = TestWorkspace::new();
    let bus = EventBus::new();
    let file = ws.state_dir().join("entries.json");
    let store = EntryStore::open(&file, bus.clone()).unwrap();

    let seen_on_disk = Arc::new(Mutex::new(Vec::new()));
    let observed = Arc::clone(&seen_on_disk);
    let observed_file = file.clone();
    let _sub = bus.subscribe(Topic::EntriesChanged, move || {
        let text = std::fs::read_to_string(&observed_file).unwrap_or_default();
        observed.lock().unwrap().push(text.contains("first"));
    });

    store.add_or_replace(entry("first", "/w/a/CMakeLists.txt", &[])).unwrap();
    assert_eq!(*seen_on_disk.lock().unwrap(), vec![true]);
}

#[test]
fn test_only_real_changes_notify() {
    let bus = EventBus::new();
    let store = EntryStore::in_memory(bus.clone());
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let _sub = bus.subscribe(Topic::EntriesChanged, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    store.add_or_replace(entry("a", "/w/a/CMakeLists.txt", &[])).unwrap();
    store.add_or_replace(entry("b", "/w/b/CMakeLists.txt", &[])).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);

    assert!(!store.remove_by_path("/w/zzz/CMakeLists.txt").unwrap());
    assert!(!store.reorder(0, Move::Up).unwrap());
    assert!(!store.reorder(7, Move::Down).unwrap());
    assert_eq!(count.load(Ordering::SeqCst), 2);

    assert!(store.reorder(0, Move::Down).unwrap());
    assert_eq!(nicknames(&store), vec!["b", "a"]);
    assert_eq!(count.load(Ordering::SeqCst), 3);

    store
        .set_patterns("/w/a/CMakeLists.txt", vec!["debug".into()])
        .unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[test]
fn test_subscription_ends_with_scope() {
    let bus = EventBus::new();
    let store = EntryStore::in_memory(bus.clone());
    let count = Arc::new(AtomicUsize::new(0));
    {
        let counter = Arc::clone(&count);
        let _sub = bus.subscribe(Topic::EntriesChanged, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        store.add_or_replace(entry("a", "/w/a/CMakeLists.txt", &[])).unwrap();
    }
    store.add_or_replace(entry("b", "/w/b/CMakeLists.txt", &[])).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(bus.subscriber_count(Topic::EntriesChanged), 0);
}

#[test]
fn test_snapshot_is_independent_of_later_mutation() {
    let store = EntryStore::in_memory(EventBus::new());
    store.add_or_replace(entry("a", "/w/a/CMakeLists.txt", &[])).unwrap();
    let snapshot = store.list();
    store.remove_by_path("/w/a/CMakeLists.txt").unwrap();
    assert_eq!(snapshot.len(), 1);
    assert!(store.is_empty());
}

// ===== Persistence =====

#[test]
fn test_set_patterns_is_durable_immediately() {
    let ws = TestWorkspace::new();
    let file = ws.state_dir().join("entries.json");
    let store = EntryStore::open(&file, EventBus::new()).unwrap();
    store.add_or_replace(entry("a", "/w/a/CMakeLists.txt", &[])).unwrap();
    store
        .set_patterns("/w/a/CMakeLists.txt", vec!["^debug".into(), "arm".into()])
        .unwrap();

    let stored = ws.read_entries();
    assert_eq!(stored["entries"][0]["patterns"], serde_json::json!(["^debug", "arm"]));

    let reopened = EntryStore::open(&file, EventBus::new()).unwrap();
    assert_eq!(
        reopened.get("/w/a/CMakeLists.txt").unwrap().patterns,
        vec!["^debug", "arm"]
    );
}

#[test]
fn test_older_records_without_patterns_load() {
    let ws = TestWorkspace::new();
    std::fs::create_dir_all(ws.state_dir()).unwrap();
    let file = ws.state_dir().join("entries.json");
    std::fs::write(
        &file,
        r#"{"entries":[
            {"nickname":"old","path":"/w/old/CMakeLists.txt"},
            {"nickname":"legacy","path":"/w/legacy/CMakeLists.txt","regexps":["rel"]},
            {"nickname":"null","path":"/w/null/CMakeLists.txt","patterns":null}
        ]}"#,
    )
    .unwrap();

    let store = EntryStore::open(&file, EventBus::new()).unwrap();
    let list = store.list();
    assert_eq!(list.len(), 3);
    assert!(list[0].patterns.is_empty());
    assert_eq!(list[1].patterns, vec!["rel"]);
    assert!(list[2].patterns.is_empty());
}

#[test]
fn test_rejected_mutation_changes_nothing() {
    let ws = TestWorkspace::new();
    let file = ws.state_dir().join("entries.json");
    let store = EntryStore::open(&file, EventBus::new()).unwrap();
    store.add_or_replace(entry("a", "/w/a/CMakeLists.txt", &[])).unwrap();

    assert!(matches!(
        store.rename("/w/a/CMakeLists.txt", "   "),
        Err(MuxError::Validation(_))
    ));
    assert!(matches!(
        store.rename("/w/missing/CMakeLists.txt", "x"),
        Err(MuxError::EntryNotFound { .. })
    ));
    assert!(Entry::new("bad", "").is_err());
    assert!(Entry::new("bad", "relative/CMakeLists.txt").is_err());
    assert_eq!(ws.read_entries()["entries"][0]["nickname"], "a");
}
