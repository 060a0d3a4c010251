//! Presence cache behaviour across sessions, processes and time.

use super::{outcome_for, settle, Answer, Harness, T0};
use module_gate::{FileStore, PresenceEvent, Snapshot, SnapshotStore, UserId};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_clones_share_one_lookup() {
    let h = Harness::in_memory();
    h.lookup.answer("/dashboard/cpf", Answer::Total(4));
    let cache = h.sessions.login(UserId::from("u1")).unwrap();
    let mut events = cache.subscribe();

    let views: Vec<_> = (0..8).map(|_| cache.clone()).collect();
    for view in &views {
        assert!(!view.has_records("/dashboard/cpf"));
    }
    outcome_for(&mut events, "/dashboard/cpf").await;

    for view in &views {
        assert!(view.has_records("/dashboard/cpf"));
    }
    assert_eq!(h.lookup.calls_for("/dashboard/cpf"), 1);
}

#[tokio::test]
async fn test_unsuccessful_and_failed_lookups_mean_no_records() {
    let h = Harness::in_memory();
    h.lookup.answer("/dashboard/placa", Answer::Unsuccessful);
    h.lookup.answer("/dashboard/cnpj", Answer::Fail);
    let cache = h.sessions.login(UserId::from("u1")).unwrap();

    assert!(!settle(&cache, "/dashboard/placa").await);
    assert!(!settle(&cache, "/dashboard/cnpj").await);

    // The backend recovers, but the cache does not ask again this lifetime.
    h.lookup.answer("/dashboard/cnpj", Answer::Total(1));
    assert!(!cache.has_records("/dashboard/cnpj"));
    assert_eq!(h.lookup.calls_for("/dashboard/cnpj"), 1);
    assert_eq!(cache.stats().lookup_failures, 1);
}

#[tokio::test]
async fn test_presence_survives_restart_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let h = Harness::with_store(Arc::new(FileStore::new(dir.path())));
    h.lookup.answer("/dashboard/cpf", Answer::Total(2));

    let cache = h.sessions.login(UserId::from("u1")).unwrap();
    assert!(settle(&cache, "/dashboard/cpf").await);
    assert!(!settle(&cache, "/dashboard/nome").await);
    cache.mark_present("/dashboard/veiculo");

    // A new process one minute later, backend now unreachable.
    h.clock.advance(Duration::from_secs(60));
    h.lookup.answer("/dashboard/cpf", Answer::Fail);
    let restarted = h.second_process();
    let cache = restarted.sessions.login(UserId::from("u1")).unwrap();
    let calls_before = h.lookup.total_calls();

    assert!(cache.has_records("/dashboard/cpf"));
    assert!(cache.has_records("/dashboard/veiculo"));
    assert!(!cache.has_records("/dashboard/nome"));
    assert_eq!(h.lookup.total_calls(), calls_before);
}

#[tokio::test]
async fn test_expired_snapshot_is_not_hydrated() {
    let h = Harness::in_memory();
    let cache = h.sessions.login(UserId::from("u1")).unwrap();
    cache.mark_present("/dashboard/cpf");

    h.clock.advance(Duration::from_secs(5 * 60));
    let later = h.second_process();
    let cache = later.sessions.login(UserId::from("u1")).unwrap();

    assert!(cache.known_present().is_empty());
    assert!(cache.checked().is_empty());
    assert!(!settle(&cache, "/dashboard/cpf").await);
    assert_eq!(h.lookup.calls_for("/dashboard/cpf"), 1);
}

#[tokio::test]
async fn test_cache_rebuilds_snapshot_after_expiry() {
    let h = Harness::in_memory();
    h.lookup.answer("/a", Answer::Total(1));
    let cache = h.sessions.login(UserId::from("u1")).unwrap();
    cache.mark_present("/old");

    h.clock.advance(Duration::from_secs(301));
    let mut events = cache.subscribe();
    assert!(!cache.has_records("/a"));
    assert_eq!(events.recv().await.unwrap(), PresenceEvent::CacheReset);
    outcome_for(&mut events, "/a").await;

    let raw = h.store.load("module_records_u1").unwrap().unwrap();
    let snapshot = Snapshot::decode(&raw).unwrap();
    assert!(snapshot.present.contains("/a"));
    assert!(!snapshot.present.contains("/old"));
    assert_eq!(snapshot.saved_at, T0 + 301_000);
}

#[tokio::test]
async fn test_tabs_share_snapshot_last_write_wins() {
    let h = Harness::in_memory();
    let tab_a = h.sessions.login(UserId::from("u1")).unwrap();
    let other = h.second_process();
    let tab_b = other.sessions.login(UserId::from("u1")).unwrap();

    tab_a.mark_present("/from-a");
    tab_b.mark_present("/from-b");

    let raw = h.store.load("module_records_u1").unwrap().unwrap();
    let snapshot = Snapshot::decode(&raw).unwrap();
    assert!(snapshot.present.contains("/from-b"));
    assert!(!snapshot.present.contains("/from-a"));

    // Each tab still answers from its own memory.
    assert!(tab_a.has_records("/from-a"));
    assert!(tab_b.has_records("/from-b"));
}

#[tokio::test]
async fn test_logout_then_login_starts_cold() {
    let h = Harness::in_memory();
    h.lookup.answer("/dashboard/cpf", Answer::Total(1));
    let cache = h.sessions.login(UserId::from("u1")).unwrap();
    assert!(settle(&cache, "/dashboard/cpf").await);

    h.sessions.logout();
    assert!(!cache.has_records("/dashboard/cpf"));

    let cache = h.sessions.login(UserId::from("u1")).unwrap();
    let mut events = cache.subscribe();
    assert!(!cache.has_records("/dashboard/cpf"));
    outcome_for(&mut events, "/dashboard/cpf").await;
    assert!(cache.has_records("/dashboard/cpf"));
    assert_eq!(h.lookup.calls_for("/dashboard/cpf"), 2);
}

#[tokio::test]
async fn test_user_b_never_sees_user_a() {
    let h = Harness::in_memory();
    let alice = h.sessions.login(UserId::from("alice")).unwrap();
    alice.mark_present("/dashboard/cpf");

    // Bob logs in on another process while Alice's snapshot is fresh.
    let other = h.second_process();
    let bob = other.sessions.login(UserId::from("bob")).unwrap();
    assert!(!bob.has_records("/dashboard/cpf"));
    assert!(bob.known_present().is_empty());

    // And on the same process, replacing Alice.
    let bob_here = h.sessions.login(UserId::from("bob")).unwrap();
    assert!(!bob_here.has_records("/dashboard/cpf"));
}
