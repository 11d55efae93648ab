use super::*;
use crate::backend::memory::MemoryAuthProvider;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

fn live(uid: &str) -> Session { Session::new(format!("tok-{}", uid), uid, Some(Utc::now() + chrono::Duration::hours(1))) }

fn counter(store: &SessionStore) -> (Arc<AtomicUsize>, Subscription) {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let sub = store.on_change(move |_| { h.fetch_add(1, Ordering::SeqCst); });
    (hits, sub)
}

#[tokio::test]
async fn pending_until_initial_fetch_then_restores_session() {
    let provider = Arc::new(MemoryAuthProvider::new().with_session(live("u-1")));
    let store = SessionStore::new(provider.clone());
    assert!(store.is_pending());
    assert_eq!(store.current(), None);
    store.init().await;
    assert!(!store.is_pending());
    assert_eq!(store.current().map(|s| s.user_id), Some("u-1".to_string()));
    assert_eq!(provider.listener_count(), 1);
}

#[tokio::test]
async fn failed_fetch_settles_anonymous() {
    let provider = Arc::new(MemoryAuthProvider::new().with_session(live("u-1")));
    provider.fail_fetch(true);
    let store = SessionStore::new(provider);
    store.init().await;
    assert_eq!(store.state(), SessionState::Ready(None));
}

#[tokio::test]
async fn ready_waits_for_spawned_fetch() {
    let provider = Arc::new(MemoryAuthProvider::new().with_session(live("u-7")));
    provider.set_fetch_latency(Duration::from_millis(20));
    let store = SessionStore::spawn(provider);
    assert!(store.is_pending());
    let s = store.ready().await;
    assert_eq!(s.map(|s| s.user_id), Some("u-7".to_string()));
}

#[tokio::test]
async fn provider_events_reach_subscribers() {
    let provider = Arc::new(MemoryAuthProvider::new());
    let store = SessionStore::new(provider.clone());
    store.init().await;
    let (hits, _sub) = counter(&store);
    provider.set_session(Some(live("u-2")));
    assert_eq!(store.current().map(|s| s.user_id), Some("u-2".to_string()));
    provider.set_session(None);
    assert_eq!(store.current(), None);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unsubscribe_is_idempotent_and_final() {
    let provider = Arc::new(MemoryAuthProvider::new());
    let store = SessionStore::new(provider.clone());
    store.init().await;
    let (hits, sub) = counter(&store);
    assert_eq!(store.subscriber_count(), 1);
    sub.unsubscribe();
    sub.unsubscribe();
    assert!(!sub.is_active());
    assert_eq!(store.subscriber_count(), 0);
    provider.set_session(Some(live("u-3")));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    drop(sub);
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn sign_in_notifies_once_and_sign_out_clears() {
    let provider = Arc::new(MemoryAuthProvider::new().with_account("rhea@dojo.test", "oss", "u-1"));
    let store = SessionStore::new(provider.clone());
    store.init().await;
    let (hits, _sub) = counter(&store);

    assert!(store.sign_in("rhea@dojo.test", "wrong").await.is_err());
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    let s = store.sign_in("Rhea@dojo.test", "oss").await.unwrap();
    assert_eq!(s.user_id, "u-1");
    // Provider event and local apply carry the same session; only one notification
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    store.sign_out().await.unwrap();
    assert_eq!(store.current(), None);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn expired_session_reads_as_absent() {
    let stale = Session::new("old", "u-1", Some(Utc::now() - chrono::Duration::seconds(5)));
    let provider = Arc::new(MemoryAuthProvider::new().with_session(stale.clone()));
    let store = SessionStore::new(provider);
    store.init().await;
    assert_eq!(store.current(), None);
    assert!(stale.is_expired());
    assert!(!live("u-1").is_expired());
}

#[tokio::test]
async fn teardown_detaches_everything() {
    let provider = Arc::new(MemoryAuthProvider::new());
    let store = SessionStore::new(provider.clone());
    store.init().await;
    let (hits, sub) = counter(&store);
    store.teardown();
    store.teardown();
    assert_eq!(provider.listener_count(), 0);
    assert!(!sub.is_active());
    provider.set_session(Some(live("u-4")));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(store.ready().await, None);
    // Late registrations are inert
    let late = store.on_change(|_| panic!("must not fire"));
    assert!(!late.is_active());
}
