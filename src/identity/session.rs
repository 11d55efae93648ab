use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::provider::{AuthEvent, AuthProvider, ProviderSubscription};
use crate::error::AppResult;
use crate::tprintln;

pub type SessionToken = String;

/// Proof of a signed-in user as issued by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: SessionToken,
    pub user_id: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new<T: Into<String>, U: Into<String>>(token: T, user_id: U, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token: token.into(), user_id: user_id.into(), expires_at }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(exp) if exp <= now)
    }

    pub fn is_expired(&self) -> bool { self.is_expired_at(Utc::now()) }
}

/// `Pending` until the initial fetch from the provider has settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Ready(Option<Session>),
}

struct Subscriber {
    id: u64,
    active: AtomicBool,
    callback: Box<dyn Fn(Option<&Session>) + Send + Sync>,
}

struct Inner {
    provider: Arc<dyn AuthProvider>,
    state: watch::Sender<SessionState>,
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
    next_id: AtomicU64,
    provider_sub: Mutex<Option<ProviderSubscription>>,
    torn_down: AtomicBool,
}

impl Inner {
    /// Replace the session and notify subscribers if the visible state changed.
    fn apply(&self, session: Option<Session>, source: &'static str, only_if_pending: bool) -> bool {
        if self.torn_down.load(Ordering::SeqCst) { return false; }
        let session = match session {
            Some(s) if s.is_expired() => {
                debug!(target: "dojogate::session", user = %s.user_id, source, "dropping expired session");
                None
            }
            other => other,
        };
        let next = SessionState::Ready(session.clone());
        let changed = self.state.send_if_modified(|cur| {
            if only_if_pending && !matches!(cur, SessionState::Pending) { return false; }
            if *cur == next { return false; }
            *cur = next.clone();
            true
        });
        if changed {
            tprintln!("session.apply source={} user={:?}", source, session.as_ref().map(|s| s.user_id.as_str()));
            info!(
                target: "dojogate::session",
                source,
                signed_in = session.is_some(),
                user = session.as_ref().map(|s| s.user_id.as_str()).unwrap_or("-"),
                "session changed"
            );
            self.notify(session.as_ref());
        }
        changed
    }

    fn notify(&self, session: Option<&Session>) {
        let snapshot: Vec<Arc<Subscriber>> = self.subscribers.lock().clone();
        for sub in snapshot {
            // Re-checked per call: an earlier callback may have unsubscribed this one
            if sub.active.load(Ordering::SeqCst) { (sub.callback)(session); }
        }
    }
}

/// Holds the current session and fans out changes. One instance per app, shared by `Clone`.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// A store in the `Pending` state. Nothing is fetched until `init`.
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        let (state, _) = watch::channel(SessionState::Pending);
        Self {
            inner: Arc::new(Inner {
                provider,
                state,
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                provider_sub: Mutex::new(None),
                torn_down: AtomicBool::new(false),
            }),
        }
    }

    /// Construct and start the initial fetch on the current tokio runtime.
    pub fn spawn(provider: Arc<dyn AuthProvider>) -> Self {
        let store = Self::new(provider);
        let task = store.clone();
        tokio::spawn(async move { task.init().await });
        store
    }

    /// Attach to provider events and fetch the persisted session once.
    /// A failed fetch settles the store as anonymous.
    pub async fn init(&self) {
        if self.inner.torn_down.load(Ordering::SeqCst) { return; }
        {
            // Listen before fetching so a sign-in racing the fetch is not lost
            let mut slot = self.inner.provider_sub.lock();
            if slot.is_none() {
                let weak: Weak<Inner> = Arc::downgrade(&self.inner);
                let sub = self.inner.provider.subscribe(Arc::new(move |ev: &AuthEvent| {
                    if let Some(inner) = weak.upgrade() {
                        inner.apply(ev.session().cloned(), "provider_event", false);
                    }
                }));
                *slot = Some(sub);
            }
        }
        let fetched = match self.inner.provider.current_session().await {
            Ok(s) => s,
            Err(e) => {
                warn!(target: "dojogate::session", code = e.code_str(), "session fetch failed, continuing anonymous: {}", e.message());
                None
            }
        };
        if !self.inner.apply(fetched, "initial_fetch", true) {
            debug!(target: "dojogate::session", "initial fetch superseded by a provider event");
        }
    }

    pub fn state(&self) -> SessionState {
        let cur = self.inner.state.borrow().clone();
        match cur {
            SessionState::Ready(Some(s)) if s.is_expired() => {
                self.inner.apply(None, "expired", false);
                SessionState::Ready(None)
            }
            other => other,
        }
    }

    pub fn is_pending(&self) -> bool { matches!(*self.inner.state.borrow(), SessionState::Pending) }

    /// The live session. An expired session is destroyed on read.
    pub fn current(&self) -> Option<Session> {
        match self.state() {
            SessionState::Ready(s) => s,
            SessionState::Pending => None,
        }
    }

    /// Wait until the store is no longer pending, then return the session.
    pub async fn ready(&self) -> Option<Session> {
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(|s| !matches!(s, SessionState::Pending)).await;
        self.current()
    }

    /// Register a change callback. It is called with the new session after every change and never
    /// after `unsubscribe` (or drop of the returned handle).
    pub fn on_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&Session>) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let entry = Arc::new(Subscriber { id, active: AtomicBool::new(true), callback: Box::new(callback) });
        if self.inner.torn_down.load(Ordering::SeqCst) {
            entry.active.store(false, Ordering::SeqCst);
        } else {
            self.inner.subscribers.lock().push(entry.clone());
        }
        Subscription { entry, store: Arc::downgrade(&self.inner) }
    }

    pub fn subscriber_count(&self) -> usize { self.inner.subscribers.lock().len() }

    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<Session> {
        let session = self.inner.provider.sign_in_with_password(email, password).await?;
        self.inner.apply(Some(session.clone()), "sign_in", false);
        Ok(session)
    }

    /// Sign out at the provider. The local session is cleared even if the provider call fails.
    pub async fn sign_out(&self) -> AppResult<()> {
        let res = self.inner.provider.sign_out().await;
        self.inner.apply(None, "sign_out", false);
        if let Err(e) = &res {
            warn!(target: "dojogate::session", code = e.code_str(), "provider sign-out failed: {}", e.message());
        }
        res
    }

    /// Detach from the provider and drop all subscribers. Idempotent.
    pub fn teardown(&self) {
        if self.inner.torn_down.swap(true, Ordering::SeqCst) { return; }
        let provider_sub = self.inner.provider_sub.lock().take();
        drop(provider_sub);
        let subs = std::mem::take(&mut *self.inner.subscribers.lock());
        for s in subs { s.active.store(false, Ordering::SeqCst); }
        // Wake anything still waiting in `ready`
        self.inner.state.send_replace(SessionState::Ready(None));
        info!(target: "dojogate::session", "session store torn down");
    }
}

/// Change-callback registration. Unsubscribing is idempotent; dropping unsubscribes.
#[must_use = "dropping the subscription unsubscribes the callback"]
pub struct Subscription {
    entry: Arc<Subscriber>,
    store: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if self.entry.active.swap(false, Ordering::SeqCst) {
            if let Some(inner) = self.store.upgrade() {
                let id = self.entry.id;
                inner.subscribers.lock().retain(|s| s.id != id);
            }
        }
    }

    pub fn is_active(&self) -> bool { self.entry.active.load(Ordering::SeqCst) }
}

impl Drop for Subscription {
    fn drop(&mut self) { self.unsubscribe(); }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;
