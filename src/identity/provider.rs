use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::session::Session;
use crate::error::AppResult;

/// Sign-in state changes reported by an auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Session),
    TokenRefreshed(Session),
    SignedOut,
}

impl AuthEvent {
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthEvent::SignedIn(s) | AuthEvent::TokenRefreshed(s) => Some(s),
            AuthEvent::SignedOut => None,
        }
    }
}

pub type AuthListener = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

/// Handle returned by `AuthProvider::subscribe`. Cancelling is idempotent; dropping cancels.
#[must_use = "dropping the subscription detaches the listener"]
pub struct ProviderSubscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ProviderSubscription {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self { cancel: Some(Box::new(cancel)) }
    }

    pub fn unsubscribe(&mut self) {
        if let Some(f) = self.cancel.take() { f(); }
    }
}

impl Drop for ProviderSubscription {
    fn drop(&mut self) { self.unsubscribe(); }
}

impl std::fmt::Debug for ProviderSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSubscription").field("active", &self.cancel.is_some()).finish()
    }
}

/// Listener registry shared by provider implementations.
#[derive(Clone, Default)]
pub struct AuthListeners {
    inner: Arc<Mutex<ListenerList>>,
}

#[derive(Default)]
struct ListenerList {
    next_id: u64,
    entries: Vec<(u64, AuthListener)>,
}

impl AuthListeners {
    pub fn add(&self, listener: AuthListener) -> ProviderSubscription {
        let id = {
            let mut l = self.inner.lock();
            l.next_id += 1;
            let id = l.next_id;
            l.entries.push((id, listener));
            id
        };
        let weak: Weak<Mutex<ListenerList>> = Arc::downgrade(&self.inner);
        ProviderSubscription::new(move || {
            if let Some(list) = weak.upgrade() {
                list.lock().entries.retain(|(eid, _)| *eid != id);
            }
        })
    }

    pub fn emit(&self, event: &AuthEvent) {
        // Snapshot so listeners may (un)subscribe while being called
        let snapshot: Vec<AuthListener> = self.inner.lock().entries.iter().map(|(_, l)| l.clone()).collect();
        for l in snapshot { l(event); }
    }

    pub fn len(&self) -> usize { self.inner.lock().entries.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// External authentication service.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The persisted session, if any. An invalid or expired token is `Ok(None)`, not an error.
    async fn current_session(&self) -> AppResult<Option<Session>>;

    fn subscribe(&self, listener: AuthListener) -> ProviderSubscription;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AppResult<Session>;

    async fn sign_out(&self) -> AppResult<()>;
}
