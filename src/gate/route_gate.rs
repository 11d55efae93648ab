//! Route gate for protected views.
//!
//! Every navigation starts a new generation in `Pending`. Resolution waits for a concrete
//! session, resolves the identity and applies the role policy; the result is committed only if
//! its generation is still the active one, so a slow answer for an old path can never overwrite
//! the state of the path the user has since moved to. Every failure ends in `Denied`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::Verdict;
use crate::config::DEFAULT_LANDING;
use crate::error::AppError;
use crate::identity::{decide, Identity, IdentityResolver, ResolveError, SessionStore, ViewRequirement};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    NoSession,
    ProfileNotFound,
    BackendUnavailable,
    PolicyDenied,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::NoSession => "no_session",
            DenyReason::ProfileNotFound => "profile_not_found",
            DenyReason::BackendUnavailable => "backend_unavailable",
            DenyReason::PolicyDenied => "policy_denied",
        }
    }

    /// The error this denial absorbed, for callers that want to log or display it.
    pub fn to_error(&self, path: &str) -> AppError {
        let msg = format!("access to {} denied", path);
        match self {
            DenyReason::NoSession => AppError::session_unavailable(self.as_str().to_string(), msg),
            DenyReason::ProfileNotFound => AppError::profile_not_found(self.as_str().to_string(), msg),
            DenyReason::BackendUnavailable => AppError::backend_unavailable(self.as_str().to_string(), msg),
            DenyReason::PolicyDenied => AppError::policy_denied(self.as_str().to_string(), msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Pending,
    Allowed,
    Denied(DenyReason),
}

/// Handle for one navigation; only the latest ticket may commit a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

impl Ticket {
    pub fn generation(&self) -> u64 { self.generation }
}

/// Terminal result of one resolution, read under the same lock that committed it.
#[derive(Debug, Clone, PartialEq)]
pub struct Settled {
    pub state: GateState,
    /// Present only when `state` is `Allowed`.
    pub identity: Option<Identity>,
}

struct Active {
    generation: u64,
    path: String,
    requirement: ViewRequirement,
    state: GateState,
    identity: Option<Identity>,
}

pub struct RouteGate {
    sessions: SessionStore,
    resolver: Arc<IdentityResolver>,
    landing: String,
    generation: AtomicU64,
    active: RwLock<Active>,
}

impl RouteGate {
    pub fn new(sessions: SessionStore, resolver: Arc<IdentityResolver>) -> Self {
        Self {
            sessions,
            resolver,
            landing: DEFAULT_LANDING.to_string(),
            generation: AtomicU64::new(0),
            active: RwLock::new(Active {
                generation: 0,
                path: String::new(),
                requirement: ViewRequirement::Public,
                state: GateState::Pending,
                identity: None,
            }),
        }
    }

    /// Where denied navigations are sent.
    pub fn with_landing<S: Into<String>>(mut self, path: S) -> Self {
        self.landing = path.into();
        self
    }

    pub fn landing(&self) -> &str { &self.landing }

    /// Start a navigation: the gate goes back to `Pending` and earlier tickets go stale.
    pub fn begin(&self, path: &str, requirement: ViewRequirement) -> Ticket {
        let mut a = self.active.write();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        a.generation = generation;
        a.path = path.to_string();
        a.requirement = requirement;
        a.state = GateState::Pending;
        a.identity = None;
        debug!(target: "dojogate::gate", path, generation, "navigation started");
        Ticket { generation }
    }

    pub fn is_current(&self, ticket: Ticket) -> bool { self.active.read().generation == ticket.generation }

    /// Run resolution for `ticket`. Returns the committed state, or `None` if the ticket went
    /// stale before resolution finished (the result was discarded).
    pub async fn resolve(&self, ticket: Ticket) -> Option<GateState> {
        self.settle(ticket).await.map(|s| s.state)
    }

    /// As `resolve`, also handing back the identity committed with the state.
    pub async fn settle(&self, ticket: Ticket) -> Option<Settled> {
        let (path, requirement) = {
            let a = self.active.read();
            if a.generation != ticket.generation { return None; }
            (a.path.clone(), a.requirement.clone())
        };
        if requirement.is_public() {
            return self.commit(ticket, &path, GateState::Allowed, None);
        }

        // Never resolve against a session that is still pending
        let session = self.sessions.ready().await;
        if !self.is_current(ticket) { return self.discard(ticket, &path); }
        let Some(session) = session else {
            return self.commit(ticket, &path, GateState::Denied(DenyReason::NoSession), None);
        };

        let identity = match self.resolver.resolve(&session).await {
            Ok(id) => id,
            Err(ResolveError::NotFound(uid)) => {
                info!(target: "dojogate::gate", path = %path, user = %uid, "session has no profile row");
                return self.commit(ticket, &path, GateState::Denied(DenyReason::ProfileNotFound), None);
            }
            Err(e @ ResolveError::Unavailable(_)) => {
                warn!(target: "dojogate::gate", path = %path, "identity resolution failed: {}", e);
                return self.commit(ticket, &path, GateState::Denied(DenyReason::BackendUnavailable), None);
            }
        };

        let decision = decide(Some(&identity), &requirement);
        let state = if decision.allow { GateState::Allowed } else { GateState::Denied(DenyReason::PolicyDenied) };
        debug!(target: "dojogate::gate", path = %path, allow = decision.allow, reason = decision.reason, "policy evaluated");
        self.commit(ticket, &path, state, Some(identity))
    }

    /// `begin` followed by `resolve`.
    pub async fn navigate(&self, path: &str, requirement: ViewRequirement) -> Option<GateState> {
        let ticket = self.begin(path, requirement);
        self.resolve(ticket).await
    }

    fn commit(&self, ticket: Ticket, path: &str, state: GateState, identity: Option<Identity>) -> Option<Settled> {
        let mut a = self.active.write();
        if a.generation != ticket.generation {
            drop(a);
            return self.discard(ticket, path);
        }
        let identity = if state == GateState::Allowed { identity } else { None };
        a.state = state.clone();
        a.identity = identity.clone();
        info!(target: "dojogate::gate", path, state = ?state, "gate settled");
        Some(Settled { state, identity })
    }

    fn discard(&self, ticket: Ticket, path: &str) -> Option<Settled> {
        debug!(target: "dojogate::gate", path, generation = ticket.generation, "discarding stale resolution");
        None
    }

    pub fn state(&self) -> GateState { self.active.read().state.clone() }

    pub fn active_path(&self) -> String { self.active.read().path.clone() }

    /// Identity behind an `Allowed` state.
    pub fn identity(&self) -> Option<Identity> { self.active.read().identity.clone() }

    pub fn verdict(&self) -> Verdict {
        match self.state() {
            GateState::Pending => Verdict::Loading,
            GateState::Allowed => Verdict::Render,
            GateState::Denied(_) => Verdict::Redirect(self.landing.clone()),
        }
    }

    /// Invalidate any in-flight resolution and return to `Pending`, as when the user leaves for a
    /// view this gate does not guard.
    pub fn cancel(&self) {
        let mut a = self.active.write();
        a.generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        a.state = GateState::Pending;
        a.identity = None;
    }

    /// Drop any in-flight resolution; the gate stays `Pending` until the next navigation.
    pub fn teardown(&self) {
        self.cancel();
        debug!(target: "dojogate::gate", "route gate torn down");
    }
}

#[cfg(test)]
#[path = "route_gate_tests.rs"]
mod route_gate_tests;
