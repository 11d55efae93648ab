use tracing::debug;

use super::Verdict;
use crate::config::DEFAULT_LANDING;
use crate::identity::{SessionState, SessionStore};

/// Keeps signed-in users away from sign-in and sign-up views.
/// Reads the shared session store; it never fetches on its own.
#[derive(Clone)]
pub struct PublicOnlyGate {
    sessions: SessionStore,
    onward: String,
}

impl PublicOnlyGate {
    pub fn new(sessions: SessionStore) -> Self {
        Self { sessions, onward: DEFAULT_LANDING.to_string() }
    }

    /// Where signed-in users are sent.
    pub fn with_onward<S: Into<String>>(mut self, path: S) -> Self {
        self.onward = path.into();
        self
    }

    /// `None` while session presence is unknown.
    pub fn decide(has_session: Option<bool>, onward: &str) -> Verdict {
        match has_session {
            None => Verdict::Loading,
            Some(true) => Verdict::Redirect(onward.to_string()),
            Some(false) => Verdict::Render,
        }
    }

    /// Verdict for the store's current state, without waiting.
    pub fn guard(&self) -> Verdict {
        let has_session = match self.sessions.state() {
            SessionState::Pending => None,
            SessionState::Ready(s) => Some(s.is_some()),
        };
        Self::decide(has_session, &self.onward)
    }

    /// Wait for the session store to settle, then decide.
    pub async fn resolve(&self) -> Verdict {
        let session = self.sessions.ready().await;
        let v = Self::decide(Some(session.is_some()), &self.onward);
        debug!(target: "dojogate::gate", verdict = ?v, "public-only gate settled");
        v
    }
}
