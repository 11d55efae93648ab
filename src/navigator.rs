//! Navigation entry point: route lookup, alias forwarding and both gates, driving a `Router`.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::gate::{GateState, PublicOnlyGate, RouteGate, Settled, Verdict};
use crate::identity::{Identity, IdentityResolver, SessionStore};
use crate::router::{normalize_path, Route, RouteKind, RouteMatch, RouteTable, Router};

/// Upper bound on alias and gate redirects followed for one navigation.
pub const MAX_REDIRECTS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Render { path: String, view: String, identity: Option<Identity> },
    NotFound { path: String, view: String },
    /// A newer navigation took over before this one settled.
    Superseded { path: String },
}

impl Outcome {
    pub fn path(&self) -> &str {
        match self {
            Outcome::Render { path, .. } | Outcome::NotFound { path, .. } | Outcome::Superseded { path } => path,
        }
    }

    pub fn view(&self) -> Option<&str> {
        match self {
            Outcome::Render { view, .. } | Outcome::NotFound { view, .. } => Some(view),
            Outcome::Superseded { .. } => None,
        }
    }
}

pub struct Navigator {
    table: RouteTable,
    router: Arc<dyn Router>,
    sessions: SessionStore,
    route_gate: RouteGate,
    public_only: PublicOnlyGate,
    /// Generation of the latest navigation. Router writes happen under this lock and only for
    /// the current generation.
    current: Mutex<u64>,
}

impl Navigator {
    pub fn new(table: RouteTable, router: Arc<dyn Router>, sessions: SessionStore, resolver: Arc<IdentityResolver>) -> Self {
        Self::from_config(&Config::default(), table, router, sessions, resolver)
    }

    /// Landing paths come from `config`.
    pub fn from_config(
        config: &Config,
        table: RouteTable,
        router: Arc<dyn Router>,
        sessions: SessionStore,
        resolver: Arc<IdentityResolver>,
    ) -> Self {
        let route_gate = RouteGate::new(sessions.clone(), resolver).with_landing(config.public_landing.clone());
        let public_only = PublicOnlyGate::new(sessions.clone()).with_onward(config.authenticated_landing.clone());
        Self { table, router, sessions, route_gate, public_only, current: Mutex::new(0) }
    }

    pub fn table(&self) -> &RouteTable { &self.table }

    pub fn router(&self) -> &Arc<dyn Router> { &self.router }

    pub fn sessions(&self) -> &SessionStore { &self.sessions }

    pub fn route_gate(&self) -> &RouteGate { &self.route_gate }

    pub fn public_only_gate(&self) -> &PublicOnlyGate { &self.public_only }

    /// Push `path` and follow redirects until a view renders. Once a newer navigation starts,
    /// this one returns `Superseded` and leaves the router alone.
    pub async fn navigate(&self, path: &str) -> AppResult<Outcome> {
        let generation = {
            let mut cur = self.current.lock();
            *cur += 1;
            // Whatever the destination, an older protected resolution must not commit
            self.route_gate.cancel();
            self.router.navigate_to(path);
            *cur
        };
        let mut path = normalize_path(path);
        for _ in 0..=MAX_REDIRECTS {
            let route = match self.table.lookup(&path) {
                RouteMatch::Found(r) => r,
                RouteMatch::NotFound => {
                    debug!(target: "dojogate::navigator", path = %path, "no route");
                    let view = self.table.not_found_view().to_string();
                    return Ok(self.finish(generation, Outcome::NotFound { path, view }));
                }
            };
            let next = match &route.kind {
                RouteKind::Public => return Ok(self.finish(generation, render(route, None))),
                RouteKind::Alias(to) => to.clone(),
                RouteKind::PublicOnly => match self.public_only.resolve().await {
                    Verdict::Render => return Ok(self.finish(generation, render(route, None))),
                    Verdict::Redirect(to) => to,
                    Verdict::Loading => return Ok(Outcome::Superseded { path }),
                },
                RouteKind::Protected(req) => {
                    let ticket = {
                        // A stale navigation must not begin over a newer one's gate ticket
                        let cur = self.current.lock();
                        if *cur != generation { return Ok(Outcome::Superseded { path }); }
                        self.route_gate.begin(&path, req.clone())
                    };
                    match self.route_gate.settle(ticket).await {
                        Some(Settled { state: GateState::Allowed, identity }) => {
                            return Ok(self.finish(generation, render(route, identity)));
                        }
                        Some(Settled { state: GateState::Denied(reason), .. }) => {
                            info!(target: "dojogate::navigator", path = %path, reason = reason.as_str(), "navigation denied");
                            self.route_gate.landing().to_string()
                        }
                        _ => return Ok(Outcome::Superseded { path }),
                    }
                }
            };
            if !self.redirect(generation, &next) {
                return Ok(Outcome::Superseded { path });
            }
            debug!(target: "dojogate::navigator", from = %path, to = %next, "redirect");
            path = normalize_path(&next);
        }
        Err(AppError::internal("redirect_loop".to_string(), format!("more than {} redirects ending at {}", MAX_REDIRECTS, path)))
    }

    fn is_current(&self, generation: u64) -> bool { *self.current.lock() == generation }

    /// Replace the history entry, unless a newer navigation has started.
    fn redirect(&self, generation: u64, to: &str) -> bool {
        let cur = self.current.lock();
        if *cur != generation { return false; }
        self.router.redirect(to, true);
        true
    }

    fn finish(&self, generation: u64, outcome: Outcome) -> Outcome {
        if self.is_current(generation) { return outcome; }
        debug!(target: "dojogate::navigator", path = outcome.path(), "navigation superseded");
        Outcome::Superseded { path: outcome.path().to_string() }
    }

    /// Sign out and head to the sign-in form. Navigation continues even if the provider call
    /// failed, since the local session is gone either way.
    pub async fn sign_out(&self) -> AppResult<Outcome> {
        if let Err(e) = self.sessions.sign_out().await {
            warn!(target: "dojogate::navigator", code = e.code_str(), "continuing after sign-out error");
        }
        self.navigate("/login").await
    }

    /// Drop in-flight navigation and gate work; call when the owning view goes away.
    pub fn teardown(&self) {
        *self.current.lock() += 1;
        self.route_gate.teardown();
    }
}

fn render(route: &Route, identity: Option<Identity>) -> Outcome {
    Outcome::Render { path: route.path.clone(), view: route.view.clone(), identity }
}
