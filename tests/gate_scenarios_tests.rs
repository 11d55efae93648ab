//! End-to-end navigation scenarios over the in-memory backend: route lookup, aliases, both gates
//! and the history they leave behind.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use dojogate::backend::{MemoryAuthProvider, MemoryStore};
use dojogate::config::Config;
use dojogate::identity::{IdentityResolver, Role, Session, SessionStore, PROFILE_TABLE, ROLE_TABLE};
use dojogate::navigator::{Navigator, Outcome};
use dojogate::router::{MemoryRouter, RouteTable, Router};

struct Harness {
    provider: Arc<MemoryAuthProvider>,
    store: Arc<MemoryStore>,
    router: Arc<MemoryRouter>,
    nav: Arc<Navigator>,
}

fn seeded_store() -> MemoryStore {
    MemoryStore::new()
        .with_row(PROFILE_TABLE, json!({"id": "student", "first_name": "Sam", "belt_rank": "blue"}))
        .with_row(ROLE_TABLE, json!({"user_id": "student", "roles": {"name": "student"}}))
        .with_row(PROFILE_TABLE, json!({"id": "coach", "first_name": "Rhea", "last_name": "Okafor"}))
        .with_row(ROLE_TABLE, json!({"user_id": "coach", "roles": {"name": "instructor"}}))
        .with_row(ROLE_TABLE, json!({"user_id": "coach", "roles": {"name": "fighter"}}))
}

async fn harness_with(user: Option<&str>, table: RouteTable, config: &Config) -> Harness {
    let mut provider = MemoryAuthProvider::new().with_account("coach@dojo.test", "pw", "coach");
    if let Some(uid) = user {
        provider = provider.with_session(Session::new(format!("tok-{}", uid), uid, None));
    }
    let provider = Arc::new(provider);
    let store = Arc::new(seeded_store());
    let sessions = SessionStore::new(provider.clone());
    sessions.init().await;
    let router = Arc::new(MemoryRouter::default());
    let resolver = Arc::new(IdentityResolver::new(store.clone()));
    let nav = Arc::new(Navigator::from_config(config, table, router.clone(), sessions, resolver));
    Harness { provider, store, router, nav }
}

async fn harness(user: Option<&str>) -> Harness {
    harness_with(user, RouteTable::dashboard(), &Config::default()).await
}

fn view(outcome: &Outcome) -> &str { outcome.view().unwrap_or("<none>") }

#[tokio::test]
async fn anonymous_visitor_lands_on_welcome() {
    let h = harness(None).await;
    let out = h.nav.navigate("/instructor-dashboard").await.unwrap();
    assert_eq!(view(&out), "welcome");
    assert_eq!(out.path(), "/welcome");
    // The denied entry was replaced, not stacked
    assert_eq!(h.router.history(), vec!["/", "/welcome"]);
    assert!(h.store.reads().is_empty());
}

#[tokio::test]
async fn student_cannot_open_instructor_dashboard() {
    let h = harness(Some("student")).await;
    let out = h.nav.navigate("/instructor-dashboard").await.unwrap();
    assert_eq!(view(&out), "welcome");
    assert_eq!(h.router.current_path(), "/welcome");
}

#[tokio::test]
async fn instructor_renders_with_identity() {
    let h = harness(Some("coach")).await;
    let out = h.nav.navigate("/Instructor-Dashboard/").await.unwrap();
    match out {
        Outcome::Render { view, identity: Some(id), .. } => {
            assert_eq!(view, "instructor_dashboard");
            assert!(id.has_role(&Role::Instructor));
            assert!(id.has_role(&Role::Fighter));
            assert_eq!(id.profile.first_name.as_deref(), Some("Rhea"));
        }
        other => panic!("expected render with identity, got {:?}", other),
    }
    assert_eq!(h.router.current_path(), "/instructor-dashboard");
}

#[tokio::test]
async fn public_routes_render_for_anyone() {
    let h = harness(None).await;
    for (path, expected) in [("/welcome", "welcome"), ("/account", "account"), ("/fighter-dashboard", "fighter_dashboard")] {
        let out = h.nav.navigate(path).await.unwrap();
        assert_eq!(view(&out), expected, "path {}", path);
    }
    assert!(h.store.reads().is_empty());
}

#[tokio::test]
async fn root_and_legacy_aliases_forward() {
    let h = harness(None).await;
    assert_eq!(view(&h.nav.navigate("/").await.unwrap()), "welcome");
    let out = h.nav.navigate("/login").await.unwrap();
    assert_eq!(view(&out), "auth");
    assert_eq!(out.path(), "/auth");
    assert_eq!(view(&h.nav.navigate("/signup?next=/account").await.unwrap()), "auth");
}

#[tokio::test]
async fn signed_in_user_is_sent_away_from_auth() {
    let h = harness(Some("student")).await;
    let out = h.nav.navigate("/login").await.unwrap();
    assert_eq!(view(&out), "welcome");
    assert_eq!(h.router.history(), vec!["/", "/welcome"]);
}

#[tokio::test]
async fn unknown_path_renders_not_found() {
    let h = harness(Some("coach")).await;
    let out = h.nav.navigate("/gym-owner-dashboard").await.unwrap();
    assert_eq!(out, Outcome::NotFound { path: "/gym-owner-dashboard".into(), view: "not_found".into() });
}

#[tokio::test]
async fn backend_outage_fails_closed() {
    let h = harness(Some("coach")).await;
    h.store.set_failing(true);
    assert_eq!(view(&h.nav.navigate("/instructor-dashboard").await.unwrap()), "welcome");
    h.store.set_failing(false);
    assert_eq!(view(&h.nav.navigate("/instructor-dashboard").await.unwrap()), "instructor_dashboard");
}

#[tokio::test]
async fn sign_in_then_sign_out_round() {
    let h = harness(None).await;
    h.nav.sessions().sign_in("coach@dojo.test", "pw").await.unwrap();
    assert_eq!(view(&h.nav.navigate("/instructor-dashboard").await.unwrap()), "instructor_dashboard");

    let out = h.nav.sign_out().await.unwrap();
    assert_eq!(view(&out), "auth");
    assert_eq!(h.nav.sessions().current(), None);
    assert_eq!(view(&h.nav.navigate("/instructor-dashboard").await.unwrap()), "welcome");
}

#[tokio::test]
async fn external_sign_out_is_seen_by_next_navigation() {
    let h = harness(Some("coach")).await;
    assert_eq!(view(&h.nav.navigate("/instructor-dashboard").await.unwrap()), "instructor_dashboard");
    h.provider.set_session(None);
    assert_eq!(view(&h.nav.navigate("/instructor-dashboard").await.unwrap()), "welcome");
}

#[tokio::test]
async fn landing_paths_follow_config() {
    let config = Config::from_lookup(|k| match k {
        "DOJOGATE_PUBLIC_LANDING" => Some("/account".to_string()),
        "DOJOGATE_AUTHENTICATED_LANDING" => Some("/fighter-dashboard".to_string()),
        _ => None,
    });
    let h = harness_with(Some("student"), RouteTable::dashboard(), &config).await;
    assert_eq!(view(&h.nav.navigate("/instructor-dashboard").await.unwrap()), "account");
    assert_eq!(view(&h.nav.navigate("/auth").await.unwrap()), "fighter_dashboard");
}

#[tokio::test]
async fn alias_cycle_is_an_error() {
    let table = RouteTable::new("not_found").alias("/a", "/b").alias("/b", "/a");
    let h = harness_with(None, table, &Config::default()).await;
    let err = h.nav.navigate("/a").await.unwrap_err();
    assert_eq!(err.code_str(), "redirect_loop");
}

#[tokio::test]
async fn newer_navigation_supersedes_slow_one() {
    let h = harness(Some("coach")).await;
    h.store.set_latency(Duration::from_millis(150));
    let nav = h.nav.clone();
    let slow = tokio::spawn(async move { nav.navigate("/instructor-dashboard").await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.store.set_latency(Duration::ZERO);
    let fast = h.nav.navigate("/instructor-dashboard").await.unwrap();
    assert_eq!(view(&fast), "instructor_dashboard");
    let slow = slow.await.unwrap().unwrap();
    assert_eq!(slow, Outcome::Superseded { path: "/instructor-dashboard".into() });
}

#[tokio::test]
async fn teardown_abandons_in_flight_navigation() {
    let h = harness(Some("coach")).await;
    h.store.set_latency(Duration::from_millis(100));
    let nav = h.nav.clone();
    let pending = tokio::spawn(async move { nav.navigate("/instructor-dashboard").await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.nav.teardown();
    let out = pending.await.unwrap().unwrap();
    assert!(matches!(out, Outcome::Superseded { .. }));
}

#[tokio::test]
async fn slow_denial_does_not_redirect_away_from_newer_public_view() {
    let h = harness(Some("student")).await;
    h.store.set_latency(Duration::from_millis(100));
    let nav = h.nav.clone();
    let slow = tokio::spawn(async move { nav.navigate("/instructor-dashboard").await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let fast = h.nav.navigate("/account").await.unwrap();
    assert_eq!(view(&fast), "account");

    let slow = slow.await.unwrap().unwrap();
    assert_eq!(slow, Outcome::Superseded { path: "/instructor-dashboard".into() });
    assert_eq!(h.router.current_path(), "/account");
    assert_eq!(h.router.history(), vec!["/", "/instructor-dashboard", "/account"]);
    assert_eq!(h.nav.route_gate().state(), dojogate::gate::GateState::Pending);
}

#[tokio::test]
async fn slow_grant_is_superseded_by_newer_alias_navigation() {
    let h = harness(Some("coach")).await;
    h.store.set_latency(Duration::from_millis(100));
    let nav = h.nav.clone();
    let slow = tokio::spawn(async move { nav.navigate("/instructor-dashboard").await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(view(&h.nav.navigate("/").await.unwrap()), "welcome");
    let slow = slow.await.unwrap().unwrap();
    assert!(matches!(slow, Outcome::Superseded { .. }));
    assert_eq!(h.router.current_path(), "/welcome");
    assert_eq!(h.nav.route_gate().identity(), None);
}
