//!
//! dojogate CLI
//! ------------
//! Inspect the dashboard's route table and evaluate navigations against the hosted backend.
//! Backend settings come from the DOJOGATE_* environment variables; `--demo` swaps in seeded
//! in-memory users.

use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use serde_json::json;

use dojogate::backend::{HttpBackend, MemoryAuthProvider, MemoryStore};
use dojogate::config::Config;
use dojogate::identity::{AuthProvider, IdentityResolver, RelationalStore, Session, SessionStore, PROFILE_TABLE, ROLE_TABLE};
use dojogate::navigator::{Navigator, Outcome};
use dojogate::router::{MemoryRouter, Router, RouteTable};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} routes\n  {program} check <path> [--token <access_token>]\n  {program} whoami [--token <access_token>]\n  {program} signin --email <email> --password <password>\n  {program} --demo [--as <user_id>] check|whoami|signin ...\n\nFlags:\n  --token <t>         Access token to evaluate with (default: DOJOGATE_ACCESS_TOKEN)\n  --demo              Use built-in in-memory users (student, coach) instead of the backend\n  --as <user_id>      Demo mode: start signed in as this user\n  --email <e>         Account email for signin\n  --password <p>      Account password for signin\n  -h, --help          Show this help\n\nEnvironment:\n  DOJOGATE_BACKEND_URL, DOJOGATE_ANON_KEY      hosted backend (required except for routes)\n  DOJOGATE_PUBLIC_LANDING                      where denied navigations land (default /welcome)\n  DOJOGATE_AUTHENTICATED_LANDING               where signed-in users leave /auth (default /welcome)\n  DOJOGATE_HTTP_TIMEOUT_SECS                   per-request timeout (default 10)\n\nExamples:\n  {program} check /instructor-dashboard --token eyJhbGciOi...\n  {program} signin --email coach@example.com --password hunter2"
    );
}

struct Args {
    command: String,
    path: Option<String>,
    token: Option<String>,
    email: Option<String>,
    password: Option<String>,
    demo: bool,
    as_user: Option<String>,
}

fn parse_args(args: &[String]) -> Result<Option<Args>> {
    let mut out = Args { command: String::new(), path: None, token: None, email: None, password: None, demo: false, as_user: None };
    let mut i = 1usize;
    while i < args.len() {
        let a = args[i].as_str();
        let mut value = |name: &str| -> Result<String> {
            i += 1;
            args.get(i).cloned().ok_or_else(|| anyhow!("{} requires a value", name))
        };
        match a {
            "-h" | "--help" => return Ok(None),
            "--token" => out.token = Some(value("--token")?),
            "--email" => out.email = Some(value("--email")?),
            "--password" => out.password = Some(value("--password")?),
            "--as" => out.as_user = Some(value("--as")?),
            "--demo" => out.demo = true,
            s if s.starts_with("--") => return Err(anyhow!("unknown flag: {}", s)),
            s if out.command.is_empty() => out.command = s.to_string(),
            s if out.path.is_none() => out.path = Some(s.to_string()),
            s => return Err(anyhow!("unexpected argument: {}", s)),
        }
        i += 1;
    }
    if out.command.is_empty() { return Ok(None); }
    Ok(Some(out))
}

fn print_routes(table: &RouteTable) {
    for r in table.routes() {
        let view = if r.view.is_empty() { "-" } else { r.view.as_str() };
        println!("{:<24} {:<22} {}", r.path, view, r.kind);
    }
}

fn print_outcome(outcome: &Outcome, router: &MemoryRouter) {
    match outcome {
        Outcome::Render { path, view, identity } => {
            println!("render {} ({})", view, path);
            if let Some(id) = identity {
                println!("  as {} [{}]", id.display_name(), id.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(", "));
            }
        }
        Outcome::NotFound { path, view } => println!("not found: {} -> {}", path, view),
        Outcome::Superseded { path } => println!("superseded: {}", path),
    }
    println!("  history: {}", router.history().join(" -> "));
}

/// Two seeded users: `student` (student role) and `coach` (instructor and student).
fn demo_backend(as_user: Option<&str>) -> (Arc<dyn AuthProvider>, Arc<dyn RelationalStore>) {
    let store = MemoryStore::new()
        .with_row(PROFILE_TABLE, json!({"id": "student", "first_name": "Sam", "belt_rank": "blue", "stripes": 2}))
        .with_row(PROFILE_TABLE, json!({"id": "coach", "first_name": "Rhea", "belt_rank": "black", "gym_name": "Harbour BJJ"}))
        .with_row(ROLE_TABLE, json!({"user_id": "student", "roles": {"name": "student"}}))
        .with_row(ROLE_TABLE, json!({"user_id": "coach", "roles": {"name": "instructor"}}))
        .with_row(ROLE_TABLE, json!({"user_id": "coach", "roles": {"name": "student"}}));
    let mut provider = MemoryAuthProvider::new()
        .with_account("student@dojo.test", "student", "student")
        .with_account("coach@dojo.test", "coach", "coach");
    if let Some(user) = as_user {
        provider = provider.with_session(Session::new(format!("demo-{}", user), user, None));
    }
    (Arc::new(provider), Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("warn"))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("dojogate");
    let parsed = match parse_args(&args) {
        Ok(Some(p)) => p,
        Ok(None) => { print_usage(program); return Ok(()); }
        Err(e) => { print_usage(program); return Err(e); }
    };

    let mut config = Config::from_env();
    if parsed.token.is_some() { config.access_token = parsed.token.clone(); }
    let table = RouteTable::dashboard();

    if parsed.command == "routes" {
        print_routes(&table);
        return Ok(());
    }

    let (provider, store): (Arc<dyn AuthProvider>, Arc<dyn RelationalStore>) = if parsed.demo {
        demo_backend(parsed.as_user.as_deref())
    } else {
        let backend = HttpBackend::from_config(&config)?;
        info!(target: "dojogate", "backend ready: token={}", if backend.access_token().is_some() { "set" } else { "none" });
        (Arc::new(backend.auth_provider()), Arc::new(backend.store()))
    };
    let sessions = SessionStore::spawn(provider);
    let resolver = Arc::new(IdentityResolver::new(store));

    match parsed.command.as_str() {
        "check" => {
            let path = parsed.path.ok_or_else(|| anyhow!("check requires a path"))?;
            let router = Arc::new(MemoryRouter::default());
            let nav = Navigator::from_config(&config, table, router.clone() as Arc<dyn Router>, sessions.clone(), resolver);
            let outcome = nav.navigate(&path).await?;
            print_outcome(&outcome, &router);
            nav.teardown();
        }
        "whoami" => match sessions.ready().await {
            None => println!("anonymous"),
            Some(session) => {
                let id = resolver.resolve(&session).await?;
                println!("{}", serde_json::to_string_pretty(&id)?);
            }
        },
        "signin" => {
            let email = parsed.email.ok_or_else(|| anyhow!("signin requires --email"))?;
            let password = parsed.password.ok_or_else(|| anyhow!("signin requires --password"))?;
            sessions.ready().await;
            let session = sessions.sign_in(&email, &password).await?;
            println!("signed in as {}", session.user_id);
            println!("export DOJOGATE_ACCESS_TOKEN={}", session.token);
        }
        other => {
            print_usage(program);
            sessions.teardown();
            return Err(anyhow!("unknown command: {}", other));
        }
    }
    sessions.teardown();
    Ok(())
}
