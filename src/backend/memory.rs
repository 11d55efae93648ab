//! In-memory auth provider and relational store.
//! Used by the test suites and the `--demo` mode of the binary; both can be told to fail or to
//! stall so gate behavior across suspension points can be exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::identity::{AuthEvent, AuthListener, AuthListeners, AuthProvider, Filter, ProviderSubscription, RelationalStore, Row, Session};

const SESSION_TTL_SECS: i64 = 60 * 60;

#[derive(Default)]
pub struct MemoryAuthProvider {
    accounts: RwLock<HashMap<String, (String, String)>>,
    current: Mutex<Option<Session>>,
    listeners: AuthListeners,
    fail_fetch: AtomicBool,
    fetch_latency: Mutex<Duration>,
}

impl MemoryAuthProvider {
    pub fn new() -> Self { Self::default() }

    /// Register `email`/`password` for `user_id`.
    pub fn with_account(self, email: &str, password: &str, user_id: &str) -> Self {
        self.accounts.write().insert(email.to_ascii_lowercase(), (password.to_string(), user_id.to_string()));
        self
    }

    /// Seed the persisted session without emitting an event (as if restored from storage).
    pub fn with_session(self, session: Session) -> Self {
        *self.current.lock() = Some(session);
        self
    }

    /// Change the session from outside, emitting the matching event (another tab, token refresh).
    pub fn set_session(&self, session: Option<Session>) {
        *self.current.lock() = session.clone();
        let ev = match session {
            Some(s) => AuthEvent::SignedIn(s),
            None => AuthEvent::SignedOut,
        };
        self.listeners.emit(&ev);
    }

    pub fn fail_fetch(&self, fail: bool) { self.fail_fetch.store(fail, Ordering::SeqCst); }

    pub fn set_fetch_latency(&self, latency: Duration) { *self.fetch_latency.lock() = latency; }

    pub fn listener_count(&self) -> usize { self.listeners.len() }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn current_session(&self) -> AppResult<Option<Session>> {
        let latency = *self.fetch_latency.lock();
        if !latency.is_zero() { tokio::time::sleep(latency).await; }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(AppError::session_unavailable("auth_fetch_failed", "memory provider set to fail"));
        }
        Ok(self.current.lock().clone())
    }

    fn subscribe(&self, listener: AuthListener) -> ProviderSubscription { self.listeners.add(listener) }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AppResult<Session> {
        let user_id = {
            let accounts = self.accounts.read();
            match accounts.get(&email.to_ascii_lowercase()) {
                Some((pw, uid)) if pw == password => uid.clone(),
                _ => return Err(AppError::session_unavailable("invalid_credentials", "invalid login credentials")),
            }
        };
        let session = Session::new(
            uuid::Uuid::new_v4().to_string(),
            user_id,
            Some(Utc::now() + chrono::Duration::seconds(SESSION_TTL_SECS)),
        );
        *self.current.lock() = Some(session.clone());
        self.listeners.emit(&AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> AppResult<()> {
        let had = self.current.lock().take().is_some();
        if had { self.listeners.emit(&AuthEvent::SignedOut); }
        Ok(())
    }
}

/// Tables of JSON rows with equality filtering.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    failing: AtomicBool,
    latency: Mutex<Duration>,
    reads: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Append a row; non-object values are ignored.
    pub fn insert(&self, table: &str, row: Value) {
        if let Value::Object(map) = row {
            self.tables.write().entry(table.to_string()).or_default().push(map);
        }
    }

    pub fn with_row(self, table: &str, row: Value) -> Self {
        self.insert(table, row);
        self
    }

    pub fn set_failing(&self, failing: bool) { self.failing.store(failing, Ordering::SeqCst); }

    pub fn set_latency(&self, latency: Duration) { *self.latency.lock() = latency; }

    /// Table names read so far, in order.
    pub fn reads(&self) -> Vec<String> { self.reads.lock().clone() }

    async fn before_read(&self, table: &str) -> AppResult<()> {
        self.reads.lock().push(table.to_string());
        let latency = *self.latency.lock();
        if !latency.is_zero() { tokio::time::sleep(latency).await; }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::backend_unavailable("store_unavailable", "memory store set to fail"));
        }
        Ok(())
    }

    fn matching(&self, table: &str, filter: &Filter) -> Vec<Row> {
        let tables = self.tables.read();
        let Some(rows) = tables.get(table) else { return Vec::new(); };
        rows.iter().filter(|r| cell_eq(r.get(&filter.column), &filter.value)).cloned().collect()
    }
}

fn cell_eq(cell: Option<&Value>, want: &str) -> bool {
    match cell {
        Some(Value::String(s)) => s == want,
        Some(Value::Number(n)) => n.to_string() == want,
        Some(Value::Bool(b)) => b.to_string() == want,
        _ => false,
    }
}

#[async_trait]
impl RelationalStore for MemoryStore {
    async fn fetch_one(&self, table: &str, filter: &Filter) -> AppResult<Option<Row>> {
        self.before_read(table).await?;
        Ok(self.matching(table, filter).into_iter().next())
    }

    async fn fetch_all(&self, table: &str, filter: &Filter) -> AppResult<Vec<Row>> {
        self.before_read(table).await?;
        Ok(self.matching(table, filter))
    }
}
