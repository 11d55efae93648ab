//! Identity resolution: session -> profile row + role-assignment rows -> `Identity`.
//! One profile read and one role read per call, no caching and no retries.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::authorizer::Role;
use super::principal::{Identity, Profile};
use super::session::Session;
use crate::error::{AppError, AppResult};

pub type Row = serde_json::Map<String, Value>;

pub const PROFILE_TABLE: &str = "users";
pub const ROLE_TABLE: &str = "user_roles";

/// Equality filter, optionally narrowing the selected columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
    pub select: Option<String>,
}

impl Filter {
    pub fn eq<C: Into<String>, V: Into<String>>(column: C, value: V) -> Self {
        Self { column: column.into(), value: value.into(), select: None }
    }

    pub fn select<S: Into<String>>(mut self, columns: S) -> Self {
        self.select = Some(columns.into());
        self
    }
}

/// Hosted relational storage. Errors are opaque beyond success/failure.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    async fn fetch_one(&self, table: &str, filter: &Filter) -> AppResult<Option<Row>>;
    async fn fetch_all(&self, table: &str, filter: &Filter) -> AppResult<Vec<Row>>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no profile row for user {0}")]
    NotFound(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl From<ResolveError> for AppError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::NotFound(_) => AppError::profile_not_found("profile_missing".to_string(), e.to_string()),
            ResolveError::Unavailable(_) => AppError::backend_unavailable("resolve_failed".to_string(), e.to_string()),
        }
    }
}

pub struct IdentityResolver {
    store: Arc<dyn RelationalStore>,
    profile_table: String,
    role_table: String,
    role_select: String,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn RelationalStore>) -> Self {
        Self {
            store,
            profile_table: PROFILE_TABLE.to_string(),
            role_table: ROLE_TABLE.to_string(),
            role_select: "*,roles(name)".to_string(),
        }
    }

    pub fn with_tables<P: Into<String>, R: Into<String>>(mut self, profile_table: P, role_table: R) -> Self {
        self.profile_table = profile_table.into();
        self.role_table = role_table.into();
        self
    }

    pub async fn resolve(&self, session: &Session) -> Result<Identity, ResolveError> {
        let uid = session.user_id.as_str();
        let row = self
            .store
            .fetch_one(&self.profile_table, &Filter::eq("id", uid))
            .await
            .map_err(|e| unavailable(uid, "profile", e))?;
        let Some(row) = row else {
            debug!(target: "dojogate::resolver", user = uid, "no profile row");
            return Err(ResolveError::NotFound(uid.to_string()));
        };
        let role_rows = self
            .store
            .fetch_all(&self.role_table, &Filter::eq("user_id", uid).select(self.role_select.clone()))
            .await
            .map_err(|e| unavailable(uid, "roles", e))?;

        // Profile columns are display data; a row that will not parse still yields its roles
        let profile: Profile = serde_json::from_value(Value::Object(row.clone())).unwrap_or_else(|e| {
            warn!(target: "dojogate::resolver", user = uid, "ignoring malformed profile row: {}", e);
            Profile::default()
        });
        // A legacy single `role` column on the profile row counts as one more assignment
        let mut roles: BTreeSet<Role> = role_names(&row).into_iter().map(Role::from).collect();
        roles.extend(role_rows.iter().flat_map(role_names).map(Role::from));
        debug!(target: "dojogate::resolver", user = uid, roles = roles.len(), "identity resolved");
        Ok(Identity { user_id: uid.to_string(), profile, roles })
    }
}

fn unavailable(uid: &str, what: &str, e: AppError) -> ResolveError {
    warn!(target: "dojogate::resolver", user = uid, code = e.code_str(), "{} read failed: {}", what, e.message());
    ResolveError::Unavailable(format!("{} read failed: {}", what, e.message()))
}

/// Role names carried by a row: `role`, `role_name`, or an embedded `roles` relation
/// (`{"name": ..}`, `[{"name": ..}]` or plain strings).
pub fn role_names(row: &Row) -> Vec<String> {
    let mut out = Vec::new();
    for key in ["role", "role_name"] {
        if let Some(Value::String(s)) = row.get(key) {
            if !s.trim().is_empty() { out.push(s.clone()); }
        }
    }
    match row.get("roles") {
        Some(Value::Object(obj)) => push_name(obj.get("name"), &mut out),
        Some(Value::Array(items)) => {
            for it in items {
                match it {
                    Value::Object(obj) => push_name(obj.get("name"), &mut out),
                    other => push_name(Some(other), &mut out),
                }
            }
        }
        Some(Value::String(s)) if !s.trim().is_empty() => out.push(s.clone()),
        _ => {}
    }
    out
}

fn push_name(v: Option<&Value>, out: &mut Vec<String>) {
    if let Some(Value::String(s)) = v {
        if !s.trim().is_empty() { out.push(s.clone()); }
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod resolver_tests;
