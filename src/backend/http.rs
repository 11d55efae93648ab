//! HTTP adapters for the hosted backend: auth under `/auth/v1`, rows under `/rest/v1/<table>`.
//!
//! Every request carries the project's anon key in `apikey`; the bearer is the user's access
//! token when one is held, else the anon key. Provider and store share the token slot, so rows
//! are read with the signed-in user's permissions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use super::token;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::identity::{AuthEvent, AuthListener, AuthListeners, AuthProvider, Filter, ProviderSubscription, RelationalStore, Row, Session};

const ERROR_BODY_LIMIT: usize = 200;

#[derive(Clone)]
pub struct HttpBackend {
    base: Url,
    anon_key: String,
    client: reqwest::Client,
    token: Arc<RwLock<Option<String>>>,
}

impl HttpBackend {
    pub fn new(base: &str, anon_key: &str, timeout: Duration) -> AppResult<Self> {
        // Relative joins keep any path prefix of the base URL
        let with_slash = if base.ends_with('/') { base.to_string() } else { format!("{}/", base) };
        let base = Url::parse(&with_slash)
            .map_err(|e| AppError::config("invalid_backend_url".to_string(), format!("{}: {}", with_slash, e)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::config("http_client".to_string(), e.to_string()))?;
        Ok(Self { base, anon_key: anon_key.to_string(), client, token: Arc::new(RwLock::new(None)) })
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        let (url, key) = config.require_backend()?;
        let backend = Self::new(url, key, config.backend.timeout)?;
        backend.set_access_token(config.access_token.clone());
        Ok(backend)
    }

    /// Persisted access token, as restored from storage.
    pub fn set_access_token(&self, token: Option<String>) { *self.token.write() = token; }

    pub fn access_token(&self) -> Option<String> { self.token.read().clone() }

    pub fn auth_provider(&self) -> HttpAuthProvider {
        HttpAuthProvider { backend: self.clone(), listeners: AuthListeners::default() }
    }

    pub fn store(&self) -> HttpStore { HttpStore { backend: self.clone() } }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        self.base
            .join(path)
            .map_err(|e| AppError::config("invalid_backend_url".to_string(), format!("{}: {}", path, e)))
    }

    fn request(&self, method: Method, url: Url, bearer: Option<&str>) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
    }
}

async fn error_body(resp: reqwest::Response) -> String {
    let mut body = resp.text().await.unwrap_or_default();
    if body.len() > ERROR_BODY_LIMIT {
        let mut cut = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(cut) { cut -= 1; }
        body.truncate(cut);
    }
    body
}

fn auth_transport(e: reqwest::Error) -> AppError {
    AppError::session_unavailable("auth_transport".to_string(), e.to_string())
}

#[derive(Debug, Deserialize)]
struct UserBody {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserBody,
}

pub struct HttpAuthProvider {
    backend: HttpBackend,
    listeners: AuthListeners,
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn current_session(&self) -> AppResult<Option<Session>> {
        let Some(tok) = self.backend.access_token() else { return Ok(None); };
        let expires_at = token::expiry(&tok);
        if matches!(expires_at, Some(exp) if exp <= Utc::now()) {
            debug!(target: "dojogate::backend", "stored access token already expired");
            return Ok(None);
        }
        let url = self.backend.endpoint("auth/v1/user")?;
        let resp = self.backend.request(Method::GET, url, Some(&tok)).send().await.map_err(auth_transport)?;
        match resp.status() {
            s if s.is_success() => {
                let user: UserBody = resp.json().await.map_err(auth_transport)?;
                Ok(Some(Session::new(tok, user.id, expires_at)))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!(target: "dojogate::backend", "access token rejected");
                Ok(None)
            }
            s => Err(AppError::session_unavailable(format!("auth_http_{}", s.as_u16()), error_body(resp).await)),
        }
    }

    fn subscribe(&self, listener: AuthListener) -> ProviderSubscription { self.listeners.add(listener) }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AppResult<Session> {
        let mut url = self.backend.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let resp = self
            .backend
            .request(Method::POST, url, None)
            .json(&serde_json::json!({"email": email, "password": password}))
            .send()
            .await
            .map_err(auth_transport)?;
        let status = resp.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(AppError::session_unavailable("invalid_credentials".to_string(), error_body(resp).await));
        }
        if !status.is_success() {
            return Err(AppError::session_unavailable(format!("auth_http_{}", status.as_u16()), error_body(resp).await));
        }
        let body: TokenBody = resp.json().await.map_err(auth_transport)?;
        let expires_at = body
            .expires_at
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .or_else(|| body.expires_in.map(|secs| Utc::now() + chrono::Duration::seconds(secs)))
            .or_else(|| token::expiry(&body.access_token));
        let session = Session::new(body.access_token, body.user.id, expires_at);
        self.backend.set_access_token(Some(session.token.clone()));
        self.listeners.emit(&AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> AppResult<()> {
        let taken = self.backend.token.write().take();
        let Some(tok) = taken else { return Ok(()); };
        self.listeners.emit(&AuthEvent::SignedOut);
        let url = self.backend.endpoint("auth/v1/logout")?;
        let resp = self.backend.request(Method::POST, url, Some(&tok)).send().await.map_err(auth_transport)?;
        let status = resp.status();
        // Already-invalid tokens are signed out as far as we care
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        warn!(target: "dojogate::backend", status = status.as_u16(), "remote sign-out failed");
        Err(AppError::session_unavailable(format!("auth_http_{}", status.as_u16()), error_body(resp).await))
    }
}

pub struct HttpStore {
    backend: HttpBackend,
}

impl HttpStore {
    async fn rows(&self, table: &str, filter: &Filter, limit: Option<usize>) -> AppResult<Vec<Row>> {
        let mut url = self.backend.endpoint(&format!("rest/v1/{}", urlencoding::encode(table)))?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("select", filter.select.as_deref().unwrap_or("*"));
            q.append_pair(&filter.column, &format!("eq.{}", filter.value));
            if let Some(n) = limit { q.append_pair("limit", &n.to_string()); }
        }
        let bearer = self.backend.access_token();
        let resp = self
            .backend
            .request(Method::GET, url, bearer.as_deref())
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = error_body(resp).await;
            warn!(target: "dojogate::backend", table, status = status.as_u16(), "row read failed");
            return Err(AppError::backend_unavailable(format!("http_{}", status.as_u16()), body));
        }
        let rows: Vec<Row> = resp.json().await?;
        debug!(target: "dojogate::backend", table, rows = rows.len(), "rows fetched");
        Ok(rows)
    }
}

#[async_trait]
impl RelationalStore for HttpStore {
    async fn fetch_one(&self, table: &str, filter: &Filter) -> AppResult<Option<Row>> {
        Ok(self.rows(table, filter, Some(1)).await?.into_iter().next())
    }

    async fn fetch_all(&self, table: &str, filter: &Filter) -> AppResult<Vec<Row>> {
        self.rows(table, filter, None).await
    }
}
