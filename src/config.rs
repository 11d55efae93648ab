//! Environment-driven configuration.
//!
//! Values are read once at startup. The HTTP backend settings are optional at load time so the
//! in-memory backend and `routes` listing work without them; `require_backend` turns a missing
//! value into a `Config` error at the point the hosted backend is actually needed.

use std::time::Duration;

use tracing::warn;

use crate::error::{AppError, AppResult};

pub const ENV_BACKEND_URL: &str = "DOJOGATE_BACKEND_URL";
pub const ENV_ANON_KEY: &str = "DOJOGATE_ANON_KEY";
pub const ENV_ACCESS_TOKEN: &str = "DOJOGATE_ACCESS_TOKEN";
pub const ENV_PUBLIC_LANDING: &str = "DOJOGATE_PUBLIC_LANDING";
pub const ENV_AUTHENTICATED_LANDING: &str = "DOJOGATE_AUTHENTICATED_LANDING";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "DOJOGATE_HTTP_TIMEOUT_SECS";

pub const DEFAULT_LANDING: &str = "/welcome";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend: BackendConfig,
    /// Where denied navigations land.
    pub public_landing: String,
    /// Where signed-in users are sent away from public-only views.
    pub authenticated_landing: String,
    pub access_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig { url: None, anon_key: None, timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS) },
            public_landing: DEFAULT_LANDING.to_string(),
            authenticated_landing: DEFAULT_LANDING.to_string(),
            access_token: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let timeout_secs = match get(ENV_HTTP_TIMEOUT_SECS) {
            Some(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
                warn!(target: "dojogate::config", "ignoring invalid {}='{}', using {}s", ENV_HTTP_TIMEOUT_SECS, raw, DEFAULT_HTTP_TIMEOUT_SECS);
                DEFAULT_HTTP_TIMEOUT_SECS
            }),
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };
        Self {
            backend: BackendConfig {
                url: get(ENV_BACKEND_URL),
                anon_key: get(ENV_ANON_KEY),
                timeout: Duration::from_secs(timeout_secs),
            },
            public_landing: get(ENV_PUBLIC_LANDING).unwrap_or_else(|| DEFAULT_LANDING.to_string()),
            authenticated_landing: get(ENV_AUTHENTICATED_LANDING).unwrap_or_else(|| DEFAULT_LANDING.to_string()),
            access_token: get(ENV_ACCESS_TOKEN),
        }
    }

    /// Backend URL and anon key, or a `Config` error naming the first missing variable.
    pub fn require_backend(&self) -> AppResult<(&str, &str)> {
        let Some(url) = self.backend.url.as_deref() else {
            return Err(AppError::config("missing_env", ENV_BACKEND_URL));
        };
        let Some(key) = self.backend.anon_key.as_deref() else {
            return Err(AppError::config("missing_env", ENV_ANON_KEY));
        };
        Ok((url, key))
    }
}
