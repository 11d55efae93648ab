//! Unified application error model.
//! Every failure inside session and identity resolution is expressed as an `AppError`
//! so the gates can convert it into a redirect instead of surfacing it to the view layer.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    SessionUnavailable { code: String, message: String },
    ProfileNotFound { code: String, message: String },
    BackendUnavailable { code: String, message: String },
    PolicyDenied { code: String, message: String },
    Config { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::SessionUnavailable { code, .. }
            | AppError::ProfileNotFound { code, .. }
            | AppError::BackendUnavailable { code, .. }
            | AppError::PolicyDenied { code, .. }
            | AppError::Config { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::SessionUnavailable { message, .. }
            | AppError::ProfileNotFound { message, .. }
            | AppError::BackendUnavailable { message, .. }
            | AppError::PolicyDenied { message, .. }
            | AppError::Config { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn session_unavailable<S: Into<String>>(code: S, msg: S) -> Self { AppError::SessionUnavailable { code: code.into(), message: msg.into() } }
    pub fn profile_not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::ProfileNotFound { code: code.into(), message: msg.into() } }
    pub fn backend_unavailable<S: Into<String>>(code: S, msg: S) -> Self { AppError::BackendUnavailable { code: code.into(), message: msg.into() } }
    pub fn policy_denied<S: Into<String>>(code: S, msg: S) -> Self { AppError::PolicyDenied { code: code.into(), message: msg.into() } }
    pub fn config<S: Into<String>>(code: S, msg: S) -> Self { AppError::Config { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Errors that the gates absorb by redirecting to the public landing view.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            AppError::SessionUnavailable { .. }
                | AppError::ProfileNotFound { .. }
                | AppError::BackendUnavailable { .. }
                | AppError::PolicyDenied { .. }
        )
    }

    /// Transport-level failures; re-navigating is the retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::BackendUnavailable { .. } | AppError::SessionUnavailable { .. })
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        // Timeouts, connection resets and body decode failures all look the same to the gate
        AppError::BackendUnavailable { code: "transport_error".into(), message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
