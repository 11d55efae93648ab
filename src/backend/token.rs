//! Unverified reads of access-token claims. The provider has already validated the token; we
//! only need `sub` and `exp` to shape the local session.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// `None` for anything that is not a three-part JWT with a JSON payload.
pub fn claims(token: &str) -> Option<Claims> {
    let mut parts = token.split('.');
    let (_, payload, _) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() { return None; }
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

pub fn expiry(token: &str) -> Option<DateTime<Utc>> {
    claims(token)?.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
}
