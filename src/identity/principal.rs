use std::collections::BTreeSet;

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::authorizer::Role;

/// Profile attributes from the `users` row. Every column is optional; unknown columns are ignored.
/// Columns are read leniently: numbers may arrive as numeric text and text may arrive as numbers.
/// A value that fits neither reads as `None`, so a badly typed display column never blocks
/// identity resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    #[serde(default, deserialize_with = "lenient_text")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub belt_rank: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub stripes: Option<u32>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub gym_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub gym_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub years_training: Option<f64>,
    /// Sign-up form's name for the same figure; older rows only carry this one.
    #[serde(default, deserialize_with = "lenient_number")]
    pub time_training: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub avatar_url: Option<String>,
}

fn lenient_text<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_number<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + DeserializeOwned,
{
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s.trim().parse().ok(),
        v @ Value::Number(_) => serde_json::from_value(v).ok(),
        _ => None,
    })
}

/// A resolved user: stable id, profile and role assignments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub user_id: String,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub roles: BTreeSet<Role>,
}

impl Identity {
    pub fn new<S: Into<String>>(user_id: S) -> Self {
        Self { user_id: user_id.into(), ..Default::default() }
    }

    pub fn with_roles<I>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = Role>,
    {
        self.roles.extend(roles);
        self
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn has_role(&self, role: &Role) -> bool { role.is_known() && self.roles.contains(role) }

    pub fn years_training(&self) -> Option<f64> { self.profile.years_training.or(self.profile.time_training) }

    pub fn display_name(&self) -> String {
        match (&self.profile.first_name, &self.profile.last_name) {
            (Some(f), Some(l)) => format!("{} {}", f, l),
            (Some(f), None) => f.clone(),
            (None, Some(l)) => l.clone(),
            (None, None) => self.profile.email.clone().unwrap_or_else(|| self.user_id.clone()),
        }
    }
}
