//! Role policy: typed roles and the pure view-access decision.
//! No I/O and no clock here; the same inputs always produce the same decision.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use super::principal::Identity;

/// Role names arrive from the backend as free-form strings. Names outside the known set are
/// kept as `Unknown` so they round-trip, but they never satisfy a requirement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Fighter,
    Annotator,
    Instructor,
    Student,
    GymOwner,
    Admin,
    Unknown(String),
}

impl Role {
    /// Case-insensitive; surrounding whitespace is ignored.
    pub fn parse(name: &str) -> Role {
        let norm = name.trim().to_ascii_lowercase();
        match norm.as_str() {
            "fighter" => Role::Fighter,
            "annotator" => Role::Annotator,
            "instructor" => Role::Instructor,
            "student" => Role::Student,
            "gym_owner" | "gym-owner" | "gymowner" => Role::GymOwner,
            "admin" => Role::Admin,
            _ => Role::Unknown(name.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Fighter => "fighter",
            Role::Annotator => "annotator",
            Role::Instructor => "instructor",
            Role::Student => "student",
            Role::GymOwner => "gym_owner",
            Role::Admin => "admin",
            Role::Unknown(s) => s.as_str(),
        }
    }

    pub fn is_known(&self) -> bool { !matches!(self, Role::Unknown(_)) }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl From<String> for Role {
    fn from(s: String) -> Self { Role::parse(&s) }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self { Role::parse(s) }
}

impl From<Role> for String {
    fn from(r: Role) -> Self { r.as_str().to_string() }
}

/// Access policy declared by a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "roles", rename_all = "snake_case")]
pub enum ViewRequirement {
    Public,
    /// Any valid session, regardless of roles.
    Authenticated,
    /// At least one of the roles. Empty means `Authenticated`.
    AnyRole(BTreeSet<Role>),
    /// Every one of the roles. Empty means `Authenticated`.
    AllRoles(BTreeSet<Role>),
}

impl ViewRequirement {
    pub fn any_of<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        ViewRequirement::AnyRole(roles.into_iter().map(Into::into).collect())
    }

    pub fn all_of<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        ViewRequirement::AllRoles(roles.into_iter().map(Into::into).collect())
    }

    pub fn requires_role(role: Role) -> Self { ViewRequirement::AnyRole(BTreeSet::from([role])) }

    pub fn is_public(&self) -> bool { matches!(self, ViewRequirement::Public) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allow: bool,
    pub reason: &'static str,
}

fn allow(reason: &'static str) -> Decision { Decision { allow: true, reason } }
fn deny(reason: &'static str) -> Decision { Decision { allow: false, reason } }

/// Evaluate a requirement for an optional identity, with a short reason for logs.
pub fn decide(identity: Option<&Identity>, requirement: &ViewRequirement) -> Decision {
    if requirement.is_public() { return allow("public"); }
    let Some(id) = identity else { return deny("anonymous"); };
    match requirement {
        ViewRequirement::Public => allow("public"),
        ViewRequirement::Authenticated => allow("authenticated"),
        ViewRequirement::AnyRole(req) if req.is_empty() => allow("authenticated"),
        ViewRequirement::AllRoles(req) if req.is_empty() => allow("authenticated"),
        ViewRequirement::AnyRole(req) => {
            if req.iter().any(|r| id.has_role(r)) { allow("role_match") } else { deny("role_missing") }
        }
        ViewRequirement::AllRoles(req) => {
            if req.iter().all(|r| id.has_role(r)) { allow("role_match") } else { deny("role_missing") }
        }
    }
}

pub fn is_allowed(identity: Option<&Identity>, requirement: &ViewRequirement) -> bool {
    decide(identity, requirement).allow
}

#[cfg(test)]
#[path = "authorizer_tests.rs"]
mod authorizer_tests;
