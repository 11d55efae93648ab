use std::fmt::{Display, Formatter};

use crate::identity::{Role, ViewRequirement};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteKind {
    /// Open to everyone.
    Public,
    /// Identity-acquisition views; signed-in users are sent onward.
    PublicOnly,
    Protected(ViewRequirement),
    /// Legacy path that forwards to another route.
    Alias(String),
}

impl Display for RouteKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteKind::Public => f.write_str("public"),
            RouteKind::PublicOnly => f.write_str("public-only"),
            RouteKind::Alias(to) => write!(f, "-> {}", to),
            RouteKind::Protected(ViewRequirement::Public) => f.write_str("public"),
            RouteKind::Protected(ViewRequirement::Authenticated) => f.write_str("authenticated"),
            RouteKind::Protected(ViewRequirement::AnyRole(r)) => {
                write!(f, "any of [{}]", r.iter().map(Role::as_str).collect::<Vec<_>>().join(", "))
            }
            RouteKind::Protected(ViewRequirement::AllRoles(r)) => {
                write!(f, "all of [{}]", r.iter().map(Role::as_str).collect::<Vec<_>>().join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    /// View name handed to the rendering layer; empty for aliases.
    pub view: String,
    pub kind: RouteKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMatch<'a> {
    Found(&'a Route),
    NotFound,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
    not_found_view: String,
}

/// Drop query and fragment, force a leading slash, drop a trailing one, lowercase.
pub fn normalize_path(path: &str) -> String {
    let end = path.find(|c: char| c == '?' || c == '#').unwrap_or(path.len());
    let p = path[..end].trim();
    let p = p.trim_end_matches('/');
    let mut out = String::with_capacity(p.len() + 1);
    if !p.starts_with('/') { out.push('/'); }
    out.push_str(p);
    out.to_ascii_lowercase()
}

impl RouteTable {
    pub fn new<S: Into<String>>(not_found_view: S) -> Self {
        Self { routes: Vec::new(), not_found_view: not_found_view.into() }
    }

    fn add(mut self, path: &str, view: &str, kind: RouteKind) -> Self {
        let path = normalize_path(path);
        // Later declarations win, as with a router's last-registered element
        self.routes.retain(|r| r.path != path);
        self.routes.push(Route { path, view: view.to_string(), kind });
        self
    }

    pub fn public(self, path: &str, view: &str) -> Self { self.add(path, view, RouteKind::Public) }

    pub fn public_only(self, path: &str, view: &str) -> Self { self.add(path, view, RouteKind::PublicOnly) }

    pub fn protected(self, path: &str, view: &str, requirement: ViewRequirement) -> Self {
        self.add(path, view, RouteKind::Protected(requirement))
    }

    pub fn alias(self, path: &str, target: &str) -> Self {
        let target = normalize_path(target);
        self.add(path, "", RouteKind::Alias(target))
    }

    /// The dashboard's routes: a root redirect, public landing and dashboards, the
    /// instructor-only dashboard, the public-only auth form and its legacy aliases.
    pub fn dashboard() -> Self {
        RouteTable::new("not_found")
            .alias("/", "/welcome")
            .public("/welcome", "welcome")
            .public("/account", "account")
            .public("/post-verification", "post_verification")
            .public("/fighter-dashboard", "fighter_dashboard")
            .public("/annotator-dashboard", "annotator_dashboard")
            .protected("/instructor-dashboard", "instructor_dashboard", ViewRequirement::requires_role(Role::Instructor))
            .public_only("/auth", "auth")
            .alias("/login", "/auth")
            .alias("/signup", "/auth")
    }

    pub fn lookup(&self, path: &str) -> RouteMatch<'_> {
        let p = normalize_path(path);
        match self.routes.iter().find(|r| r.path == p) {
            Some(r) => RouteMatch::Found(r),
            None => RouteMatch::NotFound,
        }
    }

    pub fn routes(&self) -> &[Route] { &self.routes }

    pub fn not_found_view(&self) -> &str { &self.not_found_view }
}
