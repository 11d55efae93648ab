//! Navigation history and the dashboard's route table.

mod table;

pub use table::{normalize_path, Route, RouteKind, RouteMatch, RouteTable};

use parking_lot::Mutex;

/// History the gates drive. `redirect(.., true)` replaces the current entry so a denied view
/// is not reachable with "back".
pub trait Router: Send + Sync {
    fn navigate_to(&self, path: &str);
    fn redirect(&self, path: &str, replace: bool);
    fn current_path(&self) -> String;
}

/// In-process history stack.
pub struct MemoryRouter {
    history: Mutex<Vec<String>>,
}

impl MemoryRouter {
    pub fn new(initial: &str) -> Self {
        Self { history: Mutex::new(vec![normalize_path(initial)]) }
    }

    pub fn history(&self) -> Vec<String> { self.history.lock().clone() }
}

impl Default for MemoryRouter {
    fn default() -> Self { Self::new("/") }
}

impl Router for MemoryRouter {
    fn navigate_to(&self, path: &str) {
        self.history.lock().push(normalize_path(path));
    }

    fn redirect(&self, path: &str, replace: bool) {
        let mut h = self.history.lock();
        if replace { h.pop(); }
        h.push(normalize_path(path));
    }

    fn current_path(&self) -> String {
        self.history.lock().last().cloned().unwrap_or_else(|| "/".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_replace() {
        let r = MemoryRouter::default();
        r.navigate_to("/instructor-dashboard");
        r.redirect("/welcome", true);
        assert_eq!(r.history(), vec!["/", "/welcome"]);
        r.redirect("/auth/", false);
        assert_eq!(r.current_path(), "/auth");
        assert_eq!(r.history().len(), 3);
    }
}
