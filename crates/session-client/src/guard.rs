//! Route guard
//!
//! Decides where a navigation should land given the session state:
//! protected routes bounce to login when signed out, the login and register
//! screens bounce to the home route when signed in, and `/` always lands on
//! home.

use crate::config::SessionRoutes;

const REGISTER_ROUTE: &str = "/register";

/// Outcome of guarding one navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(String),
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    routes: SessionRoutes,
}

impl RouteGuard {
    pub fn new(routes: SessionRoutes) -> Self {
        Self { routes }
    }

    /// Whether `route` needs a signed-in session.
    pub fn requires_auth(&self, route: &str) -> bool {
        let path = route_path(route);
        let home = route_path(&self.routes.home_route);
        path == home || path.starts_with(&format!("{home}/"))
    }

    pub fn check(&self, route: &str, authenticated: bool) -> RouteDecision {
        let path = route_path(route);
        if path == "/" {
            return RouteDecision::Redirect(self.routes.home_route.clone());
        }
        if self.requires_auth(route) && !authenticated {
            return RouteDecision::Redirect(self.routes.login_route.clone());
        }
        let is_entry = path == route_path(&self.routes.login_route) || path == REGISTER_ROUTE;
        if is_entry && authenticated {
            return RouteDecision::Redirect(self.routes.home_route.clone());
        }
        RouteDecision::Allow
    }
}

/// Route without query string or trailing slash.
fn route_path(route: &str) -> &str {
    let path = route.split(['?', '#']).next().unwrap_or_default();
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}
