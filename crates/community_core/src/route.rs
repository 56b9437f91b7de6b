//! Route guard: maps auth state and a path to what the front end shows.
//!
//! # Invariants
//! - Decisions are derived purely from `GuardState` and the path.
//! - While loading, no protected or public content renders.
//! - Unknown paths always redirect to the feed root.

use crate::auth::AuthState;

pub const ROOT_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const SIGNUP_PATH: &str = "/signup";

/// Longest redirect chain `settle` follows; real chains have at most two hops.
const MAX_REDIRECTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Protected root.
    Feed,
    Login,
    Signup,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Self::Feed => ROOT_PATH,
            Self::Login => LOGIN_PATH,
            Self::Signup => SIGNUP_PATH,
        }
    }

    /// Public-only routes redirect away once signed in.
    pub fn is_public_only(self) -> bool {
        matches!(self, Self::Login | Self::Signup)
    }

    /// Parses a path; `#/login`, `login` and `/login/` all name the login route.
    pub fn parse(path: &str) -> Option<Self> {
        let trimmed = path.trim();
        let without_hash = trimmed.strip_prefix('#').unwrap_or(trimmed);
        let normalized = without_hash.trim_matches('/');
        match normalized {
            "" => Some(Self::Feed),
            "login" => Some(Self::Login),
            "signup" => Some(Self::Signup),
            _ => None,
        }
    }
}

/// Guard states derived from `AuthState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Authenticated,
    Unauthenticated,
}

impl From<&AuthState> for GuardState {
    fn from(state: &AuthState) -> Self {
        if state.loading {
            Self::Loading
        } else if state.current_session.is_some() {
            Self::Authenticated
        } else {
            Self::Unauthenticated
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Neutral placeholder while the session is unknown.
    Placeholder,
    Render(Route),
    Redirect(Route),
}

/// Decides one navigation step.
pub fn resolve(state: GuardState, path: &str) -> RouteDecision {
    let Some(route) = Route::parse(path) else {
        return RouteDecision::Redirect(Route::Feed);
    };

    match (state, route) {
        (GuardState::Loading, _) => RouteDecision::Placeholder,
        (GuardState::Authenticated, route) if route.is_public_only() => {
            RouteDecision::Redirect(Route::Feed)
        }
        (GuardState::Unauthenticated, Route::Feed) => RouteDecision::Redirect(Route::Login),
        (_, route) => RouteDecision::Render(route),
    }
}

/// Follows redirects until the decision renders or shows the placeholder.
pub fn settle(state: GuardState, path: &str) -> RouteDecision {
    let mut decision = resolve(state, path);
    for _ in 0..MAX_REDIRECTS {
        match decision {
            RouteDecision::Redirect(target) => decision = resolve(state, target.path()),
            terminal => return terminal,
        }
    }
    decision
}
