//! Route gating for console views.
//!
//! `guard` is a pure function of the session's authenticated state: protected
//! views render only for a live session, everything else is sent to the login
//! view with a history replace so "back" does not return to the blocked view.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::SessionManager;

/// Console views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Login,
    Dashboard,
    News,
    Publications,
    Team,
    Opportunities,
    Users,
    Settings,
}

impl Route {
    pub const ALL: [Route; 8] = [
        Route::Login,
        Route::Dashboard,
        Route::News,
        Route::Publications,
        Route::Team,
        Route::Opportunities,
        Route::Users,
        Route::Settings,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Dashboard => "/",
            Route::News => "/news",
            Route::Publications => "/publications",
            Route::Team => "/team",
            Route::Opportunities => "/opportunities",
            Route::Users => "/users",
            Route::Settings => "/settings",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Login => "Sign in",
            Route::Dashboard => "Dashboard",
            Route::News => "News & Events",
            Route::Publications => "Publications",
            Route::Team => "Team",
            Route::Opportunities => "Opportunities",
            Route::Users => "Users",
            Route::Settings => "Settings",
        }
    }

    /// Views reachable without a session
    pub fn is_public(&self) -> bool {
        matches!(self, Route::Login)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown route: {0}")]
pub struct UnknownRoute(pub String);

impl FromStr for Route {
    type Err = UnknownRoute;

    /// Accepts either a path (`/news`) or a bare name (`news`, `dashboard`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let name = trimmed.trim_start_matches('/').trim_end_matches('/');
        let route = match name.to_lowercase().as_str() {
            "" | "dashboard" => Route::Dashboard,
            "login" => Route::Login,
            "news" => Route::News,
            "publications" => Route::Publications,
            "team" => Route::Team,
            "opportunities" => Route::Opportunities,
            "users" => Route::Users,
            "settings" => Route::Settings,
            _ => return Err(UnknownRoute(trimmed.to_string())),
        };
        Ok(route)
    }
}

/// Outcome of a navigation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Render(Route),
    Redirect { to: Route, replace: bool },
}

pub fn guard(authenticated: bool, requested: Route) -> GuardDecision {
    if authenticated || requested.is_public() {
        GuardDecision::Render(requested)
    } else {
        GuardDecision::Redirect {
            to: Route::Login,
            replace: true,
        }
    }
}

/// Gate `requested` against the live session state.
pub fn guard_session(session: &SessionManager, requested: Route) -> GuardDecision {
    guard(session.is_authenticated(), requested)
}
