//! User-facing side effects of the session: transient notices and navigation.

use std::fmt;

use crate::guard::Route;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The user asked to log out
    LoggedOut,
    /// Expiry was detected locally or asserted by the backend
    Expired,
}

/// Transient message surfaced to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    LoginSucceeded { user: String },
    LoginFailed(String),
    InvalidToken,
    AlreadyExpired,
    SessionEnded(EndReason),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::LoginSucceeded { user } => write!(f, "Welcome back, {}", user),
            Notice::LoginFailed(reason) => write!(f, "Login failed: {}", reason),
            Notice::InvalidToken => f.write_str("The server returned an invalid session token"),
            Notice::AlreadyExpired => f.write_str("The session token has already expired"),
            Notice::SessionEnded(EndReason::LoggedOut) => f.write_str("You have been logged out"),
            Notice::SessionEnded(EndReason::Expired) => {
                f.write_str("Your session has expired. Please log in again.")
            }
        }
    }
}

/// The shell hosting the session: shows notices and moves between views.
pub trait SessionObserver: Send + Sync {
    fn notify(&self, notice: Notice);

    /// In-app navigation. Returns false when the shell cannot navigate
    /// (e.g. no router mounted yet), in which case `redirect` is used.
    fn navigate(&self, route: Route) -> bool;

    /// Full reload onto `route`
    fn redirect(&self, route: Route);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_display() {
        assert_eq!(
            Notice::LoginSucceeded { user: "ana".to_string() }.to_string(),
            "Welcome back, ana"
        );
        assert_eq!(
            Notice::SessionEnded(EndReason::Expired).to_string(),
            "Your session has expired. Please log in again."
        );
        assert!(Notice::AlreadyExpired.to_string().contains("already expired"));
    }
}
