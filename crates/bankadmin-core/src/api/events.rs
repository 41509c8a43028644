//! Seams between the HTTP client and the session that owns the token.

use crate::utils::contains_ignore_case;

/// Keywords in a 401/403 error message that mean the session itself is dead,
/// as opposed to the user lacking access to one resource.
const EXPIRY_KEYWORDS: [&str; 3] = ["expired", "invalid", "token"];

/// Supplies the bearer token for outgoing requests.
pub trait TokenSource: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Receives the backend's verdict that the current token is no longer accepted.
pub trait SessionEventSink: Send + Sync {
    fn session_expired(&self);
}

pub fn signals_session_expiry(message: &str) -> bool {
    EXPIRY_KEYWORDS
        .iter()
        .any(|keyword| contains_ignore_case(message, keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signals_session_expiry() {
        assert!(signals_session_expiry("Token expired"));
        assert!(signals_session_expiry("jwt EXPIRED"));
        assert!(signals_session_expiry("Invalid signature"));
        assert!(signals_session_expiry("No token provided"));

        assert!(!signals_session_expiry("insufficient permissions"));
        assert!(!signals_session_expiry("Forbidden"));
        assert!(!signals_session_expiry(""));
    }
}
