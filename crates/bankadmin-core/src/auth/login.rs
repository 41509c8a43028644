//! Credential exchange: username/password in, session token out.

use thiserror::Error;
use tracing::{error, info};

use crate::api::{ApiClient, ApiError};
use crate::models::UserSummary;

use super::claims::Claims;
use super::notice::Notice;
use super::session::{SessionError, SessionManager};

/// Maximum length for username input.
const MAX_USERNAME_LENGTH: usize = 100;

/// Maximum length for password input.
const MAX_PASSWORD_LENGTH: usize = 128;

#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Username and password required")]
    MissingCredentials,

    #[error("Username or password contains invalid characters or is too long")]
    MalformedCredentials,

    #[error("{0}")]
    Backend(#[from] ApiError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl LoginError {
    /// Message shown on the login form
    pub fn user_message(&self) -> String {
        match self {
            LoginError::MissingCredentials | LoginError::MalformedCredentials => self.to_string(),
            LoginError::Backend(ApiError::Unauthorized(_)) => {
                "Invalid username or password".to_string()
            }
            LoginError::Backend(e) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            LoginError::Backend(e) if e.is_network() => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            LoginError::Backend(e) => e.to_string(),
            LoginError::Session(e) => e.to_string(),
        }
    }
}

pub struct LoginFlow {
    api: ApiClient,
    session: SessionManager,
}

impl LoginFlow {
    pub fn new(api: ApiClient, session: SessionManager) -> Self {
        Self { api, session }
    }

    /// Authenticate against the backend and hand the issued token to the session.
    ///
    /// Backend and transport failures surface a `LoginFailed` notice and leave
    /// the session untouched. Token problems are reported by the session itself.
    pub async fn login(&self, username: &str, password: &str) -> Result<Claims, LoginError> {
        let username = username.trim();
        if let Err(err) = validate_credentials(username, password) {
            self.session.notify(Notice::LoginFailed(err.user_message()));
            return Err(err);
        }

        let response = match self.api.login(username, password).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Login failed");
                let err = LoginError::Backend(e);
                self.session.notify(Notice::LoginFailed(err.user_message()));
                return Err(err);
            }
        };

        let claims = self.session.login(response.token)?;
        if let Some(user) = response.user {
            info!(user = %user.username, role = user.role_display(), "Signed in");
        }
        Ok(claims)
    }

    /// Opportunistic re-validation of the held token.
    ///
    /// A rejected token is logged out by the client's expiry signal before this returns.
    pub async fn verify(&self) -> Result<UserSummary, ApiError> {
        self.api.verify().await
    }
}

fn validate_credentials(username: &str, password: &str) -> Result<(), LoginError> {
    if username.is_empty() || password.is_empty() {
        return Err(LoginError::MissingCredentials);
    }
    let well_formed = |value: &str, max: usize| {
        value.chars().count() <= max && !value.chars().any(char::is_control)
    };
    if !well_formed(username, MAX_USERNAME_LENGTH) || !well_formed(password, MAX_PASSWORD_LENGTH) {
        return Err(LoginError::MalformedCredentials);
    }
    Ok(())
}
