//! Command handlers over a restored console session.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bankadmin_core::auth::{LoginFlow, SessionManager, SessionState};
use bankadmin_core::guard::guard_session;
use bankadmin_core::{ApiClient, ApiError, Config, GuardDecision, Route};
use chrono::{Local, Utc};
use tracing::{debug, info, warn};

use crate::shell::ConsoleShell;

/// How often `watch` looks at the session state
const WATCH_POLL_SECS: u64 = 1;

/// How often `watch` re-validates the token with the backend
const WATCH_VERIFY_SECS: u64 = 300;

pub struct App {
    config: Config,
    session: SessionManager,
    flow: LoginFlow,
}

impl App {
    pub fn new(api_url: Option<String>) -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let store = config.token_store()?;
        let session = SessionManager::new(store, Arc::new(ConsoleShell), config.session_config());

        let base_url = api_url.unwrap_or_else(|| config.base_url());
        debug!(base_url = %base_url, "API base URL configured");

        // The session is both the token source and the expiry sink
        let api = ApiClient::new(
            base_url,
            config.request_timeout(),
            Arc::new(session.clone()),
            Arc::new(session.clone()),
        )
        .context("Failed to build HTTP client")?;

        let state = session.restore();
        debug!(?state, "Session restored");

        let flow = LoginFlow::new(api, session.clone());
        Ok(Self {
            config,
            session,
            flow,
        })
    }

    pub async fn login(&mut self, username: Option<String>) -> Result<()> {
        let username = match username.or_else(|| self.config.last_username.clone()) {
            Some(u) if !u.trim().is_empty() => u,
            _ => prompt_username()?,
        };
        let password = match std::env::var("BANKADMIN_PASSWORD") {
            Ok(p) if !p.is_empty() => p,
            _ => rpassword::prompt_password(format!("Password for {}: ", username))?,
        };

        // Failures were already shown to the user by the session shell
        if let Err(e) = self.flow.login(&username, &password).await {
            return Err(anyhow::anyhow!(e.user_message()));
        }

        self.config.last_username = Some(username);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
        Ok(())
    }

    pub fn logout(&self) {
        self.session.logout(true);
    }

    pub fn status(&self, json: bool) -> Result<()> {
        let claims = match (self.session.state(), self.session.claims()) {
            (SessionState::LoggedIn, Some(claims)) => claims,
            _ => {
                if json {
                    println!("{}", serde_json::json!({ "state": "logged_out" }));
                } else {
                    println!("Not logged in");
                }
                return Ok(());
            }
        };

        if json {
            let out = serde_json::json!({ "state": "logged_in", "claims": claims });
            println!("{}", serde_json::to_string_pretty(&out)?);
            return Ok(());
        }

        println!("Logged in as {}", claims.display_name());
        if let Some(role) = &claims.role {
            println!("  Role:    {}", role);
        }
        match claims.expires_at() {
            Some(expiry) => println!(
                "  Expires: {} ({} min left)",
                expiry.with_timezone(&Local).format("%b %d, %Y %H:%M"),
                claims.minutes_until_expiry(Utc::now()).unwrap_or(0)
            ),
            None => println!("  Expires: never"),
        }
        Ok(())
    }

    pub async fn verify(&self) -> Result<()> {
        if self.session.token().is_none() {
            println!("Not logged in");
            return Ok(());
        }
        match self.flow.verify().await {
            Ok(user) => {
                println!("Token accepted for {} ({})", user.username, user.role_display());
                Ok(())
            }
            // Already logged out and announced by the session
            Err(ApiError::SessionExpired(_)) => Ok(()),
            Err(e) => Err(e).context("Verification failed"),
        }
    }

    pub fn open(&self, route: Route) {
        match guard_session(&self.session, route) {
            GuardDecision::Render(route) => println!("Opening {} ({})", route.title(), route.path()),
            GuardDecision::Redirect { to, replace } => println!(
                "Sign-in required: redirecting to {}{}",
                to.path(),
                if replace { " (history replaced)" } else { "" }
            ),
        }
    }

    /// Block until the session ends (expiry watch or backend rejection) or Ctrl+C.
    pub async fn watch(&self) -> Result<()> {
        if !self.session.is_authenticated() {
            println!("Not logged in");
            return Ok(());
        }
        info!("Watching session");

        let mut poll = tokio::time::interval(Duration::from_secs(WATCH_POLL_SECS));
        let mut verify = tokio::time::interval(Duration::from_secs(WATCH_VERIFY_SECS));

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
                _ = poll.tick() => {
                    if self.session.token().is_none() {
                        break;
                    }
                }
                _ = verify.tick() => {
                    match self.flow.verify().await {
                        Ok(user) => debug!(user = %user.username, "Token re-validated"),
                        Err(ApiError::SessionExpired(_)) => break,
                        Err(e) => warn!(error = %e, "Token re-validation failed"),
                    }
                }
            }
        }
        Ok(())
    }

    pub fn shutdown(&self) {
        self.session.stop_expiry_watch();
    }
}

fn prompt_username() -> Result<String> {
    print!("Username: ");
    io::stdout().flush()?;

    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    Ok(username.trim().to_string())
}
