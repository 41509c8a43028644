use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::{SessionEventSink, TokenSource};
use crate::guard::Route;

use super::claims::{Claims, ClaimsError};
use super::notice::{EndReason, Notice, SessionObserver};
use super::storage::TokenStore;

/// How often the stored token is re-checked while logged in
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;

/// Source of "now". Swappable so expiry can be tested without waiting.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid session token: {0}")]
    InvalidToken(#[from] ClaimsError),

    #[error("session token already expired at {expired_at}")]
    AlreadyExpired { expired_at: DateTime<Utc> },

    #[error("failed to persist session token: {0:#}")]
    Storage(anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggedIn,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub check_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
        }
    }
}

/// In-memory half of the session. The durable half lives in the `TokenStore`.
#[derive(Default)]
struct SessionData {
    token: Option<String>,
    claims: Option<Claims>,
    watch: Option<JoinHandle<()>>,
}

struct Inner {
    data: Mutex<SessionData>,
    store: Box<dyn TokenStore>,
    observer: Arc<dyn SessionObserver>,
    clock: Clock,
    config: SessionConfig,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let data = self.data.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(watch) = data.watch.take() {
            watch.abort();
        }
    }
}

/// Single source of truth for "is the user logged in".
///
/// Clone is cheap and every clone sees the same session. The background
/// expiry watch holds only a weak reference, so dropping the last clone
/// cancels it.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        store: Box<dyn TokenStore>,
        observer: Arc<dyn SessionObserver>,
        config: SessionConfig,
    ) -> Self {
        Self::with_clock(store, observer, config, Arc::new(Utc::now))
    }

    pub fn with_clock(
        store: Box<dyn TokenStore>,
        observer: Arc<dyn SessionObserver>,
        config: SessionConfig,
        clock: Clock,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                data: Mutex::new(SessionData::default()),
                store,
                observer,
                clock,
                config,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionData> {
        self.inner.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> DateTime<Utc> {
        (self.inner.clock)()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Adopt a token left in storage by a previous run.
    ///
    /// A stored token that is malformed or expired is purged. No notices are
    /// emitted; the shell simply starts on the login view.
    pub fn restore(&self) -> SessionState {
        let token = match self.inner.store.load() {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("No stored session token");
                return SessionState::LoggedOut;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored session token");
                return SessionState::LoggedOut;
            }
        };

        match Claims::decode(&token) {
            Ok(claims) if !claims.is_expired_at(self.now()) => {
                info!(user = %claims.display_name(), "Restored session");
                {
                    let mut data = self.lock();
                    data.token = Some(token);
                    data.claims = Some(claims);
                }
                self.start_expiry_watch();
                SessionState::LoggedIn
            }
            Ok(_) => {
                info!("Stored session token has expired, discarding");
                self.purge_store();
                SessionState::LoggedOut
            }
            Err(e) => {
                warn!(error = %e, "Stored session token is malformed, discarding");
                self.purge_store();
                SessionState::LoggedOut
            }
        }
    }

    /// Start a session with a freshly issued token, replacing any current one.
    ///
    /// Malformed or already-expired tokens are rejected and the session is
    /// left exactly as it was.
    pub fn login(&self, token: impl Into<String>) -> Result<Claims, SessionError> {
        let token = token.into();

        let claims = match Claims::decode(&token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "Rejected malformed session token");
                self.inner.observer.notify(Notice::InvalidToken);
                return Err(e.into());
            }
        };

        if claims.is_expired_at(self.now()) {
            let expired_at = claims.expires_at().unwrap_or(DateTime::UNIX_EPOCH);
            warn!(%expired_at, "Rejected session token that is already expired");
            self.inner.observer.notify(Notice::AlreadyExpired);
            return Err(SessionError::AlreadyExpired { expired_at });
        }

        self.inner.store.save(&token).map_err(SessionError::Storage)?;

        {
            let mut data = self.lock();
            data.token = Some(token);
            data.claims = Some(claims.clone());
        }
        self.start_expiry_watch();

        let user = claims.display_name();
        info!(user = %user, expires_at = ?claims.expires_at(), "Logged in");
        self.inner.observer.notify(Notice::LoginSucceeded { user });
        Ok(claims)
    }

    /// End the session. Safe to call when already logged out.
    ///
    /// With `notify`, the user is told and sent to the login view.
    pub fn logout(&self, notify: bool) {
        if self.clear() {
            info!("Logged out");
        }
        if notify {
            self.announce_end(EndReason::LoggedOut);
        }
    }

    /// Force a logout if the current token has expired.
    ///
    /// Returns true when a logout was triggered.
    pub fn check_expiration(&self) -> bool {
        let now = self.now();
        let expired = {
            let data = self.lock();
            match (&data.token, &data.claims) {
                (None, _) => false,
                (Some(_), Some(claims)) => claims.is_expired_at(now),
                (Some(_), None) => true,
            }
        };

        if expired {
            self.expire();
        }
        expired
    }

    /// `token present AND not expired`, evaluated at call time
    pub fn is_authenticated(&self) -> bool {
        let now = self.now();
        let data = self.lock();
        match (&data.token, &data.claims) {
            (Some(_), Some(claims)) => !claims.is_expired_at(now),
            _ => false,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.is_authenticated() {
            SessionState::LoggedIn
        } else {
            SessionState::LoggedOut
        }
    }

    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    pub fn claims(&self) -> Option<Claims> {
        self.lock().claims.clone()
    }

    /// Token as currently held in durable storage
    pub fn stored_token(&self) -> Result<Option<String>> {
        self.inner.store.load()
    }

    // =========================================================================
    // Expiry watch
    // =========================================================================

    /// (Re)start the periodic expiry check. Replaces any running watch.
    ///
    /// Requires a Tokio runtime; without one the watch is skipped and expiry
    /// is still caught by `check_expiration` and the HTTP client.
    pub fn start_expiry_watch(&self) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime available, background expiry check disabled");
                return;
            }
        };

        let period = self.inner.config.check_interval;
        let session: Weak<Inner> = Arc::downgrade(&self.inner);

        let watch = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = session.upgrade() else {
                    break;
                };
                if (SessionManager { inner }).recheck_stored_token() {
                    break;
                }
            }
        });

        let previous = self.lock().watch.replace(watch);
        if let Some(previous) = previous {
            previous.abort();
        }
        debug!(interval_secs = period.as_secs(), "Expiry watch started");
    }

    pub fn stop_expiry_watch(&self) {
        let watch = self.lock().watch.take();
        if let Some(watch) = watch {
            watch.abort();
            debug!("Expiry watch stopped");
        }
    }

    pub fn is_watching(&self) -> bool {
        self.lock()
            .watch
            .as_ref()
            .is_some_and(|watch| !watch.is_finished())
    }

    #[cfg(test)]
    fn watch_handle(&self) -> Option<tokio::task::AbortHandle> {
        self.lock().watch.as_ref().map(JoinHandle::abort_handle)
    }

    /// Periodic check against durable storage. Returns true once the session is over.
    fn recheck_stored_token(&self) -> bool {
        match self.inner.store.load() {
            Ok(Some(token)) => match Claims::decode(&token) {
                Ok(claims) if !claims.is_expired_at(self.now()) => false,
                Ok(_) => {
                    debug!("Stored session token reached its expiry");
                    self.expire();
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Stored session token is malformed");
                    self.expire();
                    true
                }
            },
            Ok(None) => {
                debug!("Stored session token disappeared");
                self.expire();
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored session token, checking in-memory token");
                self.check_expiration()
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Forced logout. Only the first trigger announces; later ones are no-ops.
    fn expire(&self) {
        if self.clear() {
            info!("Session expired, logged out");
            self.announce_end(EndReason::Expired);
        }
    }

    /// Drop token, claims, watch and the stored copy. Returns whether a token was held.
    fn clear(&self) -> bool {
        let (had_token, watch) = {
            let mut data = self.lock();
            let had_token = data.token.take().is_some();
            data.claims = None;
            (had_token, data.watch.take())
        };
        if let Some(watch) = watch {
            watch.abort();
        }
        self.purge_store();
        had_token
    }

    fn purge_store(&self) {
        if let Err(e) = self.inner.store.clear() {
            warn!(error = %e, "Failed to clear stored session token");
        }
    }

    fn announce_end(&self, reason: EndReason) {
        let observer = &self.inner.observer;
        observer.notify(Notice::SessionEnded(reason));
        if !observer.navigate(Route::Login) {
            observer.redirect(Route::Login);
        }
    }

    pub(crate) fn notify(&self, notice: Notice) {
        self.inner.observer.notify(notice);
    }
}

impl TokenSource for SessionManager {
    fn bearer_token(&self) -> Option<String> {
        self.token()
    }
}

impl SessionEventSink for SessionManager {
    fn session_expired(&self) {
        self.expire();
    }
}

// ============================================================================
// Tests
// ============================================================================
