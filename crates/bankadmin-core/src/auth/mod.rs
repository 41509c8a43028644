//! Authentication module for the console session.
//!
//! This module provides:
//! - `SessionManager`: token ownership, claims, expiry watch and logout
//! - `Claims`: the decoded token payload
//! - `TokenStore`: durable storage for the single token slot (file, keyring, memory)
//! - `LoginFlow`: credential exchange against the backend
//!
//! The session is the only writer of the token slot; other components ask it
//! for the bearer token or report expiry to it.

pub mod claims;
pub mod login;
pub mod notice;
pub mod session;
pub mod storage;

pub use claims::{Claims, ClaimsError};
pub use login::{LoginError, LoginFlow};
pub use notice::{EndReason, Notice, SessionObserver};
pub use session::{Clock, SessionConfig, SessionError, SessionManager, SessionState};
pub use storage::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
