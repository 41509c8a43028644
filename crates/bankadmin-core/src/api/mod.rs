//! REST client for the bank CMS backend.
//!
//! This module provides the `ApiClient` used by every console screen. It
//! attaches the session's bearer token to each request and reports
//! server-asserted token expiry back to the session through a
//! `SessionEventSink` injected at startup.

pub mod client;
pub mod error;
pub mod events;

pub use client::ApiClient;
pub use error::ApiError;
pub use events::{signals_session_expiry, SessionEventSink, TokenSource};
