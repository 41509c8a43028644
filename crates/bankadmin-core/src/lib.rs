//! Core library for the bank CMS admin console.
//!
//! Owns everything the console screens share: the login session and its
//! expiry handling, the authenticated REST client, and route gating. The
//! CRUD screens themselves are thin views over `ApiClient`.

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::{LoginFlow, SessionManager, SessionState};
pub use config::Config;
pub use guard::{guard, GuardDecision, Route};
