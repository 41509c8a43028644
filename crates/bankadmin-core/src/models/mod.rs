//! Data models exchanged with the CMS backend.
//!
//! Only the authentication surface is modelled here:
//!
//! - `UserSummary`: the user block returned by login and verify
//! - `LoginRequest`, `LoginResponse`, `VerifyResponse`: auth endpoint payloads
//! - `ErrorBody`: the JSON error envelope carried by non-2xx responses

pub mod user;

pub use user::{ErrorBody, LoginRequest, LoginResponse, UserId, UserSummary, VerifyResponse};
