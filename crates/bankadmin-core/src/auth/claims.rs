//! Read-only view of a session token's payload.
//!
//! Tokens are JWTs issued by the CMS backend. The console only reads the
//! payload to drive the UI (who is logged in, when the session ends); the
//! signature is never checked here, the backend does that on every request.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::UserId;

/// Number of dot-separated segments in a JWT
const TOKEN_SEGMENTS: usize = 3;

#[derive(Error, Debug)]
pub enum ClaimsError {
    #[error("token is not a JWT: expected 3 segments, found {0}")]
    Segments(usize),

    #[error("token payload is not valid base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("token payload is not a JSON claims object: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Token payload as the console reads it.
///
/// Identity fields are display-only, so a claim of an unexpected type is
/// dropped rather than failing the whole token. `exp` is the exception: a
/// non-numeric expiry is a malformed token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Claims {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<UserId>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sub: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    /// Some issuers send a list of roles; those are joined with ", "
    #[serde(default, deserialize_with = "lenient_text")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub photo: Option<String>,
    /// Issued-at, unix seconds (NumericDate, may be fractional)
    #[serde(default, deserialize_with = "lenient")]
    pub iat: Option<f64>,
    /// Expiry, unix seconds (NumericDate, may be fractional).
    /// Absent means the token never expires client-side.
    #[serde(default)]
    pub exp: Option<f64>,
}

/// Deserialize `T` if the claim has that shape, otherwise treat it as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Text claim that tolerates numbers and lists of strings.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Array(items)) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    };
    Ok(text)
}

/// NumericDate to a UTC timestamp, keeping millisecond precision
fn numeric_date(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((secs * 1000.0).floor() as i64)
}

impl Claims {
    /// Decode the payload segment of a token without verifying its signature.
    pub fn decode(token: &str) -> Result<Self, ClaimsError> {
        let segments: Vec<&str> = token.trim().split('.').collect();
        if segments.len() != TOKEN_SEGMENTS {
            return Err(ClaimsError::Segments(segments.len()));
        }

        // Some issuers pad base64url; the no-pad engine rejects trailing '='
        let payload = URL_SAFE_NO_PAD.decode(segments[1].trim_end_matches('='))?;
        Ok(serde_json::from_slice(&payload)?)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(numeric_date)
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.and_then(numeric_date)
    }

    /// A token is expired once `now` reaches its `exp`. Tokens without `exp` never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.exp {
            Some(exp) => now.timestamp_millis() as f64 / 1000.0 >= exp,
            None => false,
        }
    }

    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at().map(|expiry| expiry - now)
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.time_until_expiry(now).map(|d| d.num_minutes().max(0))
    }

    /// Name shown in the console header
    pub fn display_name(&self) -> String {
        self.username
            .as_deref()
            .or(self.email.as_deref())
            .or(self.sub.as_deref())
            .map(str::to_string)
            .or_else(|| self.id.as_ref().map(|id| id.to_string()))
            .unwrap_or_else(|| "unknown user".to_string())
    }
}

#[cfg(test)]
pub(crate) fn encode_test_token(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.signature", header, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_full_claims() {
        let token = encode_test_token(&json!({
            "id": 7,
            "username": "treasury-admin",
            "email": "ops@bank.example",
            "role": "admin",
            "iat": 1_700_000_000,
            "exp": 1_700_003_600
        }));

        let claims = Claims::decode(&token).expect("valid token");
        assert_eq!(claims.id, Some(UserId::Number(7)));
        assert_eq!(claims.username.as_deref(), Some("treasury-admin"));
        assert_eq!(claims.role.as_deref(), Some("admin"));
        assert_eq!(claims.exp, Some(1_700_003_600.0));
        assert_eq!(
            claims.issued_at().map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
    }

    #[test]
    fn test_decode_padded_payload() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(r#"{"username":"a"}"#);
        assert!(payload.ends_with('='));
        let claims = Claims::decode(&format!("h.{}.s", payload)).expect("padded payload");
        assert_eq!(claims.username.as_deref(), Some("a"));
    }

    #[test]
    fn test_decode_rejects_malformed_tokens() {
        assert!(matches!(Claims::decode(""), Err(ClaimsError::Segments(1))));
        assert!(matches!(Claims::decode("a.b"), Err(ClaimsError::Segments(2))));
        assert!(matches!(
            Claims::decode("a.!!!.c"),
            Err(ClaimsError::Encoding(_))
        ));

        let not_json = URL_SAFE_NO_PAD.encode("not json");
        assert!(matches!(
            Claims::decode(&format!("a.{}.c", not_json)),
            Err(ClaimsError::Payload(_))
        ));

        let not_object = URL_SAFE_NO_PAD.encode("[1,2]");
        assert!(matches!(
            Claims::decode(&format!("a.{}.c", not_object)),
            Err(ClaimsError::Payload(_))
        ));
    }

    #[test]
    fn test_expiry() {
        let now = DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap();
        let live = Claims::decode(&encode_test_token(&json!({ "exp": now.timestamp() + 3600 })))
            .unwrap();
        assert!(!live.is_expired_at(now));
        assert_eq!(live.minutes_until_expiry(now), Some(60));

        let dead = Claims::decode(&encode_test_token(&json!({ "exp": now.timestamp() - 10 })))
            .unwrap();
        assert!(dead.is_expired_at(now));
        assert_eq!(dead.minutes_until_expiry(now), Some(0));

        // Expiry is reached at exactly `exp`
        let edge = Claims::decode(&encode_test_token(&json!({ "exp": now.timestamp() }))).unwrap();
        assert!(edge.is_expired_at(now));
    }

    #[test]
    fn test_fractional_expiry() {
        let now = DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap();
        let exp = now.timestamp() as f64 + 0.5;
        let claims = Claims::decode(&encode_test_token(&json!({ "exp": exp }))).unwrap();

        assert_eq!(claims.exp, Some(exp));
        assert!(!claims.is_expired_at(now));
        assert!(claims.is_expired_at(now + Duration::milliseconds(500)));
        assert_eq!(
            claims.expires_at().map(|t| t.timestamp_millis()),
            Some(now.timestamp_millis() + 500)
        );
    }

    #[test]
    fn test_non_numeric_exp_is_malformed() {
        let token = encode_test_token(&json!({ "exp": "tomorrow" }));
        assert!(matches!(Claims::decode(&token), Err(ClaimsError::Payload(_))));
    }

    #[test]
    fn test_unexpected_identity_types_are_tolerated() {
        let claims = Claims::decode(&encode_test_token(&json!({
            "id": { "$oid": "65f0c1" },
            "username": "editor",
            "role": ["editor", "publisher"],
            "email": null,
            "photo": false,
            "iat": "yesterday",
            "exp": 4_102_444_800u64
        })))
        .unwrap();

        assert_eq!(claims.id, None);
        assert_eq!(claims.role.as_deref(), Some("editor, publisher"));
        assert_eq!(claims.email, None);
        assert_eq!(claims.photo, None);
        assert_eq!(claims.iat, None);
        assert_eq!(claims.display_name(), "editor");
        assert!(!claims.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_no_exp_never_expires() {
        let claims = Claims::decode(&encode_test_token(&json!({ "username": "legacy" }))).unwrap();
        assert!(!claims.is_expired_at(Utc::now() + Duration::days(3650)));
        assert_eq!(claims.expires_at(), None);
        assert_eq!(claims.minutes_until_expiry(Utc::now()), None);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let by_email = Claims::decode(&encode_test_token(&json!({ "email": "x@bank.example" })))
            .unwrap();
        assert_eq!(by_email.display_name(), "x@bank.example");

        let by_id = Claims::decode(&encode_test_token(&json!({ "id": "u-1" }))).unwrap();
        assert_eq!(by_id.display_name(), "u-1");

        let empty = Claims::decode(&encode_test_token(&json!({}))).unwrap();
        assert_eq!(empty.display_name(), "unknown user");
    }
}
