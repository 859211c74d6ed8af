//! Token pair value object and expiry introspection

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// An immutable access/refresh token pair.
///
/// Constructed from successful login/refresh responses and superseded, never
/// mutated, when a refresh issues a new pair.
///
/// Expiry is read from the *unverified* JWT payload's `exp` claim. This is a
/// client-side UX decision (when to proactively refresh), not a security
/// boundary: the server remains the authority on token validity, and these
/// checks must never back an authorization decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    access: String,
    refresh: String,
}

impl AuthTokens {
    /// Create a new token pair.
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }

    /// The access token.
    pub fn access(&self) -> &str {
        &self.access
    }

    /// The refresh token.
    pub fn refresh(&self) -> &str {
        &self.refresh
    }

    /// Whether the access token's `exp` claim is in the past.
    ///
    /// A token that is not a well-formed three-part JWT with a numeric `exp`
    /// is treated as expired.
    pub fn is_access_expired(&self) -> bool {
        token_expired(&self.access)
    }

    /// Whether the refresh token's `exp` claim is in the past.
    pub fn is_refresh_expired(&self) -> bool {
        token_expired(&self.refresh)
    }

    /// Access token expired but the refresh token is still usable.
    pub fn needs_refresh(&self) -> bool {
        self.is_access_expired() && !self.is_refresh_expired()
    }

    /// Neither token has expired.
    pub fn is_valid(&self) -> bool {
        !self.is_access_expired() && !self.is_refresh_expired()
    }

    /// When the access token expires, if its `exp` claim is decodable.
    pub fn access_expires_at(&self) -> Option<DateTime<Utc>> {
        decode_exp(&self.access).and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }
}

/// Decode the `exp` claim (seconds since epoch) from an unverified JWT.
fn decode_exp(token: &str) -> Option<i64> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&payload).ok()?;
    claims.get("exp")?.as_i64()
}

fn token_expired(token: &str) -> bool {
    match decode_exp(token) {
        Some(exp) => exp <= Utc::now().timestamp(),
        None => true,
    }
}
