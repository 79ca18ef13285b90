//! Access token introspection.
//!
//! Access tokens are HS256 JWTs signed by the backend. The client never holds
//! the signing key, so it only decodes the payload to read the expiry; the
//! signature is the server's concern.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Error type for token decoding.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token does not have the `header.payload.signature` shape.
    #[error("malformed token: expected three dot-separated segments")]
    Malformed,

    /// The payload segment is not valid base64url.
    #[error("invalid token payload encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// The payload is not the expected JSON object.
    #[error("invalid token claims: {0}")]
    Claims(#[from] serde_json::Error),

    /// The `exp` claim is outside the representable range.
    #[error("token expiry out of range: {0}")]
    ExpiryOutOfRange(i64),
}

/// The subset of access token claims the client reads.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenClaims {
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,

    /// Subject: the backend user id, as a string.
    #[serde(default)]
    pub sub: Option<String>,
}

impl AccessTokenClaims {
    /// Decode the claims of a JWT without verifying its signature.
    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let mut parts = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        // Some encoders keep the padding; base64url-no-pad rejects it.
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// The expiry as a timestamp.
    pub fn expires_at(&self) -> Result<DateTime<Utc>, TokenError> {
        DateTime::from_timestamp(self.exp, 0).ok_or(TokenError::ExpiryOutOfRange(self.exp))
    }

    /// Whether the expiry is strictly after `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map(|exp| exp > now).unwrap_or(false)
    }
}

/// Whether `token` carries an expiry strictly in the future.
///
/// Fails closed: anything that cannot be decoded is treated as expired.
pub fn is_token_live(token: &str) -> bool {
    is_token_live_at(token, Utc::now())
}

/// [`is_token_live`] against an explicit clock.
pub fn is_token_live_at(token: &str, now: DateTime<Utc>) -> bool {
    match AccessTokenClaims::decode(token) {
        Ok(claims) => claims.is_valid_at(now),
        Err(e) => {
            tracing::debug!("Treating undecodable access token as expired: {}", e);
            false
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build an unsigned JWT-shaped token with the given claims.
    pub(crate) fn token_with_claims(claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{}.{}.signature", header, payload)
    }

    pub(crate) fn token_expiring_in(delta: chrono::Duration) -> String {
        let exp = (Utc::now() + delta).timestamp();
        token_with_claims(serde_json::json!({ "exp": exp, "sub": "1" }))
    }

    #[test]
    fn test_future_expiry_is_live() {
        assert!(is_token_live(&token_expiring_in(chrono::Duration::hours(1))));
    }

    #[test]
    fn test_past_expiry_is_not_live() {
        assert!(!is_token_live(&token_expiring_in(-chrono::Duration::minutes(1))));
    }

    #[test]
    fn test_expiry_equal_to_now_is_not_live() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let token = token_with_claims(serde_json::json!({ "exp": 1_700_000_000 }));
        assert!(!is_token_live_at(&token, now));
    }

    #[test]
    fn test_malformed_tokens_fail_closed() {
        assert!(!is_token_live(""));
        assert!(!is_token_live("not-a-jwt"));
        assert!(!is_token_live("a.b"));
        assert!(!is_token_live("a.!!!.c"));
        assert!(!is_token_live("a.b.c.d"));

        let no_exp = token_with_claims(serde_json::json!({ "sub": "1" }));
        assert!(!is_token_live(&no_exp));

        let huge_exp = token_with_claims(serde_json::json!({ "exp": i64::MAX }));
        assert!(!is_token_live(&huge_exp));
    }

    #[test]
    fn test_decode_reads_subject() {
        let token = token_with_claims(serde_json::json!({ "exp": 10, "sub": "42" }));
        let claims = AccessTokenClaims::decode(&token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("42"));
        assert_eq!(claims.exp, 10);
    }

    #[test]
    fn test_decode_accepts_padded_payload() {
        let header = URL_SAFE_NO_PAD.encode(b"{}");
        let payload = base64::engine::general_purpose::URL_SAFE.encode(br#"{"exp":10}"#);
        let token = format!("{}.{}.sig", header, payload);
        assert!(payload.ends_with('='));
        assert_eq!(AccessTokenClaims::decode(&token).unwrap().exp, 10);
    }
}
