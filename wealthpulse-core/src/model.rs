//! Domain model types shared by the gateway client.
//!
//! This module defines:
//! - [`keys`] - The fixed storage keys for persisted client state
//! - [`CredentialRecord`] - The access/refresh token pair
//! - [`TokenPair`] - The body returned by the login and refresh endpoints
//! - [`RefreshRequest`] - The body sent to the refresh endpoint
//! - [`UserProfile`] - The authenticated principal as reported by the backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::store::Secret;

/// Fixed storage keys.
///
/// Presence or absence of a key is the only signal of state: there are no
/// extra "logged in" or "impersonating" flags.
pub mod keys {
    /// Current access token.
    pub const ACCESS_TOKEN: &str = "wealthpulse/access_token";

    /// Current refresh token.
    pub const REFRESH_TOKEN: &str = "wealthpulse/refresh_token";

    /// Numeric id of the user an administrator is acting as.
    pub const ACTING_AS_USER_ID: &str = "wealthpulse/acting_as_user_id";
}

/// The access/refresh pair produced by one authentication exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialRecord {
    pub access_token: Option<Secret>,
    pub refresh_token: Option<Secret>,
}

impl CredentialRecord {
    /// True when neither token is stored.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Token pair returned by `/auth/login` and `/auth/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: Secret,
    pub refresh_token: Secret,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl TokenPair {
    /// Create a bearer token pair.
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token),
            refresh_token: Secret::new(refresh_token),
            token_type: default_token_type(),
        }
    }
}

/// Body of a refresh-token exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Secret,
}

/// Identifier of a backend user, used for impersonation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// The authenticated principal, as returned by `/auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub is_verified: bool,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}
