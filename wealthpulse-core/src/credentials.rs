//! Persistent client credentials.
//!
//! [`CredentialStore`] holds the access/refresh pair and [`ImpersonationStore`]
//! holds the "acting as" user id. Both sit on top of a [`SecretStore`] and
//! contain no refresh logic of their own.
//!
//! Reads never fail: when the backend is unavailable they log a warning and
//! answer `None`, so the client behaves as logged-out rather than crashing.

use std::sync::Arc;

use crate::model::{CredentialRecord, TokenPair, UserId, keys};
use crate::store::{Secret, SecretStore, StoreError};
use crate::token::is_token_live;

/// Single source of truth for the access/refresh token pair.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn SecretStore>,
}

impl CredentialStore {
    /// Create a credential store over the given backend.
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Persist a new pair, replacing any previous one.
    ///
    /// If the refresh token cannot be written the access token write is
    /// undone, so a failed call leaves the previous pair in place.
    pub fn set_tokens(&self, access: &Secret, refresh: &Secret) -> Result<(), StoreError> {
        let previous_access = self.store.get(keys::ACCESS_TOKEN)?;
        self.store.set(keys::ACCESS_TOKEN, access)?;

        if let Err(e) = self.store.set(keys::REFRESH_TOKEN, refresh) {
            let rollback = match &previous_access {
                Some(prev) => self.store.set(keys::ACCESS_TOKEN, prev),
                None => self.store.delete(keys::ACCESS_TOKEN),
            };
            if let Err(rollback_err) = rollback {
                tracing::error!(
                    "Failed to restore access token after partial write: {}",
                    rollback_err
                );
            }
            return Err(e);
        }

        tracing::debug!("Stored new token pair");
        Ok(())
    }

    /// Persist the pair returned by a login or refresh exchange.
    pub fn store_pair(&self, pair: &TokenPair) -> Result<(), StoreError> {
        self.set_tokens(&pair.access_token, &pair.refresh_token)
    }

    /// Current access token, or `None` if absent or unreadable.
    pub fn access_token(&self) -> Option<Secret> {
        self.read(keys::ACCESS_TOKEN)
    }

    /// Current refresh token, or `None` if absent or unreadable.
    pub fn refresh_token(&self) -> Option<Secret> {
        self.read(keys::REFRESH_TOKEN)
    }

    /// Snapshot of both tokens.
    pub fn record(&self) -> CredentialRecord {
        CredentialRecord {
            access_token: self.access_token(),
            refresh_token: self.refresh_token(),
        }
    }

    /// Remove both tokens. Safe to call when already logged out.
    pub fn clear_tokens(&self) {
        for key in [keys::ACCESS_TOKEN, keys::REFRESH_TOKEN] {
            if let Err(e) = self.store.delete(key) {
                tracing::warn!("Failed to delete {}: {}", key, e);
            }
        }
        tracing::debug!("Cleared token pair");
    }

    /// Whether the stored access token's expiry is in the future.
    ///
    /// A missing or undecodable token counts as not authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.access_token()
            .map(|token| is_token_live(token.expose()))
            .unwrap_or(false)
    }

    fn read(&self, key: &str) -> Option<Secret> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Credential storage unavailable reading {}: {}", key, e);
                None
            }
        }
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

/// Persisted impersonation target.
///
/// Absent means "act as the authenticated principal".
#[derive(Clone)]
pub struct ImpersonationStore {
    store: Arc<dyn SecretStore>,
}

impl ImpersonationStore {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// The user currently being viewed, if any.
    pub fn acting_as(&self) -> Option<UserId> {
        let value = match self.store.get(keys::ACTING_AS_USER_ID) {
            Ok(value) => value?,
            Err(e) => {
                tracing::warn!("Impersonation storage unavailable: {}", e);
                return None;
            }
        };

        match value.expose().trim().parse::<i64>() {
            Ok(id) => Some(UserId(id)),
            Err(_) => {
                tracing::warn!("Ignoring non-numeric impersonation target");
                None
            }
        }
    }

    pub fn set_acting_as(&self, user: UserId) -> Result<(), StoreError> {
        self.store
            .set(keys::ACTING_AS_USER_ID, &Secret::new(user.to_string()))?;
        tracing::info!("Acting as user {}", user);
        Ok(())
    }

    /// Stop impersonating. Safe to call when not impersonating.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.delete(keys::ACTING_AS_USER_ID)
    }
}

impl std::fmt::Debug for ImpersonationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImpersonationStore").finish_non_exhaustive()
    }
}
