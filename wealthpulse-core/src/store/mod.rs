//! Secret storage abstraction.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`SecretStore`] - Trait for secret storage backends
//! - [`MemoryStore`] - In-memory implementation for tests and ephemeral sessions
//! - [`FileStore`] - JSON file in the platform data directory
//! - [`KeyringStore`] - OS keyring implementation (with `keyring-store` feature)
//! - [`create_store`] - Helper to select a backend based on availability
//!
//! # Storage Key Convention
//!
//! Keys follow the pattern: `wealthpulse/{name}`. The fixed keys used by the
//! credential store live in [`crate::model::keys`].
//!
//! # Example
//!
//! ```rust
//! use wealthpulse_core::store::{MemoryStore, Secret, SecretStore};
//!
//! let store = MemoryStore::new();
//! store.set("wealthpulse/access_token", &Secret::new("token")).unwrap();
//!
//! let retrieved = store.get("wealthpulse/access_token").unwrap();
//! assert_eq!(retrieved.unwrap().expose(), "token");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

mod file;
#[cfg(feature = "keyring-store")]
mod keyring;
mod memory;

pub use file::FileStore;
#[cfg(feature = "keyring-store")]
pub use keyring::KeyringStore;
pub use memory::MemoryStore;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the buffer is zeroed when the secret is dropped.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for secret store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Access to the secret was denied.
    #[error("access denied to secret: {key}")]
    AccessDenied { key: String },

    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Reading or writing the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The keyring backend is not available.
    #[error("keyring not available: {message}")]
    KeyringUnavailable { message: String },

    /// No platform data directory could be determined.
    #[error("data directory not available")]
    DataDirUnavailable,
}

/// Abstraction over secret storage backends.
///
/// Reads and writes are synchronous: the credential store answers
/// `access_token()` without suspending, so every backend must too.
pub trait SecretStore: Send + Sync {
    /// Retrieve a secret by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    fn get(&self, key: &str) -> Result<Option<Secret>, StoreError>;

    /// Store a secret at the given key.
    ///
    /// Overwrites any existing value.
    fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError>;

    /// Delete a secret by key.
    ///
    /// Returns `Ok(())` even if the key didn't exist.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Which persistent backend a client should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Nothing survives the process.
    Memory,
    /// JSON file under the platform data directory.
    #[default]
    File,
    /// OS keyring (requires the `keyring-store` feature).
    Keyring,
}

/// Create a secret store for the requested backend.
///
/// Falls back to [`MemoryStore`] with a warning when the requested backend is
/// unavailable; callers then behave as logged-out after a restart instead of
/// failing to start.
pub fn create_store(backend: StoreBackend) -> Box<dyn SecretStore> {
    match backend {
        StoreBackend::Memory => {}
        StoreBackend::File => match FileStore::open_default() {
            Ok(store) => {
                tracing::debug!("Using file secret storage at {:?}", store.path());
                return Box::new(store);
            }
            Err(e) => {
                tracing::warn!(
                    "File storage unavailable ({}), falling back to memory store. \
                     Credentials will not persist across restarts.",
                    e
                );
            }
        },
        #[cfg(feature = "keyring-store")]
        StoreBackend::Keyring => match KeyringStore::try_new("wealthpulse") {
            Ok(store) => {
                tracing::info!("Using OS keyring for secret storage");
                return Box::new(store);
            }
            Err(e) => {
                tracing::warn!(
                    "Keyring unavailable ({}), falling back to memory store. \
                     Credentials will not persist across restarts.",
                    e
                );
            }
        },
        #[cfg(not(feature = "keyring-store"))]
        StoreBackend::Keyring => {
            tracing::warn!(
                "Keyring storage requested but keyring-store feature not enabled. \
                 Using memory store. Credentials will not persist across restarts."
            );
        }
    }

    tracing::debug!("Using in-memory secret storage");
    Box::new(MemoryStore::new())
}
