//! # WealthPulse Core
//!
//! Storage and token primitives for the WealthPulse API gateway client.
//!
//! This crate provides:
//! - [`CredentialStore`] - the persisted access/refresh token pair
//! - [`ImpersonationStore`] - the persisted "acting as" user id
//! - Secret storage backends behind the [`SecretStore`] trait
//! - Access token claim decoding for expiry checks
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use wealthpulse_core::{CredentialStore, MemoryStore, Secret};
//!
//! let credentials = CredentialStore::new(Arc::new(MemoryStore::new()));
//! credentials
//!     .set_tokens(&Secret::new("access"), &Secret::new("refresh"))
//!     .unwrap();
//!
//! // "access" is not a JWT, so it cannot prove a future expiry.
//! assert!(!credentials.is_authenticated());
//! ```

pub mod credentials;
pub mod model;
pub mod store;
pub mod token;

pub use credentials::{CredentialStore, ImpersonationStore};

pub use model::{CredentialRecord, RefreshRequest, TokenPair, UserId, UserProfile};

pub use store::{FileStore, MemoryStore, Secret, SecretStore, StoreBackend, StoreError, create_store};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;

pub use token::{AccessTokenClaims, TokenError, is_token_live};
