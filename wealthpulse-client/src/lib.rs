//! WealthPulse Gateway Client
//!
//! The authenticated HTTP layer every WealthPulse front end talks through.
//!
//! # Overview
//!
//! Each request passes the same pipeline:
//!
//! 1. The [`RequestAuthenticator`] attaches `Authorization`,
//!    `X-Portfolio-User-ID` and `X-CSRFToken` from the credential store, the
//!    impersonation store and the cookie jar.
//! 2. The [`Transport`] sends it.
//! 3. A 401 is handed to the [`RefreshCoordinator`], which runs at most one
//!    refresh exchange no matter how many requests failed at once, then the
//!    request is replayed exactly once.
//! 4. Any other failure is classified into a [`GatewayError`] and recorded in
//!    the [`ActionLog`].
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use wealthpulse_client::{GatewayClient, GatewayConfig};
//! use wealthpulse_core::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> wealthpulse_client::Result<()> {
//!     let client = GatewayClient::builder()
//!         .config(GatewayConfig::with_base_url("http://localhost:8000/api/v1"))
//!         .store(Arc::new(MemoryStore::new()))
//!         .build()?;
//!
//!     client.login("investor@example.com", "hunter2").await?;
//!
//!     let portfolio: serde_json::Value = client.get_json("/portfolio/summary").await?;
//!     println!("{}", portfolio);
//!
//!     for entry in client.action_log().entries() {
//!         println!("{:?} {}", entry.kind, entry.message);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! [`GatewayConfig::load`] reads `<config_dir>/wealthpulse/client.toml` and
//! then `WEALTHPULSE_API_URL`:
//!
//! ```toml
//! base_url = "https://pulse.example.com/api/v1"
//! store = "file"          # file | memory | keyring
//! action_log_capacity = 100
//! ```

pub mod action_log;
pub mod classify;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod navigator;
pub mod refresh;
pub mod transport;

pub use action_log::{ActionLog, LogEntry, LogKind, Subscription};
pub use client::{GatewayClient, GatewayClientBuilder};
pub use config::GatewayConfig;
pub use context::{ContextResolver, RequestAuthenticator};
pub use error::{GatewayError, RefreshFailure, Result};
pub use navigator::{MemoryNavigator, Navigator};
pub use refresh::RefreshCoordinator;
pub use transport::{
    ApiRequest, ApiResponse, MultipartPart, OutboundRequest, ReqwestTransport, RequestBody,
    Transport, TransportError,
};

pub use wealthpulse_core::{UserId, UserProfile};
