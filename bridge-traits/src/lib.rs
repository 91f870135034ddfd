//! # Host Bridge Traits
//!
//! Capability contracts between the courier core and everything it does not
//! own: the host platform and the hosted backend.
//!
//! ## Overview
//!
//! Each trait represents a capability the core requires but that is provided
//! from outside. Host platforms (desktop, iOS, Android) supply the low-level
//! capabilities; backend connectors (e.g. `provider-supabase`) supply the
//! identity and driver-lookup contracts on top of them.
//!
//! ## Traits
//!
//! ### Networking & Storage
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and TLS
//! - [`SecureStore`](storage::SecureStore) - Credential persistence (Keychain/Keystore)
//!
//! ### Backend
//! - [`IdentityProvider`](backend::IdentityProvider) - Managed auth sessions and change events
//! - [`DriverDirectory`](backend::DriverDirectory) - Driver profile lookup, login and registration
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Backend failures
//! are string-shaped (`BridgeError::Backend`) and are expected control flow for
//! callers, not exceptional conditions.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind an `Arc`.
//!
//! ## Examples
//!
//! ### Implementing DriverDirectory
//!
//! ```ignore
//! use bridge_traits::backend::{Credentials, DriverDirectory, DriverLogin, DriverRecord, Registration, UserId};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyDirectory;
//!
//! #[async_trait]
//! impl DriverDirectory for MyDirectory {
//!     async fn get_driver_by_id(&self, id: &UserId) -> Result<DriverRecord> {
//!         todo!()
//!     }
//!
//!     async fn login(&self, credentials: &Credentials) -> Result<DriverLogin> {
//!         todo!()
//!     }
//!
//!     async fn register(&self, registration: &Registration) -> Result<DriverLogin> {
//!         todo!()
//!     }
//! }
//! ```

pub mod backend;
pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use backend::{
    AuthChange, AuthChangeKind, AuthSession, AuthSubscription, Credentials, DriverDirectory,
    DriverLogin, DriverRecord, Identity, IdentityProvider, Registration, UserId,
};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::SecureStore;
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
