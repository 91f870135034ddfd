//! # Core Configuration Module
//!
//! Builder-based configuration for the Courier Platform Core.
//!
//! ## Overview
//!
//! `CoreConfigBuilder` collects the backend endpoint, its public API key and
//! the host capabilities the session core needs, then validates everything in
//! [`build()`](CoreConfigBuilder::build). Missing capabilities fail fast with
//! an actionable [`Error::CapabilityMissing`].
//!
//! ## Capabilities
//!
//! - `HttpClient` - backend REST calls (desktop default: reqwest)
//! - `SecureStore` - session persistence (desktop default: OS keychain)
//!
//! When the `desktop-shims` feature is enabled both defaults are injected
//! automatically if the host did not provide its own.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .backend_url("https://project.supabase.co")
//!     .anon_key("public-anon-key")
//!     .http_client(Arc::new(MyHttpClient))
//!     .secure_store(Arc::new(MySecureStore))
//!     .build()?;
//! ```
//!
//! Environment-driven setup for the driver console:
//!
//! ```ignore
//! let config = CoreConfigBuilder::from_env()?.build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, SecureStore};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Environment variable holding the backend base URL.
pub const ENV_BACKEND_URL: &str = "COURIER_BACKEND_URL";
/// Environment variable holding the backend public (anon) key.
pub const ENV_ANON_KEY: &str = "COURIER_ANON_KEY";

pub const DEFAULT_SESSION_STORAGE_KEY: &str = "courier.session";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = crate::events::DEFAULT_EVENT_BUFFER_SIZE;

/// Bounded retry schedule for driver profile reconciliation.
///
/// Delays grow linearly: attempt `n` (zero-based) that fails waits
/// `base_delay * (n + 1)` before attempt `n + 1`. With the defaults a run that
/// keeps failing performs three fetches separated by 1s and 2s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl ReconcilePolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay to wait after the failed attempt with index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.saturating_add(1))
    }

    /// Index of the last attempt in a run.
    pub fn last_attempt(&self) -> u32 {
        self.max_attempts.saturating_sub(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config(
                "Reconcile policy needs at least one attempt".to_string(),
            ));
        }
        if self.max_attempts > 10 {
            return Err(Error::Config(format!(
                "Reconcile policy allows at most 10 attempts, got {}",
                self.max_attempts
            )));
        }
        Ok(())
    }
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

/// Validated configuration for the Courier Platform Core.
///
/// Construct through [`CoreConfig::builder`].
#[derive(Clone)]
pub struct CoreConfig {
    /// Backend base URL, without a trailing slash.
    pub backend_url: String,

    /// Public API key sent as `apikey` on every backend request.
    pub anon_key: String,

    pub http_client: Arc<dyn HttpClient>,

    pub secure_store: Arc<dyn SecureStore>,

    pub reconcile: ReconcilePolicy,

    /// Per-request timeout for backend calls.
    pub request_timeout: Duration,

    /// `SecureStore` key under which the session is persisted.
    pub session_storage_key: String,

    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("backend_url", &self.backend_url)
            .field("anon_key", &"[REDACTED]")
            .field("http_client", &"<HttpClient>")
            .field("secure_store", &"<SecureStore>")
            .field("reconcile", &self.reconcile)
            .field("request_timeout", &self.request_timeout)
            .field("session_storage_key", &self.session_storage_key)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a malformed backend URL, an empty key or
    /// storage key, a zero timeout or buffer, or an invalid reconcile policy.
    pub fn validate(&self) -> Result<()> {
        validate_backend_url(&self.backend_url)?;

        if self.anon_key.trim().is_empty() {
            return Err(Error::Config(
                "Backend anon key must not be empty. Use .anon_key() to set it.".to_string(),
            ));
        }

        if self.session_storage_key.trim().is_empty() {
            return Err(Error::Config(
                "Session storage key must not be empty".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than zero".to_string(),
            ));
        }

        self.reconcile.validate()
    }
}

fn validate_backend_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw)
        .map_err(|e| Error::Config(format!("Invalid backend URL '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::Config(format!(
                "Backend URL must use http or https, got '{}'",
                other
            )))
        }
    }

    if url.host_str().is_none() {
        return Err(Error::Config(format!("Backend URL '{}' has no host", raw)));
    }

    Ok(())
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for backend calls. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestHttpClient. \
                 Mobile: inject the platform HTTP stack (URLSession/OkHttp)."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn secure_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "SecureStore implementation is required for session persistence. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default KeyringSecureStore. \
                 Mobile: inject platform-native secure storage (Keychain/Keystore)."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout)
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    use bridge_desktop::KeyringSecureStore;

    let store: Arc<dyn SecureStore> = Arc::new(KeyringSecureStore::new());
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(secure_store_missing_error())
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    backend_url: Option<String>,
    anon_key: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    reconcile: Option<ReconcilePolicy>,
    request_timeout: Option<Duration>,
    session_storage_key: Option<String>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Starts a builder from `COURIER_BACKEND_URL` and `COURIER_ANON_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first variable that is unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("Environment variable {} is not set", name)))
        };

        Ok(Self::default()
            .backend_url(read(ENV_BACKEND_URL)?)
            .anon_key(read(ENV_ANON_KEY)?))
    }

    /// Sets the backend base URL, e.g. `https://project.supabase.co`.
    pub fn backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = Some(url.into());
        self
    }

    pub fn anon_key(mut self, key: impl Into<String>) -> Self {
        self.anon_key = Some(key.into());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    /// Overrides the reconciliation retry schedule (default: 3 attempts, 1s base).
    pub fn reconcile_policy(mut self, policy: ReconcilePolicy) -> Self {
        self.reconcile = Some(policy);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn session_storage_key(mut self, key: impl Into<String>) -> Self {
        self.session_storage_key = Some(key.into());
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the backend URL or anon key is missing or invalid
    /// - [`Error::CapabilityMissing`] if a capability was not provided and no
    ///   platform default is available
    pub fn build(self) -> Result<CoreConfig> {
        let backend_url = self.backend_url.ok_or_else(|| {
            Error::Config("Backend URL is required. Use .backend_url() to set it.".to_string())
        })?;

        let anon_key = self.anon_key.ok_or_else(|| {
            Error::Config("Backend anon key is required. Use .anon_key() to set it.".to_string())
        })?;

        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let config = CoreConfig {
            backend_url: backend_url.trim_end_matches('/').to_string(),
            anon_key,
            http_client,
            secure_store,
            reconcile: self.reconcile.unwrap_or_default(),
            request_timeout,
            session_storage_key: self
                .session_storage_key
                .unwrap_or_else(|| DEFAULT_SESSION_STORAGE_KEY.to_string()),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{BridgeError, HttpRequest, HttpResponse};
    use std::collections::HashMap;

    struct MockHttpClient;

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn execute(
            &self,
            _request: HttpRequest,
        ) -> std::result::Result<HttpResponse, BridgeError> {
            Ok(HttpResponse {
                status: 200,
                headers: HashMap::new(),
                body: Default::default(),
            })
        }
    }

    struct MockSecureStore;

    #[async_trait]
    impl SecureStore for MockSecureStore {
        async fn set_secret(
            &self,
            _key: &str,
            _value: &[u8],
        ) -> std::result::Result<(), BridgeError> {
            Ok(())
        }

        async fn get_secret(
            &self,
            _key: &str,
        ) -> std::result::Result<Option<Vec<u8>>, BridgeError> {
            Ok(None)
        }

        async fn delete_secret(&self, _key: &str) -> std::result::Result<(), BridgeError> {
            Ok(())
        }
    }

    fn complete_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .backend_url("https://demo.supabase.co/")
            .anon_key("anon-key")
            .http_client(Arc::new(MockHttpClient))
            .secure_store(Arc::new(MockSecureStore))
    }

    #[test]
    fn test_builder_with_all_required_fields() {
        let config = complete_builder().build().unwrap();

        assert_eq!(config.backend_url, "https://demo.supabase.co");
        assert_eq!(config.reconcile, ReconcilePolicy::default());
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.session_storage_key, "courier.session");
        assert_eq!(config.event_buffer_size, 100);
    }

    #[test]
    fn test_builder_requires_backend_url() {
        let result = CoreConfig::builder()
            .anon_key("anon-key")
            .http_client(Arc::new(MockHttpClient))
            .secure_store(Arc::new(MockSecureStore))
            .build();

        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("Backend URL is required")),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_builder_requires_anon_key() {
        let result = CoreConfig::builder()
            .backend_url("https://demo.supabase.co")
            .http_client(Arc::new(MockHttpClient))
            .secure_store(Arc::new(MockSecureStore))
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_non_http_scheme() {
        let result = complete_builder().backend_url("ftp://demo.example").build();
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("http or https")),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_validate_rejects_garbage_url() {
        let result = complete_builder().backend_url("not a url").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_blank_anon_key() {
        let result = complete_builder().anon_key("   ").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_attempt_policy() {
        let result = complete_builder()
            .reconcile_policy(ReconcilePolicy::new(0, Duration::from_millis(10)))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_event_buffer() {
        let result = complete_builder().event_buffer_size(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_http_client() {
        let result = CoreConfig::builder()
            .backend_url("https://demo.supabase.co")
            .anon_key("anon-key")
            .secure_store(Arc::new(MockSecureStore))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "HttpClient")
            }
            other => panic!("expected missing capability, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_secure_store() {
        let result = CoreConfig::builder()
            .backend_url("https://demo.supabase.co")
            .anon_key("anon-key")
            .http_client(Arc::new(MockHttpClient))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, message }) => {
                assert_eq!(capability, "SecureStore");
                assert!(message.contains("desktop-shims"));
            }
            other => panic!("expected missing capability, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_reconcile_policy_linear_delays() {
        let policy = ReconcilePolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(3000));
        assert_eq!(policy.last_attempt(), 2);
    }

    #[test]
    fn test_from_lookup_reads_both_variables() {
        let builder = CoreConfigBuilder::from_lookup(|name| match name {
            ENV_BACKEND_URL => Some("https://env.supabase.co".to_string()),
            ENV_ANON_KEY => Some("env-key".to_string()),
            _ => None,
        })
        .unwrap();

        let config = builder
            .http_client(Arc::new(MockHttpClient))
            .secure_store(Arc::new(MockSecureStore))
            .build()
            .unwrap();

        assert_eq!(config.backend_url, "https://env.supabase.co");
        assert_eq!(config.anon_key, "env-key");
    }

    #[test]
    fn test_from_lookup_names_missing_variable() {
        let result = CoreConfigBuilder::from_lookup(|name| match name {
            ENV_BACKEND_URL => Some("https://env.supabase.co".to_string()),
            _ => None,
        });

        match result {
            Err(Error::Config(msg)) => assert!(msg.contains(ENV_ANON_KEY)),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_debug_redacts_anon_key() {
        let config = complete_builder().anon_key("super-secret-key").build().unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret-key"));
        assert!(debug.contains("[REDACTED]"));
    }
}
