//! Shared HTTP plumbing for the auth and REST endpoints.

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use core_async::time::Duration;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Result, SupabaseError};
use crate::types::ApiErrorBody;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection to one Supabase project.
///
/// Every request carries the project's anonymous key in the `apikey` header
/// and, until a user token replaces it, as the bearer token.
#[derive(Clone)]
pub struct SupabaseClient {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    anon_key: String,
    timeout: Duration,
}

impl SupabaseClient {
    /// Create a client for the project at `base_url` (no trailing slash needed).
    ///
    /// # Errors
    ///
    /// [`SupabaseError::InvalidConfig`] when the URL is not `http(s)://` or
    /// the key is empty.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let anon_key = anon_key.into();

        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(SupabaseError::InvalidConfig(format!(
                "project URL must start with http:// or https://, got '{}'",
                base_url
            )));
        }
        if anon_key.trim().is_empty() {
            return Err(SupabaseError::InvalidConfig(
                "anon key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            http_client,
            base_url,
            anon_key,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request for `path` under the project URL, with the project headers set.
    pub fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(method, format!("{}{}", self.base_url, path))
            .header("apikey", self.anon_key.clone())
            .bearer_token(self.anon_key.clone())
            .timeout(self.timeout)
    }

    /// Execute `request`, turning non-2xx answers into [`SupabaseError::Api`].
    pub async fn send(&self, request: HttpRequest, policy: RetryPolicy) -> Result<HttpResponse> {
        let method = request.method;
        let path = request
            .url
            .strip_prefix(&self.base_url)
            .unwrap_or(&request.url)
            .split('?')
            .next()
            .unwrap_or_default()
            .to_string();

        let response = self
            .http_client
            .execute_with_retry(request, policy)
            .await?;

        if response.is_success() {
            debug!(?method, path = %path, status = response.status, "Supabase request succeeded");
            return Ok(response);
        }

        let message = serde_json::from_slice::<ApiErrorBody>(&response.body)
            .ok()
            .and_then(ApiErrorBody::into_message)
            .unwrap_or_else(|| format!("HTTP {}", response.status));

        warn!(
            ?method,
            path = %path,
            status = response.status,
            error = %message,
            "Supabase request failed"
        );

        Err(SupabaseError::Api {
            status: response.status,
            message,
        })
    }

    /// Execute `request` and parse the JSON body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<T> {
        let response = self.send(request, policy).await?;
        serde_json::from_slice(&response.body)
            .map_err(|e| SupabaseError::ParseError(e.to_string()))
    }
}

impl fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.base_url)
            .field("anon_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}
