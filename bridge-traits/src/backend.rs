//! Backend Service Contracts
//!
//! Contracts for the hosted backend the courier core talks to: a managed
//! identity provider and the driver directory stored in its database.
//!
//! Payload shapes follow the backend schema; the core only relies on the
//! fields declared here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Stable identifier of an authenticated user, as issued by the identity provider.
///
/// The same value keys the driver's profile row.
///
/// # Examples
///
/// ```
/// use bridge_traits::backend::UserId;
///
/// let id = UserId::from("9b2f6c1e-5a6d-4f38-9d7e-0c4b2a1f3e55");
/// assert_eq!(id.as_str(), "9b2f6c1e-5a6d-4f38-9d7e-0c4b2a1f3e55");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// User identity derived from a session: stable id plus email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

/// Credential bundle issued by the identity provider.
///
/// Created on sign-in, replaced on token refresh, destroyed on sign-out.
///
/// # Security
///
/// The `Debug` implementation redacts the tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: Identity,
}

impl AuthSession {
    /// The identity this session authenticates.
    pub fn identity(&self) -> &Identity {
        &self.user
    }

    /// Whether the access token is expired, or will be within `buffer_seconds` of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, buffer_seconds: i64) -> bool {
        now + chrono::Duration::seconds(buffer_seconds) >= self.expires_at
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Application-level driver profile, keyed by the identity id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverRecord {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub business_id: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub vehicle_plate: Option<String>,
    #[serde(default)]
    pub total_deliveries: u64,
    #[serde(default)]
    pub total_earnings: f64,
    #[serde(default)]
    pub is_available: bool,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

/// Email/password sign-in credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Data required to register a new driver account.
#[derive(Clone, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub business_id: Option<String>,
    #[serde(default)]
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub vehicle_plate: Option<String>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("full_name", &self.full_name)
            .field("phone", &self.phone)
            .field("business_id", &self.business_id)
            .field("vehicle_type", &self.vehicle_type)
            .field("vehicle_plate", &self.vehicle_plate)
            .finish()
    }
}

/// Resolved session and driver profile returned by login and registration.
#[derive(Debug, Clone)]
pub struct DriverLogin {
    pub session: AuthSession,
    pub driver: DriverRecord,
}

/// Kind of identity-provider change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthChangeKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

impl AuthChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthChangeKind::InitialSession => "initial_session",
            AuthChangeKind::SignedIn => "signed_in",
            AuthChangeKind::SignedOut => "signed_out",
            AuthChangeKind::TokenRefreshed => "token_refreshed",
            AuthChangeKind::UserUpdated => "user_updated",
        }
    }
}

impl fmt::Display for AuthChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity-provider change notification: event kind plus the session after the change.
#[derive(Debug, Clone)]
pub struct AuthChange {
    pub kind: AuthChangeKind,
    pub session: Option<AuthSession>,
}

impl AuthChange {
    pub fn new(kind: AuthChangeKind, session: Option<AuthSession>) -> Self {
        Self { kind, session }
    }
}

type UnsubscribeHook = Box<dyn FnOnce() + Send + Sync>;

/// Scoped subscription to identity-provider change notifications.
///
/// The unsubscribe hook runs exactly once: on [`unsubscribe`](Self::unsubscribe)
/// or when the subscription is dropped, whichever comes first.
pub struct AuthSubscription {
    events: broadcast::Receiver<AuthChange>,
    on_unsubscribe: Option<UnsubscribeHook>,
}

impl AuthSubscription {
    pub fn new(events: broadcast::Receiver<AuthChange>) -> Self {
        Self {
            events,
            on_unsubscribe: None,
        }
    }

    /// Attach a hook that releases provider-side resources for this subscription.
    pub fn with_unsubscribe(mut self, hook: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.on_unsubscribe = Some(Box::new(hook));
        self
    }

    /// Wait for the next change. Returns `None` once the provider is gone.
    ///
    /// A subscriber that falls behind skips the missed changes and continues
    /// with the oldest change still buffered.
    pub async fn recv(&mut self) -> Option<AuthChange> {
        loop {
            match self.events.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Release the subscription explicitly.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(hook) = self.on_unsubscribe.take() {
            hook();
        }
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for AuthSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSubscription")
            .field("active", &self.on_unsubscribe.is_some())
            .finish()
    }
}

/// Managed identity provider.
///
/// Every call is a single round trip that returns a result; failures never
/// escape as panics.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current session, if one exists.
    async fn get_session(&self) -> Result<Option<AuthSession>>;

    /// Subscribe to sign-in, sign-out and token-refresh notifications.
    fn on_auth_state_change(&self) -> AuthSubscription;

    /// Password sign-in.
    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<AuthSession>;

    /// Create a new identity and sign it in.
    async fn sign_up(&self, registration: &Registration) -> Result<AuthSession>;

    /// End the current session.
    async fn sign_out(&self) -> Result<()>;
}

/// Driver directory backed by the hosted database.
#[async_trait]
pub trait DriverDirectory: Send + Sync {
    /// Look up the driver profile for an identity. One network round trip.
    async fn get_driver_by_id(&self, id: &UserId) -> Result<DriverRecord>;

    /// Sign in and resolve the driver profile in one call.
    async fn login(&self, credentials: &Credentials) -> Result<DriverLogin>;

    /// Register a new identity together with its driver profile.
    async fn register(&self, registration: &Registration) -> Result<DriverLogin>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn session(expires_at: DateTime<Utc>) -> AuthSession {
        AuthSession {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            token_type: "bearer".to_string(),
            expires_at,
            user: Identity {
                id: UserId::from("user-1"),
                email: Some("a@b.com".to_string()),
            },
        }
    }

    #[test]
    fn test_session_debug_redacts_tokens() {
        let debug = format!("{:?}", session(Utc::now()));
        assert!(!debug.contains("access\""));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let debug = format!("{:?}", Credentials::new("a@b.com", "hunter2"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_session_expiry_with_buffer() {
        let now = Utc::now();
        let session = session(now + chrono::Duration::seconds(30));

        assert!(!session.is_expired_at(now, 0));
        assert!(session.is_expired_at(now, 60));
    }

    #[test]
    fn test_driver_record_defaults_from_sparse_row() {
        let record: DriverRecord = serde_json::from_value(serde_json::json!({
            "id": "user-1",
            "email": "a@b.com"
        }))
        .unwrap();

        assert_eq!(record.id, UserId::from("user-1"));
        assert!(record.is_active);
        assert!(!record.is_verified);
        assert_eq!(record.total_deliveries, 0);
        assert!(record.business_id.is_none());
    }

    #[tokio::test]
    async fn test_subscription_unsubscribes_once() {
        let (tx, rx) = broadcast::channel(4);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut subscription = AuthSubscription::new(rx).with_unsubscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tx.send(AuthChange::new(AuthChangeKind::SignedOut, None))
            .unwrap();
        let change = subscription.recv().await.unwrap();
        assert_eq!(change.kind, AuthChangeKind::SignedOut);

        subscription.unsubscribe();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_subscription_drop_runs_hook() {
        let (_tx, rx) = broadcast::channel::<AuthChange>(4);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        {
            let _subscription = AuthSubscription::new(rx).with_unsubscribe(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_subscription_ends_when_provider_gone() {
        let (tx, rx) = broadcast::channel::<AuthChange>(4);
        let mut subscription = AuthSubscription::new(rx);
        drop(tx);
        assert!(subscription.recv().await.is_none());
    }
}
