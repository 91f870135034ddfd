//! GoTrue identity provider
//!
//! Implements `IdentityProvider` on top of the Supabase auth API and keeps the
//! session in the host secure store between launches.

use async_trait::async_trait;
use bridge_traits::backend::{
    AuthChange, AuthChangeKind, AuthSession, AuthSubscription, Credentials, IdentityProvider,
    Registration,
};
use bridge_traits::error::Result;
use bridge_traits::http::{HttpMethod, RetryPolicy};
use bridge_traits::time::{Clock, SystemClock};
use core_async::sync::{broadcast, Mutex};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::client::SupabaseClient;
use crate::error::SupabaseError;
use crate::session_store::SessionStore;
use crate::types::{PasswordGrant, RefreshGrant, SignUpRequest, SignUpResponse, TokenResponse};

/// Sessions expiring within this many seconds are refreshed before use
pub const REFRESH_BUFFER_SECS: i64 = 60;

const CHANGE_BUFFER: usize = 16;

/// Supabase auth (GoTrue) identity provider
///
/// # Features
///
/// - Password sign-in and sign-up
/// - Session restore from `SecureStore` with refresh ahead of expiry
/// - Change notifications for every session transition
///
/// Refresh tokens are single-use, so every operation that replaces the
/// session runs under one lock.
pub struct SupabaseIdentityProvider {
    client: SupabaseClient,
    sessions: SessionStore,
    clock: Arc<dyn Clock>,
    changes: broadcast::Sender<AuthChange>,
    session_lock: Mutex<()>,
}

impl SupabaseIdentityProvider {
    pub fn new(client: SupabaseClient, sessions: SessionStore) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            client,
            sessions,
            clock: Arc::new(SystemClock),
            changes,
            session_lock: Mutex::new(()),
        }
    }

    /// Replace the wall clock used for expiry checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Bearer token of the current session, for row-level-security requests.
    pub async fn access_token(&self) -> Result<Option<String>> {
        Ok(self
            .get_session()
            .await?
            .map(|session| session.access_token))
    }

    fn publish(&self, kind: AuthChangeKind, session: Option<AuthSession>) {
        debug!(change = %kind, "Publishing auth change");
        // No subscribers is fine.
        let _ = self.changes.send(AuthChange::new(kind, session));
    }

    async fn refresh(&self, session: &AuthSession) -> crate::error::Result<AuthSession> {
        let request = self
            .client
            .request(HttpMethod::Post, "/auth/v1/token?grant_type=refresh_token")
            .json(&RefreshGrant {
                refresh_token: &session.refresh_token,
            })?;

        let response: TokenResponse = self
            .client
            .send_json(request, RetryPolicy::none())
            .await?;
        Ok(response.into_session(self.clock.now()))
    }

    async fn install(&self, session: &AuthSession, kind: AuthChangeKind) -> Result<()> {
        self.sessions.save(session).await?;
        self.publish(kind, Some(session.clone()));
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentityProvider {
    #[instrument(skip(self))]
    async fn get_session(&self) -> Result<Option<AuthSession>> {
        let _guard = self.session_lock.lock().await;

        let Some(session) = self.sessions.load().await? else {
            return Ok(None);
        };

        if !session.is_expired_at(self.clock.now(), REFRESH_BUFFER_SECS) {
            return Ok(Some(session));
        }

        debug!(user_id = %session.user.id, "Session near expiry, refreshing");
        match self.refresh(&session).await {
            Ok(fresh) => {
                self.install(&fresh, AuthChangeKind::TokenRefreshed).await?;
                info!(user_id = %fresh.user.id, "Session refreshed");
                Ok(Some(fresh))
            }
            Err(SupabaseError::Api { status, message }) if (400..500).contains(&status) => {
                warn!(
                    user_id = %session.user.id,
                    status,
                    error = %message,
                    "Refresh token rejected, dropping session"
                );
                self.sessions.clear().await?;
                self.publish(AuthChangeKind::SignedOut, None);
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "Session refresh failed");
                Err(e.into())
            }
        }
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        AuthSubscription::new(self.changes.subscribe())
            .with_unsubscribe(|| debug!("Auth state subscription released"))
    }

    #[instrument(skip(self, credentials))]
    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<AuthSession> {
        let _guard = self.session_lock.lock().await;

        let request = self
            .client
            .request(HttpMethod::Post, "/auth/v1/token?grant_type=password")
            .json(&PasswordGrant {
                email: &credentials.email,
                password: &credentials.password,
            })?;

        let response: TokenResponse = self
            .client
            .send_json(request, RetryPolicy::none())
            .await?;
        let session = response.into_session(self.clock.now());

        self.install(&session, AuthChangeKind::SignedIn).await?;
        info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    #[instrument(skip(self, registration))]
    async fn sign_up(&self, registration: &Registration) -> Result<AuthSession> {
        let _guard = self.session_lock.lock().await;

        let request = self
            .client
            .request(HttpMethod::Post, "/auth/v1/signup")
            .json(&SignUpRequest::from(registration))?;

        let response: SignUpResponse = self
            .client
            .send_json(request, RetryPolicy::none())
            .await?;

        match response {
            SignUpResponse::Session(tokens) => {
                let session = tokens.into_session(self.clock.now());
                self.install(&session, AuthChangeKind::SignedIn).await?;
                info!(user_id = %session.user.id, "Signed up");
                Ok(session)
            }
            SignUpResponse::PendingConfirmation(user) => {
                info!(user_id = %user.id, "Sign-up awaiting email confirmation");
                Err(SupabaseError::ConfirmationRequired {
                    email: user.email.unwrap_or_else(|| registration.email.clone()),
                }
                .into())
            }
        }
    }

    /// Revokes the session remotely, then removes it locally whatever the
    /// remote outcome. A remote failure is still returned.
    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<()> {
        let _guard = self.session_lock.lock().await;

        let Some(session) = self.sessions.load().await? else {
            debug!("Sign-out without a session");
            return Ok(());
        };

        let request = self
            .client
            .request(HttpMethod::Post, "/auth/v1/logout")
            .bearer_token(session.access_token.clone());

        let remote = match self.client.send(request, RetryPolicy::none()).await {
            Ok(_) => Ok(()),
            // The token is already invalid server-side.
            Err(SupabaseError::Api { status, .. }) if matches!(status, 401 | 403 | 404) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Remote sign-out failed, removing local session anyway");
                Err(e)
            }
        };

        self.sessions.clear().await?;
        self.publish(AuthChangeKind::SignedOut, None);
        info!(user_id = %session.user.id, "Signed out");

        remote.map_err(Into::into)
    }
}
