//! # Session Bootstrapper
//!
//! Owns the session lifecycle: restores the persisted session at startup,
//! reacts to identity-provider change notifications, and runs the explicit
//! sign-in, sign-up and sign-out operations. Every state change goes through
//! the [`AuthStore`] transitions; driver profiles are converged by the
//! [`DriverReconciler`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_auth::{AuthStore, SessionBootstrapper};
//! use core_runtime::config::ReconcilePolicy;
//! use core_runtime::events::EventBus;
//! use std::sync::Arc;
//!
//! let bootstrapper = Arc::new(SessionBootstrapper::new(
//!     identity_provider,
//!     driver_directory,
//!     AuthStore::new(),
//!     EventBus::default(),
//!     ReconcilePolicy::default(),
//! ));
//!
//! let handle = bootstrapper.start();
//! bootstrapper.initialize().await?;
//!
//! let ready = bootstrapper.wait_until_ready().await;
//! println!("driver: {:?}", ready.driver.map(|d| d.full_name));
//!
//! handle.shutdown().await;
//! ```

use crate::error::{AuthError, Result};
use crate::reconcile::{DriverReconciler, ReconcileTask};
use crate::store::AuthStore;
use crate::types::{AuthSnapshot, Transition};
use bridge_traits::backend::{
    AuthChange, AuthChangeKind, AuthSession, Credentials, DriverDirectory, DriverLogin,
    DriverRecord, IdentityProvider, Registration,
};
use core_async::sync::{watch, CancellationToken};
use core_async::task::JoinHandle;
use core_runtime::config::ReconcilePolicy;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, instrument, warn};

/// Coordinates the identity provider, the driver directory and the auth state.
pub struct SessionBootstrapper {
    identity_provider: Arc<dyn IdentityProvider>,
    directory: Arc<dyn DriverDirectory>,
    store: AuthStore,
    reconciler: DriverReconciler,
    event_bus: EventBus,
}

impl SessionBootstrapper {
    pub fn new(
        identity_provider: Arc<dyn IdentityProvider>,
        directory: Arc<dyn DriverDirectory>,
        store: AuthStore,
        event_bus: EventBus,
        policy: ReconcilePolicy,
    ) -> Self {
        let reconciler = DriverReconciler::new(
            Arc::clone(&directory),
            store.clone(),
            event_bus.clone(),
            policy,
        );

        Self {
            identity_provider,
            directory,
            store,
            reconciler,
            event_bus,
        }
    }

    /// Subscribes to identity-provider notifications and forwards each one to
    /// [`on_auth_event`](Self::on_auth_event) from a background task.
    ///
    /// The returned handle owns the subscription; dropping it or calling
    /// [`BootstrapHandle::shutdown`] releases it and cancels any pending
    /// reconciliation.
    pub fn start(self: &Arc<Self>) -> BootstrapHandle {
        let mut subscription = self.identity_provider.on_auth_state_change();
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();
        let this: Weak<Self> = Arc::downgrade(self);

        let listener = core_async::spawn(async move {
            loop {
                let change = core_async::select! {
                    _ = stop.cancelled() => break,
                    change = subscription.recv() => change,
                };

                let Some(change) = change else {
                    debug!("Identity provider closed the change stream");
                    break;
                };
                let Some(bootstrapper) = this.upgrade() else {
                    break;
                };
                bootstrapper.on_auth_event(change);
            }

            subscription.unsubscribe();
            if stop.is_cancelled() {
                if let Some(bootstrapper) = this.upgrade() {
                    bootstrapper.reconciler.cancel();
                }
            }
        });

        info!("Listening for identity provider changes");
        BootstrapHandle {
            shutdown,
            listener: Some(listener),
        }
    }

    /// Looks up the current session once.
    ///
    /// With a session, starts reconciliation and returns its task; `loading`
    /// stays true until that run ends. Without one, clears any driver and
    /// sets `loading` to false. If a change notification already moved the
    /// state on while the lookup was in flight, the lookup result is ignored.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the session lookup fails. `loading` is
    /// cleared first so consumers are never left waiting.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<Option<ReconcileTask>> {
        let observed = self.store.generation();

        match self.identity_provider.get_session().await {
            Ok(Some(session)) => {
                if !self.store.is_current(observed) {
                    debug!("State changed during session lookup, keeping newer state");
                    return Ok(None);
                }
                info!(user_id = %session.user.id, "Restored persisted session");
                let user_id = session.user.id.to_string();
                let task = self.reconcile(session);
                self.emit(AuthEvent::SessionRestored { user_id });
                Ok(Some(task))
            }
            Ok(None) => {
                debug!("No persisted session");
                self.store.signed_out_if_current(observed);
                Ok(None)
            }
            Err(e) => {
                error!(error = %e, "Failed to load session");
                self.store.signed_out_if_current(observed);
                let err = AuthError::from(e);
                self.emit_error(&err);
                Err(err)
            }
        }
    }

    /// Applies an identity-provider change notification.
    ///
    /// A change carrying a session starts reconciliation for it. A change
    /// without one clears the driver and `loading` before returning and
    /// cancels any pending retry.
    pub fn on_auth_event(&self, change: AuthChange) -> Option<ReconcileTask> {
        debug!(kind = %change.kind, has_session = change.session.is_some(), "Auth change");

        let Some(session) = change.session else {
            self.clear_session();
            return None;
        };

        let user_id = session.user.id.to_string();
        let (task, transition) = self.begin(session);

        let event = match change.kind {
            AuthChangeKind::TokenRefreshed => Some(AuthEvent::TokenRefreshed { user_id }),
            AuthChangeKind::SignedIn if transition.identity_changed => {
                Some(AuthEvent::SignedIn { user_id })
            }
            AuthChangeKind::InitialSession if transition.identity_changed => {
                Some(AuthEvent::SessionRestored { user_id })
            }
            _ => None,
        };
        if let Some(event) = event {
            self.emit(event);
        }

        Some(task)
    }

    /// Signs in through the driver directory and installs the returned
    /// profile directly, without a reconciliation run.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidCredentials`] for rejected credentials,
    /// [`AuthError::NotADriver`] when the account has no driver profile.
    #[instrument(skip(self, credentials))]
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<DriverRecord> {
        info!("Signing in");

        let login = self.directory.login(credentials).await.map_err(|e| {
            let err = AuthError::from_login(e);
            warn!(error = %err, "Sign-in failed");
            self.emit_error(&err);
            err
        })?;

        self.apply_login(login)
    }

    /// Registers a new driver and installs the returned profile.
    #[instrument(skip(self, registration))]
    pub async fn sign_up(&self, registration: &Registration) -> Result<DriverRecord> {
        info!("Registering driver");

        let login = self.directory.register(registration).await.map_err(|e| {
            let err = AuthError::from_registration(e);
            warn!(error = %err, "Registration failed");
            self.emit_error(&err);
            err
        })?;

        self.apply_login(login)
    }

    /// Signs out. Local state is cleared before the provider is called, and a
    /// provider failure is logged rather than returned.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        info!("Signing out");
        self.clear_session();

        if let Err(e) = self.identity_provider.sign_out().await {
            let err = AuthError::SignOutFailed(e.to_string());
            warn!(error = %err, "Provider sign-out failed");
            self.emit_error(&err);
        }
    }

    /// Restarts reconciliation for the current session from attempt 0.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotAuthenticated`] when no session is present.
    pub fn refresh_driver(&self) -> Result<ReconcileTask> {
        let session = self
            .store
            .snapshot()
            .session
            .ok_or(AuthError::NotAuthenticated)?;
        debug!(user_id = %session.user.id, "Driver refresh requested");
        Ok(self.reconcile(session))
    }

    /// Single lookup of the current driver profile, without retries.
    ///
    /// On success the record is installed if the state has not moved on in
    /// the meantime.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotAuthenticated`] without a session,
    /// [`AuthError::DriverLookupFailed`] when the lookup fails or answers
    /// with another identity's profile.
    #[instrument(skip(self))]
    pub async fn fetch_current_driver(&self) -> Result<DriverRecord> {
        let snapshot = self.store.snapshot();
        let identity = snapshot.identity.ok_or(AuthError::NotAuthenticated)?;

        let record = self
            .directory
            .get_driver_by_id(&identity.id)
            .await
            .map_err(|e| {
                warn!(user_id = %identity.id, error = %e, "Driver lookup failed");
                AuthError::DriverLookupFailed(e.to_string())
            })?;

        if record.id != identity.id {
            warn!(
                user_id = %identity.id,
                driver_id = %record.id,
                "Lookup returned another identity's profile"
            );
            return Err(AuthError::DriverLookupFailed(
                "driver profile belongs to another identity".to_string(),
            ));
        }

        if !self.store.install_driver(snapshot.generation, record.clone()) {
            debug!("Auth state moved on during lookup, record not installed");
        }
        Ok(record)
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.store.subscribe()
    }

    /// Waits until `loading` is false.
    pub async fn wait_until_ready(&self) -> AuthSnapshot {
        self.store.wait_until_settled().await
    }

    pub fn store(&self) -> &AuthStore {
        &self.store
    }

    fn reconcile(&self, session: AuthSession) -> ReconcileTask {
        self.begin(session).0
    }

    fn begin(&self, session: AuthSession) -> (ReconcileTask, Transition) {
        let identity = session.user.clone();
        let transition = self.store.begin_reconciliation(session);
        let task = self.reconciler.start(transition.generation, identity);
        (task, transition)
    }

    fn clear_session(&self) {
        self.reconciler.cancel();
        let transition = self.store.signed_out();
        if transition.identity_changed {
            self.emit(AuthEvent::SignedOut);
        }
    }

    fn apply_login(&self, login: DriverLogin) -> Result<DriverRecord> {
        let DriverLogin { session, driver } = login;

        if driver.id != session.user.id {
            let err = AuthError::DriverLookupFailed(
                "driver profile does not belong to the signed-in identity".to_string(),
            );
            error!(user_id = %session.user.id, "Login returned a mismatched driver profile");
            self.emit_error(&err);
            return Err(err);
        }

        self.reconciler.cancel();
        let user_id = session.user.id.to_string();
        let transition = self.store.signed_in(session, driver.clone());
        if transition.identity_changed {
            self.emit(AuthEvent::SignedIn { user_id });
        }

        info!("Signed in");
        Ok(driver)
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.event_bus.emit(CoreEvent::Auth(event));
    }

    fn emit_error(&self, err: &AuthError) {
        self.emit(AuthEvent::AuthError {
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        });
    }
}

impl std::fmt::Debug for SessionBootstrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBootstrapper")
            .field("store", &self.store)
            .field("reconciler", &self.reconciler)
            .finish()
    }
}

/// Scoped ownership of the change subscription started by
/// [`SessionBootstrapper::start`].
#[derive(Debug)]
pub struct BootstrapHandle {
    shutdown: CancellationToken,
    listener: Option<JoinHandle<()>>,
}

impl BootstrapHandle {
    /// Stops listening, releases the subscription and cancels pending
    /// reconciliation, then waits for the listener to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(listener) = self.listener.take() {
            if let Err(e) = listener.await {
                warn!(error = %e, "Auth listener ended abnormally");
            }
        }
    }

    pub fn is_active(&self) -> bool {
        !self.shutdown.is_cancelled()
    }
}

impl Drop for BootstrapHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
