//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, secure
//! storage) and the Supabase backend connectors into the courier core, and
//! hands host applications a single [`CourierCore`] handle. Desktop apps
//! typically enable the `desktop-shims` feature, which lets
//! [`CoreConfig`](core_runtime::config::CoreConfig) fall back to the
//! `bridge-desktop` adapters.
//!
//! ```no_run
//! # async fn example() -> core_service::Result<()> {
//! use core_runtime::config::CoreConfig;
//! use core_service::CourierCore;
//!
//! let config = CoreConfig::builder()
//!     .backend_url("https://fleet.supabase.co")
//!     .anon_key("public-anon-key")
//!     .build()?;
//!
//! let core = CourierCore::bootstrap(config).await?;
//! let ready = core.auth().wait_until_ready().await;
//! println!("driver present: {}", ready.driver.is_some());
//!
//! core.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::backend::{DriverDirectory, IdentityProvider};
use core_auth::{AuthSnapshot, AuthStore, BootstrapHandle, SessionBootstrapper};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use provider_supabase::{
    SessionStore, SupabaseClient, SupabaseDriverDirectory, SupabaseIdentityProvider,
};
use tracing::{info, warn};

/// Primary façade exposed to host applications.
pub struct CourierCore {
    auth: Arc<SessionBootstrapper>,
    events: EventBus,
    listener: BootstrapHandle,
}

impl CourierCore {
    /// Build the Supabase connectors from `config` and bring the session up.
    ///
    /// Restores any persisted session and starts driver reconciliation for
    /// it. A failed session lookup is not fatal: the core starts signed out.
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let client = SupabaseClient::new(
            Arc::clone(&config.http_client),
            config.backend_url.clone(),
            config.anon_key.clone(),
        )
        .map_err(|e| CoreError::InitializationFailed(e.to_string()))?
        .with_timeout(config.request_timeout);
        let sessions = SessionStore::with_key(
            Arc::clone(&config.secure_store),
            config.session_storage_key.clone(),
        );

        let identity = Arc::new(SupabaseIdentityProvider::new(client.clone(), sessions));
        let directory = Arc::new(SupabaseDriverDirectory::new(client, Arc::clone(&identity)));

        Self::with_backend(&config, identity, directory).await
    }

    /// Bring the session up against explicit backend connectors.
    pub async fn with_backend(
        config: &CoreConfig,
        identity: Arc<dyn IdentityProvider>,
        directory: Arc<dyn DriverDirectory>,
    ) -> Result<Self> {
        let events = EventBus::new(config.event_buffer_size);
        let auth = Arc::new(SessionBootstrapper::new(
            identity,
            directory,
            AuthStore::new(),
            events.clone(),
            config.reconcile,
        ));

        let listener = auth.start();
        if let Err(e) = auth.initialize().await {
            warn!(error = %e, "Session restore failed, starting signed out");
        }

        info!(backend = %config.backend_url, "Courier core started");
        Ok(Self {
            auth,
            events,
            listener,
        })
    }

    /// Session and driver operations.
    pub fn auth(&self) -> &Arc<SessionBootstrapper> {
        &self.auth
    }

    /// Event bus carrying auth and reconciliation events.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.auth.snapshot()
    }

    /// Release the identity-provider subscription and cancel pending
    /// reconciliation.
    pub async fn shutdown(self) {
        self.listener.shutdown().await;
        info!("Courier core stopped");
    }
}

impl std::fmt::Debug for CourierCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourierCore")
            .field("snapshot", &self.auth.snapshot())
            .field("listener_active", &self.listener.is_active())
            .finish()
    }
}
