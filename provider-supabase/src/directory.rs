//! PostgREST driver directory
//!
//! Driver profiles live in the `drivers` table, keyed by the auth user id.
//! Requests run with the signed-in user's token so row-level security applies.

use async_trait::async_trait;
use bridge_traits::backend::{
    AuthSession, Credentials, DriverDirectory, DriverLogin, DriverRecord, IdentityProvider,
    Registration, UserId,
};
use bridge_traits::error::Result;
use bridge_traits::http::{HttpMethod, RetryPolicy};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::auth::SupabaseIdentityProvider;
use crate::client::SupabaseClient;
use crate::error::SupabaseError;
use crate::types::NewDriverRow;

const DRIVERS_PATH: &str = "/rest/v1/drivers";

/// Makes PostgREST answer with a single object instead of an array
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Driver directory backed by the `drivers` table
pub struct SupabaseDriverDirectory {
    client: SupabaseClient,
    identity: Arc<SupabaseIdentityProvider>,
}

impl SupabaseDriverDirectory {
    pub fn new(client: SupabaseClient, identity: Arc<SupabaseIdentityProvider>) -> Self {
        Self { client, identity }
    }

    /// Single-attempt lookup with an explicit bearer token.
    ///
    /// A missing row (404, or 406 when the object media type matches
    /// nothing) is reported as "driver not found".
    async fn fetch_driver(&self, id: &UserId, token: &str) -> crate::error::Result<DriverRecord> {
        let path = format!(
            "{}?id=eq.{}&select=*",
            DRIVERS_PATH,
            urlencoding::encode(id.as_str())
        );
        let request = self
            .client
            .request(HttpMethod::Get, &path)
            .bearer_token(token)
            .header("Accept", SINGLE_OBJECT);

        match self.client.send_json(request, RetryPolicy::none()).await {
            Err(SupabaseError::Api { status, .. }) if matches!(status, 404 | 406) => {
                Err(SupabaseError::Api {
                    status,
                    message: "driver not found".to_string(),
                })
            }
            other => other,
        }
    }

    async fn insert_driver(
        &self,
        session: &AuthSession,
        registration: &Registration,
    ) -> crate::error::Result<DriverRecord> {
        let request = self
            .client
            .request(HttpMethod::Post, DRIVERS_PATH)
            .bearer_token(session.access_token.clone())
            .header("Accept", SINGLE_OBJECT)
            .header("Prefer", "return=representation")
            .json(&NewDriverRow::new(&session.user.id, registration))?;

        self.client.send_json(request, RetryPolicy::none()).await
    }

    /// Undo a half-finished login or registration.
    async fn abandon_session(&self) {
        if let Err(e) = self.identity.sign_out().await {
            warn!(error = %e, "Failed to sign out abandoned session");
        }
    }
}

#[async_trait]
impl DriverDirectory for SupabaseDriverDirectory {
    #[instrument(skip(self), fields(driver_id = %id))]
    async fn get_driver_by_id(&self, id: &UserId) -> Result<DriverRecord> {
        let token = self
            .identity
            .access_token()
            .await?
            .ok_or(SupabaseError::NotAuthenticated)?;

        let record = self.fetch_driver(id, &token).await?;
        debug!("Driver profile loaded");
        Ok(record)
    }

    /// Signs in and resolves the driver row. An identity without a row is
    /// signed out again and rejected.
    #[instrument(skip(self, credentials))]
    async fn login(&self, credentials: &Credentials) -> Result<DriverLogin> {
        let session = self.identity.sign_in_with_password(credentials).await?;

        match self.fetch_driver(&session.user.id, &session.access_token).await {
            Ok(driver) => {
                info!(driver_id = %driver.id, "Driver logged in");
                Ok(DriverLogin { session, driver })
            }
            Err(e) => {
                warn!(user_id = %session.user.id, error = %e, "Driver lookup after sign-in failed");
                self.abandon_session().await;
                let error = match e {
                    SupabaseError::Api { status, .. } if matches!(status, 404 | 406) => {
                        SupabaseError::NotADriver {
                            user_id: session.user.id.to_string(),
                        }
                    }
                    other => other,
                };
                Err(error.into())
            }
        }
    }

    #[instrument(skip(self, registration))]
    async fn register(&self, registration: &Registration) -> Result<DriverLogin> {
        let session = self.identity.sign_up(registration).await?;

        match self.insert_driver(&session, registration).await {
            Ok(driver) => {
                info!(driver_id = %driver.id, "Driver registered");
                Ok(DriverLogin { session, driver })
            }
            Err(e) => {
                warn!(user_id = %session.user.id, error = %e, "Creating driver profile failed");
                self.abandon_session().await;
                Err(e.into())
            }
        }
    }
}
