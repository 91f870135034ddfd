//! Session Persistence
//!
//! Keeps the current [`AuthSession`] in the host's `SecureStore` so a restart
//! can restore it without asking the driver to sign in again.
//!
//! ## Security Features
//!
//! - Tokens are never logged; only the user id and expiry are
//! - Corrupted entries are erased and reported as "no session"

use bridge_traits::backend::AuthSession;
use bridge_traits::storage::SecureStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Result, SupabaseError};

/// Default secure-store key for the persisted session
pub const DEFAULT_STORAGE_KEY: &str = "courier.session";

/// Secure storage for the signed-in session
#[derive(Clone)]
pub struct SessionStore {
    secure_store: Arc<dyn SecureStore>,
    key: String,
}

impl SessionStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self::with_key(secure_store, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(secure_store: Arc<dyn SecureStore>, key: impl Into<String>) -> Self {
        Self {
            secure_store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Persist `session`, replacing any previous one.
    pub async fn save(&self, session: &AuthSession) -> Result<()> {
        let json = serde_json::to_vec(session)
            .map_err(|e| SupabaseError::SessionStorage(format!("serialization failed: {}", e)))?;

        self.secure_store
            .set_secret(&self.key, &json)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to persist session");
                SupabaseError::SessionStorage(e.to_string())
            })?;

        debug!(
            user_id = %session.user.id,
            expires_at = %session.expires_at,
            "Session persisted"
        );
        Ok(())
    }

    /// Load the persisted session.
    ///
    /// Returns `Ok(None)` when nothing is stored or the stored entry is
    /// unreadable; an unreadable entry is deleted.
    pub async fn load(&self) -> Result<Option<AuthSession>> {
        let data = self.secure_store.get_secret(&self.key).await.map_err(|e| {
            warn!(error = %e, "Failed to read persisted session");
            SupabaseError::SessionStorage(e.to_string())
        })?;

        let Some(data) = data else {
            debug!("No persisted session");
            return Ok(None);
        };

        match serde_json::from_slice::<AuthSession>(&data) {
            Ok(session) => {
                debug!(user_id = %session.user.id, "Persisted session loaded");
                Ok(Some(session))
            }
            Err(e) => {
                warn!(error = %e, "Persisted session is corrupted, discarding it");
                if let Err(delete_err) = self.secure_store.delete_secret(&self.key).await {
                    warn!(error = %delete_err, "Failed to delete corrupted session");
                }
                Ok(None)
            }
        }
    }

    /// Remove the persisted session. Idempotent.
    pub async fn clear(&self) -> Result<()> {
        self.secure_store
            .delete_secret(&self.key)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to delete persisted session");
                SupabaseError::SessionStorage(e.to_string())
            })?;

        info!("Persisted session removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::backend::{Identity, UserId};
    use chrono::{Duration, Utc};
    use core_async::sync::Mutex;
    use std::collections::HashMap;

    struct MockSecureStore {
        storage: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MockSecureStore {
        fn new() -> Self {
            Self {
                storage: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl SecureStore for MockSecureStore {
        async fn set_secret(&self, key: &str, value: &[u8]) -> bridge_traits::error::Result<()> {
            self.storage
                .lock()
                .await
                .insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn get_secret(&self, key: &str) -> bridge_traits::error::Result<Option<Vec<u8>>> {
            Ok(self.storage.lock().await.get(key).cloned())
        }

        async fn delete_secret(&self, key: &str) -> bridge_traits::error::Result<()> {
            self.storage.lock().await.remove(key);
            Ok(())
        }
    }

    fn session() -> AuthSession {
        AuthSession {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            token_type: "bearer".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
            user: Identity {
                id: UserId::from("user-1"),
                email: Some("a@b.com".to_string()),
            },
        }
    }

    #[tokio::test]
    async fn test_save_and_load_session() {
        let store = SessionStore::new(Arc::new(MockSecureStore::new()));
        let session = session();

        store.save(&session).await.unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded, Some(session));
    }

    #[tokio::test]
    async fn test_load_missing_session() {
        let store = SessionStore::new(Arc::new(MockSecureStore::new()));
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupted_session_is_discarded() {
        let secure_store = Arc::new(MockSecureStore::new());
        secure_store
            .set_secret(DEFAULT_STORAGE_KEY, b"{not json")
            .await
            .unwrap();
        let store = SessionStore::new(secure_store.clone());

        assert_eq!(store.load().await.unwrap(), None);
        assert!(!secure_store.has_secret(DEFAULT_STORAGE_KEY).await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let store = SessionStore::with_key(Arc::new(MockSecureStore::new()), "custom.key");

        store.save(&session()).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();

        assert_eq!(store.key(), "custom.key");
        assert_eq!(store.load().await.unwrap(), None);
    }
}
