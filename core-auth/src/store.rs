//! # Auth State Container
//!
//! `AuthStore` is the single owner of `{session, identity, driver, loading}`.
//! Consumers read immutable [`AuthSnapshot`]s; every mutation goes through one
//! of the transition functions below, each applied atomically to the
//! published snapshot.
//!
//! ## Invariants
//!
//! - A driver is installed only while a session is present, and its id equals
//!   the session identity id.
//! - A driver is only ever replaced whole.
//! - Writes from work started under an older [`Generation`] are rejected.

use crate::types::{AuthSnapshot, Generation, Transition};
use bridge_traits::backend::{AuthSession, DriverRecord};
use core_async::sync::watch;
use std::sync::Arc;
use tracing::{debug, trace};

/// Shared handle to the auth state. Clones refer to the same state.
#[derive(Clone)]
pub struct AuthStore {
    state: Arc<watch::Sender<AuthSnapshot>>,
}

impl AuthStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(AuthSnapshot::initial());
        Self {
            state: Arc::new(state),
        }
    }

    /// Current state.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver that observes every published state.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    pub fn generation(&self) -> Generation {
        self.state.borrow().generation
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation() == generation
    }

    /// Waits until `loading` is false and returns that state.
    pub async fn wait_until_settled(&self) -> AuthSnapshot {
        let mut rx = self.subscribe();
        let settled = match rx.wait_for(|snapshot| !snapshot.loading).await {
            Ok(snapshot) => snapshot.clone(),
            // The sender lives as long as `self`
            Err(_) => self.snapshot(),
        };
        settled
    }

    /// Installs `session` and starts a new reconciliation generation.
    ///
    /// A different identity clears the previous driver first. `loading`
    /// becomes true only if no driver for this identity is installed, so a
    /// token refresh does not flash the consumer back into a loading state.
    pub fn begin_reconciliation(&self, session: AuthSession) -> Transition {
        let mut transition = None;
        self.state.send_modify(|state| {
            let identity = session.user.clone();
            let identity_changed = state.identity.as_ref() != Some(&identity);

            if !state.has_driver_for(&identity) {
                state.driver = None;
            }
            state.loading = state.driver.is_none();
            state.identity = Some(identity);
            state.session = Some(session);
            state.generation = state.generation.next();

            transition = Some(Transition {
                generation: state.generation,
                identity_changed,
            });
        });

        let transition = self.settle(transition);
        debug!(
            generation = %transition.generation,
            identity_changed = transition.identity_changed,
            "Reconciliation generation started"
        );
        transition
    }

    /// Installs a fetched driver record.
    ///
    /// Returns `false` without touching the state if `generation` is stale,
    /// no session is present, or the record belongs to another identity.
    pub fn install_driver(&self, generation: Generation, record: DriverRecord) -> bool {
        let applied = self.state.send_if_modified(|state| {
            let matches_identity = state
                .identity
                .as_ref()
                .is_some_and(|identity| identity.id == record.id);

            if state.generation != generation || state.session.is_none() || !matches_identity {
                return false;
            }

            state.driver = Some(record);
            state.loading = false;
            true
        });

        if !applied {
            trace!(%generation, "Discarded driver record from stale or mismatched run");
        }
        applied
    }

    /// Ends a reconciliation run that gave up. The installed driver is kept.
    pub fn finish_exhausted(&self, generation: Generation) -> bool {
        self.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            state.loading = false;
            true
        })
    }

    /// Applies a resolved login or registration response directly.
    ///
    /// The record is only installed if its id matches the session identity.
    pub fn signed_in(&self, session: AuthSession, record: DriverRecord) -> Transition {
        let mut transition = None;
        self.state.send_modify(|state| {
            let identity = session.user.clone();
            let identity_changed = state.identity.as_ref() != Some(&identity);

            state.driver = (record.id == identity.id).then_some(record);
            state.identity = Some(identity);
            state.session = Some(session);
            state.loading = false;
            state.generation = state.generation.next();

            transition = Some(Transition {
                generation: state.generation,
                identity_changed,
            });
        });
        self.settle(transition)
    }

    /// Clears session, identity and driver; `loading` becomes false.
    pub fn signed_out(&self) -> Transition {
        let mut transition = None;
        self.state.send_modify(|state| {
            let identity_changed = state.identity.is_some();

            state.session = None;
            state.identity = None;
            state.driver = None;
            state.loading = false;
            state.generation = state.generation.next();

            transition = Some(Transition {
                generation: state.generation,
                identity_changed,
            });
        });
        self.settle(transition)
    }

    /// Like [`signed_out`](Self::signed_out), but only if nothing moved the
    /// state past `generation` in the meantime.
    pub fn signed_out_if_current(&self, generation: Generation) -> Option<Transition> {
        let mut transition = None;
        self.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            let identity_changed = state.identity.is_some();

            state.session = None;
            state.identity = None;
            state.driver = None;
            state.loading = false;
            state.generation = state.generation.next();

            transition = Some(Transition {
                generation: state.generation,
                identity_changed,
            });
            true
        });
        transition
    }

    // send_modify runs its closure synchronously, so the slot is always filled.
    fn settle(&self, transition: Option<Transition>) -> Transition {
        transition.unwrap_or_else(|| Transition {
            generation: self.generation(),
            identity_changed: false,
        })
    }
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AuthStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("AuthStore")
            .field("authenticated", &state.session.is_some())
            .field("has_driver", &state.driver.is_some())
            .field("loading", &state.loading)
            .field("generation", &state.generation)
            .finish()
    }
}
