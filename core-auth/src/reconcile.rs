//! # Driver Reconciliation
//!
//! Converges the driver profile for a signed-in identity with a bounded,
//! linearly backed-off retry loop.
//!
//! ## State machine
//!
//! ```text
//!   Idle ──> Fetching{0} ──ok──> Succeeded
//!                │
//!              error (attempt < last)
//!                │ sleep(base * (attempt + 1))
//!                v
//!            Fetching{n+1} ──error (attempt == last)──> Exhausted
//! ```
//!
//! Each run is one spawned task driving the loop above. Starting a new run
//! cancels the previous one and waits for it to stop before the first fetch,
//! so at most one lookup is in flight at a time. A run whose generation is no
//! longer current ends as [`ReconcileOutcome::Superseded`] and writes nothing.
//!
//! Exhaustion never clears an installed driver: a stale profile is preferred
//! over none.

use crate::store::AuthStore;
use crate::types::Generation;
use bridge_traits::backend::{DriverDirectory, Identity};
use core_async::sync::{watch, CancellationToken};
use core_async::time::sleep;
use core_runtime::config::ReconcilePolicy;
use core_runtime::events::{CoreEvent, DriverEvent, EventBus};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, instrument, warn};

/// Phase of a single reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilePhase {
    Idle,
    /// Lookup with zero-based `attempt` index.
    Fetching { attempt: u32 },
    Succeeded { attempts: u32 },
    Exhausted { attempts: u32, last_error: String },
}

impl ReconcilePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReconcilePhase::Succeeded { .. } | ReconcilePhase::Exhausted { .. }
        )
    }
}

/// How a reconciliation run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The driver was installed after `attempts` lookups.
    Succeeded { attempts: u32 },
    /// Every lookup failed; the previous driver, if any, is untouched.
    Exhausted { attempts: u32, last_error: String },
    /// Cancelled, or overtaken by a newer generation, before finishing.
    Superseded,
}

/// Awaitable handle to a running reconciliation.
///
/// Dropping the handle does not stop the run.
#[derive(Debug, Clone)]
pub struct ReconcileTask {
    generation: Generation,
    outcome: watch::Receiver<Option<ReconcileOutcome>>,
}

impl ReconcileTask {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Outcome if the run already finished.
    pub fn outcome(&self) -> Option<ReconcileOutcome> {
        self.outcome.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Waits for the run to finish.
    pub async fn wait(mut self) -> ReconcileOutcome {
        let outcome = match self.outcome.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        // A run whose task was dropped without reporting was torn down
        outcome.unwrap_or(ReconcileOutcome::Superseded)
    }
}

struct ActiveRun {
    cancel: CancellationToken,
    done: watch::Receiver<Option<ReconcileOutcome>>,
}

/// Drives reconciliation runs against a [`DriverDirectory`].
pub struct DriverReconciler {
    directory: Arc<dyn DriverDirectory>,
    store: AuthStore,
    event_bus: EventBus,
    policy: ReconcilePolicy,
    active: Mutex<Option<ActiveRun>>,
}

impl DriverReconciler {
    pub fn new(
        directory: Arc<dyn DriverDirectory>,
        store: AuthStore,
        event_bus: EventBus,
        policy: ReconcilePolicy,
    ) -> Self {
        Self {
            directory,
            store,
            event_bus,
            policy,
            active: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.policy
    }

    /// Starts a run from attempt 0 for `identity` under `generation`.
    ///
    /// Any previous run is cancelled; the new run begins fetching only after
    /// the previous one has stopped.
    pub fn start(&self, generation: Generation, identity: Identity) -> ReconcileTask {
        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(None);

        let previous = self.replace_active(Some(ActiveRun {
            cancel: cancel.clone(),
            done: done_rx.clone(),
        }));
        if let Some(previous) = &previous {
            previous.cancel.cancel();
        }

        let run = Run {
            directory: Arc::clone(&self.directory),
            store: self.store.clone(),
            event_bus: self.event_bus.clone(),
            policy: self.policy,
            generation,
            identity,
            cancel,
        };

        core_async::spawn(async move {
            if let Some(mut previous) = previous.map(|run| run.done) {
                let _ = previous.wait_for(Option::is_some).await;
            }
            let outcome = run.drive().await;
            done_tx.send_replace(Some(outcome));
        });

        ReconcileTask {
            generation,
            outcome: done_rx,
        }
    }

    /// Cancels the active run, if any. Pending retries are dropped at once;
    /// an in-flight lookup is abandoned and its result discarded.
    pub fn cancel(&self) {
        if let Some(active) = self.replace_active(None) {
            active.cancel.cancel();
        }
    }

    /// Whether a run is still in progress.
    pub fn is_running(&self) -> bool {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active
            .as_ref()
            .is_some_and(|run| run.done.borrow().is_none())
    }

    fn replace_active(&self, next: Option<ActiveRun>) -> Option<ActiveRun> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *active, next)
    }
}

impl Drop for DriverReconciler {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for DriverReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverReconciler")
            .field("policy", &self.policy)
            .field("running", &self.is_running())
            .finish()
    }
}

struct Run {
    directory: Arc<dyn DriverDirectory>,
    store: AuthStore,
    event_bus: EventBus,
    policy: ReconcilePolicy,
    generation: Generation,
    identity: Identity,
    cancel: CancellationToken,
}

impl Run {
    #[instrument(skip(self), fields(user_id = %self.identity.id, generation = %self.generation))]
    async fn drive(self) -> ReconcileOutcome {
        let mut phase = ReconcilePhase::Idle;

        loop {
            phase = match phase {
                ReconcilePhase::Idle => {
                    self.emit(DriverEvent::ReconcileStarted {
                        user_id: self.identity.id.to_string(),
                        generation: self.generation.value(),
                    });
                    ReconcilePhase::Fetching { attempt: 0 }
                }
                ReconcilePhase::Fetching { attempt } => match self.fetch(attempt).await {
                    Some(next) => next,
                    None => return self.superseded(),
                },
                ReconcilePhase::Succeeded { attempts } => {
                    info!(attempts, "Driver profile reconciled");
                    self.emit(DriverEvent::ReconcileSucceeded {
                        user_id: self.identity.id.to_string(),
                        attempts,
                    });
                    return ReconcileOutcome::Succeeded { attempts };
                }
                ReconcilePhase::Exhausted {
                    attempts,
                    last_error,
                } => {
                    if !self.store.finish_exhausted(self.generation) {
                        return self.superseded();
                    }
                    warn!(attempts, error = %last_error, "Driver reconciliation gave up");
                    self.emit(DriverEvent::ReconcileExhausted {
                        user_id: self.identity.id.to_string(),
                        attempts,
                        last_error: last_error.clone(),
                    });
                    return ReconcileOutcome::Exhausted {
                        attempts,
                        last_error,
                    };
                }
            };
        }
    }

    /// One lookup plus, on failure, the backoff before the next one.
    /// Returns `None` if the run was cancelled or overtaken.
    async fn fetch(&self, attempt: u32) -> Option<ReconcilePhase> {
        if self.cancel.is_cancelled() || !self.store.is_current(self.generation) {
            return None;
        }

        debug!(attempt, "Fetching driver profile");
        let result = core_async::select! {
            _ = self.cancel.cancelled() => return None,
            result = self.directory.get_driver_by_id(&self.identity.id) => result,
        };

        let error = match result {
            Ok(record) if record.id != self.identity.id => {
                format!(
                    "driver profile belongs to another identity ({})",
                    record.id
                )
            }
            Ok(record) => {
                return self
                    .store
                    .install_driver(self.generation, record)
                    .then_some(ReconcilePhase::Succeeded {
                        attempts: attempt + 1,
                    });
            }
            Err(error) => error.to_string(),
        };

        if attempt >= self.policy.last_attempt() {
            return Some(ReconcilePhase::Exhausted {
                attempts: attempt + 1,
                last_error: error,
            });
        }

        let delay = self.policy.delay_for(attempt);
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Driver lookup failed, retry scheduled"
        );
        self.emit(DriverEvent::ReconcileRetryScheduled {
            user_id: self.identity.id.to_string(),
            attempt,
            delay_ms: delay.as_millis() as u64,
            error,
        });

        core_async::select! {
            _ = self.cancel.cancelled() => None,
            _ = sleep(delay) => Some(ReconcilePhase::Fetching { attempt: attempt + 1 }),
        }
    }

    fn superseded(&self) -> ReconcileOutcome {
        debug!("Reconciliation superseded");
        self.emit(DriverEvent::ReconcileSuperseded {
            user_id: self.identity.id.to_string(),
            generation: self.generation.value(),
        });
        ReconcileOutcome::Superseded
    }

    fn emit(&self, event: DriverEvent) {
        let _ = self.event_bus.emit(CoreEvent::Driver(event));
    }
}
