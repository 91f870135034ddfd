//! # Event Bus System
//!
//! Typed, broadcast-based notifications for hosts that want to observe the
//! session lifecycle and driver reconciliation without polling the auth state.
//!
//! ## Overview
//!
//! - **Event Types**: `AuthEvent` for session transitions, `DriverEvent` for
//!   reconciliation progress, both wrapped in `CoreEvent`
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Receiver wrapper with optional filtering
//!
//! ```text
//! ┌────────────────────┐   emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ SessionBootstrapper├─────────>│           ├────────────>│ Host UI    │
//! └────────────────────┘          │ EventBus  │             └────────────┘
//! ┌────────────────────┐   emit   │           │  subscribe  ┌────────────┐
//! │ DriverReconciler   ├─────────>│           ├────────────>│ Telemetry  │
//! └────────────────────┘          └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
//!
//! let event_bus = EventBus::new(100);
//! let _subscriber = event_bus.subscribe();
//!
//! let event = CoreEvent::Auth(AuthEvent::SignedIn {
//!     user_id: "user-123".to_string(),
//! });
//! event_bus.emit(event).ok();
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events. Non-fatal.
//! - **`RecvError::Closed`**: every sender was dropped. Treat as shutdown.
//!
//! Publishers ignore `SendError`: having no subscribers is not a failure of the
//! transition that produced the event.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session lifecycle events
    Auth(AuthEvent),
    /// Driver profile reconciliation events
    Driver(DriverEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Driver(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Driver(DriverEvent::ReconcileExhausted { .. }) => EventSeverity::Warning,
            CoreEvent::Driver(DriverEvent::ReconcileRetryScheduled { .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Auth(AuthEvent::SignedIn { .. })
            | CoreEvent::Auth(AuthEvent::SignedOut)
            | CoreEvent::Driver(DriverEvent::ReconcileSucceeded { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Session lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// A user signed in through credentials or registration.
    SignedIn { user_id: String },
    /// The session ended, either explicitly or because the provider dropped it.
    SignedOut,
    /// A persisted session was found at startup.
    SessionRestored { user_id: String },
    /// The provider rotated the access token for the current session.
    TokenRefreshed { user_id: String },
    /// An authentication operation failed.
    AuthError {
        message: String,
        /// Whether retrying the same operation might succeed.
        recoverable: bool,
    },
}

impl AuthEvent {
    pub fn description(&self) -> &str {
        match self {
            AuthEvent::SignedIn { .. } => "User signed in",
            AuthEvent::SignedOut => "User signed out",
            AuthEvent::SessionRestored { .. } => "Session restored",
            AuthEvent::TokenRefreshed { .. } => "Access token refreshed",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }
}

// ============================================================================
// Driver Events
// ============================================================================

/// Progress of the driver profile reconciliation loop.
///
/// `attempt` is zero-based, matching the reconciler's phase numbering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum DriverEvent {
    ReconcileStarted {
        user_id: String,
        generation: u64,
    },
    ReconcileRetryScheduled {
        user_id: String,
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    ReconcileSucceeded {
        user_id: String,
        attempts: u32,
    },
    /// All attempts failed. Any previously installed driver is kept.
    ReconcileExhausted {
        user_id: String,
        attempts: u32,
        last_error: String,
    },
    /// A newer chain or a sign-out replaced this one before it finished.
    ReconcileSuperseded {
        user_id: String,
        generation: u64,
    },
}

impl DriverEvent {
    pub fn description(&self) -> &str {
        match self {
            DriverEvent::ReconcileStarted { .. } => "Driver reconciliation started",
            DriverEvent::ReconcileRetryScheduled { .. } => "Driver reconciliation retry scheduled",
            DriverEvent::ReconcileSucceeded { .. } => "Driver profile reconciled",
            DriverEvent::ReconcileExhausted { .. } => "Driver reconciliation gave up",
            DriverEvent::ReconcileSuperseded { .. } => "Driver reconciliation superseded",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for `CoreEvent`s.
///
/// Cloning the bus yields another handle to the same channel.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, DriverEvent, EventBus};
///
/// let event_bus = EventBus::new(16);
/// let mut subscriber = event_bus.subscribe();
///
/// event_bus
///     .emit(CoreEvent::Driver(DriverEvent::ReconcileSucceeded {
///         user_id: "driver-1".to_string(),
///         attempts: 1,
///     }))
///     .ok();
///
/// assert!(subscriber.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus. Subscribers that fall more than `capacity`
    /// events behind receive `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let _driver_events = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Driver(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once all senders are gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive. Returns `None` if nothing matching is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
