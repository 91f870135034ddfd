use bridge_traits::backend::{AuthSession, DriverRecord, Identity, UserId};
use std::fmt;

/// Epoch of the auth state.
///
/// Every transition that changes who is signed in, or that starts a new
/// reconciliation run, moves the store to a new generation. Work started
/// under an older generation can no longer write to the store.
///
/// # Examples
///
/// ```
/// use core_auth::Generation;
///
/// let first = Generation::default();
/// let second = first.next();
/// assert!(second > first);
/// assert_eq!(second.value(), 1);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable view of the auth state handed to consumers.
///
/// `driver` is only ever present together with `session`, and its id always
/// matches `identity.id`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSnapshot {
    pub session: Option<AuthSession>,
    pub identity: Option<Identity>,
    pub driver: Option<DriverRecord>,
    /// True while a session exists and its driver profile is neither
    /// confirmed nor given up on. Also true before the first initialization.
    pub loading: bool,
    pub generation: Generation,
}

impl AuthSnapshot {
    /// State before the persisted session has been looked up.
    pub fn initial() -> Self {
        Self {
            session: None,
            identity: None,
            driver: None,
            loading: true,
            generation: Generation::default(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.identity.as_ref().map(|identity| &identity.id)
    }

    /// Whether an installed driver belongs to `identity`.
    pub fn has_driver_for(&self, identity: &Identity) -> bool {
        self.driver
            .as_ref()
            .is_some_and(|driver| driver.id == identity.id)
    }
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}

/// Result of a store transition that may change who is signed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub generation: Generation,
    /// The identity after the transition differs from the one before it.
    pub identity_changed: bool,
}
