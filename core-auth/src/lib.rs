//! # Authentication Module
//!
//! Session bootstrap and driver profile reconciliation for the courier core.
//!
//! ## Overview
//!
//! - [`AuthStore`]: the single owned auth state container, published as
//!   [`AuthSnapshot`]s
//! - [`DriverReconciler`]: bounded, linearly backed-off driver lookup run as an
//!   explicit state machine
//! - [`SessionBootstrapper`]: session restore, change notifications and the
//!   sign-in, sign-up and sign-out operations
//!
//! ## Features
//!
//! - Stale runs are fenced off by a [`Generation`] epoch, so a late lookup can
//!   never resurrect a signed-out user
//! - Failed reconciliation keeps the last known driver profile
//! - Auth and reconciliation events on the shared event bus

pub mod bootstrap;
pub mod error;
pub mod reconcile;
pub mod store;
pub mod types;

#[cfg(test)]
mod test_support;

pub use bootstrap::{BootstrapHandle, SessionBootstrapper};
pub use error::{AuthError, Result};
pub use reconcile::{DriverReconciler, ReconcileOutcome, ReconcilePhase, ReconcileTask};
pub use store::AuthStore;
pub use types::{AuthSnapshot, Generation, Transition};
