//! Runtime-agnostic async abstraction layer for the Courier Platform Core.
//!
//! Every core-* and provider-* crate spawns tasks, sleeps and synchronizes
//! through this crate instead of naming the executor directly. Today the only
//! backing runtime is Tokio; keeping the seam here means a host with a
//! different event loop only has to swap this crate.
//!
//! # Modules
//!
//! - `task`: Task spawning and join handles
//! - `time`: Sleep, timeout, duration and instant
//! - `sync`: Locks, channels and cooperative cancellation
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let token = CancellationToken::new();
//!     let child = token.clone();
//!
//!     let handle = task::spawn(async move {
//!         core_async::select! {
//!             _ = child.cancelled() => None,
//!             _ = sleep(Duration::from_secs(1)) => Some(42),
//!         }
//!     });
//!
//!     token.cancel();
//!     assert_eq!(handle.await.unwrap(), None);
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};

/// Waits on multiple concurrent branches, returning when the first completes.
pub use tokio::select;
