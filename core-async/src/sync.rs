//! Synchronization primitives.
//!
//! All primitives are async-aware: waiting on a lock or a channel suspends the
//! task instead of blocking the executor thread.
//!
//! - `watch`: single latest value, used for observable state snapshots
//! - `broadcast`: fan-out event delivery
//! - `CancellationToken`: cooperative cancellation of pending work
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{watch, Mutex};
//!
//! async fn example() {
//!     let mutex = Mutex::new(0);
//!     *mutex.lock().await += 1;
//!
//!     let (tx, rx) = watch::channel(false);
//!     tx.send_replace(true);
//!     assert!(*rx.borrow());
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};

pub use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};
