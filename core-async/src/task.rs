//! Task spawning and execution abstractions.
//!
//! Tasks spawned here run cooperatively with the caller: they suspend at I/O
//! and timer boundaries and never block the thread that scheduled them.
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//!
//! async fn example() {
//!     let handle = task::spawn(async { 42 });
//!     let result = handle.await.unwrap();
//!     assert_eq!(result, 42);
//! }
//! ```

pub use tokio::task::{yield_now, AbortHandle, JoinError, JoinHandle};

/// Spawns a new asynchronous task on the current runtime.
///
/// # Arguments
///
/// * `future` - The async computation to run
///
/// # Returns
///
/// A `JoinHandle` that can be awaited to get the task's result.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
