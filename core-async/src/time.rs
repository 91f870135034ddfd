//! Time-related abstractions.
//!
//! `sleep` is a timer-backed deferred continuation: awaiting it yields the
//! task back to the executor until the deadline passes. Under a paused test
//! runtime (`#[tokio::test(start_paused = true)]`) timers advance virtually,
//! which keeps retry schedules deterministic in tests.
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{sleep, Duration, Instant};
//!
//! async fn example() {
//!     let start = Instant::now();
//!     sleep(Duration::from_millis(10)).await;
//!     assert!(start.elapsed() >= Duration::from_millis(10));
//! }
//! ```

pub use tokio::time::{sleep, sleep_until, timeout, Instant, Sleep, Timeout};

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Error returned when a [`timeout`] elapses.
pub use tokio::time::error::Elapsed;
