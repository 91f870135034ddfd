//! Runtime handles.
//!
//! Lets code that may run outside a task (tracing layers, FFI entry points)
//! detect whether an executor is available before spawning onto it.

pub use tokio::runtime::{Builder, Handle, Runtime};
