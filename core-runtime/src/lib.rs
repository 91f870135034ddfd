//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by every courier crate:
//! - Logging and tracing (`tracing` + `tracing-subscriber`, PII redaction)
//! - Configuration (`CoreConfig` builder with fail-fast capability checks)
//! - Event bus (`CoreEvent` over a broadcast channel)
//!
//! ## Overview
//!
//! Nothing in here knows about sessions or drivers beyond the event payloads;
//! the domain logic lives in `core-auth` and the backend connector in
//! `provider-supabase`.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
