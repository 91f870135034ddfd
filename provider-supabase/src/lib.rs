//! # Supabase Provider
//!
//! Implements the backend contracts (`IdentityProvider`, `DriverDirectory`)
//! against a Supabase project.
//!
//! ## Overview
//!
//! This module provides:
//! - Password sign-in, sign-up, sign-out and token refresh via the GoTrue API
//! - Session persistence in the host `SecureStore`
//! - Change notifications for sign-in, sign-out and token refresh
//! - Driver profile lookup and creation via PostgREST (`/rest/v1/drivers`)
//!
//! Both connectors share a [`SupabaseClient`], which carries the project URL,
//! the anonymous API key and the host `HttpClient`.

pub mod auth;
pub mod client;
pub mod directory;
pub mod error;
pub mod session_store;
pub mod types;

pub use auth::SupabaseIdentityProvider;
pub use client::SupabaseClient;
pub use directory::SupabaseDriverDirectory;
pub use error::{Result, SupabaseError};
pub use session_store::SessionStore;
