//! Error types for the Supabase provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Supabase provider errors
#[derive(Error, Debug)]
pub enum SupabaseError {
    /// The API answered with a non-success status
    #[error("Supabase API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Failed to parse an API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// The persisted session could not be read or written
    #[error("Session storage unavailable: {0}")]
    SessionStorage(String),

    /// The project URL or API key is unusable
    #[error("Invalid Supabase configuration: {0}")]
    InvalidConfig(String),

    /// The call needs a signed-in session and there is none
    #[error("No active session")]
    NotAuthenticated,

    /// Sign-up succeeded but the project requires email confirmation first
    #[error("Email confirmation required for {email}")]
    ConfirmationRequired { email: String },

    /// The identity exists but has no driver profile
    #[error("Account {user_id} is not registered as a driver")]
    NotADriver { user_id: String },

    /// Bridge error
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result type for Supabase operations
pub type Result<T> = std::result::Result<T, SupabaseError>;

impl From<SupabaseError> for BridgeError {
    fn from(error: SupabaseError) -> Self {
        match error {
            SupabaseError::Api { status, message } => BridgeError::Backend {
                status: Some(status),
                message,
            },
            SupabaseError::NotAuthenticated => BridgeError::Backend {
                status: Some(401),
                message: "No active session".to_string(),
            },
            SupabaseError::NotADriver { user_id } => BridgeError::Backend {
                status: Some(403),
                message: format!("Account {} is not registered as a driver", user_id),
            },
            SupabaseError::ConfirmationRequired { email } => {
                BridgeError::backend(format!("Email confirmation required for {}", email))
            }
            SupabaseError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            SupabaseError::InvalidConfig(msg) => {
                BridgeError::OperationFailed(format!("Invalid configuration: {}", msg))
            }
            SupabaseError::SessionStorage(msg) => {
                BridgeError::OperationFailed(format!("Session storage unavailable: {}", msg))
            }
            SupabaseError::Bridge(e) => e,
        }
    }
}
