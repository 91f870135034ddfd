use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is not registered as a driver")]
    NotADriver,

    #[error("Driver lookup failed: {0}")]
    DriverLookupFailed(String),

    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Sign-out failed: {0}")]
    SignOutFailed(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl AuthError {
    /// Classify a failed login call from the driver directory.
    pub fn from_login(err: BridgeError) -> Self {
        match err.status() {
            Some(400) | Some(401) => AuthError::InvalidCredentials,
            Some(403) => AuthError::NotADriver,
            Some(_) => AuthError::AuthenticationFailed(err.to_string()),
            None => AuthError::Bridge(err),
        }
    }

    /// Classify a failed registration call.
    pub fn from_registration(err: BridgeError) -> Self {
        match err.status() {
            Some(_) => AuthError::RegistrationFailed(err.to_string()),
            None => AuthError::Bridge(err),
        }
    }

    /// Whether repeating the same operation might succeed without user input.
    pub fn is_recoverable(&self) -> bool {
        match self {
            AuthError::InvalidCredentials
            | AuthError::NotADriver
            | AuthError::RegistrationFailed(_)
            | AuthError::NotAuthenticated => false,
            AuthError::Bridge(BridgeError::Backend {
                status: Some(status),
                ..
            }) => *status >= 500 || *status == 429,
            _ => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
