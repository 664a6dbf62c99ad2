use bridge_traits::error::{ApiError, BridgeError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{service} is not authenticated")]
    NotAuthenticated { service: String },

    #[error("{service} authentication failed: {reason}")]
    AuthenticationFailed { service: String, reason: String },

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Invalid authorization code: {0}")]
    InvalidAuthCode(String),

    #[error("OAuth state mismatch")]
    StateMismatch,

    #[error("Timed out waiting for {service} authorization after {seconds}s")]
    AuthorizationTimeout { service: String, seconds: u64 },

    #[error("Credential storage failed: {0}")]
    Storage(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(String),
}

impl AuthError {
    /// Whether a later attempt may succeed without user interaction.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AuthError::Network(_) | AuthError::Storage(_))
    }
}

impl From<BridgeError> for AuthError {
    fn from(err: BridgeError) -> Self {
        AuthError::Network(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::AuthFailure(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
