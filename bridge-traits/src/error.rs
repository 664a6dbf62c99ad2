use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Uniform classification of a failed call against a remote provider.
///
/// Transport problems, authentication problems and provider-side rejections
/// are kept apart so callers can decide what is fatal to a run and what is
/// scoped to a single item.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Session unobtainable, or the provider answered 401/403.
    #[error("Authentication failure: {0}")]
    AuthFailure(String),

    /// A required scope or container does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-2xx answer. Status and raw body are kept verbatim.
    #[error("Provider returned HTTP {status}: {body}")]
    ProviderError { status: u16, body: String },

    /// Network failure or timeout before a status was received.
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// A 2xx answer whose body could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Classify a non-2xx status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => ApiError::AuthFailure(format!("HTTP {}: {}", status, body)),
            _ => ApiError::ProviderError { status, body },
        }
    }

    /// HTTP status carried by the error, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ProviderError { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::AuthFailure(_))
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        ApiError::TransportFailure(err.to_string())
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        assert!(ApiError::from_status(401, "expired").is_auth_failure());
        assert!(ApiError::from_status(403, "denied").is_auth_failure());

        match ApiError::from_status(412, "precondition failed") {
            ApiError::ProviderError { status, body } => {
                assert_eq!(status, 412);
                assert_eq!(body, "precondition failed");
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_404_is_provider_error_by_default() {
        // Only scope resolution promotes 404 to NotFound.
        assert_eq!(ApiError::from_status(404, "").status(), Some(404));
    }

    #[test]
    fn test_bridge_error_is_transport_failure() {
        let err: ApiError = BridgeError::Timeout("30s elapsed".to_string()).into();
        assert!(matches!(err, ApiError::TransportFailure(msg) if msg.contains("30s")));
    }
}
