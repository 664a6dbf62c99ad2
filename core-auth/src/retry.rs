//! Opt-in retry wrapper around an [`ApiClient`].

use crate::client::{ApiClient, ApiRequest};
use async_trait::async_trait;
use bridge_traits::error::{ApiError, ApiResult};
use bridge_traits::http::{HttpResponse, RetryPolicy};
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether a failed call may succeed when repeated unchanged.
///
/// Transport failures, 5xx and 429 are transient. Authentication failures,
/// missing resources and other 4xx are not.
pub fn is_retryable(error: &ApiError) -> bool {
    match error {
        ApiError::TransportFailure(_) => true,
        ApiError::ProviderError { status, .. } => *status >= 500 || *status == 429,
        _ => false,
    }
}

/// Retries transient failures with the backoff of a [`RetryPolicy`].
pub struct RetryingClient {
    inner: Arc<dyn ApiClient>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn ApiClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl ApiClient for RetryingClient {
    async fn execute(&self, request: ApiRequest) -> ApiResult<HttpResponse> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.inner.execute(request.clone()).await {
                Ok(response) => {
                    if attempt > 1 {
                        debug!(attempt, endpoint = %request.endpoint, "Request succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(e) if attempt < max_attempts && is_retryable(&e) => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        endpoint = %request.endpoint,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
