//! Authenticated Request Client
//!
//! Every provider call goes through an [`ApiClient`]. The stock implementation,
//! [`AuthenticatedClient`], does four things and nothing else:
//!
//! 1. asks its [`SessionProvider`] for the current session headers,
//! 2. merges the caller's headers over them (caller wins),
//! 3. applies the per-call timeout and sends exactly one request,
//! 4. strips the `while (1) {}` prefix from JSON bodies when the provider
//!    uses it, and classifies non-2xx answers with [`ApiError::from_status`].
//!
//! Retrying is opt-in through [`RetryingClient`](crate::retry::RetryingClient).

use crate::manager::SessionProvider;
use crate::retry::RetryingClient;
use async_trait::async_trait;
use bridge_traits::error::{ApiError, ApiResult};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bytes::Bytes;
use core_runtime::config::CoreConfig;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Literal prefix some providers put in front of JSON bodies.
pub const ANTI_HIJACK_PREFIX: &[u8] = b"while (1) {}";

/// Remove [`ANTI_HIJACK_PREFIX`] from the start of `body`.
///
/// Idempotent: a body without the prefix is returned unchanged.
///
/// ```
/// use core_auth::client::strip_anti_hijack_prefix;
///
/// let once = strip_anti_hijack_prefix(b"while (1) {}{\"id\":\"c1\"}");
/// assert_eq!(once, b"{\"id\":\"c1\"}");
/// assert_eq!(strip_anti_hijack_prefix(once), once);
/// ```
pub fn strip_anti_hijack_prefix(body: &[u8]) -> &[u8] {
    body.strip_prefix(ANTI_HIJACK_PREFIX).unwrap_or(body)
}

/// Decode a successful response body.
///
/// # Errors
///
/// [`ApiError::InvalidResponse`] if the body is not the expected JSON.
pub fn parse_json<T: DeserializeOwned>(response: &HttpResponse) -> ApiResult<T> {
    serde_json::from_slice(&response.body)
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to decode response: {}", e)))
}

/// A provider call, relative to the client's base URL unless absolute.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub endpoint: String,
    pub json: Option<serde_json::Value>,
    pub raw_body: Option<Bytes>,
    pub headers: HashMap<String, String>,
    /// Binary download; the body is never normalized.
    pub stream: bool,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            json: None,
            raw_body: None,
            headers: HashMap::new(),
            stream: false,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, endpoint)
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.json = Some(body);
        self
    }

    /// Raw bytes sent as-is. Takes precedence over `json`.
    pub fn raw_body(mut self, body: Bytes) -> Self {
        self.raw_body = Some(body);
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// Executes provider calls. Implementations never retry on their own.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Send `request` and return the successful response.
    ///
    /// # Errors
    ///
    /// - `AuthFailure` when no session can be acquired, or on 401/403
    /// - `ProviderError` for any other non-2xx, with status and raw body
    /// - `TransportFailure` for network errors and timeouts
    async fn execute(&self, request: ApiRequest) -> ApiResult<HttpResponse>;
}

/// Overlay `overrides` on `base`. Keys compare case-insensitively.
pub fn merge_headers(
    mut base: HashMap<String, String>,
    overrides: &HashMap<String, String>,
) -> HashMap<String, String> {
    for (key, value) in overrides {
        base.retain(|existing, _| !existing.eq_ignore_ascii_case(key));
        base.insert(key.clone(), value.clone());
    }
    base
}

/// [`ApiClient`] bound to one provider's session.
pub struct AuthenticatedClient {
    http_client: Arc<dyn HttpClient>,
    session: Arc<dyn SessionProvider>,
    base_url: String,
    timeout: Duration,
    strip_response_prefix: bool,
}

impl AuthenticatedClient {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        session: Arc<dyn SessionProvider>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http_client,
            session,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            strip_response_prefix: false,
        }
    }

    /// Strip the anti-hijacking prefix from every JSON response.
    pub fn with_response_prefix_stripping(mut self) -> Self {
        self.strip_response_prefix = true;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn resolve(&self, endpoint: &str) -> String {
        if endpoint.starts_with("https://") || endpoint.starts_with("http://") {
            endpoint.to_string()
        } else if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    fn normalize(&self, stream: bool, mut response: HttpResponse) -> HttpResponse {
        if self.strip_response_prefix && !stream && response.is_json() {
            let stripped = strip_anti_hijack_prefix(&response.body);
            if stripped.len() != response.body.len() {
                response.body = response.body.slice(response.body.len() - stripped.len()..);
            }
        }
        response
    }
}

/// Request client for `base_url` with the timeout of `config`, wrapped in a
/// [`RetryingClient`] when `config` carries a retry policy.
pub fn configured_client(
    config: &CoreConfig,
    session: Arc<dyn SessionProvider>,
    base_url: &str,
    strip_response_prefix: bool,
) -> Arc<dyn ApiClient> {
    let mut client = AuthenticatedClient::new(
        config.http_client.clone(),
        session,
        base_url,
        config.request_timeout,
    );
    if strip_response_prefix {
        client = client.with_response_prefix_stripping();
    }

    match &config.retry_policy {
        Some(policy) => Arc::new(RetryingClient::new(Arc::new(client), policy.clone())),
        None => Arc::new(client),
    }
}

#[async_trait]
impl ApiClient for AuthenticatedClient {
    #[instrument(
        skip(self, request),
        fields(
            service = self.session.service().as_str(),
            method = request.method.as_str(),
            endpoint = %request.endpoint
        )
    )]
    async fn execute(&self, request: ApiRequest) -> ApiResult<HttpResponse> {
        let session_headers = self.session.headers().await.map_err(ApiError::from)?;
        let headers = merge_headers(session_headers, &request.headers);

        let mut http_request = HttpRequest::new(request.method, self.resolve(&request.endpoint))
            .timeout(self.timeout);
        http_request.headers = headers;

        if let Some(raw) = request.raw_body {
            http_request = http_request.body(raw);
        } else if let Some(json) = &request.json {
            let body = serde_json::to_vec(json).map_err(|e| {
                ApiError::InvalidResponse(format!("Failed to encode request body: {}", e))
            })?;
            http_request = http_request.body(Bytes::from(body));
        }

        let response = self.http_client.execute(http_request).await.map_err(|e| {
            warn!(error = %e, "Request failed before a response was received");
            ApiError::from(e)
        })?;

        if !response.is_success() {
            let body = response.text_lossy();
            debug!(status = response.status, "Provider returned an error status");
            return Err(ApiError::from_status(response.status, body));
        }

        Ok(self.normalize(request.stream, response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuthError, Result as AuthResult};
    use crate::test_support::MockHttp;
    use crate::types::{ServiceId, Session};
    use bridge_traits::error::BridgeError;

    struct StaticSession {
        headers: Option<HashMap<String, String>>,
    }

    #[async_trait]
    impl SessionProvider for StaticSession {
        fn service(&self) -> ServiceId {
            ServiceId::Lightroom
        }

        async fn acquire_session(&self) -> AuthResult<Session> {
            Err(AuthError::NotAuthenticated {
                service: "Adobe Lightroom".to_string(),
            })
        }

        async fn is_valid(&self) -> bool {
            self.headers.is_some()
        }

        async fn headers(&self) -> AuthResult<HashMap<String, String>> {
            self.headers.clone().ok_or(AuthError::NotAuthenticated {
                service: "Adobe Lightroom".to_string(),
            })
        }
    }

    fn adobe_headers() -> Option<HashMap<String, String>> {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer eyJ".to_string());
        headers.insert("X-API-Key".to_string(), "client".to_string());
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Some(headers)
    }

    fn response(status: u16, content_type: &str, body: &'static str) -> HttpResponse {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), content_type.to_string());
        HttpResponse {
            status,
            headers,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    fn client(http: MockHttp, headers: Option<HashMap<String, String>>) -> AuthenticatedClient {
        AuthenticatedClient::new(
            Arc::new(http),
            Arc::new(StaticSession { headers }),
            "https://lr.adobe.io/",
            Duration::from_secs(5),
        )
        .with_response_prefix_stripping()
    }

    #[test]
    fn test_strip_prefix_is_idempotent() {
        let body = b"while (1) {}{\"base\":\"x\"}";
        let once = strip_anti_hijack_prefix(body);
        assert_eq!(once, b"{\"base\":\"x\"}");
        assert_eq!(strip_anti_hijack_prefix(once), once);
        assert_eq!(strip_anti_hijack_prefix(b""), b"");
    }

    #[test]
    fn test_prefix_only_matches_at_start() {
        let body = b" {\"a\":\"while (1) {}\"}";
        assert_eq!(strip_anti_hijack_prefix(body), body);
    }

    #[test]
    fn test_merge_headers_caller_wins_case_insensitive() {
        let mut overrides = HashMap::new();
        overrides.insert("content-type".to_string(), "image/jpeg".to_string());

        let merged = merge_headers(adobe_headers().unwrap(), &overrides);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get("content-type").map(String::as_str), Some("image/jpeg"));
        assert!(!merged.contains_key("Content-Type"));
        assert_eq!(merged.get("X-API-Key").map(String::as_str), Some("client"));
    }

    #[tokio::test]
    async fn test_execute_merges_headers_and_strips_json() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|req| {
                req.url == "https://lr.adobe.io/v2/catalog"
                    && req.headers.get("If-None-Match").map(String::as_str) == Some("*")
                    && req.headers.get("Authorization").map(String::as_str) == Some("Bearer eyJ")
                    && req.timeout == Some(Duration::from_secs(5))
            })
            .times(1)
            .returning(|_| Ok(response(200, "application/json;charset=utf-8", "while (1) {}{\"id\":\"cat\"}")));

        let resp = client(http, adobe_headers())
            .execute(ApiRequest::get("/v2/catalog").header("If-None-Match", "*"))
            .await
            .unwrap();

        let value: serde_json::Value = parse_json(&resp).unwrap();
        assert_eq!(value["id"], "cat");
    }

    #[tokio::test]
    async fn test_streamed_body_is_untouched() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, "application/json", "while (1) {}raw")));

        let resp = client(http, adobe_headers())
            .execute(ApiRequest::get("https://content.example/file").streaming())
            .await
            .unwrap();
        assert_eq!(&resp.body[..], b"while (1) {}raw");
    }

    #[tokio::test]
    async fn test_non_json_body_is_untouched() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, "text/plain", "while (1) {}text")));

        let resp = client(http, adobe_headers())
            .execute(ApiRequest::get("v2/health"))
            .await
            .unwrap();
        assert_eq!(&resp.body[..], b"while (1) {}text");
    }

    #[tokio::test]
    async fn test_error_status_is_classified_verbatim() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(412, "application/json", "{\"code\":1005}")));

        let err = client(http, adobe_headers())
            .execute(ApiRequest::put("/v2/catalogs/c/assets/a"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::ProviderError {
                status: 412,
                body: "{\"code\":1005}".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_failure() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(401, "application/json", "{}")));

        let err = client(http, adobe_headers())
            .execute(ApiRequest::get("/v2/account"))
            .await
            .unwrap_err();
        assert!(err.is_auth_failure());
    }

    #[tokio::test]
    async fn test_missing_session_is_auth_failure_without_network() {
        let mut http = MockHttp::new();
        http.expect_execute().never();

        let err = client(http, None)
            .execute(ApiRequest::get("/v2/account"))
            .await
            .unwrap_err();
        assert!(err.is_auth_failure());
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_retried() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::Timeout("deadline elapsed".to_string())));

        let err = client(http, adobe_headers())
            .execute(ApiRequest::get("/v2/account"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::TransportFailure(_)));
    }

    #[tokio::test]
    async fn test_raw_body_takes_precedence() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|req| req.body.as_deref() == Some(&b"\xff\xd8"[..]))
            .times(1)
            .returning(|_| Ok(response(201, "application/json", "")));

        client(http, adobe_headers())
            .execute(
                ApiRequest::put("/v2/catalogs/c/assets/a/master")
                    .json(serde_json::json!({"ignored": true}))
                    .raw_body(Bytes::from_static(b"\xff\xd8")),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_configured_client_retries_with_policy() {
        use crate::test_support::MemorySecureStore;
        use bridge_traits::http::RetryPolicy;

        let mut http = MockHttp::new();
        let mut seq = mockall::Sequence::new();
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(503, "text/plain", "busy")));
        http.expect_execute()
            .withf(|req| req.timeout == Some(Duration::from_secs(7)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(200, "application/json", "while (1) {}{}")));

        let config = CoreConfig::builder()
            .http_client(Arc::new(http))
            .secure_store(Arc::new(MemorySecureStore::default()))
            .request_timeout(Duration::from_secs(7))
            .retry_policy(RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                use_exponential_backoff: false,
            })
            .build()
            .unwrap();

        let client = configured_client(
            &config,
            Arc::new(StaticSession {
                headers: adobe_headers(),
            }),
            "https://lr.adobe.io",
            true,
        );

        let resp = client.execute(ApiRequest::get("/v2/account")).await.unwrap();
        assert_eq!(&resp.body[..], b"{}");
    }
}
