//! OAuth 2.0 Authorization Flow Manager with PKCE Support
//!
//! This module implements the authorization code grant (RFC 6749) with
//! optional PKCE (RFC 7636), parameterised so that both services can share it.
//!
//! # Overview
//!
//! The OAuth flow manager handles:
//! - Building authorization URLs, with a PKCE challenge when enabled
//! - Exchanging authorization codes for a [`Session`]
//! - Refreshing access tokens
//! - State verification for CSRF protection
//!
//! Provider differences are data in [`OAuthConfig`]: scope separator,
//! whether PKCE is used, a fixed `state`, extra authorization parameters and
//! whether token responses carry the anti-hijacking prefix.
//!
//! Token endpoint calls are single attempts. Deciding what to do after a
//! failure belongs to the session manager.
//!
//! # Security
//!
//! - Generates cryptographically secure random state and code verifier
//! - Never logs sensitive values (tokens, codes, verifiers)
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::OAuthFlowManager;
//! use core_auth::providers::google_oauth_config_with;
//! use std::sync::Arc;
//!
//! # async fn example() -> core_auth::Result<()> {
//! # use bridge_traits::http::HttpClient;
//! # let http_client: Arc<dyn HttpClient> = todo!();
//! let config = google_oauth_config_with("client-id", Some("client-secret".to_string()));
//!
//! let flow_manager = OAuthFlowManager::new(config, http_client);
//! let (auth_url, pkce_verifier) = flow_manager.build_auth_url()?;
//! // Send the user to auth_url, then:
//! // let session = flow_manager.exchange_code(code, Some(state), &pkce_verifier).await?;
//! # Ok(())
//! # }
//! ```

use crate::client::strip_anti_hijack_prefix;
use crate::error::{AuthError, Result};
use crate::types::{ServiceId, Session};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::time::{Clock, SystemClock};
use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(60);

/// OAuth 2.0 provider configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub service: ServiceId,
    pub client_id: String,
    /// Sent to the token endpoint when present
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Separator used when joining `scopes` (`" "` or `","`)
    pub scope_separator: String,
    pub auth_url: String,
    pub token_url: String,
    /// Add an S256 code challenge and send the verifier on exchange
    pub use_pkce: bool,
    /// Use this `state` instead of a random one
    pub fixed_state: Option<String>,
    /// Additional query parameters for the authorization URL
    pub extra_auth_params: Vec<(String, String)>,
    /// Token responses may start with `while (1) {}`
    pub strip_response_prefix: bool,
}

impl OAuthConfig {
    fn joined_scopes(&self) -> String {
        self.scopes.join(&self.scope_separator)
    }
}

/// PKCE (Proof Key for Code Exchange) verifier and the flow's `state`.
///
/// # Security
///
/// The verifier must be kept secret and never transmitted to the authorization server.
/// Only the challenge (derived from the verifier) is sent during authorization.
#[derive(Clone)]
pub struct PkceVerifier {
    verifier: String,
    state: String,
}

impl PkceVerifier {
    /// Create a verifier with a random 32-byte code verifier and a random
    /// 16-byte state, both base64-url-encoded without padding.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);
        let state = URL_SAFE_NO_PAD.encode(state_bytes);

        Self { verifier, state }
    }

    /// Replace the random state with a fixed one.
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// S256 method: BASE64URL(SHA256(code_verifier))
    pub fn challenge(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.verifier.as_bytes());
        let hash = hasher.finalize();
        URL_SAFE_NO_PAD.encode(hash)
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceVerifier")
            .field("verifier", &"[REDACTED]")
            .field("state", &self.state)
            .finish()
    }
}

/// OAuth 2.0 flow manager for one service.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl OAuthFlowManager {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
            clock: Arc::new(SystemClock),
            timeout: DEFAULT_TOKEN_TIMEOUT,
        }
    }

    /// Time source used to turn `expires_in` into `expires_at`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Timeout for token endpoint calls.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the authorization URL.
    ///
    /// Returns the URL and the verifier holding the `state` the callback must
    /// echo; keep it for [`exchange_code`](Self::exchange_code).
    ///
    /// # Errors
    ///
    /// Returns an error if the configured authorization URL cannot be parsed.
    #[instrument(skip(self), fields(service = self.config.service.as_str()))]
    pub fn build_auth_url(&self) -> Result<(String, PkceVerifier)> {
        let mut verifier = PkceVerifier::new();
        if let Some(state) = &self.config.fixed_state {
            verifier = verifier.with_state(state.clone());
        }

        let mut url = Url::parse(&self.config.auth_url).map_err(|e| {
            AuthError::AuthenticationFailed {
                service: self.config.service.to_string(),
                reason: format!("Invalid auth URL: {}", e),
            }
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("redirect_uri", &self.config.redirect_uri);
            query.append_pair("response_type", "code");
            query.append_pair("scope", &self.config.joined_scopes());
            query.append_pair("state", verifier.state());
            if self.config.use_pkce {
                query.append_pair("code_challenge", &verifier.challenge());
                query.append_pair("code_challenge_method", "S256");
            }
            for (key, value) in &self.config.extra_auth_params {
                query.append_pair(key, value);
            }
        }

        debug!("Built authorization URL");

        Ok((url.to_string(), verifier))
    }

    /// Exchange an authorization code for a session.
    ///
    /// `returned_state` is the state seen by the transport, if it saw one.
    /// A pasted code carries no state and passes `None`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::StateMismatch`] if the returned state differs
    /// - [`AuthError::InvalidAuthCode`] if the token endpoint rejects the code
    /// - [`AuthError::Network`] on transport failure
    #[instrument(skip(self, code, returned_state, verifier), fields(service = self.config.service.as_str()))]
    pub async fn exchange_code(
        &self,
        code: &str,
        returned_state: Option<&str>,
        verifier: &PkceVerifier,
    ) -> Result<Session> {
        if let Some(state) = returned_state {
            if state != verifier.state() {
                warn!("OAuth state mismatch on code exchange");
                return Err(AuthError::StateMismatch);
            }
        }

        let mut params: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.config.redirect_uri),
            ("client_id", &self.config.client_id),
        ];
        if self.config.use_pkce {
            params.push(("code_verifier", verifier.verifier()));
        }
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret));
        }

        debug!("Exchanging authorization code for tokens");

        let response = self
            .post_form(&params)
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !response.is_success() {
            let body = response.text_lossy();
            warn!(status = response.status, "Token endpoint rejected authorization code");
            return Err(AuthError::InvalidAuthCode(format!(
                "Token endpoint returned {}: {}",
                response.status, body
            )));
        }

        let token_response = self.parse_token_response(&response)?;
        let session = self.session_from(token_response, None);

        info!(expires_at = %session.expires_at, "Exchanged authorization code for tokens");
        Ok(session)
    }

    /// Refresh an access token. A response without a refresh token keeps
    /// the previous one.
    ///
    /// # Errors
    ///
    /// Every failure, including transport errors, is reported as
    /// [`AuthError::TokenRefreshFailed`].
    #[instrument(skip(self, refresh_token), fields(service = self.config.service.as_str()))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<Session> {
        let mut params: Vec<(&str, &str)> = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.config.client_id),
        ];
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret));
        }

        debug!("Refreshing access token");

        let response = self
            .post_form(&params)
            .await
            .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

        if !response.is_success() {
            let body = response.text_lossy();
            warn!(status = response.status, "Token refresh rejected");
            return Err(AuthError::TokenRefreshFailed(format!(
                "Token endpoint returned {}: {}",
                response.status, body
            )));
        }

        let token_response = self
            .parse_token_response(&response)
            .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;
        let session = self.session_from(token_response, Some(refresh_token));

        info!(expires_at = %session.expires_at, "Access token refreshed");
        Ok(session)
    }

    async fn post_form(
        &self,
        params: &[(&str, &str)],
    ) -> std::result::Result<HttpResponse, bridge_traits::BridgeError> {
        let encoded = serde_urlencoded::to_string(params).map_err(|e| {
            bridge_traits::BridgeError::OperationFailed(format!(
                "Failed to encode token request: {}",
                e
            ))
        })?;

        let request = HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .body(Bytes::from(encoded))
            .timeout(self.timeout);

        self.http_client.execute(request).await
    }

    fn parse_token_response(&self, response: &HttpResponse) -> Result<TokenResponse> {
        let body: &[u8] = if self.config.strip_response_prefix {
            strip_anti_hijack_prefix(&response.body)
        } else {
            &response.body
        };

        let parsed: TokenResponse = serde_json::from_slice(body)?;
        if parsed.access_token.is_empty() {
            return Err(AuthError::AuthenticationFailed {
                service: self.config.service.to_string(),
                reason: "Token response has an empty access token".to_string(),
            });
        }
        Ok(parsed)
    }

    fn session_from(&self, response: TokenResponse, previous_refresh: Option<&str>) -> Session {
        let expires_at = self.clock.now() + chrono::Duration::seconds(response.expires_in);
        let refresh_token = response
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous_refresh.map(str::to_string));

        let scopes = match response.scope {
            Some(scope) => scope
                .split([' ', ','])
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => self.config.scopes.clone(),
        };

        Session::new(
            self.config.service,
            response.access_token,
            refresh_token,
            expires_at,
        )
        .with_token_type(response.token_type.unwrap_or_else(|| "Bearer".to_string()))
        .with_scopes(scopes)
    }
}

/// JSON answer of the token endpoint.
#[derive(Debug, Deserialize, Serialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{body_of, json_response, MockHttp};
    use bridge_traits::error::BridgeError;
    use bridge_traits::time::FixedClock;
    use chrono::{DateTime, Utc};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn config(service: ServiceId) -> OAuthConfig {
        OAuthConfig {
            service,
            client_id: "test-client".to_string(),
            client_secret: Some("secret".to_string()),
            redirect_uri: "http://localhost:8080/callback".to_string(),
            scopes: vec!["scope1".to_string(), "scope2".to_string()],
            scope_separator: " ".to_string(),
            auth_url: "https://provider.example/auth".to_string(),
            token_url: "https://provider.example/token".to_string(),
            use_pkce: true,
            fixed_state: None,
            extra_auth_params: vec![("access_type".to_string(), "offline".to_string())],
            strip_response_prefix: false,
        }
    }

    fn manager(config: OAuthConfig, http: MockHttp) -> OAuthFlowManager {
        OAuthFlowManager::new(config, Arc::new(http)).with_clock(Arc::new(FixedClock::new(now())))
    }

    #[test]
    fn test_pkce_verifier_generation() {
        let verifier = PkceVerifier::new();
        assert!(!verifier.verifier().is_empty());
        assert!(!verifier.state().is_empty());
        assert_eq!(verifier.challenge(), verifier.challenge());

        let other = PkceVerifier::new();
        assert_ne!(verifier.verifier(), other.verifier());
        assert_ne!(verifier.state(), other.state());
    }

    #[test]
    fn test_pkce_challenge_is_url_safe() {
        let verifier = PkceVerifier {
            verifier: "test_verifier".to_string(),
            state: "test_state".to_string(),
        };
        let challenge = verifier.challenge();
        assert!(!challenge.contains('+'));
        assert!(!challenge.contains('/'));
        assert!(!challenge.contains('='));
    }

    #[test]
    fn test_build_auth_url_with_pkce() {
        let manager = manager(config(ServiceId::GoogleDrive), MockHttp::new());
        let (url, verifier) = manager.build_auth_url().unwrap();

        assert!(url.contains("client_id=test-client"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=scope1+scope2") || url.contains("scope=scope1%20scope2"));
        assert!(url.contains(&format!("state={}", verifier.state())));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn test_build_auth_url_fixed_state_without_pkce() {
        let mut cfg = config(ServiceId::Lightroom);
        cfg.use_pkce = false;
        cfg.scope_separator = ",".to_string();
        cfg.fixed_state = Some("lightroom_sync_state".to_string());
        cfg.extra_auth_params.clear();

        let (url, verifier) = manager(cfg, MockHttp::new()).build_auth_url().unwrap();

        assert_eq!(verifier.state(), "lightroom_sync_state");
        assert!(url.contains("state=lightroom_sync_state"));
        assert!(url.contains("scope=scope1%2Cscope2"));
        assert!(!url.contains("code_challenge"));
    }

    #[test]
    fn test_build_auth_url_invalid_url() {
        let mut cfg = config(ServiceId::GoogleDrive);
        cfg.auth_url = "not a valid url".to_string();
        assert!(manager(cfg, MockHttp::new()).build_auth_url().is_err());
    }

    #[tokio::test]
    async fn test_exchange_code_rejects_state_mismatch() {
        let manager = manager(config(ServiceId::GoogleDrive), MockHttp::new());
        let verifier = PkceVerifier::new();

        let result = manager
            .exchange_code("4/0Abc", Some("forged"), &verifier)
            .await;
        assert!(matches!(result, Err(AuthError::StateMismatch)));
    }

    #[tokio::test]
    async fn test_exchange_code_builds_session() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|req| {
                let body = body_of(req);
                req.method == HttpMethod::Post
                    && req.url == "https://provider.example/token"
                    && body.contains("grant_type=authorization_code")
                    && body.contains("code_verifier=")
                    && body.contains("client_secret=secret")
            })
            .times(1)
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"{"access_token":"ya29.new","refresh_token":"1//r","expires_in":3599,"token_type":"Bearer"}"#,
                ))
            });

        let manager = manager(config(ServiceId::GoogleDrive), http);
        let verifier = PkceVerifier::new();
        let session = manager
            .exchange_code("4/0Abc", Some(verifier.state()), &verifier)
            .await
            .unwrap();

        assert_eq!(session.service, ServiceId::GoogleDrive);
        assert_eq!(session.access_token, "ya29.new");
        assert_eq!(session.refresh_token.as_deref(), Some("1//r"));
        assert_eq!(session.expires_at, now() + chrono::Duration::seconds(3599));
        assert_eq!(session.scopes, vec!["scope1", "scope2"]);
    }

    #[tokio::test]
    async fn test_exchange_code_strips_prefix_and_omits_verifier() {
        let mut cfg = config(ServiceId::Lightroom);
        cfg.use_pkce = false;
        cfg.strip_response_prefix = true;

        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|req| !body_of(req).contains("code_verifier"))
            .times(1)
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"while (1) {}{"access_token":"eyJ.a","refresh_token":"eyJ.r","scope":"openid,lr_partner_apis"}"#,
                ))
            });

        let session = manager(cfg, http)
            .exchange_code("eyJcode", None, &PkceVerifier::new())
            .await
            .unwrap();

        assert_eq!(session.access_token, "eyJ.a");
        assert_eq!(session.expires_at, now() + chrono::Duration::seconds(3600));
        assert_eq!(session.scopes, vec!["openid", "lr_partner_apis"]);
    }

    #[tokio::test]
    async fn test_exchange_code_rejected() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(json_response(400, r#"{"error":"invalid_grant"}"#)));

        let result = manager(config(ServiceId::GoogleDrive), http)
            .exchange_code("bad", None, &PkceVerifier::new())
            .await;

        match result {
            Err(AuthError::InvalidAuthCode(msg)) => assert!(msg.contains("invalid_grant")),
            other => panic!("expected InvalidAuthCode, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_keeps_previous_refresh_token() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|req| body_of(req).contains("grant_type=refresh_token"))
            .times(1)
            .returning(|_| Ok(json_response(200, r#"{"access_token":"ya29.fresh","expires_in":1800}"#)));

        let session = manager(config(ServiceId::GoogleDrive), http)
            .refresh("1//old")
            .await
            .unwrap();

        assert_eq!(session.access_token, "ya29.fresh");
        assert_eq!(session.refresh_token.as_deref(), Some("1//old"));
        assert_eq!(session.expires_at, now() + chrono::Duration::seconds(1800));
    }

    #[tokio::test]
    async fn test_refresh_is_single_attempt() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(json_response(503, "unavailable")));

        let result = manager(config(ServiceId::GoogleDrive), http)
            .refresh("1//old")
            .await;
        assert!(matches!(result, Err(AuthError::TokenRefreshFailed(_))));
    }

    #[tokio::test]
    async fn test_refresh_transport_failure() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::Timeout("Request timed out".to_string())));

        let result = manager(config(ServiceId::Lightroom), http)
            .refresh("eyJ.r")
            .await;
        assert!(matches!(result, Err(AuthError::TokenRefreshFailed(_))));
    }

    #[test]
    fn test_token_response_minimal() {
        let response: TokenResponse = serde_json::from_str(r#"{"access_token":"token"}"#).unwrap();
        assert_eq!(response.refresh_token, None);
        assert_eq!(response.expires_in, 3600);
    }
}
