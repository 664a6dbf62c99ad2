//! # Session Manager
//!
//! Owns the OAuth session of one service and hands out usable credentials.
//!
//! ## Acquisition
//!
//! [`SessionManager::acquire_session`] walks a fixed ladder and stops at the
//! first rung that yields a usable session:
//!
//! 1. the in-memory session, if still valid
//! 2. the persisted session, if still valid
//! 3. one refresh with the persisted refresh token
//! 4. the interactive authorization flow, bounded by the authorization timeout
//!
//! A session is valid iff `now < expires_at - 5 minutes`. Whatever rung
//! produced a new session, it is persisted before it is returned.
//!
//! Acquisition is serialized per manager, so a refresh and its write complete
//! before any other caller reads the session.
//!
//! ## Variants
//!
//! [`SessionManager::google`] and [`SessionManager::adobe`] differ only in
//! how the pasted or redirected code is cleaned and which headers a request
//! carries. Which transport delivers the code is up to the injected
//! [`AuthCodeReceiver`].
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::{providers, SessionManager, SessionProvider};
//! use std::sync::Arc;
//! # use bridge_traits::{AuthCodeReceiver, HttpClient, SecureStore};
//! # async fn example(
//! #     http: Arc<dyn HttpClient>,
//! #     store: Arc<dyn SecureStore>,
//! #     receiver: Arc<dyn AuthCodeReceiver>,
//! # ) -> core_auth::Result<()> {
//! let config = providers::adobe_oauth_config()?;
//! let adobe = SessionManager::adobe(config, http, store, receiver);
//!
//! let headers = adobe.headers().await?;
//! assert!(headers.contains_key("X-API-Key"));
//! # Ok(())
//! # }
//! ```

use crate::credential_store::CredentialStore;
use crate::error::{AuthError, Result};
use crate::oauth::{OAuthConfig, OAuthFlowManager};
use crate::types::{AuthStatus, ServiceId, Session};
use async_trait::async_trait;
use bridge_traits::auth::{AuthCodeReceiver, AuthorizationPrompt};
use bridge_traits::http::HttpClient;
use bridge_traits::storage::SecureStore;
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::config::{CoreConfig, DEFAULT_AUTHORIZATION_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Shortest Adobe authorization code accepted after cleaning.
pub const MIN_ADOBE_CODE_LEN: usize = 10;

/// Source of usable credentials for one service.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    fn service(&self) -> ServiceId;

    /// Return a session that is valid now, refreshing or re-authorizing as
    /// needed.
    async fn acquire_session(&self) -> Result<Session>;

    /// Whether a valid session exists without refreshing or prompting.
    async fn is_valid(&self) -> bool;

    /// Request headers for the current session. Acquires one if necessary.
    async fn headers(&self) -> Result<HashMap<String, String>>;
}

/// Service-specific mechanics.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionVariant {
    /// Bearer header only; the code arrives from the redirect listener.
    Google,
    /// Bearer plus `X-API-Key`; the code is pasted and may carry trailing
    /// query parameters.
    Adobe { api_key: String },
}

impl SessionVariant {
    fn clean_code(&self, raw: &str) -> Result<String> {
        let trimmed = raw.trim();
        match self {
            SessionVariant::Google => {
                if trimmed.is_empty() {
                    return Err(AuthError::InvalidAuthCode(
                        "Authorization code is empty".to_string(),
                    ));
                }
                Ok(trimmed.to_string())
            }
            SessionVariant::Adobe { .. } => {
                let code = trimmed.split('&').next().unwrap_or_default().trim();
                if code.len() < MIN_ADOBE_CODE_LEN {
                    return Err(AuthError::InvalidAuthCode(format!(
                        "Authorization code is too short ({} characters)",
                        code.len()
                    )));
                }
                Ok(code.to_string())
            }
        }
    }

    fn headers(&self, session: &Session) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), session.authorization_value());
        if let SessionVariant::Adobe { api_key } = self {
            headers.insert("X-API-Key".to_string(), api_key.clone());
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }
        headers
    }
}

/// OAuth session owner for one service.
pub struct SessionManager {
    service: ServiceId,
    variant: SessionVariant,
    oauth: OAuthFlowManager,
    redirect_uri: String,
    store: CredentialStore,
    receiver: Arc<dyn AuthCodeReceiver>,
    clock: Arc<dyn Clock>,
    authorization_timeout: Duration,
    current: RwLock<Option<Session>>,
    acquire_lock: Mutex<()>,
    event_bus: Option<EventBus>,
}

impl SessionManager {
    /// Google Drive session.
    pub fn google(
        config: OAuthConfig,
        http_client: Arc<dyn HttpClient>,
        secure_store: Arc<dyn SecureStore>,
        receiver: Arc<dyn AuthCodeReceiver>,
    ) -> Self {
        Self::new(SessionVariant::Google, config, http_client, secure_store, receiver)
    }

    /// Adobe Lightroom session. The client id doubles as the API key.
    pub fn adobe(
        config: OAuthConfig,
        http_client: Arc<dyn HttpClient>,
        secure_store: Arc<dyn SecureStore>,
        receiver: Arc<dyn AuthCodeReceiver>,
    ) -> Self {
        let variant = SessionVariant::Adobe {
            api_key: config.client_id.clone(),
        };
        Self::new(variant, config, http_client, secure_store, receiver)
    }

    /// Build the variant matching `config.service` from runtime configuration.
    pub fn from_config(
        core: &CoreConfig,
        config: OAuthConfig,
        receiver: Arc<dyn AuthCodeReceiver>,
    ) -> Self {
        let manager = match config.service {
            ServiceId::GoogleDrive => Self::google(
                config,
                core.http_client.clone(),
                core.secure_store.clone(),
                receiver,
            ),
            ServiceId::Lightroom => Self::adobe(
                config,
                core.http_client.clone(),
                core.secure_store.clone(),
                receiver,
            ),
        };
        manager
            .with_request_timeout(core.request_timeout)
            .with_authorization_timeout(core.authorization_timeout)
    }

    fn new(
        variant: SessionVariant,
        config: OAuthConfig,
        http_client: Arc<dyn HttpClient>,
        secure_store: Arc<dyn SecureStore>,
        receiver: Arc<dyn AuthCodeReceiver>,
    ) -> Self {
        let service = config.service;
        let redirect_uri = config.redirect_uri.clone();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let oauth = OAuthFlowManager::new(config, http_client)
            .with_clock(clock.clone())
            .with_timeout(DEFAULT_REQUEST_TIMEOUT);

        Self {
            service,
            variant,
            oauth,
            redirect_uri,
            store: CredentialStore::new(secure_store),
            receiver,
            clock,
            authorization_timeout: DEFAULT_AUTHORIZATION_TIMEOUT,
            current: RwLock::new(None),
            acquire_lock: Mutex::new(()),
            event_bus: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.oauth = self.oauth.with_clock(clock.clone());
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Bound on waiting for the interactive code.
    pub fn with_authorization_timeout(mut self, timeout: Duration) -> Self {
        self.authorization_timeout = timeout;
        self
    }

    /// Timeout for token endpoint calls.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.oauth = self.oauth.with_timeout(timeout);
        self
    }

    fn emit(&self, event: AuthEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Auth(event));
        }
    }

    fn emit_error(&self, message: String, recoverable: bool) {
        self.emit(AuthEvent::AuthError {
            service: self.service.as_str().to_string(),
            message,
            recoverable,
        });
    }

    async fn remember(&self, session: &Session) {
        *self.current.write().await = Some(session.clone());
    }

    /// Current authentication state from the persisted record. Never
    /// refreshes or prompts.
    pub async fn status(&self) -> Result<AuthStatus> {
        let Some(session) = self.store.load(self.service).await? else {
            return Ok(AuthStatus::NotAuthenticated);
        };

        if session.is_valid_at(self.clock.now()) {
            Ok(AuthStatus::Valid {
                expires_at: session.expires_at,
            })
        } else {
            Ok(AuthStatus::Expired {
                refreshable: session.has_refresh_token(),
            })
        }
    }

    /// Drop the cached session and delete the persisted record.
    #[instrument(skip(self), fields(service = self.service.as_str()))]
    pub async fn logout(&self) -> Result<()> {
        let _guard = self.acquire_lock.lock().await;
        *self.current.write().await = None;
        self.store.clear(self.service).await?;

        self.emit(AuthEvent::SignedOut {
            service: self.service.as_str().to_string(),
        });
        info!("Signed out");
        Ok(())
    }

    async fn try_refresh(&self, stored: &Session) -> Option<Session> {
        let refresh_token = stored.refresh_token.as_deref().filter(|t| !t.is_empty())?;

        info!("Access token expired, refreshing");
        self.emit(AuthEvent::TokenRefreshing {
            service: self.service.as_str().to_string(),
        });

        match self.oauth.refresh(refresh_token).await {
            Ok(session) if session.is_valid_at(self.clock.now()) => Some(session),
            Ok(_) => {
                warn!("Refreshed token is already inside the expiry margin");
                self.emit_error("Refreshed token expires too soon".to_string(), true);
                None
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, falling back to authorization");
                self.emit_error(format!("Token refresh failed: {}", e), true);
                None
            }
        }
    }

    async fn authorize_interactively(&self) -> Result<Session> {
        self.emit(AuthEvent::SigningIn {
            service: self.service.as_str().to_string(),
        });

        let (auth_url, verifier) = self.oauth.build_auth_url()?;
        let prompt = AuthorizationPrompt {
            service: self.service.display_name().to_string(),
            auth_url,
            redirect_uri: self.redirect_uri.clone(),
            expected_state: Some(verifier.state().to_string()),
        };

        info!("Waiting for interactive authorization");
        let raw_code = match timeout(self.authorization_timeout, self.receiver.receive_code(&prompt)).await {
            Ok(Ok(code)) => code,
            Ok(Err(e)) => {
                return Err(AuthError::AuthenticationFailed {
                    service: self.service.to_string(),
                    reason: format!("No authorization code received: {}", e),
                });
            }
            Err(_) => {
                return Err(AuthError::AuthorizationTimeout {
                    service: self.service.to_string(),
                    seconds: self.authorization_timeout.as_secs(),
                });
            }
        };

        let code = self.variant.clean_code(&raw_code)?;
        // The receiver has already matched `state` when its transport carries one.
        let session = self.oauth.exchange_code(&code, None, &verifier).await?;

        if !session.is_valid_at(self.clock.now()) {
            return Err(AuthError::AuthenticationFailed {
                service: self.service.to_string(),
                reason: "Issued token expires within the validity margin".to_string(),
            });
        }

        Ok(session)
    }

    async fn acquire_locked(&self) -> Result<Session> {
        if let Some(session) = self.current.read().await.as_ref() {
            if session.is_valid_at(self.clock.now()) {
                return Ok(session.clone());
            }
        }

        let stored = self.store.load(self.service).await?;

        if let Some(stored) = &stored {
            if stored.is_valid_at(self.clock.now()) {
                debug!("Using persisted session");
                self.remember(stored).await;
                return Ok(stored.clone());
            }

            if let Some(refreshed) = self.try_refresh(stored).await {
                self.store.save(&refreshed).await?;
                self.remember(&refreshed).await;
                self.emit(AuthEvent::TokenRefreshed {
                    service: self.service.as_str().to_string(),
                    expires_at: refreshed.expires_at.timestamp(),
                });
                return Ok(refreshed);
            }

            if stored.has_refresh_token() {
                // A rejected refresh token is never retried on a later call.
                *self.current.write().await = None;
                self.store.clear(self.service).await?;
            }
        }

        let session = self.authorize_interactively().await?;
        self.store.save(&session).await?;
        self.remember(&session).await;

        self.emit(AuthEvent::SignedIn {
            service: self.service.as_str().to_string(),
            expires_at: session.expires_at.timestamp(),
        });
        info!(expires_at = %session.expires_at, "Authorization completed");

        Ok(session)
    }
}

#[async_trait]
impl SessionProvider for SessionManager {
    fn service(&self) -> ServiceId {
        self.service
    }

    #[instrument(skip(self), fields(service = self.service.as_str()))]
    async fn acquire_session(&self) -> Result<Session> {
        let _guard = self.acquire_lock.lock().await;

        self.acquire_locked().await.map_err(|e| {
            error!(error = %e, "Could not acquire a session");
            self.emit_error(e.to_string(), e.is_recoverable());
            e
        })
    }

    async fn is_valid(&self) -> bool {
        let now = self.clock.now();
        if let Some(session) = self.current.read().await.as_ref() {
            if session.is_valid_at(now) {
                return true;
            }
        }

        match self.store.load(self.service).await {
            Ok(Some(session)) => session.is_valid_at(now),
            _ => false,
        }
    }

    async fn headers(&self) -> Result<HashMap<String, String>> {
        let session = self.acquire_session().await?;
        Ok(self.variant.headers(&session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{adobe_oauth_config_with, google_oauth_config_with};
    use crate::test_support::{body_of, json_response, MemorySecureStore, MockHttp, ScriptedReceiver};
    use bridge_traits::error::BridgeError;
    use bridge_traits::time::FixedClock;
    use chrono::{DateTime, Utc};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    struct Fixture {
        store: Arc<MemorySecureStore>,
        receiver: Arc<ScriptedReceiver>,
        clock: Arc<FixedClock>,
    }

    impl Fixture {
        fn new(receiver: ScriptedReceiver) -> Self {
            Self {
                store: Arc::new(MemorySecureStore::default()),
                receiver: Arc::new(receiver),
                clock: Arc::new(FixedClock::new(now())),
            }
        }

        fn google(&self, http: MockHttp) -> SessionManager {
            SessionManager::google(
                google_oauth_config_with("gid", Some("gsecret".to_string())),
                Arc::new(http),
                self.store.clone(),
                self.receiver.clone(),
            )
            .with_clock(self.clock.clone())
        }

        fn adobe(&self, http: MockHttp) -> SessionManager {
            SessionManager::adobe(
                adobe_oauth_config_with("adobe-key", "p8e", "http://localhost:8080/callback"),
                Arc::new(http),
                self.store.clone(),
                self.receiver.clone(),
            )
            .with_clock(self.clock.clone())
        }

        async fn persist(&self, session: &Session) {
            CredentialStore::new(self.store.clone())
                .save(session)
                .await
                .unwrap();
        }

        async fn persisted(&self, service: ServiceId) -> Option<Session> {
            CredentialStore::new(self.store.clone())
                .load(service)
                .await
                .unwrap()
        }
    }

    fn google_session(expires_in: chrono::Duration, refresh: Option<&str>) -> Session {
        Session::new(
            ServiceId::GoogleDrive,
            "ya29.stored".to_string(),
            refresh.map(str::to_string),
            now() + expires_in,
        )
    }

    #[tokio::test]
    async fn test_valid_persisted_session_needs_no_network() {
        let fx = Fixture::new(ScriptedReceiver::silent());
        fx.persist(&google_session(chrono::Duration::hours(1), Some("1//r")))
            .await;

        let mut http = MockHttp::new();
        http.expect_execute().never();
        let manager = fx.google(http);

        let session = manager.acquire_session().await.unwrap();
        assert_eq!(session.access_token, "ya29.stored");
        assert!(manager.is_valid().await);
        assert_eq!(fx.receiver.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_session_inside_skew_is_refreshed_and_persisted() {
        let fx = Fixture::new(ScriptedReceiver::silent());
        fx.persist(&google_session(chrono::Duration::minutes(4), Some("1//r")))
            .await;

        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|req| body_of(req).contains("grant_type=refresh_token"))
            .times(1)
            .returning(|_| Ok(json_response(200, r#"{"access_token":"ya29.fresh","expires_in":3600}"#)));
        let manager = fx.google(http);

        let session = manager.acquire_session().await.unwrap();
        assert_eq!(session.access_token, "ya29.fresh");
        assert!(session.expires_at - chrono::Duration::minutes(5) > now());

        let persisted = fx.persisted(ServiceId::GoogleDrive).await.unwrap();
        assert_eq!(persisted.access_token, "ya29.fresh");
        assert_eq!(persisted.refresh_token.as_deref(), Some("1//r"));
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_authorization() {
        let fx = Fixture::new(ScriptedReceiver::answering("4/0AbcCode"));
        fx.persist(&google_session(-chrono::Duration::hours(1), Some("1//revoked")))
            .await;

        let mut http = MockHttp::new();
        let mut seq = mockall::Sequence::new();
        http.expect_execute()
            .withf(|req| body_of(req).contains("grant_type=refresh_token"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json_response(400, r#"{"error":"invalid_grant"}"#)));
        http.expect_execute()
            .withf(|req| {
                let body = body_of(req);
                body.contains("grant_type=authorization_code") && body.contains("code=4%2F0AbcCode")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"{"access_token":"ya29.new","refresh_token":"1//new","expires_in":3599}"#,
                ))
            });
        let manager = fx.google(http);

        let session = manager.acquire_session().await.unwrap();
        assert_eq!(session.access_token, "ya29.new");
        assert_eq!(fx.receiver.prompt_count(), 1);

        let prompt = fx.receiver.prompts.lock().unwrap()[0].clone();
        assert_eq!(prompt.service, "Google Drive");
        assert!(prompt.auth_url.contains("code_challenge="));
        assert_eq!(
            fx.persisted(ServiceId::GoogleDrive).await.unwrap().refresh_token.as_deref(),
            Some("1//new")
        );
    }

    #[tokio::test]
    async fn test_rejected_refresh_token_is_cleared() {
        let fx = Fixture::new(ScriptedReceiver::silent());
        fx.persist(&google_session(-chrono::Duration::hours(1), Some("1//revoked")))
            .await;

        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|req| body_of(req).contains("grant_type=refresh_token"))
            .times(1)
            .returning(|_| Ok(json_response(400, r#"{"error":"invalid_grant"}"#)));
        let manager = fx
            .google(http)
            .with_authorization_timeout(Duration::from_millis(20));

        let err = manager.acquire_session().await.unwrap_err();
        assert!(matches!(err, AuthError::AuthorizationTimeout { .. }));
        assert!(fx.persisted(ServiceId::GoogleDrive).await.is_none());
        assert_eq!(manager.status().await.unwrap(), AuthStatus::NotAuthenticated);
        assert!(!manager.is_valid().await);
    }

    #[tokio::test]
    async fn test_adobe_pasted_code_is_cleaned() {
        let fx = Fixture::new(ScriptedReceiver::answering(
            "  eyJhbGciOiJSUzI1NiIsIng1dSI6&state=lightroom_sync_state\n",
        ));

        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|req| {
                let body = body_of(req);
                body.contains("code=eyJhbGciOiJSUzI1NiIsIng1dSI6&")
                    && !body.contains("code_verifier")
                    && !body.contains("lightroom_sync_state")
            })
            .times(1)
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"while (1) {}{"access_token":"eyJ.access","refresh_token":"eyJ.refresh","expires_in":86399}"#,
                ))
            });
        let manager = fx.adobe(http);

        let headers = manager.headers().await.unwrap();
        assert_eq!(headers.get("Authorization").map(String::as_str), Some("Bearer eyJ.access"));
        assert_eq!(headers.get("X-API-Key").map(String::as_str), Some("adobe-key"));
        assert_eq!(headers.get("Content-Type").map(String::as_str), Some("application/json"));

        let prompt = fx.receiver.prompts.lock().unwrap()[0].clone();
        assert_eq!(prompt.expected_state.as_deref(), Some("lightroom_sync_state"));
    }

    #[tokio::test]
    async fn test_adobe_short_code_is_rejected() {
        let fx = Fixture::new(ScriptedReceiver::answering("abc&state=x"));
        let mut http = MockHttp::new();
        http.expect_execute().never();

        let err = fx.adobe(http).acquire_session().await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidAuthCode(_)));
        assert!(fx.persisted(ServiceId::Lightroom).await.is_none());
    }

    #[tokio::test]
    async fn test_authorization_times_out() {
        let fx = Fixture::new(ScriptedReceiver::silent());
        let mut http = MockHttp::new();
        http.expect_execute().never();

        let manager = fx
            .google(http)
            .with_authorization_timeout(Duration::from_millis(20));

        let err = manager.acquire_session().await.unwrap_err();
        assert!(matches!(err, AuthError::AuthorizationTimeout { .. }));
    }

    #[tokio::test]
    async fn test_token_issued_inside_skew_is_never_returned() {
        let fx = Fixture::new(ScriptedReceiver::answering("4/0AbcCode"));
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(json_response(200, r#"{"access_token":"short","expires_in":120}"#)));

        let err = fx.google(http).acquire_session().await.unwrap_err();
        assert!(matches!(err, AuthError::AuthenticationFailed { .. }));
    }

    #[tokio::test]
    async fn test_cached_session_expires_with_clock() {
        let fx = Fixture::new(ScriptedReceiver::silent());
        fx.persist(&google_session(chrono::Duration::minutes(30), None))
            .await;

        let mut http = MockHttp::new();
        http.expect_execute().never();
        let manager = fx.google(http).with_authorization_timeout(Duration::from_millis(20));

        assert!(manager.acquire_session().await.is_ok());

        fx.clock.advance(chrono::Duration::minutes(26));
        assert!(!manager.is_valid().await);
        assert!(manager.acquire_session().await.is_err());
    }

    #[tokio::test]
    async fn test_status_and_logout() {
        let fx = Fixture::new(ScriptedReceiver::silent());
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();

        let mut http = MockHttp::new();
        http.expect_execute().never();
        let manager = fx.google(http).with_event_bus(bus.clone());

        assert_eq!(manager.status().await.unwrap(), AuthStatus::NotAuthenticated);

        fx.persist(&google_session(-chrono::Duration::minutes(1), Some("1//r")))
            .await;
        assert_eq!(
            manager.status().await.unwrap(),
            AuthStatus::Expired { refreshable: true }
        );

        fx.persist(&google_session(chrono::Duration::hours(1), Some("1//r")))
            .await;
        assert!(manager.status().await.unwrap().is_authenticated());

        manager.logout().await.unwrap();
        manager.logout().await.unwrap();
        assert_eq!(manager.status().await.unwrap(), AuthStatus::NotAuthenticated);

        match events.recv().await.unwrap() {
            CoreEvent::Auth(AuthEvent::SignedOut { service }) => assert_eq!(service, "google"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_events_are_emitted() {
        let fx = Fixture::new(ScriptedReceiver::silent());
        fx.persist(&google_session(chrono::Duration::minutes(1), Some("1//r")))
            .await;
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();

        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(json_response(200, r#"{"access_token":"ya29.fresh"}"#)));
        fx.google(http).with_event_bus(bus).acquire_session().await.unwrap();

        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::TokenRefreshing { .. })
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::TokenRefreshed { .. })
        ));
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        struct BrokenStore;

        #[async_trait]
        impl SecureStore for BrokenStore {
            async fn set_secret(&self, _: &str, _: &[u8]) -> bridge_traits::error::Result<()> {
                Err(BridgeError::OperationFailed("read-only".to_string()))
            }
            async fn get_secret(&self, _: &str) -> bridge_traits::error::Result<Option<Vec<u8>>> {
                Err(BridgeError::OperationFailed("unreadable".to_string()))
            }
            async fn delete_secret(&self, _: &str) -> bridge_traits::error::Result<()> {
                Ok(())
            }
        }

        let mut http = MockHttp::new();
        http.expect_execute().never();
        let manager = SessionManager::google(
            google_oauth_config_with("gid", None),
            Arc::new(http),
            Arc::new(BrokenStore),
            Arc::new(ScriptedReceiver::silent()),
        );

        let err = manager.acquire_session().await.unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));
        assert!(err.is_recoverable());
    }
}
