//! Credential Persistence
//!
//! One JSON record per service, written through the injected [`SecureStore`]:
//!
//! ```json
//! {
//!   "access_token": "...",
//!   "refresh_token": "...",
//!   "expires_at": "2024-05-01T13:00:00+00:00",
//!   "token_type": "Bearer",
//!   "scopes": ["openid", "lr_partner_apis"]
//! }
//! ```
//!
//! A missing record means "not authenticated". A record that cannot be
//! decoded is logged and treated as missing; it is never fatal.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{CredentialStore, ServiceId};
//! use std::sync::Arc;
//! # use bridge_traits::storage::SecureStore;
//! # async fn example(secure_store: Arc<dyn SecureStore>) -> core_auth::Result<()> {
//! let store = CredentialStore::new(secure_store);
//!
//! if let Some(session) = store.load(ServiceId::Lightroom).await? {
//!     println!("Adobe session expires at {}", session.expires_at);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::{ServiceId, Session};
use bridge_traits::storage::SecureStore;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Persistence of [`Session`] records, one per service.
#[derive(Clone)]
pub struct CredentialStore {
    secure_store: Arc<dyn SecureStore>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// ISO-8601; naive timestamps are read as UTC.
    expires_at: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    scopes: Vec<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

impl CredentialStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self { secure_store }
    }

    /// Persist a session, replacing any previous record for its service.
    pub async fn save(&self, session: &Session) -> Result<()> {
        let stored = StoredSession {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_at: session.expires_at.to_rfc3339(),
            token_type: session.token_type.clone(),
            scopes: session.scopes.clone(),
        };

        let json = serde_json::to_vec_pretty(&stored)?;

        self.secure_store
            .set_secret(session.service.storage_key(), &json)
            .await
            .map_err(|e| {
                warn!(service = session.service.as_str(), error = %e, "Failed to persist credentials");
                AuthError::Storage(e.to_string())
            })?;

        info!(
            service = session.service.as_str(),
            has_refresh_token = session.has_refresh_token(),
            expires_at = %session.expires_at,
            "Credentials persisted"
        );

        Ok(())
    }

    /// Load the persisted session for `service`.
    ///
    /// Returns `Ok(None)` when nothing is stored or the record is corrupt.
    /// Only a failing storage backend is an error.
    pub async fn load(&self, service: ServiceId) -> Result<Option<Session>> {
        let data = self
            .secure_store
            .get_secret(service.storage_key())
            .await
            .map_err(|e| {
                warn!(service = service.as_str(), error = %e, "Failed to read credentials");
                AuthError::Storage(e.to_string())
            })?;

        let Some(data) = data else {
            debug!(service = service.as_str(), "No persisted credentials");
            return Ok(None);
        };

        let stored: StoredSession = match serde_json::from_slice(&data) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(
                    service = service.as_str(),
                    error = %e,
                    "Persisted credentials are corrupt; treating as absent"
                );
                return Ok(None);
            }
        };

        let Some(expires_at) = parse_expiry(&stored.expires_at) else {
            warn!(
                service = service.as_str(),
                "Persisted credentials have an unreadable expiry; treating as absent"
            );
            return Ok(None);
        };

        if stored.access_token.is_empty() {
            warn!(service = service.as_str(), "Persisted credentials have no access token");
            return Ok(None);
        }

        let session = Session::new(service, stored.access_token, stored.refresh_token, expires_at)
            .with_token_type(stored.token_type)
            .with_scopes(stored.scopes);

        debug!(
            service = service.as_str(),
            has_refresh_token = session.has_refresh_token(),
            expires_at = %session.expires_at,
            "Loaded persisted credentials"
        );

        Ok(Some(session))
    }

    /// Delete the persisted record. Idempotent.
    pub async fn clear(&self, service: ServiceId) -> Result<()> {
        self.secure_store
            .delete_secret(service.storage_key())
            .await
            .map_err(|e| {
                warn!(service = service.as_str(), error = %e, "Failed to delete credentials");
                AuthError::Storage(e.to_string())
            })?;

        info!(service = service.as_str(), "Credentials cleared");
        Ok(())
    }

    pub async fn exists(&self, service: ServiceId) -> Result<bool> {
        self.secure_store
            .has_secret(service.storage_key())
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::test_support::MemorySecureStore;

    fn adobe_session() -> Session {
        Session::new(
            ServiceId::Lightroom,
            "eyJhbGciOiJSUzI1NiJ9.access".to_string(),
            Some("eyJhbGciOiJSUzI1NiJ9.refresh".to_string()),
            Utc::now() + Duration::hours(24),
        )
        .with_scopes(vec!["openid".to_string(), "lr_partner_apis".to_string()])
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let store = CredentialStore::new(Arc::new(MemorySecureStore::default()));
        let session = adobe_session();

        store.save(&session).await.unwrap();
        let loaded = store.load(ServiceId::Lightroom).await.unwrap().unwrap();

        assert_eq!(loaded.access_token, session.access_token);
        assert_eq!(loaded.refresh_token, session.refresh_token);
        assert!((loaded.expires_at - session.expires_at).num_milliseconds().abs() < 1000);
        assert_eq!(loaded.scopes, session.scopes);
        assert_eq!(loaded.service, ServiceId::Lightroom);
    }

    #[tokio::test]
    async fn test_services_are_stored_separately() {
        let store = CredentialStore::new(Arc::new(MemorySecureStore::default()));
        store.save(&adobe_session()).await.unwrap();

        assert!(store.load(ServiceId::GoogleDrive).await.unwrap().is_none());
        assert!(store.exists(ServiceId::Lightroom).await.unwrap());
        assert!(!store.exists(ServiceId::GoogleDrive).await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_absent() {
        let secure = Arc::new(MemorySecureStore::default());
        secure
            .set_secret("adobe_token", b"{not json")
            .await
            .unwrap();
        let store = CredentialStore::new(secure);

        assert!(store.load(ServiceId::Lightroom).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreadable_expiry_is_absent() {
        let secure = Arc::new(MemorySecureStore::default());
        secure
            .set_secret(
                "google_token",
                br#"{"access_token":"a","refresh_token":"r","expires_at":"tomorrow"}"#,
            )
            .await
            .unwrap();
        let store = CredentialStore::new(secure);

        assert!(store.load(ServiceId::GoogleDrive).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_naive_expiry_is_read_as_utc() {
        let secure = Arc::new(MemorySecureStore::default());
        secure
            .set_secret(
                "adobe_token",
                br#"{"access_token":"a","refresh_token":"r","expires_at":"2024-05-01T13:00:00.250000","token_type":"bearer"}"#,
            )
            .await
            .unwrap();
        let store = CredentialStore::new(secure);

        let session = store.load(ServiceId::Lightroom).await.unwrap().unwrap();
        assert_eq!(
            session.expires_at.to_rfc3339(),
            "2024-05-01T13:00:00.250+00:00"
        );
        assert_eq!(session.token_type, "bearer");
        assert!(session.scopes.is_empty());
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let store = CredentialStore::new(Arc::new(MemorySecureStore::default()));
        store.save(&adobe_session()).await.unwrap();

        store.clear(ServiceId::Lightroom).await.unwrap();
        store.clear(ServiceId::Lightroom).await.unwrap();

        assert!(store.load(ServiceId::Lightroom).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_without_refresh_token() {
        let store = CredentialStore::new(Arc::new(MemorySecureStore::default()));
        let mut session = adobe_session();
        session.refresh_token = None;

        store.save(&session).await.unwrap();
        let loaded = store.load(ServiceId::Lightroom).await.unwrap().unwrap();
        assert!(loaded.refresh_token.is_none());
    }
}
