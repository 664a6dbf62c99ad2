use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds before `expires_at` after which a session is no longer used.
pub const SESSION_SKEW_SECS: i64 = 5 * 60;

fn session_skew() -> Duration {
    Duration::seconds(SESSION_SKEW_SECS)
}

/// The two OAuth-protected services the engine talks to.
///
/// # Examples
///
/// ```
/// use core_auth::ServiceId;
///
/// assert_eq!(ServiceId::Lightroom.display_name(), "Adobe Lightroom");
/// assert_eq!(ServiceId::GoogleDrive.storage_key(), "google_token");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceId {
    /// Source side
    GoogleDrive,
    /// Destination side
    Lightroom,
}

impl ServiceId {
    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceId::GoogleDrive => "Google Drive",
            ServiceId::Lightroom => "Adobe Lightroom",
        }
    }

    /// Short identifier used in logs and events.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceId::GoogleDrive => "google",
            ServiceId::Lightroom => "adobe",
        }
    }

    /// Key of the persisted credential record.
    pub fn storage_key(&self) -> &'static str {
        match self {
            ServiceId::GoogleDrive => "google_token",
            ServiceId::Lightroom => "adobe_token",
        }
    }

    /// Parse a service from its short identifier or display name.
    ///
    /// ```
    /// use core_auth::ServiceId;
    ///
    /// assert_eq!(ServiceId::parse("adobe"), Some(ServiceId::Lightroom));
    /// assert_eq!(ServiceId::parse("Google Drive"), Some(ServiceId::GoogleDrive));
    /// assert_eq!(ServiceId::parse("dropbox"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(' ', "_").as_str() {
            "google" | "google_drive" | "googledrive" => Some(ServiceId::GoogleDrive),
            "adobe" | "lightroom" | "adobe_lightroom" => Some(ServiceId::Lightroom),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Live credential state for one service.
///
/// # Security
///
/// Tokens are never logged. The `Debug` implementation redacts them.
///
/// # Examples
///
/// ```
/// use core_auth::{ServiceId, Session};
/// use chrono::{Duration, Utc};
///
/// let now = Utc::now();
/// let session = Session::new(
///     ServiceId::Lightroom,
///     "eyJhbGciOi".to_string(),
///     Some("eyJyZWZyZXNo".to_string()),
///     now + Duration::hours(1),
/// );
///
/// assert!(session.is_valid_at(now));
/// assert!(!session.is_valid_at(now + Duration::minutes(56)));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub service: ServiceId,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
    pub scopes: Vec<String>,
}

impl Session {
    pub fn new(
        service: ServiceId,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            service,
            access_token,
            refresh_token,
            expires_at,
            token_type: "Bearer".to_string(),
            scopes: Vec::new(),
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    /// A session is usable iff `now < expires_at - 5 minutes`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && now < self.expires_at - session_skew()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token
            .as_deref()
            .map(|t| !t.is_empty())
            .unwrap_or(false)
    }

    /// Time left before the session stops being usable, `None` once it has.
    pub fn time_until_unusable(&self, now: DateTime<Utc>) -> Option<Duration> {
        let cutoff = self.expires_at - session_skew();
        if now >= cutoff {
            None
        } else {
            Some(cutoff - now)
        }
    }

    /// Value for the `Authorization` header.
    pub fn authorization_value(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("service", &self.service)
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Authentication status of a service, read from persisted state only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuthStatus {
    NotAuthenticated,
    Valid { expires_at: DateTime<Utc> },
    Expired { refreshable: bool },
}

impl AuthStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthStatus::Valid { .. })
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStatus::NotAuthenticated => write!(f, "Not authenticated"),
            AuthStatus::Valid { expires_at } => {
                write!(f, "Authenticated until {}", expires_at.to_rfc3339())
            }
            AuthStatus::Expired { refreshable: true } => write!(f, "Expired (refreshable)"),
            AuthStatus::Expired { refreshable: false } => write!(f, "Expired"),
        }
    }
}
