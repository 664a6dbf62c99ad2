//! OAuth client settings for the two services.
//!
//! The `*_with` constructors take values directly. The plain ones read them
//! from the environment:
//!
//! | Variable | Required |
//! |----------|----------|
//! | `GOOGLE_CLIENT_ID` | yes |
//! | `GOOGLE_CLIENT_SECRET` | no |
//! | `ADOBE_CLIENT_ID` | yes |
//! | `ADOBE_CLIENT_SECRET` | yes |
//! | `ADOBE_REDIRECT_URI` | no, defaults to `http://localhost:8080/callback` |

use crate::error::{AuthError, Result};
use crate::oauth::OAuthConfig;
use crate::types::ServiceId;

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/callback";

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

pub const ADOBE_AUTH_URL: &str = "https://ims-na1.adobelogin.com/ims/authorize/v2";
pub const ADOBE_TOKEN_URL: &str = "https://ims-na1.adobelogin.com/ims/token/v3";
pub const ADOBE_SCOPES: &[&str] = &["openid", "lr_partner_apis"];
pub const ADOBE_STATE: &str = "lightroom_sync_state";

/// Google Drive settings: PKCE, offline access, local callback.
pub fn google_oauth_config_with(
    client_id: impl Into<String>,
    client_secret: Option<String>,
) -> OAuthConfig {
    OAuthConfig {
        service: ServiceId::GoogleDrive,
        client_id: client_id.into(),
        client_secret,
        redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
        scopes: vec![GOOGLE_DRIVE_SCOPE.to_string()],
        scope_separator: " ".to_string(),
        auth_url: GOOGLE_AUTH_URL.to_string(),
        token_url: GOOGLE_TOKEN_URL.to_string(),
        use_pkce: true,
        fixed_state: None,
        extra_auth_params: vec![
            ("access_type".to_string(), "offline".to_string()),
            ("prompt".to_string(), "consent".to_string()),
        ],
        strip_response_prefix: false,
    }
}

/// Adobe IMS settings: comma-joined scopes, fixed state, no PKCE.
pub fn adobe_oauth_config_with(
    client_id: impl Into<String>,
    client_secret: impl Into<String>,
    redirect_uri: impl Into<String>,
) -> OAuthConfig {
    OAuthConfig {
        service: ServiceId::Lightroom,
        client_id: client_id.into(),
        client_secret: Some(client_secret.into()),
        redirect_uri: redirect_uri.into(),
        scopes: ADOBE_SCOPES.iter().map(|s| s.to_string()).collect(),
        scope_separator: ",".to_string(),
        auth_url: ADOBE_AUTH_URL.to_string(),
        token_url: ADOBE_TOKEN_URL.to_string(),
        use_pkce: false,
        fixed_state: Some(ADOBE_STATE.to_string()),
        extra_auth_params: Vec::new(),
        strip_response_prefix: true,
    }
}

/// Google Drive settings from the process environment.
pub fn google_oauth_config() -> Result<OAuthConfig> {
    google_oauth_config_from(|key| std::env::var(key).ok())
}

/// Adobe settings from the process environment.
pub fn adobe_oauth_config() -> Result<OAuthConfig> {
    adobe_oauth_config_from(|key| std::env::var(key).ok())
}

/// Google Drive settings from an arbitrary variable lookup.
pub fn google_oauth_config_from<F>(lookup: F) -> Result<OAuthConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let client_id = required(&lookup, ServiceId::GoogleDrive, "GOOGLE_CLIENT_ID")?;
    let client_secret = optional(&lookup, "GOOGLE_CLIENT_SECRET");
    Ok(google_oauth_config_with(client_id, client_secret))
}

/// Adobe settings from an arbitrary variable lookup.
pub fn adobe_oauth_config_from<F>(lookup: F) -> Result<OAuthConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let client_id = required(&lookup, ServiceId::Lightroom, "ADOBE_CLIENT_ID")?;
    let client_secret = required(&lookup, ServiceId::Lightroom, "ADOBE_CLIENT_SECRET")?;
    let redirect_uri = optional(&lookup, "ADOBE_REDIRECT_URI")
        .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());
    Ok(adobe_oauth_config_with(client_id, client_secret, redirect_uri))
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, service: ServiceId, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or_else(|| AuthError::AuthenticationFailed {
        service: service.to_string(),
        reason: format!("{} is not set", key),
    })
}
