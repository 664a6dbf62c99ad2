//! Interactive Authorization Handoff
//!
//! The interactive step of an OAuth flow needs exactly one thing from the
//! outside world: the authorization code. How that code arrives (local HTTP
//! callback, pasted on stdin, an IPC message from a GUI) is host specific, so
//! it is modelled as a single async capability.

use async_trait::async_trait;

use crate::error::Result;

/// What the host needs to show the user and how to validate the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationPrompt {
    /// Service being authorized, for display (e.g. "Google Drive").
    pub service: String,
    /// URL the user must open in a browser.
    pub auth_url: String,
    /// Redirect URI registered for the client.
    pub redirect_uri: String,
    /// State value the callback must echo, when the transport can see it.
    pub expected_state: Option<String>,
}

/// Blocks until a raw authorization code is supplied.
///
/// Implementations return the code exactly as received; provider-specific
/// cleaning and validation happen in the session layer.
#[async_trait]
pub trait AuthCodeReceiver: Send + Sync {
    async fn receive_code(&self, prompt: &AuthorizationPrompt) -> Result<String>;
}
