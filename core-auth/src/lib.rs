//! # Authentication Module
//!
//! OAuth 2.0 sessions for the two services the transfer engine talks to, and
//! the request client that attaches them to provider calls.
//!
//! ## Overview
//!
//! - [`SessionManager`]: per-service session with validity checks, a single
//!   refresh attempt and interactive re-authorization as the last resort
//! - [`CredentialStore`]: one persisted record per service
//! - [`OAuthFlowManager`]: authorization URL, code exchange and refresh
//! - [`AuthenticatedClient`]: header merging, response unwrapping and error
//!   classification for provider calls
//! - [`RetryingClient`]: opt-in backoff around any [`ApiClient`]
//! - [`ChannelCodeReceiver`]: in-process transport for the authorization code

pub mod client;
pub mod code_channel;
pub mod credential_store;
pub mod error;
pub mod manager;
pub mod oauth;
pub mod providers;
pub mod retry;
pub mod types;

#[cfg(test)]
mod test_support;

pub use client::{ApiClient, ApiRequest, AuthenticatedClient};
pub use code_channel::{ChannelCodeReceiver, CodeSubmitter};
pub use credential_store::CredentialStore;
pub use error::{AuthError, Result};
pub use manager::{SessionManager, SessionProvider};
pub use oauth::{OAuthConfig, OAuthFlowManager, PkceVerifier};
pub use retry::RetryingClient;
pub use types::{AuthStatus, ServiceId, Session};
