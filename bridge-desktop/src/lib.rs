//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` with rustls
//! - `SecureStore` as one JSON file per service in a tokens directory
//! - `AuthCodeReceiver` as a loopback callback listener or a pasted code
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FileSecureStore, LocalCallbackReceiver, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! let http_client = Arc::new(ReqwestHttpClient::new()?);
//! let store = Arc::new(FileSecureStore::new("tokens"));
//! let google_codes = Arc::new(LocalCallbackReceiver::new());
//! ```

mod auth_code;
mod http;
mod secure_store;

pub use auth_code::{LocalCallbackReceiver, PastedCodeReceiver};
pub use http::ReqwestHttpClient;
pub use secure_store::FileSecureStore;
