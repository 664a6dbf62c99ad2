//! # Host Bridge Traits
//!
//! Capability traits and shared types that the transfer engine depends on but
//! that each host supplies.
//!
//! ## Overview
//!
//! This crate defines the contract between the core crates and the
//! platform-specific implementations in `bridge-desktop`. Each trait
//! represents a capability that must be injected rather than reached for
//! globally.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Single-attempt async HTTP with timeouts
//!
//! ### Credentials
//! - [`SecureStore`](storage::SecureStore) - Atomic persistence of token records
//! - [`AuthCodeReceiver`](auth::AuthCodeReceiver) - Hands the interactive
//!   authorization code to the session layer
//!
//! ### Browsing and transfer
//! - [`PaginatedBrowser`](browse::PaginatedBrowser) - Cursor-based listing over a
//!   source tree or a flat destination catalog
//! - [`SourceFetcher`](transfer::SourceFetcher) and
//!   [`DestinationWriter`](transfer::DestinationWriter) - The two ends of a copy
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! Host capability failures use [`BridgeError`](error::BridgeError). Calls
//! against remote providers are classified with [`ApiError`](error::ApiError):
//!
//! | Condition | Variant |
//! |-----------|---------|
//! | 401 / 403, or no usable session | `AuthFailure` |
//! | Missing scope or container | `NotFound` |
//! | Any other non-2xx | `ProviderError { status, body }` |
//! | Network error or timeout | `TransportFailure` |
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! behind `Arc` across async tasks.

pub mod auth;
pub mod browse;
pub mod error;
pub mod http;
pub mod storage;
pub mod time;
pub mod transfer;

pub use error::{ApiError, ApiResult, BridgeError};

// Re-export commonly used types
pub use auth::{AuthCodeReceiver, AuthorizationPrompt};
pub use browse::{
    Catalog, DestinationContainer, Page, PageCheckpoints, PageCursor, PageRequest,
    PaginatedBrowser, SourceEntry,
};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::SecureStore;
pub use time::{Clock, FixedClock, LogLevel, SystemClock};
pub use transfer::{AssetMetadata, AssetSubtype, DestinationWriter, SourceFetcher};
