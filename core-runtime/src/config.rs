//! # Core Configuration Module
//!
//! Holds the injected capabilities and the tunables of the transfer engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance. It validates fail-fast, so a bad batch size or a missing
//! capability is reported before any network call is made.
//!
//! ## Required Capabilities
//!
//! - `HttpClient` - every provider call goes through it
//! - `SecureStore` - credential persistence, one record per service
//!
//! When the `desktop-shims` feature is enabled, `ReqwestHttpClient` and a
//! `FileSecureStore` rooted at `tokens_dir` are injected if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .tokens_dir("/home/me/.lrsync/tokens")
//!     .batch_size(10)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! A missing capability or an out-of-range value is reported with an
//! actionable message:
//!
//! ```
//! use core_runtime::config::CoreConfig;
//!
//! let result = CoreConfig::builder().batch_size(0).build();
//! assert!(result.is_err());
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, RetryPolicy, SecureStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TOKENS_DIR: &str = "tokens";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_PATH_MAX_DEPTH: usize = 32;
pub const DEFAULT_ALBUM_PAGE_SIZE: u32 = 25;

const MAX_CONCURRENT_ITEMS: usize = 16;
const MAX_ALBUM_PAGE_SIZE: u32 = 500;

/// Engine configuration.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Directory holding one credential file per service
    pub tokens_dir: PathBuf,

    /// Timeout applied to every provider request
    pub request_timeout: Duration,

    /// Upper bound on waiting for the user to complete authorization
    pub authorization_timeout: Duration,

    /// Items per transfer batch
    pub batch_size: usize,

    /// Items of a batch processed at the same time
    pub max_concurrent_items: usize,

    /// Parent hops followed when building a display path
    pub path_max_depth: usize,

    /// Default page size when listing albums
    pub album_page_size: u32,

    /// Retry transient provider failures. `None` means single attempt.
    pub retry_policy: Option<RetryPolicy>,

    pub http_client: Arc<dyn HttpClient>,

    pub secure_store: Arc<dyn SecureStore>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("tokens_dir", &self.tokens_dir)
            .field("request_timeout", &self.request_timeout)
            .field("authorization_timeout", &self.authorization_timeout)
            .field("batch_size", &self.batch_size)
            .field("max_concurrent_items", &self.max_concurrent_items)
            .field("path_max_depth", &self.path_max_depth)
            .field("album_page_size", &self.album_page_size)
            .field("retry_policy", &self.retry_policy)
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The tokens directory is not empty
    /// - Timeouts are non-zero
    /// - Batch size, concurrency, depth and page size are within range
    pub fn validate(&self) -> Result<()> {
        if self.tokens_dir.as_os_str().is_empty() {
            return Err(Error::Config("Tokens directory cannot be empty".to_string()));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.authorization_timeout.is_zero() {
            return Err(Error::Config(
                "Authorization timeout must be greater than zero".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(Error::Config(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrent_items == 0 || self.max_concurrent_items > MAX_CONCURRENT_ITEMS {
            return Err(Error::Config(format!(
                "Concurrent items must be between 1 and {}",
                MAX_CONCURRENT_ITEMS
            )));
        }

        if self.path_max_depth == 0 {
            return Err(Error::Config(
                "Path depth limit must be greater than 0".to_string(),
            ));
        }

        if self.album_page_size == 0 || self.album_page_size > MAX_ALBUM_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Album page size must be between 1 and {}",
                MAX_ALBUM_PAGE_SIZE
            )));
        }

        if let Some(policy) = &self.retry_policy {
            if policy.max_attempts == 0 {
                return Err(Error::Config(
                    "Retry policy must allow at least one attempt".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for provider calls. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Tests: inject a mock client."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn secure_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "SecureStore implementation is required for credential persistence. \
                 Desktop: enable the 'desktop-shims' feature to use the default FileSecureStore. \
                 Tests: inject an in-memory store."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::with_timeout(timeout)?);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store(tokens_dir: &std::path::Path) -> Result<Arc<dyn SecureStore>> {
    use bridge_desktop::FileSecureStore;

    let store: Arc<dyn SecureStore> = Arc::new(FileSecureStore::new(tokens_dir));
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store(_tokens_dir: &std::path::Path) -> Result<Arc<dyn SecureStore>> {
    Err(secure_store_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    tokens_dir: Option<PathBuf>,
    request_timeout: Option<Duration>,
    authorization_timeout: Option<Duration>,
    batch_size: Option<usize>,
    max_concurrent_items: Option<usize>,
    path_max_depth: Option<usize>,
    album_page_size: Option<u32>,
    retry_policy: Option<RetryPolicy>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
}

impl CoreConfigBuilder {
    /// Sets the directory for credential files.
    ///
    /// Default: `tokens` relative to the working directory.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder().tokens_dir("/var/lib/lrsync/tokens");
    /// ```
    pub fn tokens_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.tokens_dir = Some(path.into());
        self
    }

    /// Default: 60 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Default: 5 minutes
    pub fn authorization_timeout(mut self, timeout: Duration) -> Self {
        self.authorization_timeout = Some(timeout);
        self
    }

    /// Default: 5
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Default: 1, items of a batch run one after another.
    pub fn max_concurrent_items(mut self, count: usize) -> Self {
        self.max_concurrent_items = Some(count);
        self
    }

    pub fn path_max_depth(mut self, depth: usize) -> Self {
        self.path_max_depth = Some(depth);
        self
    }

    pub fn album_page_size(mut self, size: u32) -> Self {
        self.album_page_size = Some(size);
        self
    }

    /// Enables retries of transient failures with the given policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, `ReqwestHttpClient` is used when the `desktop-shims`
    /// feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the credential store implementation.
    ///
    /// If not provided, a `FileSecureStore` rooted at `tokens_dir` is used
    /// when the `desktop-shims` feature is enabled.
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a capability is absent and no
    ///   desktop default is available
    /// - [`Error::Config`] when a value is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let tokens_dir = self
            .tokens_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKENS_DIR));
        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store(&tokens_dir)?,
        };

        let config = CoreConfig {
            tokens_dir,
            request_timeout,
            authorization_timeout: self
                .authorization_timeout
                .unwrap_or(DEFAULT_AUTHORIZATION_TIMEOUT),
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            max_concurrent_items: self.max_concurrent_items.unwrap_or(1),
            path_max_depth: self.path_max_depth.unwrap_or(DEFAULT_PATH_MAX_DEPTH),
            album_page_size: self.album_page_size.unwrap_or(DEFAULT_ALBUM_PAGE_SIZE),
            retry_policy: self.retry_policy,
            http_client,
            secure_store,
        };

        config.validate()?;

        Ok(config)
    }
}
