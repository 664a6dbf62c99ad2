//! Credential Storage Abstraction
//!
//! Persists small opaque secrets (serialized token records) under a key per
//! service.

use async_trait::async_trait;

use crate::error::Result;

/// Secure credential storage trait
///
/// Abstracts where token records live:
/// - Desktop: one JSON file per key inside a tokens directory
/// - Tests: an in-memory map
///
/// # Consistency Requirements
///
/// Implementations MUST:
/// - Make `set_secret` atomic: a concurrent `get_secret` sees either the old
///   value or the new one, never a partially written value
/// - Return `Ok(None)` for an absent key rather than an error
/// - Never log secret values
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SecureStore;
///
/// async fn store_token(store: &dyn SecureStore, record: &[u8]) -> Result<()> {
///     store.set_secret("adobe_token", record).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a secret value, replacing any previous value for `key`.
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a secret value
    ///
    /// # Returns
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret. Deleting an absent key succeeds.
    async fn delete_secret(&self, key: &str) -> Result<()>;

    /// Check if a secret exists without retrieving it
    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(self.get_secret(key).await?.is_some())
    }
}
