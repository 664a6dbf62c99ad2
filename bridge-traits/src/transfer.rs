//! Transfer Capabilities
//!
//! The two sides of a copy as the pipeline sees them: a source that returns
//! the bytes of a listed entry, and a destination that accepts an asset in
//! three calls (create, upload master, associate with an album).

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ApiResult;

/// Destination asset kind, derived from the source MIME type.
///
/// ```
/// use bridge_traits::transfer::AssetSubtype;
///
/// assert_eq!(AssetSubtype::from_mime("video/mp4"), AssetSubtype::Video);
/// assert_eq!(AssetSubtype::from_mime("application/pdf"), AssetSubtype::Image);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetSubtype {
    Image,
    Video,
}

impl AssetSubtype {
    /// `video/*` is a video; everything else, including unknown types, is an image.
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("video/") {
            AssetSubtype::Video
        } else {
            AssetSubtype::Image
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetSubtype::Image => "image",
            AssetSubtype::Video => "video",
        }
    }
}

impl fmt::Display for AssetSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata sent with the create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMetadata {
    pub file_name: String,
    pub subtype: AssetSubtype,
    /// Time of transfer. The source capture time is not read.
    pub capture_date: DateTime<Utc>,
    /// Destination account id of the importer.
    pub imported_by: String,
}

/// Source side of a transfer.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Full binary content of the entry with id `entry_id`.
    async fn fetch(&self, entry_id: &str) -> ApiResult<Bytes>;
}

/// Destination side of a transfer.
///
/// Every call is a single attempt; a non-2xx answer is an error.
#[async_trait]
pub trait DestinationWriter: Send + Sync {
    /// Create the asset record. Must fail rather than overwrite when an asset
    /// with `asset_id` already exists.
    async fn create_asset(
        &self,
        catalog_id: &str,
        asset_id: &str,
        metadata: &AssetMetadata,
    ) -> ApiResult<()>;

    /// Upload the original bytes of an existing asset.
    async fn upload_master(
        &self,
        catalog_id: &str,
        asset_id: &str,
        content_type: &str,
        content: Bytes,
    ) -> ApiResult<()>;

    /// Add an existing asset to an album.
    async fn add_to_album(&self, catalog_id: &str, album_id: &str, asset_id: &str)
        -> ApiResult<()>;

    /// Identity recorded as the importer of new assets.
    async fn importer_identity(&self) -> ApiResult<String>;
}
