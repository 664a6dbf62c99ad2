//! # Transfer Items and Outcomes
//!
//! A [`TransferItem`] is one source entry on its way to one destination
//! album. Each item ends in exactly one [`TransferOutcome`].
//!
//! ## Statuses
//!
//! ```text
//! Download ──✗──> DownloadFailed
//!    │
//! Create ────✗──> CreateFailed
//!    │
//! Upload ────✗──> UploadFailed   (created asset left in place)
//!    │
//! Associate ─✗──> Succeeded + warning detail
//!    │
//! Succeeded
//! ```

use bridge_traits::browse::SourceEntry;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use bridge_traits::transfer::AssetSubtype;

/// Fresh destination asset id: 32 lowercase hex characters.
pub fn new_asset_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// One unit of work. Lives for a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItem {
    /// Position in the input listing.
    pub index: usize,
    pub source_entry: SourceEntry,
    pub destination_container_id: String,
    pub generated_asset_id: String,
}

impl TransferItem {
    pub fn new(
        index: usize,
        source_entry: SourceEntry,
        destination_container_id: impl Into<String>,
    ) -> Self {
        Self {
            index,
            source_entry,
            destination_container_id: destination_container_id.into(),
            generated_asset_id: new_asset_id(),
        }
    }

    pub fn subtype(&self) -> AssetSubtype {
        AssetSubtype::from_mime(&self.source_entry.content_type)
    }

    pub fn name(&self) -> &str {
        &self.source_entry.display_name
    }
}

/// Terminal status of an item.
///
/// `AssociateFailed` is part of the status vocabulary but the pipeline does
/// not produce it: an album association failure leaves the item `Succeeded`
/// with a warning in the detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransferStatus {
    Succeeded,
    DownloadFailed,
    CreateFailed,
    UploadFailed,
    AssociateFailed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Succeeded => "succeeded",
            TransferStatus::DownloadFailed => "download_failed",
            TransferStatus::CreateFailed => "create_failed",
            TransferStatus::UploadFailed => "upload_failed",
            TransferStatus::AssociateFailed => "associate_failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransferStatus::Succeeded)
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub item: TransferItem,
    pub status: TransferStatus,
    /// Failure reason, or the association warning of a degraded success.
    /// Empty for a clean success.
    pub detail: String,
}

impl TransferOutcome {
    pub fn succeeded(item: TransferItem) -> Self {
        Self {
            item,
            status: TransferStatus::Succeeded,
            detail: String::new(),
        }
    }

    pub fn degraded(item: TransferItem, warning: impl Into<String>) -> Self {
        Self {
            item,
            status: TransferStatus::Succeeded,
            detail: warning.into(),
        }
    }

    pub fn failed(item: TransferItem, status: TransferStatus, detail: impl Into<String>) -> Self {
        Self {
            item,
            status,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Succeeded, but the asset is not in the album.
    pub fn is_degraded(&self) -> bool {
        self.is_success() && !self.detail.is_empty()
    }
}
