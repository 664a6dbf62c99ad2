//! Google Drive API response types
//!
//! Data structures for deserializing Google Drive API v3 responses. Only the
//! fields requested through `fields=` are modelled, and all of them are
//! optional because Drive omits what it does not have.

use bridge_traits::browse::{SourceEntry, DEFAULT_CONTENT_TYPE};
use serde::{Deserialize, Serialize};

/// Google Drive API file resource
///
/// See: https://developers.google.com/drive/api/v3/reference/files#resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub mime_type: Option<String>,

    /// File size in bytes, as a decimal string (omitted for folders)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// Parent folder IDs
    #[serde(default)]
    pub parents: Vec<String>,
}

impl DriveFile {
    pub fn into_entry(self) -> SourceEntry {
        SourceEntry {
            id: self.id.filter(|id| !id.is_empty()),
            display_name: self.name.unwrap_or_else(|| "Unknown File".to_string()),
            content_type: self
                .mime_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            size_bytes: self.size.and_then(|s| s.parse().ok()),
            parent_id: self.parents.into_iter().next(),
        }
    }
}

/// Google Drive API files.list response
///
/// See: https://developers.google.com/drive/api/v3/reference/files/list
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    #[serde(default)]
    pub files: Vec<DriveFile>,
}

/// Result of the ancestor lookup (`fields=name,parents`).
#[derive(Debug, Deserialize)]
pub struct FolderRef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
}

/// Google Drive API about.get response with `fields=user`.
#[derive(Debug, Deserialize)]
pub struct AboutResponse {
    #[serde(default)]
    pub user: DriveUser,
}

/// Authenticated Drive user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveUser {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}
