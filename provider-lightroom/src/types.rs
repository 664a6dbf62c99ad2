//! Lightroom API response and request bodies.

use bridge_traits::browse::DestinationContainer;
use bridge_traits::transfer::AssetMetadata;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// `GET /v2/catalog`
#[derive(Debug, Deserialize)]
pub struct CatalogResponse {
    #[serde(default)]
    pub id: Option<String>,
}

/// `GET /v2/catalogs/{catalog}/albums`
#[derive(Debug, Default, Deserialize)]
pub struct AlbumsResponse {
    #[serde(default)]
    pub resources: Vec<AlbumResource>,
    #[serde(default)]
    pub links: Option<Links>,
}

impl AlbumsResponse {
    /// Relative `href` of the next page, if the provider returned one.
    pub fn next_href(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|links| links.next.as_ref())
            .and_then(|next| next.href.as_deref())
            .filter(|href| !href.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct AlbumResource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub payload: Option<AlbumPayload>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AlbumPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
}

impl AlbumResource {
    /// `None` for albums without an id.
    pub fn into_container(self) -> Option<DestinationContainer> {
        let id = self.id.filter(|id| !id.is_empty())?;
        let payload = self.payload.unwrap_or_default();
        Some(DestinationContainer {
            id,
            name: payload.name.unwrap_or_else(|| "Unnamed Album".to_string()),
            created_at: self.created,
            updated_at: self.updated,
            kind: payload.subtype,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub next: Option<Link>,
}

#[derive(Debug, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub href: Option<String>,
}

/// `GET /v2/account`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default, rename = "type")]
    pub account_type: Option<String>,
}

/// Body of the asset create call.
pub fn create_asset_body(metadata: &AssetMetadata) -> Value {
    let timestamp = metadata
        .capture_date
        .to_rfc3339_opts(SecondsFormat::Secs, true);

    json!({
        "subtype": metadata.subtype.as_str(),
        "payload": {
            "captureDate": timestamp,
            "importSource": {
                "fileName": metadata.file_name,
                "importedOnDevice": "Partner API Upload",
                "importedBy": metadata.imported_by,
                "importTimestamp": timestamp,
            }
        }
    })
}

/// Body of the add-to-album call.
pub fn add_to_album_body(asset_id: &str) -> Value {
    json!({
        "resources": [
            { "id": asset_id, "payload": { "cover": false } }
        ]
    })
}
