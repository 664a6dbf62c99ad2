//! Adobe Lightroom destination
//!
//! Catalog resolution, album paging, account lookup and the three asset
//! calls of a transfer. Every call is a single attempt through the injected
//! [`ApiClient`]; the anti-hijacking prefix is removed there.

use async_trait::async_trait;
use bridge_traits::browse::{Catalog, DestinationContainer, Page, PageCursor, PageRequest, PaginatedBrowser};
use bridge_traits::error::{ApiError, ApiResult};
use bridge_traits::http::HttpClient;
use bridge_traits::transfer::{AssetMetadata, DestinationWriter};
use bytes::Bytes;
use core_auth::client::{configured_client, parse_json, ApiClient, ApiRequest, AuthenticatedClient};
use core_auth::SessionProvider;
use core_runtime::config::CoreConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::types::{
    add_to_album_body, create_asset_body, Account, AlbumResource, AlbumsResponse, CatalogResponse,
};

/// Lightroom API base URL
pub const LIGHTROOM_API_BASE: &str = "https://lr.adobe.io";

/// Albums per page when the request does not say.
pub const DEFAULT_ALBUM_PAGE_SIZE: u32 = 25;

/// Adobe Lightroom browser and writer.
pub struct LightroomBrowser {
    client: Arc<dyn ApiClient>,
    base_url: String,
    page_size: u32,
}

impl LightroomBrowser {
    pub fn new(client: Arc<dyn ApiClient>) -> Self {
        Self {
            client,
            base_url: LIGHTROOM_API_BASE.to_string(),
            page_size: DEFAULT_ALBUM_PAGE_SIZE,
        }
    }

    /// Browser that authenticates through `session` and strips the
    /// `while (1) {}` prefix from JSON answers.
    pub fn with_session(
        http_client: Arc<dyn HttpClient>,
        session: Arc<dyn SessionProvider>,
        timeout: Duration,
    ) -> Self {
        let client = AuthenticatedClient::new(http_client, session, LIGHTROOM_API_BASE, timeout)
            .with_response_prefix_stripping();
        Self::new(Arc::new(client))
    }

    /// Browser using the timeout, retry policy and album page size of `config`.
    pub fn from_config(config: &CoreConfig, session: Arc<dyn SessionProvider>) -> Self {
        Self::new(configured_client(config, session, LIGHTROOM_API_BASE, true))
            .with_page_size(config.album_page_size)
    }

    /// Default album page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Resolve the user's catalog, required before any album call.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the user has no catalog (404)
    /// - `InvalidResponse` when the answer carries no id
    #[instrument(skip(self))]
    pub async fn resolve_scope(&self) -> ApiResult<Catalog> {
        let response = self
            .client
            .execute(ApiRequest::get("/v2/catalog"))
            .await
            .map_err(|e| match e {
                ApiError::ProviderError { status: 404, body } => {
                    ApiError::NotFound(format!("Lightroom catalog: {}", body))
                }
                other => other,
            })?;

        let catalog: CatalogResponse = parse_json(&response)?;
        let catalog_id = catalog
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::InvalidResponse("Catalog response has no id".to_string()))?;

        info!(catalog_id = %catalog_id, "Resolved Lightroom catalog");
        Ok(Catalog { catalog_id })
    }

    /// The account behind the session.
    #[instrument(skip(self))]
    pub async fn account(&self) -> ApiResult<Account> {
        let response = self.client.execute(ApiRequest::get("/v2/account")).await?;
        parse_json(&response)
    }

    fn albums_endpoint(&self, catalog_id: &str, request: &PageRequest) -> String {
        if let Some(cursor) = &request.cursor {
            return cursor.clone();
        }

        let limit = request.limit.unwrap_or(self.page_size);
        let mut endpoint = format!("/v2/catalogs/{}/albums?limit={}", catalog_id, limit);
        if request.offset > 0 {
            endpoint.push_str(&format!("&offset={}", request.offset));
        }
        endpoint
    }

    fn next_cursor(&self, catalog_id: &str, response: &AlbumsResponse) -> Option<PageCursor> {
        response.next_href().map(|href| {
            PageCursor::Link(format!(
                "{}/v2/catalogs/{}/{}",
                self.base_url, catalog_id, href
            ))
        })
    }
}

#[async_trait]
impl PaginatedBrowser for LightroomBrowser {
    type Item = DestinationContainer;

    /// One page of albums in `container` (a catalog id). A cursor, when
    /// present, is fetched verbatim and the offset and limit are ignored.
    #[instrument(skip(self, request), fields(offset = request.offset, cursor = request.cursor.is_some()))]
    async fn list_page(
        &self,
        container: &str,
        request: &PageRequest,
    ) -> ApiResult<Page<DestinationContainer>> {
        let endpoint = self.albums_endpoint(container, request);
        let response = self.client.execute(ApiRequest::get(endpoint)).await?;
        let albums: AlbumsResponse = parse_json(&response)?;

        let next_cursor = self.next_cursor(container, &albums);
        let items: Vec<DestinationContainer> = albums
            .resources
            .into_iter()
            .filter_map(AlbumResource::into_container)
            .collect();

        debug!(count = items.len(), has_more = next_cursor.is_some(), "Listed albums");
        Ok(Page { items, next_cursor })
    }
}

#[async_trait]
impl DestinationWriter for LightroomBrowser {
    #[instrument(skip(self, metadata), fields(subtype = %metadata.subtype))]
    async fn create_asset(
        &self,
        catalog_id: &str,
        asset_id: &str,
        metadata: &AssetMetadata,
    ) -> ApiResult<()> {
        let request = ApiRequest::put(format!("/v2/catalogs/{}/assets/{}", catalog_id, asset_id))
            .header("Content-Type", "application/json")
            .header("If-None-Match", "*")
            .json(create_asset_body(metadata));

        self.client.execute(request).await?;
        debug!("Asset created");
        Ok(())
    }

    #[instrument(skip(self, content), fields(bytes = content.len()))]
    async fn upload_master(
        &self,
        catalog_id: &str,
        asset_id: &str,
        content_type: &str,
        content: Bytes,
    ) -> ApiResult<()> {
        let request = ApiRequest::put(format!(
            "/v2/catalogs/{}/assets/{}/master",
            catalog_id, asset_id
        ))
        .header("Content-Type", content_type)
        .header("Content-Length", content.len().to_string())
        .raw_body(content);

        self.client.execute(request).await?;
        debug!("Master uploaded");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_to_album(&self, catalog_id: &str, album_id: &str, asset_id: &str) -> ApiResult<()> {
        let request = ApiRequest::put(format!(
            "/v2/catalogs/{}/albums/{}/assets",
            catalog_id, album_id
        ))
        .header("Content-Type", "application/json")
        .json(add_to_album_body(asset_id));

        self.client.execute(request).await?;
        debug!("Asset added to album");
        Ok(())
    }

    async fn importer_identity(&self) -> ApiResult<String> {
        let account = self.account().await?;
        match account.id.filter(|id| !id.is_empty()) {
            Some(id) => Ok(id),
            None => {
                warn!("Account response has no id");
                Err(ApiError::InvalidResponse("Account response has no id".to_string()))
            }
        }
    }
}
