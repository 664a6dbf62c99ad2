//! Google Drive browser
//!
//! Tree-structured source over Google Drive API v3: folder listing,
//! transferable-file listing, path display and content download.

use async_trait::async_trait;
use bridge_traits::browse::{Page, PageRequest, PaginatedBrowser, SourceEntry, CONTAINER_CONTENT_TYPE};
use bridge_traits::error::ApiResult;
use bridge_traits::http::HttpClient;
use bridge_traits::transfer::SourceFetcher;
use bytes::Bytes;
use core_auth::client::{configured_client, parse_json, ApiClient, ApiRequest, AuthenticatedClient};
use core_auth::SessionProvider;
use core_runtime::config::CoreConfig;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::types::{AboutResponse, DriveFile, DriveUser, FilesListResponse, FolderRef};

/// Google Drive API base URL
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Alias Drive accepts for the user's root folder.
pub const ROOT_FOLDER_ID: &str = "root";

/// How the root folder is shown in paths.
pub const ROOT_DISPLAY_NAME: &str = "My Drive";

/// Page size of a folder listing. Results beyond it are not fetched.
pub const FOLDER_PAGE_SIZE: u32 = 50;

/// Drive's own maximum page size.
const MAX_PAGE_SIZE: u32 = 1000;

const DEFAULT_MAX_PATH_DEPTH: usize = 32;

const FOLDER_FIELDS: &str = "files(id,name,mimeType,parents,size)";
const FILE_FIELDS: &str = "files(id,name,mimeType,size,parents)";

/// Quote a value for a Drive `q` expression.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Google Drive source browser.
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::DriveBrowser;
/// use bridge_traits::browse::{PageRequest, PaginatedBrowser};
///
/// let drive = DriveBrowser::with_session(http_client, google_session, timeout);
/// let page = drive.list_page("root", &PageRequest::default()).await?;
/// for folder in page.items {
///     println!("{}", drive.resolve_path(folder.id.as_deref().unwrap_or("root")).await);
/// }
/// ```
pub struct DriveBrowser {
    client: Arc<dyn ApiClient>,
    max_path_depth: usize,
}

impl DriveBrowser {
    pub fn new(client: Arc<dyn ApiClient>) -> Self {
        Self {
            client,
            max_path_depth: DEFAULT_MAX_PATH_DEPTH,
        }
    }

    /// Browser that authenticates through `session`.
    pub fn with_session(
        http_client: Arc<dyn HttpClient>,
        session: Arc<dyn SessionProvider>,
        timeout: Duration,
    ) -> Self {
        let client = AuthenticatedClient::new(http_client, session, DRIVE_API_BASE, timeout);
        Self::new(Arc::new(client))
    }

    /// Browser using the timeout, retry policy and path depth of `config`.
    pub fn from_config(config: &CoreConfig, session: Arc<dyn SessionProvider>) -> Self {
        Self::new(configured_client(config, session, DRIVE_API_BASE, false))
            .with_max_path_depth(config.path_max_depth)
    }

    /// Bound on the ancestor walk of [`resolve_path`](Self::resolve_path).
    pub fn with_max_path_depth(mut self, depth: usize) -> Self {
        self.max_path_depth = depth.max(1);
        self
    }

    async fn list(&self, endpoint: String) -> ApiResult<Vec<SourceEntry>> {
        let response = self.client.execute(ApiRequest::get(endpoint)).await?;
        let listing: FilesListResponse = parse_json(&response)?;
        Ok(listing.files.into_iter().map(DriveFile::into_entry).collect())
    }

    /// Direct child folders of `parent_id`, at most `page_size` of them.
    #[instrument(skip(self))]
    pub async fn list_folders(&self, parent_id: &str, page_size: u32) -> ApiResult<Vec<SourceEntry>> {
        let query = format!(
            "{} in parents and mimeType='{}' and trashed=false",
            quote(parent_id),
            CONTAINER_CONTENT_TYPE
        );
        let endpoint = format!(
            "/files?q={}&pageSize={}&fields={}",
            urlencoding::encode(&query),
            page_size.clamp(1, MAX_PAGE_SIZE),
            urlencoding::encode(FOLDER_FIELDS)
        );

        let folders = self.list(endpoint).await?;
        debug!(count = folders.len(), "Listed folders");
        Ok(folders)
    }

    /// Every non-trashed child of `folder_id`, folders included.
    #[instrument(skip(self))]
    pub async fn list_files(&self, folder_id: &str) -> ApiResult<Vec<SourceEntry>> {
        let query = format!("{} in parents and trashed=false", quote(folder_id));
        let endpoint = format!(
            "/files?q={}&fields={}",
            urlencoding::encode(&query),
            urlencoding::encode(FILE_FIELDS)
        );

        let files = self.list(endpoint).await?;
        info!(count = files.len(), "Listed folder contents");
        Ok(files)
    }

    /// Image and video leaves of `folder_id`, in listing order.
    pub async fn list_transferable(&self, folder_id: &str) -> ApiResult<Vec<SourceEntry>> {
        let files = self.list_files(folder_id).await?;
        Ok(files
            .into_iter()
            .filter(|entry| !entry.is_container() && entry.is_media())
            .collect())
    }

    /// Full content of a file.
    #[instrument(skip(self))]
    pub async fn download(&self, file_id: &str) -> ApiResult<Bytes> {
        let endpoint = format!("/files/{}?alt=media", urlencoding::encode(file_id));
        let response = self
            .client
            .execute(ApiRequest::get(endpoint).streaming())
            .await?;

        debug!(bytes = response.body.len(), "Downloaded file");
        Ok(response.body)
    }

    /// Human-readable path of a folder, e.g. `My Drive / Photos / 2024`.
    ///
    /// Walks first parents up to the root. A failed lookup, a cycle or a walk
    /// longer than the depth bound yields `Unknown Path ({folder_id})`; this
    /// never fails.
    #[instrument(skip(self))]
    pub async fn resolve_path(&self, folder_id: &str) -> String {
        let mut names: Vec<String> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut current = folder_id.to_string();

        loop {
            if current == ROOT_FOLDER_ID {
                break;
            }
            if names.len() >= self.max_path_depth || !visited.insert(current.clone()) {
                warn!(depth = names.len(), "Folder ancestry is too deep or cyclic");
                return unknown_path(folder_id);
            }

            let folder = match self.folder_ref(&current).await {
                Ok(folder) => folder,
                Err(e) => {
                    warn!(error = %e, "Folder lookup failed");
                    return unknown_path(folder_id);
                }
            };

            let name = folder.name.unwrap_or_else(|| "Unknown".to_string());
            match folder.parents.into_iter().next() {
                Some(parent) => {
                    names.push(name);
                    current = parent;
                }
                None => {
                    // Shared folders have no parents but still get their name.
                    if name != ROOT_DISPLAY_NAME {
                        names.push(name);
                    }
                    break;
                }
            }
        }

        names.reverse();
        std::iter::once(ROOT_DISPLAY_NAME.to_string())
            .chain(names)
            .collect::<Vec<_>>()
            .join(" / ")
    }

    async fn folder_ref(&self, folder_id: &str) -> ApiResult<FolderRef> {
        let endpoint = format!(
            "/files/{}?fields={}",
            urlencoding::encode(folder_id),
            urlencoding::encode("name,parents")
        );
        let response = self.client.execute(ApiRequest::get(endpoint)).await?;
        parse_json(&response)
    }

    /// Authenticated user, as a connection check.
    #[instrument(skip(self))]
    pub async fn test_connection(&self) -> ApiResult<DriveUser> {
        let response = self
            .client
            .execute(ApiRequest::get("/about?fields=user"))
            .await?;
        let about: AboutResponse = parse_json(&response)?;

        info!(
            user = about.user.display_name.as_deref().unwrap_or("Unknown"),
            "Connected to Google Drive"
        );
        Ok(about.user)
    }
}

fn unknown_path(folder_id: &str) -> String {
    format!("Unknown Path ({})", folder_id)
}

#[async_trait]
impl PaginatedBrowser for DriveBrowser {
    type Item = SourceEntry;

    /// Child folders of `container`. Offset and cursor are ignored; the
    /// listing is one page of `limit` (default 50) and never has a next cursor.
    async fn list_page(&self, container: &str, request: &PageRequest) -> ApiResult<Page<SourceEntry>> {
        let folders = self
            .list_folders(container, request.limit.unwrap_or(FOLDER_PAGE_SIZE))
            .await?;
        Ok(Page::single(folders))
    }
}

#[async_trait]
impl SourceFetcher for DriveBrowser {
    async fn fetch(&self, entry_id: &str) -> ApiResult<Bytes> {
        self.download(entry_id).await
    }
}
