//! Paginated Browsing Abstractions
//!
//! Shared types for listing a tree-structured source and a flat, paged
//! destination catalog through one interface.
//!
//! ## Addressing
//!
//! A listing position is described by a [`PageRequest`]. It carries an explicit
//! `(offset, limit)` pair and, optionally, an opaque link cursor returned by the
//! provider. The two modes are mutually exclusive per call: when a link cursor
//! is present the offset and limit are ignored. Link cursors are replayed
//! verbatim and never parsed.
//!
//! `list_page` must be idempotent and side-effect free so callers can replay
//! and backtrack through pages freely; [`PageCheckpoints`] is the stack callers
//! use for that.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;

/// Content type that marks a navigable container in the source tree.
pub const CONTAINER_CONTENT_TYPE: &str = "application/vnd.google-apps.folder";

/// Content type assumed when the source does not report one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A node listed from the tree-structured source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Provider id. Entries without an id cannot be transferred.
    pub id: Option<String>,
    pub display_name: String,
    pub content_type: String,
    pub size_bytes: Option<u64>,
    pub parent_id: Option<String>,
}

impl SourceEntry {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            display_name: display_name.into(),
            content_type: content_type.into(),
            size_bytes: None,
            parent_id: None,
        }
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Whether this entry is a container rather than a transferable leaf.
    pub fn is_container(&self) -> bool {
        self.content_type == CONTAINER_CONTENT_TYPE
    }

    /// Whether this entry is an image or video leaf.
    pub fn is_media(&self) -> bool {
        self.content_type.starts_with("image/") || self.content_type.starts_with("video/")
    }
}

/// A flat organizational unit (album) inside a destination catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationContainer {
    pub id: String,
    pub name: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub kind: Option<String>,
}

/// Top-level destination scope; required before any container listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Catalog {
    pub catalog_id: String,
}

/// Position of the next fetch in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageCursor {
    /// Caller-computed offset and page size.
    Offset { offset: u32, limit: u32 },
    /// Opaque provider link, replayed verbatim.
    Link(String),
}

/// Arguments of a single `list_page` call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageRequest {
    pub offset: u32,
    pub limit: Option<u32>,
    /// When set, `offset` and `limit` are ignored.
    pub cursor: Option<String>,
}

impl PageRequest {
    /// First page with the given page size.
    pub fn first(limit: u32) -> Self {
        Self {
            offset: 0,
            limit: Some(limit),
            cursor: None,
        }
    }

    /// Explicit offset addressing.
    pub fn at(offset: u32, limit: u32) -> Self {
        Self {
            offset,
            limit: Some(limit),
            cursor: None,
        }
    }

    /// Link addressing.
    pub fn link(cursor: impl Into<String>) -> Self {
        Self {
            offset: 0,
            limit: None,
            cursor: Some(cursor.into()),
        }
    }

    pub fn from_cursor(cursor: &PageCursor) -> Self {
        match cursor {
            PageCursor::Offset { offset, limit } => Self::at(*offset, *limit),
            PageCursor::Link(link) => Self::link(link.clone()),
        }
    }

    /// Attach a link cursor while keeping the offset for display purposes.
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}

/// One fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<PageCursor>,
}

impl<T> Page<T> {
    pub fn single(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }

    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

/// Cursor-based listing shared by the source tree and the destination catalog.
///
/// For the source, `container` is the parent folder id. For the destination,
/// it is the catalog id obtained from scope resolution.
#[async_trait]
pub trait PaginatedBrowser: Send + Sync {
    type Item: Send;

    /// List one page of `container`.
    ///
    /// # Errors
    ///
    /// - `ApiError::AuthFailure` for 401/403; never retried here
    /// - `ApiError::ProviderError` for any other non-2xx
    /// - `ApiError::TransportFailure` for network problems
    async fn list_page(
        &self,
        container: &str,
        request: &PageRequest,
    ) -> ApiResult<Page<Self::Item>>;
}

/// Stack of visited page positions for forward/backward navigation.
///
/// ```
/// use bridge_traits::browse::{PageCheckpoints, PageCursor, PageRequest};
///
/// let mut pages = PageCheckpoints::new(PageRequest::first(25));
/// pages.advance(&PageCursor::Link("https://lr.adobe.io/next".into()), 25);
/// assert_eq!(pages.current().offset, 25);
/// pages.retreat();
/// assert_eq!(pages.current().offset, 0);
/// ```
#[derive(Debug, Clone)]
pub struct PageCheckpoints {
    history: Vec<PageRequest>,
    current: PageRequest,
}

impl PageCheckpoints {
    pub fn new(first: PageRequest) -> Self {
        Self {
            history: Vec::new(),
            current: first,
        }
    }

    pub fn current(&self) -> &PageRequest {
        &self.current
    }

    /// Move to the page addressed by `next`, remembering the current one.
    ///
    /// `page_len` is the number of items on the page being left; it keeps the
    /// display offset meaningful when following link cursors.
    pub fn advance(&mut self, next: &PageCursor, page_len: usize) -> &PageRequest {
        let previous = self.current.clone();
        let next_request = match next {
            PageCursor::Offset { .. } => PageRequest::from_cursor(next),
            PageCursor::Link(link) => PageRequest {
                offset: previous.offset.saturating_add(page_len as u32),
                limit: previous.limit,
                cursor: Some(link.clone()),
            },
        };
        self.history.push(previous);
        self.current = next_request;
        &self.current
    }

    /// Return to the previously visited page. `None` when already at the first.
    pub fn retreat(&mut self) -> Option<&PageRequest> {
        let previous = self.history.pop()?;
        self.current = previous;
        Some(&self.current)
    }

    pub fn depth(&self) -> usize {
        self.history.len()
    }

    pub fn is_first(&self) -> bool {
        self.history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_entry_kind() {
        let folder = SourceEntry::new("f1", "Trips", CONTAINER_CONTENT_TYPE);
        let photo = SourceEntry::new("p1", "beach.jpg", "image/jpeg").with_size(2048);
        let doc = SourceEntry::new("d1", "notes.pdf", "application/pdf");

        assert!(folder.is_container());
        assert!(!folder.is_media());
        assert!(photo.is_media());
        assert_eq!(photo.size_bytes, Some(2048));
        assert!(!doc.is_media());
        assert!(!doc.is_container());
    }

    #[test]
    fn test_page_request_from_cursor() {
        let offset = PageRequest::from_cursor(&PageCursor::Offset {
            offset: 50,
            limit: 25,
        });
        assert_eq!(offset, PageRequest::at(50, 25));

        let link = PageRequest::from_cursor(&PageCursor::Link("next?x=1".to_string()));
        assert_eq!(link.cursor.as_deref(), Some("next?x=1"));
        assert_eq!(link.limit, None);
    }

    #[test]
    fn test_checkpoints_advance_and_retreat() {
        let mut pages = PageCheckpoints::new(PageRequest::first(25));
        assert!(pages.is_first());

        pages.advance(&PageCursor::Link("page-2".to_string()), 25);
        pages.advance(&PageCursor::Link("page-3".to_string()), 25);
        assert_eq!(pages.depth(), 2);
        assert_eq!(pages.current().offset, 50);
        assert_eq!(pages.current().cursor.as_deref(), Some("page-3"));

        let back = pages.retreat().cloned().unwrap();
        assert_eq!(back.cursor.as_deref(), Some("page-2"));
        assert_eq!(back.offset, 25);

        pages.retreat();
        assert!(pages.is_first());
        assert_eq!(pages.current(), &PageRequest::first(25));
        assert!(pages.retreat().is_none());
    }

    #[test]
    fn test_page_has_more() {
        let page: Page<u8> = Page::single(vec![1, 2]);
        assert!(!page.has_more());
    }
}
