//! # Adobe Lightroom Provider
//!
//! Destination side of the transfer engine, over the Lightroom Partner API.
//!
//! - Catalog resolution ([`LightroomBrowser::resolve_scope`])
//! - Album paging with link cursors through
//!   [`PaginatedBrowser`](bridge_traits::PaginatedBrowser)
//! - Asset create, master upload and album association through
//!   [`DestinationWriter`](bridge_traits::DestinationWriter)
//!
//! Every JSON answer from Lightroom starts with `while (1) {}`; the client
//! built by [`LightroomBrowser::with_session`] removes it before decoding.

pub mod browser;
pub mod types;

pub use browser::{LightroomBrowser, DEFAULT_ALBUM_PAGE_SIZE, LIGHTROOM_API_BASE};
pub use types::Account;
