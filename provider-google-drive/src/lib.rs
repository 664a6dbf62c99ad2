//! # Google Drive Provider
//!
//! Source side of the transfer engine, over Google Drive API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Folder listing through [`PaginatedBrowser`](bridge_traits::PaginatedBrowser)
//! - Image and video listing of a folder
//! - Folder path display with a bounded ancestor walk
//! - Content download through [`SourceFetcher`](bridge_traits::SourceFetcher)
//! - A connection check against the `about` endpoint
//!
//! Errors are reported as [`ApiError`](bridge_traits::ApiError).

pub mod browser;
pub mod types;

pub use browser::{DriveBrowser, DRIVE_API_BASE, FOLDER_PAGE_SIZE, ROOT_DISPLAY_NAME, ROOT_FOLDER_ID};
pub use types::DriveUser;
