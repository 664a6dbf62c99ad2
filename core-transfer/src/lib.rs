//! # Transfer Module
//!
//! Moves images and videos from a tree-structured source into a destination
//! album.
//!
//! ## Components
//!
//! - **Items** (`item`): `TransferItem`, `TransferOutcome`, `TransferStatus`
//! - **Pipeline** (`pipeline`): batched download, create, upload, associate
//! - **Observers** (`observer`): progress reporting and run summaries
//!
//! The pipeline talks to the providers only through
//! [`SourceFetcher`](bridge_traits::SourceFetcher) and
//! [`DestinationWriter`](bridge_traits::DestinationWriter).

pub mod error;
pub mod item;
pub mod observer;
pub mod pipeline;

pub use error::{Result, TransferError};
pub use item::{new_asset_id, AssetSubtype, TransferItem, TransferOutcome, TransferStatus};
pub use observer::{
    EventBusObserver, RunStarted, TracingObserver, TransferObserver, TransferSummary,
};
pub use pipeline::{TransferOptions, TransferPipeline, MAX_CONCURRENT_ITEMS, UNKNOWN_IMPORTER};
pub use tokio_util::sync::CancellationToken;
