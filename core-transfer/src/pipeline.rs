//! # Transfer Pipeline
//!
//! Copies a source listing into a destination album in fixed-size batches.
//!
//! ## Workflow
//!
//! 1. Resolve the importer identity once (falls back to `Unknown`)
//! 2. Split the listing into batches of `batch_size`
//! 3. For every item: download, create, upload, associate
//! 4. Report each outcome to the observer as it lands
//!
//! Items inside a batch run one at a time unless `max_concurrent_items`
//! is raised; outcomes are always returned in input order. Nothing is
//! retried here. Cancellation is checked before every batch and every item.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_transfer::{TransferOptions, TransferPipeline};
//! use std::sync::Arc;
//!
//! let pipeline = TransferPipeline::new(Arc::new(drive), Arc::new(lightroom))
//!     .with_options(TransferOptions { batch_size: 5, max_concurrent_items: 2 });
//!
//! let entries = drive.list_transferable(&folder_id).await?;
//! let outcomes = pipeline.run(entries, &album.id, &catalog.catalog_id).await?;
//! ```

use bridge_traits::browse::SourceEntry;
use bridge_traits::error::ApiError;
use bridge_traits::time::{Clock, SystemClock};
use bridge_traits::transfer::{AssetMetadata, DestinationWriter, SourceFetcher};
use core_runtime::config::{CoreConfig, DEFAULT_BATCH_SIZE};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{Result, TransferError};
use crate::item::{TransferItem, TransferOutcome, TransferStatus};
use crate::observer::{RunStarted, TracingObserver, TransferObserver, TransferSummary};

/// Importer recorded when the destination account lookup fails.
pub const UNKNOWN_IMPORTER: &str = "Unknown";

/// Upper bound of `max_concurrent_items`.
pub const MAX_CONCURRENT_ITEMS: usize = 16;

/// Pipeline tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    pub batch_size: usize,
    pub max_concurrent_items: usize,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrent_items: 1,
        }
    }
}

impl TransferOptions {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_concurrent_items: config.max_concurrent_items,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(TransferError::InvalidConfig(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if !(1..=MAX_CONCURRENT_ITEMS).contains(&self.max_concurrent_items) {
            return Err(TransferError::InvalidConfig(format!(
                "max_concurrent_items must be between 1 and {}",
                MAX_CONCURRENT_ITEMS
            )));
        }
        Ok(())
    }
}

/// Per-run values shared by every item.
struct RunContext<'a> {
    run_id: &'a str,
    catalog_id: &'a str,
    importer: &'a str,
}

/// Why an item stopped before the end.
struct ItemFailure {
    status: TransferStatus,
    detail: String,
    auth_failure: bool,
}

impl ItemFailure {
    fn from_api(status: TransferStatus, error: ApiError) -> Self {
        Self {
            status,
            detail: error.to_string(),
            auth_failure: error.is_auth_failure(),
        }
    }
}

/// Result of a single item, before it is reported.
struct ItemResult {
    outcome: TransferOutcome,
    /// Set when the item hit an authentication failure in any phase.
    auth_failure: Option<String>,
}

/// Batched download, create, upload, associate.
pub struct TransferPipeline {
    source: Arc<dyn SourceFetcher>,
    destination: Arc<dyn DestinationWriter>,
    observer: Arc<dyn TransferObserver>,
    clock: Arc<dyn Clock>,
    options: TransferOptions,
}

impl TransferPipeline {
    pub fn new(source: Arc<dyn SourceFetcher>, destination: Arc<dyn DestinationWriter>) -> Self {
        Self {
            source,
            destination,
            observer: Arc::new(TracingObserver),
            clock: Arc::new(SystemClock),
            options: TransferOptions::default(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Clock used for the capture date of new assets.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_options(mut self, options: TransferOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> TransferOptions {
        self.options
    }

    /// Transfer `entries` into album `destination_container_id` of catalog
    /// `catalog_id`. Returns one outcome per entry, in input order.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` before anything is sent
    /// - `AuthFailure` after the first item that hit one; earlier outcomes
    ///   and the failing item's outcome are carried in the error
    pub async fn run(
        &self,
        entries: Vec<SourceEntry>,
        destination_container_id: &str,
        catalog_id: &str,
    ) -> Result<Vec<TransferOutcome>> {
        self.run_with_cancellation(
            entries,
            destination_container_id,
            catalog_id,
            &CancellationToken::new(),
        )
        .await
    }

    /// [`run`](Self::run) that stops at the next batch or item boundary once
    /// `cancel` fires. Items already in flight finish.
    ///
    /// # Errors
    ///
    /// As `run`, plus `Cancelled` carrying the outcomes completed so far.
    pub async fn run_with_cancellation(
        &self,
        entries: Vec<SourceEntry>,
        destination_container_id: &str,
        catalog_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<TransferOutcome>> {
        self.options.validate()?;

        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let span = info_span!("transfer_run", run_id = %run_id, album_id = %destination_container_id);

        async {
            let items: Vec<TransferItem> = entries
                .into_iter()
                .enumerate()
                .map(|(index, entry)| TransferItem::new(index, entry, destination_container_id))
                .collect();

            let batch_size = self.options.batch_size;
            let batch_count = items.len().div_ceil(batch_size);

            self.observer.on_run_started(&RunStarted {
                run_id: run_id.clone(),
                total_items: items.len(),
                batch_count,
                destination_container_id: destination_container_id.to_string(),
            });

            let importer = if items.is_empty() {
                UNKNOWN_IMPORTER.to_string()
            } else {
                self.resolve_importer().await
            };

            let ctx = RunContext {
                run_id: &run_id,
                catalog_id,
                importer: &importer,
            };

            let mut outcomes = Vec::with_capacity(items.len());
            let mut remaining = items.into_iter().peekable();
            let mut batch_index = 0;

            while remaining.peek().is_some() {
                if cancel.is_cancelled() {
                    return Err(self.abort(&run_id, TransferError::Cancelled { completed: outcomes }));
                }

                let batch: Vec<TransferItem> = remaining.by_ref().take(batch_size).collect();
                self.observer
                    .on_batch_started(&run_id, batch_index, batch_count, batch.len());

                let (mut batch_outcomes, auth_failure) = self.run_batch(batch, &ctx, cancel).await;
                outcomes.append(&mut batch_outcomes);

                if let Some(reason) = auth_failure {
                    return Err(self.abort(
                        &run_id,
                        TransferError::AuthFailure {
                            reason,
                            completed: outcomes,
                        },
                    ));
                }
                if cancel.is_cancelled() {
                    return Err(self.abort(&run_id, TransferError::Cancelled { completed: outcomes }));
                }

                batch_index += 1;
            }

            let summary = TransferSummary::from_outcomes(&outcomes, started.elapsed());
            self.observer.on_run_finished(&run_id, &summary);
            Ok(outcomes)
        }
        .instrument(span)
        .await
    }

    fn abort(&self, run_id: &str, error: TransferError) -> TransferError {
        self.observer.on_run_aborted(run_id, &error);
        error
    }

    async fn resolve_importer(&self) -> String {
        match self.destination.importer_identity().await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Importer identity unavailable, using {}", UNKNOWN_IMPORTER);
                UNKNOWN_IMPORTER.to_string()
            }
        }
    }

    /// Runs one batch. Returns the outcomes in input order and the reason of
    /// the first authentication failure, if any.
    async fn run_batch(
        &self,
        batch: Vec<TransferItem>,
        ctx: &RunContext<'_>,
        cancel: &CancellationToken,
    ) -> (Vec<TransferOutcome>, Option<String>) {
        // Stops new items on cancellation or on the first auth failure.
        let stop = cancel.child_token();
        let mut outcomes = Vec::with_capacity(batch.len());
        let mut auth_failure = None;

        let mut results = stream::iter(batch)
            .map(|item| {
                let stop = stop.clone();
                async move {
                    if stop.is_cancelled() {
                        debug!(index = item.index, "Skipping item after stop");
                        return None;
                    }
                    Some(self.transfer_item(item, ctx).await)
                }
            })
            .buffered(self.options.max_concurrent_items);

        while let Some(result) = results.next().await {
            let Some(ItemResult {
                outcome,
                auth_failure: item_auth_failure,
            }) = result
            else {
                continue;
            };

            self.observer.on_item_finished(ctx.run_id, &outcome);
            outcomes.push(outcome);

            if let Some(reason) = item_auth_failure {
                stop.cancel();
                auth_failure.get_or_insert(reason);
            }
        }

        (outcomes, auth_failure)
    }

    async fn transfer_item(&self, item: TransferItem, ctx: &RunContext<'_>) -> ItemResult {
        let span = info_span!(
            "transfer_item",
            index = item.index,
            asset_id = %item.generated_asset_id
        );

        async {
            match self.copy_asset(&item, ctx).await {
                Ok(None) => ItemResult {
                    outcome: TransferOutcome::succeeded(item),
                    auth_failure: None,
                },
                Ok(Some((warning, auth_failure))) => ItemResult {
                    outcome: TransferOutcome::degraded(item, warning),
                    auth_failure,
                },
                Err(failure) => {
                    let auth_failure = failure.auth_failure.then(|| failure.detail.clone());
                    ItemResult {
                        outcome: TransferOutcome::failed(item, failure.status, failure.detail),
                        auth_failure,
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// The four phases of one item. `Ok(Some(..))` is a success whose album
    /// association failed: the warning, plus the auth failure reason when
    /// that was the cause.
    async fn copy_asset(
        &self,
        item: &TransferItem,
        ctx: &RunContext<'_>,
    ) -> std::result::Result<Option<(String, Option<String>)>, ItemFailure> {
        let entry = &item.source_entry;
        let asset_id = item.generated_asset_id.as_str();

        let source_id = entry.id.as_deref().ok_or_else(|| ItemFailure {
            status: TransferStatus::DownloadFailed,
            detail: "missing id".to_string(),
            auth_failure: false,
        })?;

        let content = self
            .source
            .fetch(source_id)
            .await
            .map_err(|e| ItemFailure::from_api(TransferStatus::DownloadFailed, e))?;
        if content.is_empty() {
            return Err(ItemFailure {
                status: TransferStatus::DownloadFailed,
                detail: "empty content".to_string(),
                auth_failure: false,
            });
        }
        debug!(bytes = content.len(), "Downloaded");

        let metadata = AssetMetadata {
            file_name: entry.display_name.clone(),
            subtype: item.subtype(),
            capture_date: self.clock.now(),
            imported_by: ctx.importer.to_string(),
        };
        self.destination
            .create_asset(ctx.catalog_id, asset_id, &metadata)
            .await
            .map_err(|e| ItemFailure::from_api(TransferStatus::CreateFailed, e))?;

        // A failed upload leaves the created asset in the catalog.
        self.destination
            .upload_master(ctx.catalog_id, asset_id, &entry.content_type, content)
            .await
            .map_err(|e| ItemFailure::from_api(TransferStatus::UploadFailed, e))?;

        match self
            .destination
            .add_to_album(ctx.catalog_id, &item.destination_container_id, asset_id)
            .await
        {
            Ok(()) => {
                info!(name = %entry.display_name, "Asset transferred");
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "Asset uploaded but not added to album");
                let auth_failure = e.is_auth_failure().then(|| e.to_string());
                Ok(Some((format!("Uploaded but not added to album: {}", e), auth_failure)))
            }
        }
    }
}
