//! # Transfer Observers
//!
//! The pipeline reports progress through an injected [`TransferObserver`]
//! instead of writing to a console. Two observers ship with the crate:
//!
//! - [`TracingObserver`] writes every callback to `tracing`
//! - [`EventBusObserver`] republishes them as [`CoreEvent::Transfer`]
//!
//! All callbacks have empty default bodies so an observer only implements
//! what it cares about.

use core_runtime::events::{CoreEvent, EventBus, TransferEvent};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::TransferError;
use crate::item::{TransferOutcome, TransferStatus};

/// Shape of a run, reported once before the first batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStarted {
    pub run_id: String,
    pub total_items: usize,
    pub batch_count: usize,
    pub destination_container_id: String,
}

/// Counts of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferSummary {
    pub total: usize,
    /// Succeeded items, degraded ones included.
    pub succeeded: usize,
    /// Succeeded items that were not added to the album.
    pub degraded: usize,
    pub failed: usize,
    pub failed_by_status: BTreeMap<TransferStatus, usize>,
    #[serde(skip)]
    pub duration: Duration,
}

impl TransferSummary {
    pub fn from_outcomes(outcomes: &[TransferOutcome], duration: Duration) -> Self {
        let mut summary = TransferSummary {
            total: outcomes.len(),
            duration,
            ..Default::default()
        };

        for outcome in outcomes {
            if outcome.is_success() {
                summary.succeeded += 1;
                if outcome.is_degraded() {
                    summary.degraded += 1;
                }
            } else {
                summary.failed += 1;
                *summary.failed_by_status.entry(outcome.status).or_insert(0) += 1;
            }
        }

        summary
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Receiver of pipeline progress.
pub trait TransferObserver: Send + Sync {
    fn on_run_started(&self, _run: &RunStarted) {}

    /// `batch_index` is zero-based.
    fn on_batch_started(&self, _run_id: &str, _batch_index: usize, _batch_count: usize, _size: usize) {}

    fn on_item_finished(&self, _run_id: &str, _outcome: &TransferOutcome) {}

    fn on_run_finished(&self, _run_id: &str, _summary: &TransferSummary) {}

    /// Called instead of `on_run_finished` when the run stops early.
    fn on_run_aborted(&self, _run_id: &str, _error: &TransferError) {}
}

/// Writes progress to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TransferObserver for TracingObserver {
    fn on_run_started(&self, run: &RunStarted) {
        info!(
            run_id = %run.run_id,
            total_items = run.total_items,
            batch_count = run.batch_count,
            album_id = %run.destination_container_id,
            "Transfer started"
        );
    }

    fn on_batch_started(&self, run_id: &str, batch_index: usize, batch_count: usize, size: usize) {
        info!(run_id, batch = batch_index + 1, batch_count, size, "Processing batch");
    }

    fn on_item_finished(&self, run_id: &str, outcome: &TransferOutcome) {
        let item = &outcome.item;
        if outcome.is_degraded() {
            warn!(run_id, index = item.index, name = %item.name(), detail = %outcome.detail, "Transferred without album association");
        } else if outcome.is_success() {
            info!(run_id, index = item.index, name = %item.name(), asset_id = %item.generated_asset_id, "Transferred");
        } else {
            warn!(run_id, index = item.index, name = %item.name(), status = %outcome.status, detail = %outcome.detail, "Transfer failed");
        }
    }

    fn on_run_finished(&self, run_id: &str, summary: &TransferSummary) {
        info!(
            run_id,
            succeeded = summary.succeeded,
            degraded = summary.degraded,
            failed = summary.failed,
            duration_ms = summary.duration.as_millis() as u64,
            "Transfer completed"
        );
    }

    fn on_run_aborted(&self, run_id: &str, error: &TransferError) {
        warn!(run_id, items_processed = error.completed().len(), error = %error, "Transfer aborted");
    }
}

/// Republishes progress on an [`EventBus`].
#[derive(Debug, Clone)]
pub struct EventBusObserver {
    bus: EventBus,
}

impl EventBusObserver {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    fn emit(&self, event: TransferEvent) {
        // No subscribers is not an error for a progress feed.
        self.bus.emit(CoreEvent::Transfer(event)).ok();
    }
}

impl TransferObserver for EventBusObserver {
    fn on_run_started(&self, run: &RunStarted) {
        self.emit(TransferEvent::Started {
            run_id: run.run_id.clone(),
            total_items: run.total_items as u64,
            batch_count: run.batch_count as u64,
            destination_container_id: run.destination_container_id.clone(),
        });
    }

    fn on_batch_started(&self, run_id: &str, batch_index: usize, batch_count: usize, size: usize) {
        self.emit(TransferEvent::BatchStarted {
            run_id: run_id.to_string(),
            batch_index: batch_index as u64,
            batch_count: batch_count as u64,
            size: size as u64,
        });
    }

    fn on_item_finished(&self, run_id: &str, outcome: &TransferOutcome) {
        self.emit(TransferEvent::ItemCompleted {
            run_id: run_id.to_string(),
            index: outcome.item.index as u64,
            name: outcome.item.name().to_string(),
            status: outcome.status.to_string(),
            succeeded: outcome.is_success(),
            detail: outcome.detail.clone(),
        });
    }

    fn on_run_finished(&self, run_id: &str, summary: &TransferSummary) {
        self.emit(TransferEvent::Completed {
            run_id: run_id.to_string(),
            succeeded: summary.succeeded as u64,
            degraded: summary.degraded as u64,
            failed: summary.failed as u64,
            duration_ms: summary.duration.as_millis() as u64,
        });
    }

    fn on_run_aborted(&self, run_id: &str, error: &TransferError) {
        let items_processed = error.completed().len() as u64;
        let event = match error {
            TransferError::Cancelled { .. } => TransferEvent::Cancelled {
                run_id: run_id.to_string(),
                items_processed,
            },
            other => TransferEvent::Failed {
                run_id: run_id.to_string(),
                message: other.to_string(),
                items_processed,
            },
        };
        self.emit(event);
    }
}
