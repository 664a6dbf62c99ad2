use thiserror::Error;

use crate::item::TransferOutcome;

/// Run-level aborts. Per-item failures are outcomes, never errors.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Transfer cancelled after {} items", completed.len())]
    Cancelled { completed: Vec<TransferOutcome> },

    #[error("Authentication failed: {reason}")]
    AuthFailure {
        reason: String,
        completed: Vec<TransferOutcome>,
    },

    #[error("Invalid transfer configuration: {0}")]
    InvalidConfig(String),
}

impl TransferError {
    /// Outcomes recorded before the abort, in input order.
    pub fn completed(&self) -> &[TransferOutcome] {
        match self {
            TransferError::Cancelled { completed } => completed,
            TransferError::AuthFailure { completed, .. } => completed,
            TransferError::InvalidConfig(_) => &[],
        }
    }

    pub fn into_completed(self) -> Vec<TransferOutcome> {
        match self {
            TransferError::Cancelled { completed } => completed,
            TransferError::AuthFailure { completed, .. } => completed,
            TransferError::InvalidConfig(_) => Vec::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
