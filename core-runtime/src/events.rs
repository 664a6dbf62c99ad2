//! # Event Bus System
//!
//! Provides decoupled notification of authentication and transfer progress
//! using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies per domain
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ```text
//! ┌──────────────────┐    emit     ┌───────────┐   subscribe   ┌────────────┐
//! │ Session managers ├────────────>│           ├──────────────>│ Subscriber │
//! └──────────────────┘             │ EventBus  │               └────────────┘
//! ┌──────────────────┐    emit     │           │   subscribe   ┌────────────┐
//! │ Transfer pipeline├────────────>│           ├──────────────>│ Subscriber │
//! └──────────────────┘             └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Auth(AuthEvent::SigningIn {
//!         service: "adobe".to_string(),
//!     }))
//!     .ok();
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   Non-fatal; the subscriber keeps receiving newer events.
//! - **`RecvError::Closed`**: All senders have been dropped.
//!
//! Emitting with no subscribers returns an error; publishers ignore it with
//! `.ok()` because nobody listening is a normal situation.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session lifecycle events
    Auth(AuthEvent),
    /// Transfer pipeline events
    Transfer(TransferEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Transfer(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Transfer(TransferEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Transfer(TransferEvent::ItemCompleted { succeeded: false, .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Transfer(TransferEvent::Cancelled { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SignedIn { .. }) => EventSeverity::Info,
            CoreEvent::Transfer(TransferEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events emitted by a session manager. `service` is the stable service key
/// (`google`, `adobe`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// Interactive authorization started.
    SigningIn { service: String },
    /// A fresh session was obtained interactively.
    SignedIn {
        service: String,
        /// Expiry of the new access token (Unix epoch seconds).
        expires_at: i64,
    },
    /// Persisted credentials were cleared.
    SignedOut { service: String },
    /// Refresh of an expired access token started.
    TokenRefreshing { service: String },
    /// Refresh succeeded.
    TokenRefreshed { service: String, expires_at: i64 },
    /// Session acquisition or refresh failed.
    AuthError {
        service: String,
        message: String,
        /// Whether a later attempt may succeed without user action.
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SigningIn { .. } => "Authorization in progress",
            AuthEvent::SignedIn { .. } => "Signed in successfully",
            AuthEvent::SignedOut { .. } => "Signed out",
            AuthEvent::TokenRefreshing { .. } => "Refreshing access token",
            AuthEvent::TokenRefreshed { .. } => "Token refreshed successfully",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }
}

// ============================================================================
// Transfer Events
// ============================================================================

/// Progress of a transfer run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum TransferEvent {
    Started {
        run_id: String,
        total_items: u64,
        batch_count: u64,
        destination_container_id: String,
    },
    BatchStarted {
        run_id: String,
        /// Zero-based batch index.
        batch_index: u64,
        batch_count: u64,
        size: u64,
    },
    ItemCompleted {
        run_id: String,
        /// Position of the item in the input listing.
        index: u64,
        name: String,
        status: String,
        succeeded: bool,
        detail: String,
    },
    Completed {
        run_id: String,
        succeeded: u64,
        degraded: u64,
        failed: u64,
        duration_ms: u64,
    },
    Cancelled {
        run_id: String,
        items_processed: u64,
    },
    Failed {
        run_id: String,
        message: String,
        items_processed: u64,
    },
}

impl TransferEvent {
    fn description(&self) -> &str {
        match self {
            TransferEvent::Started { .. } => "Transfer started",
            TransferEvent::BatchStarted { .. } => "Batch started",
            TransferEvent::ItemCompleted { .. } => "Item finished",
            TransferEvent::Completed { .. } => "Transfer completed",
            TransferEvent::Cancelled { .. } => "Transfer cancelled",
            TransferEvent::Failed { .. } => "Transfer aborted",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel shared by every publisher and subscriber.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers that fall behind by more than `capacity` events receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let transfers_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Transfer(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map(|f| f(event)).unwrap_or(true)
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
