//! # Event Bus System
//!
//! Broadcasts the progress of sector jobs using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The scheduler publishes an [`AssemblyEvent`] whenever a job is queued,
//! starts, changes state or terminates. Hosts subscribe to drive progress
//! displays or audit logs without polling the scheduler.
//!
//! ```text
//! ┌────────────────────┐     emit      ┌───────────┐     subscribe    ┌────────────┐
//! │ SectorJobScheduler ├──────────────>│ EventBus  ├─────────────────>│ Subscriber │
//! └────────────────────┘               │ (broadcast│                  └────────────┘
//!                                      │  channel) │     subscribe    ┌────────────┐
//!                                      │           ├─────────────────>│ Subscriber │
//!                                      └───────────┘                  └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AssemblyEvent, EventBus};
//! use core_model::{DatasetKey, JobKind, SectorKey};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut subscriber = bus.subscribe();
//!
//! bus.emit(AssemblyEvent::Queued {
//!     sector_key: SectorKey(1),
//!     dataset_key: DatasetKey(100),
//!     job: JobKind::Sync,
//! })
//! .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.sector_key(), SectorKey(1));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber was too slow and missed `n` events.
//! - **`RecvError::Closed`**: every sender was dropped.
//!
//! Emitting without subscribers returns an error that publishers ignore.

use core_model::{DatasetKey, ImportState, JobKind, SectorKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError, error::SendError, Receiver};

/// Default buffer size for the event bus
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Progress of a sector job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AssemblyEvent {
    /// Job admitted and waiting for the worker.
    Queued {
        sector_key: SectorKey,
        /// Source dataset of the sector
        dataset_key: DatasetKey,
        job: JobKind,
    },
    /// The worker picked up the job.
    Started {
        sector_key: SectorKey,
        attempt: u32,
        job: JobKind,
    },
    /// The job moved to another state.
    StateChanged {
        sector_key: SectorKey,
        attempt: u32,
        state: ImportState,
    },
    /// The job finished successfully.
    Completed {
        sector_key: SectorKey,
        attempt: u32,
        job: JobKind,
        /// Time spent waiting in the queue
        queued_ms: u64,
        /// Time spent running
        run_ms: u64,
        taxa: u64,
        synonyms: u64,
    },
    /// The job stopped with an error.
    Failed {
        sector_key: SectorKey,
        attempt: u32,
        job: JobKind,
        message: String,
    },
    /// The job was cancelled, before or while running.
    Cancelled {
        sector_key: SectorKey,
        attempt: u32,
        job: JobKind,
    },
}

impl AssemblyEvent {
    pub fn sector_key(&self) -> SectorKey {
        match self {
            AssemblyEvent::Queued { sector_key, .. }
            | AssemblyEvent::Started { sector_key, .. }
            | AssemblyEvent::StateChanged { sector_key, .. }
            | AssemblyEvent::Completed { sector_key, .. }
            | AssemblyEvent::Failed { sector_key, .. }
            | AssemblyEvent::Cancelled { sector_key, .. } => *sector_key,
        }
    }

    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            AssemblyEvent::Queued { .. } => "Sector job queued",
            AssemblyEvent::Started { .. } => "Sector job started",
            AssemblyEvent::StateChanged { .. } => "Sector job changed state",
            AssemblyEvent::Completed { .. } => "Sector job completed successfully",
            AssemblyEvent::Failed { .. } => "Sector job failed",
            AssemblyEvent::Cancelled { .. } => "Sector job cancelled",
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            AssemblyEvent::Failed { .. } => EventSeverity::Error,
            AssemblyEvent::Cancelled { .. } => EventSeverity::Warning,
            AssemblyEvent::Completed { .. } | AssemblyEvent::Started { .. } => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Whether the job is over after this event
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AssemblyEvent::Completed { .. } | AssemblyEvent::Failed { .. } | AssemblyEvent::Cancelled { .. }
        )
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

/// Central event bus for broadcasting job progress.
///
/// Cloning yields another handle to the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AssemblyEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// A subscriber falling behind by more than `capacity` events receives
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: AssemblyEvent) -> Result<usize, SendError<AssemblyEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber receiving all future events.
    pub fn subscribe(&self) -> Receiver<AssemblyEvent> {
        self.sender.subscribe()
    }

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

type EventFilter = Box<dyn Fn(&AssemblyEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream};
/// use core_model::SectorKey;
///
/// let bus = EventBus::new(100);
/// let stream = EventStream::new(bus.subscribe())
///     .filter(|event| event.sector_key() == SectorKey(7));
/// ```
pub struct EventStream {
    receiver: Receiver<AssemblyEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<AssemblyEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AssemblyEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<AssemblyEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            match &self.filter {
                Some(filter) if !filter(&event) => continue,
                _ => return Ok(event),
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

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(key: i32) -> AssemblyEvent {
        AssemblyEvent::Queued {
            sector_key: SectorKey(key),
            dataset_key: DatasetKey(100),
            job: JobKind::Sync,
        }
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(queued(1)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();
        assert_eq!(bus.emit(queued(1)).unwrap(), 2);
        assert_eq!(sub1.recv().await.unwrap(), queued(1));
        assert_eq!(sub2.recv().await.unwrap(), queued(1));
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe()).filter(|e| e.sector_key() == SectorKey(2));
        bus.emit(queued(1)).unwrap();
        bus.emit(queued(2)).unwrap();
        assert_eq!(stream.recv().await.unwrap(), queued(2));
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();
        for i in 0..5 {
            bus.emit(queued(i)).ok();
        }
        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let failed = AssemblyEvent::Failed {
            sector_key: SectorKey(1),
            attempt: 2,
            job: JobKind::Sync,
            message: "store offline".to_string(),
        };
        assert_eq!(failed.severity(), EventSeverity::Error);
        assert!(failed.is_terminal());

        let changed = AssemblyEvent::StateChanged {
            sector_key: SectorKey(1),
            attempt: 2,
            state: ImportState::Copying,
        };
        assert_eq!(changed.severity(), EventSeverity::Debug);
        assert!(!changed.is_terminal());
        assert_eq!(changed.description(), "Sector job changed state");
    }

    #[test]
    fn test_event_serialization() {
        let event = AssemblyEvent::Cancelled {
            sector_key: SectorKey(4),
            attempt: 1,
            job: JobKind::Delete,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "Cancelled");
        assert_eq!(json["sector_key"], 4);
        assert_eq!(json["job"], "delete");
        let back: AssemblyEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
