//! Event bus between the download engine and the session layer.
//!
//! The engine reports lifecycle and telemetry events for one torrent;
//! the session controller and the dashboard subscribe independently. A
//! bounded replay ring lets a subscriber that attaches after the engine
//! has already started reporting catch up from a known event id (or from
//! the beginning). Delivery rides on `tokio::broadcast`; a subscriber
//! that falls too far behind skips ahead rather than stalling publishers.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// Identifier assigned to each event emitted by the engine.
pub type EventId = u64;

/// Replay ring size when none is given.
const DEFAULT_REPLAY_CAPACITY: usize = 256;

/// Lifecycle and telemetry events reported by the engine for one torrent.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The info hash became known (magnet resolution or metainfo parse).
    InfoHash { info_hash: String },
    /// A peer wire joined the swarm; carries the new swarm size.
    WireJoined { total_wires: usize },
    /// Full metadata (file list, lengths, name) is available.
    Metadata { name: String },
    /// Pre-download integrity pass over existing data on disk.
    Verifying {
        percent_done: f64,
        percent_verified: f64,
    },
    /// File list and length are known and local serving may begin.
    Ready,
    /// A piece request was reassigned from a slow wire to a faster one.
    Hotswap { piece_index: u64 },
    /// All data downloaded and verified.
    Done,
    /// Fatal engine failure; the session does not retry.
    EngineError { message: String },
}

impl Event {
    /// Machine-friendly discriminator, used in logs and tests.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Event::InfoHash { .. } => "info_hash",
            Event::WireJoined { .. } => "wire_joined",
            Event::Metadata { .. } => "metadata",
            Event::Verifying { .. } => "verifying",
            Event::Ready => "ready",
            Event::Hotswap { .. } => "hotswap",
            Event::Done => "done",
            Event::EngineError { .. } => "engine_error",
        }
    }
}

/// An event plus its id and emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct EventEnvelope {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub event: Event,
}

/// Id assignment and replay state, updated under one lock per publish.
struct Ring {
    entries: VecDeque<EventEnvelope>,
    next_id: EventId,
}

/// Shared event bus with bounded replay.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    ring: Arc<Mutex<Ring>>,
    capacity: usize,
}

impl EventBus {
    /// Bus with the given replay ring size, which also bounds the live
    /// channel.
    ///
    /// # Panics
    ///
    /// Panics when `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            ring: Arc::new(Mutex::new(Ring {
                entries: VecDeque::with_capacity(capacity),
                next_id: 1,
            })),
            capacity,
        }
    }

    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish an event, assigning the next sequential id.
    ///
    /// # Panics
    ///
    /// Panics if the ring mutex has been poisoned.
    pub fn publish(&self, event: Event) -> EventId {
        let envelope = {
            let mut ring = self.ring.lock().expect("event ring poisoned");
            let envelope = EventEnvelope {
                id: ring.next_id,
                timestamp: Utc::now(),
                event,
            };
            ring.next_id += 1;
            if ring.entries.len() == self.capacity {
                ring.entries.pop_front();
            }
            ring.entries.push_back(envelope.clone());
            envelope
        };

        let id = envelope.id;
        // Send fails only when no subscriber exists, which is fine.
        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe, replaying ring contents newer than `since_id` before any
    /// live events. `None` replays the whole ring.
    ///
    /// # Panics
    ///
    /// Panics if the ring mutex has been poisoned.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let receiver = self.sender.subscribe();
        let floor = since_id.unwrap_or(0);
        let backlog = {
            let ring = self.ring.lock().expect("event ring poisoned");
            ring.entries
                .iter()
                .filter(|entry| entry.id > floor)
                .cloned()
                .collect()
        };
        EventStream { backlog, receiver }
    }

    /// Id of the most recent event, if any were published.
    ///
    /// # Panics
    ///
    /// Panics if the ring mutex has been poisoned.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        let ring = self.ring.lock().expect("event ring poisoned");
        ring.entries.back().map(|entry| entry.id)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscriber view: buffered replay first, then the live channel.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: broadcast::Receiver<EventEnvelope>,
}

impl EventStream {
    /// Next event, or `None` once every publisher is gone. A lagged
    /// subscriber skips the overwritten span and keeps receiving.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(replayed) = self.backlog.pop_front() {
            return Some(replayed);
        }
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
