//! Bounded, shared event history
//!
//! The buffer is the one structure written by a source task and read by the HTTP
//! surface at the same time. A single mutex guards the ring and the session
//! registry, so a snapshot never observes an event without its session update.

use crate::event::AgentEvent;
use crate::session::{SessionInfo, SessionRegistry};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

/// Default ring capacity
pub const DEFAULT_MAX_EVENTS: usize = 20_000;

/// Capacity of the live-update channel handed to subscribers
const BROADCAST_CAPACITY: usize = 1024;

/// An event with its buffer sequence number
pub type Sequenced = (u64, AgentEvent);

struct Inner {
    events: VecDeque<Sequenced>,
    counter: u64,
    sessions: SessionRegistry,
}

/// Thread-safe ring of recent events plus the session registry they feed
pub struct EventBuffer {
    inner: Mutex<Inner>,
    max_events: usize,
    live_tx: broadcast::Sender<Sequenced>,
}

impl std::fmt::Debug for EventBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBuffer")
            .field("max_events", &self.max_events)
            .field("counter", &self.counter())
            .finish()
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS)
    }
}

impl EventBuffer {
    pub fn new(max_events: usize) -> Self {
        let (live_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        EventBuffer {
            inner: Mutex::new(Inner {
                events: VecDeque::with_capacity(max_events.min(4096)),
                counter: 0,
                sessions: SessionRegistry::new(),
            }),
            max_events: max_events.max(1),
            live_tx,
        }
    }

    /// A poisoned lock only means a reader panicked mid-copy; the data is still whole.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an event and return its sequence number.
    pub fn push(&self, event: AgentEvent) -> u64 {
        let mut inner = self.lock();
        inner.counter += 1;
        let seq = inner.counter;
        inner.sessions.observe(&event);
        if inner.events.len() >= self.max_events {
            inner.events.pop_front();
        }
        inner.events.push_back((seq, event.clone()));
        // Sent under the lock so subscribers see sequence numbers in order.
        // No subscribers is fine.
        let _ = self.live_tx.send((seq, event));
        seq
    }

    /// Sequence number of the newest event (0 when empty)
    pub fn counter(&self) -> u64 {
        self.lock().counter
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    /// Buffered events with a sequence number strictly greater than `since`
    pub fn events_since(&self, since: u64) -> Vec<Sequenced> {
        self.lock()
            .events
            .iter()
            .filter(|(seq, _)| *seq > since)
            .cloned()
            .collect()
    }

    /// Every buffered event, oldest first
    pub fn all_events(&self) -> Vec<AgentEvent> {
        self.lock().events.iter().map(|(_, e)| e.clone()).collect()
    }

    /// Copy of every known session in first-seen order
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.lock().sessions.list()
    }

    /// Total cost accumulated over all sessions
    pub fn total_cost(&self) -> f64 {
        self.lock().sessions.total_cost()
    }

    /// Whether the console should print events of this session
    pub fn is_visible(&self, session_id: &str) -> bool {
        self.lock().sessions.is_visible(session_id)
    }

    pub fn toggle_session(&self, session_id: &str) -> Option<bool> {
        self.lock().sessions.toggle_visible(session_id)
    }

    /// Receive every event pushed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Sequenced> {
        self.live_tx.subscribe()
    }
}
