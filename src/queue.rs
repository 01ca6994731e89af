use crate::events::CountEvent;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Pending count events awaiting delivery, in detection order
///
/// Enqueue and drain share one mutex; a drain swaps the whole buffer out in a
/// single critical section, so an event enqueued concurrently lands either in
/// this drain or the next one, never both and never neither.
pub struct EventQueue {
    events: Mutex<Vec<CountEvent>>,
    stats: EventQueueStats,
}

/// Counters for queue traffic
#[derive(Debug, Default)]
pub struct EventQueueStats {
    pub enqueued: AtomicU64,
    pub drained: AtomicU64,
    pub drain_calls: AtomicU64,
}

/// Snapshot of queue counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQueueStatsSnapshot {
    pub enqueued: u64,
    pub drained: u64,
    pub drain_calls: u64,
}

impl EventQueueStats {
    pub fn snapshot(&self) -> EventQueueStatsSnapshot {
        EventQueueStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            drained: self.drained.load(Ordering::Relaxed),
            drain_calls: self.drain_calls.load(Ordering::Relaxed),
        }
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            stats: EventQueueStats::default(),
        }
    }

    pub fn enqueue(&self, event: CountEvent) {
        trace!("Enqueueing count event {}", event.id);
        self.events.lock().push(event);
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Take every queued event, leaving the queue empty. Never blocks on an
    /// empty queue.
    pub fn drain_and_clear(&self) -> Vec<CountEvent> {
        let events = std::mem::take(&mut *self.events.lock());
        self.stats.drain_calls.fetch_add(1, Ordering::Relaxed);
        self.stats
            .drained
            .fetch_add(events.len() as u64, Ordering::Relaxed);
        events
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn stats(&self) -> EventQueueStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
