use crate::backup::{BackupStatsSnapshot, BackupStore, BackupStoreBuilder};
use crate::error::Result;
use crate::events::CountEvent;
use crate::queue::{EventQueue, EventQueueStatsSnapshot};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Shared handle to the event queue and its backup shadow
///
/// The capture loop enqueues through one clone; consumers drain through
/// others. Nothing here is global: whoever needs the pipeline gets a clone.
#[derive(Clone)]
pub struct DeliveryHandle {
    queue: Arc<EventQueue>,
    backup: Arc<BackupStore>,
}

/// Combined queue and backup counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    pub pending: usize,
    pub recoverable: usize,
    pub backup_capacity: usize,
    pub enqueued: u64,
    pub drained: u64,
    pub evicted: u64,
}

impl DeliveryHandle {
    pub fn new(backup_capacity: usize) -> Result<Self> {
        let backup = BackupStoreBuilder::new().capacity(backup_capacity).build()?;
        Ok(Self::from_parts(Arc::new(EventQueue::new()), Arc::new(backup)))
    }

    pub fn from_parts(queue: Arc<EventQueue>, backup: Arc<BackupStore>) -> Self {
        Self { queue, backup }
    }

    pub fn enqueue(&self, event: CountEvent) {
        self.queue.enqueue(event);
    }

    /// Atomically take every pending event and shadow it into the backup
    /// before the caller sees it.
    pub fn drain(&self) -> Vec<CountEvent> {
        let events = self.queue.drain_and_clear();
        if !events.is_empty() {
            debug!("Drained {} pending count events", events.len());
            self.backup.record_on_drain(&events);
        }
        events
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn recoverable(&self) -> Vec<CountEvent> {
        self.backup.list_recoverable()
    }

    pub fn clear_recovered(&self) -> usize {
        self.backup.clear_after_recovery()
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn backup(&self) -> &Arc<BackupStore> {
        &self.backup
    }

    pub fn stats(&self) -> DeliveryStats {
        let queue: EventQueueStatsSnapshot = self.queue.stats();
        let backup: BackupStatsSnapshot = self.backup.stats();

        DeliveryStats {
            pending: self.queue.len(),
            recoverable: self.backup.len(),
            backup_capacity: self.backup.capacity(),
            enqueued: queue.enqueued,
            drained: queue.drained,
            evicted: backup.evicted,
        }
    }
}
