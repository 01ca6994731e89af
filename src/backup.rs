use crate::error::{CounterError, Result};
use crate::events::CountEvent;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Bounded shadow log of every drained event
///
/// Holds a copy of each event handed to the consumer, whatever the consumer
/// did with it, so a failed save can be replayed later. Oldest entries are
/// evicted first once `capacity` is reached.
pub struct BackupStore {
    events: Mutex<VecDeque<CountEvent>>,
    capacity: usize,
    stats: BackupStats,
}

/// Counters for backup traffic
#[derive(Debug, Default)]
pub struct BackupStats {
    pub recorded: AtomicU64,
    pub evicted: AtomicU64,
    pub cleared: AtomicU64,
}

/// Snapshot of backup counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupStatsSnapshot {
    pub recorded: u64,
    pub evicted: u64,
    pub cleared: u64,
}

impl BackupStats {
    pub fn snapshot(&self) -> BackupStatsSnapshot {
        BackupStatsSnapshot {
            recorded: self.recorded.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            cleared: self.cleared.load(Ordering::Relaxed),
        }
    }
}

impl BackupStore {
    /// Create a backup store holding at most `capacity` events
    ///
    /// # Panics
    /// Panics if `capacity` is 0; use [`BackupStoreBuilder`] for a fallible
    /// constructor.
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 {
            panic!("Backup store capacity must be greater than 0");
        }

        debug!("Created backup store with capacity {}", capacity);

        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
            stats: BackupStats::default(),
        }
    }

    /// Append drained events, evicting the oldest on overflow
    pub fn record_on_drain(&self, events: &[CountEvent]) {
        if events.is_empty() {
            return;
        }

        let (total, evicted) = {
            let mut backup = self.events.lock();
            let mut evicted = 0u64;
            for event in events {
                if backup.len() == self.capacity {
                    backup.pop_front();
                    evicted += 1;
                }
                backup.push_back(event.clone());
            }
            (backup.len(), evicted)
        };

        self.stats
            .recorded
            .fetch_add(events.len() as u64, Ordering::Relaxed);

        if evicted > 0 {
            self.stats.evicted.fetch_add(evicted, Ordering::Relaxed);
            warn!(
                "Backup store full, evicted {} oldest events (capacity {})",
                evicted, self.capacity
            );
        }

        info!(
            "Backed up {} events, total backup: {}",
            events.len(),
            total
        );
    }

    /// Copy of the retained events, oldest first
    pub fn list_recoverable(&self) -> Vec<CountEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Drop every retained event and return how many there were. Run only
    /// after a recovery batch has been fully persisted.
    pub fn clear_after_recovery(&self) -> usize {
        let cleared = {
            let mut backup = self.events.lock();
            let cleared = backup.len();
            backup.clear();
            cleared
        };

        self.stats
            .cleared
            .fetch_add(cleared as u64, Ordering::Relaxed);
        info!("Cleared {} backup events", cleared);
        cleared
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> BackupStatsSnapshot {
        self.stats.snapshot()
    }
}

/// Builder for creating backup stores with validation
pub struct BackupStoreBuilder {
    capacity: Option<usize>,
}

impl BackupStoreBuilder {
    pub fn new() -> Self {
        Self { capacity: None }
    }

    /// Set the retained event capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn build(self) -> Result<BackupStore> {
        let capacity = self
            .capacity
            .ok_or_else(|| CounterError::system("Backup store capacity must be specified"))?;

        if capacity == 0 {
            return Err(CounterError::system(
                "Backup store capacity must be greater than 0",
            ));
        }

        Ok(BackupStore::new(capacity))
    }
}

impl Default for BackupStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Direction;
    use chrono::Utc;
    use std::sync::Arc;

    fn events(range: std::ops::Range<u64>) -> Vec<CountEvent> {
        range
            .map(|track_id| CountEvent::new(Direction::Out, 0.7, track_id, Utc::now()))
            .collect()
    }

    #[test]
    fn test_record_and_list() {
        let store = BackupStore::new(10);
        let batch = events(0..3);
        store.record_on_drain(&batch);

        assert_eq!(store.list_recoverable(), batch);
        assert_eq!(store.stats().recorded, 3);
    }

    #[test]
    fn test_overflow_keeps_most_recent_in_order() {
        let store = BackupStore::new(1000);
        let all = events(0..1500);
        for chunk in all.chunks(64) {
            store.record_on_drain(chunk);
        }

        let kept = store.list_recoverable();
        assert_eq!(kept.len(), 1000);
        assert_eq!(kept.as_slice(), &all[500..]);
        assert_eq!(store.stats().evicted, 500);
    }

    #[test]
    fn test_single_oversized_batch() {
        let store = BackupStore::new(3);
        let batch = events(0..5);
        store.record_on_drain(&batch);

        let kept: Vec<u64> = store.list_recoverable().iter().map(|e| e.track_id).collect();
        assert_eq!(kept, vec![2, 3, 4]);
    }

    #[test]
    fn test_clear_returns_count() {
        let store = BackupStore::new(100);
        store.record_on_drain(&events(0..42));

        assert_eq!(store.clear_after_recovery(), 42);
        assert!(store.list_recoverable().is_empty());
        assert_eq!(store.clear_after_recovery(), 0);
        assert_eq!(store.stats().cleared, 42);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = BackupStore::new(10);
        store.record_on_drain(&events(0..2));

        let mut snapshot = store.list_recoverable();
        snapshot.clear();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_builder_validation() {
        assert!(BackupStoreBuilder::new().build().is_err());
        assert!(BackupStoreBuilder::new().capacity(0).build().is_err());

        let store = BackupStoreBuilder::new().capacity(5).build().unwrap();
        assert_eq!(store.capacity(), 5);
    }

    #[test]
    fn test_concurrent_record_and_clear() {
        let store = Arc::new(BackupStore::new(50));
        let mut handles = Vec::new();

        for writer in 0..4u64 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    store.record_on_drain(&events(writer * 1000 + i..writer * 1000 + i + 1));
                }
            }));
        }

        let reader = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let mut cleared = 0;
                for _ in 0..20 {
                    assert!(store.list_recoverable().len() <= 50);
                    cleared += store.clear_after_recovery();
                }
                cleared
            })
        };

        for handle in handles {
            handle.join().unwrap();
        }
        let cleared = reader.join().unwrap();

        let stats = store.stats();
        assert_eq!(stats.recorded, 400);
        assert_eq!(
            stats.recorded,
            stats.evicted + cleared as u64 + store.len() as u64
        );
    }
}
