use super::*;
use crate::error::PersistenceError;
use crate::events::{CountEvent, Direction};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Memory store that refuses chosen tracks or goes offline on demand
struct FlakyStore {
    inner: MemoryCountStore,
    failing_tracks: Mutex<HashSet<u64>>,
    offline: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryCountStore::new(),
            failing_tracks: Mutex::new(HashSet::new()),
            offline: AtomicBool::new(false),
        }
    }

    fn fail_track(&self, track_id: u64) {
        self.failing_tracks.lock().insert(track_id);
    }

    fn heal(&self) {
        self.failing_tracks.lock().clear();
        self.offline.store(false, Ordering::SeqCst);
    }

    fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(PersistenceError::Unavailable {
                details: "connection refused".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CountStore for FlakyStore {
    async fn ping(&self) -> StoreResult<()> {
        self.check_online()
    }

    async fn ensure_active_session(&self) -> StoreResult<SessionTotals> {
        self.check_online()?;
        self.inner.ensure_active_session().await
    }

    async fn active_session(&self) -> StoreResult<Option<SessionTotals>> {
        self.check_online()?;
        self.inner.active_session().await
    }

    async fn persist_event(
        &self,
        session_id: u64,
        day: NaiveDate,
        event: &CountEvent,
    ) -> StoreResult<StoredEvent> {
        self.check_online()?;
        if self.failing_tracks.lock().contains(&event.track_id) {
            return Err(PersistenceError::Rejected {
                details: format!("commit failed for track {}", event.track_id),
            });
        }
        self.inner.persist_event(session_id, day, event).await
    }

    async fn daily_totals(&self, day: NaiveDate) -> StoreResult<DailyTotals> {
        self.check_online()?;
        self.inner.daily_totals(day).await
    }

    async fn find_daily_totals(&self, day: NaiveDate) -> StoreResult<Option<DailyTotals>> {
        self.check_online()?;
        self.inner.find_daily_totals(day).await
    }

    async fn record_occupancy(&self, day: NaiveDate, occupancy: u64) -> StoreResult<DailyTotals> {
        self.check_online()?;
        self.inner.record_occupancy(day, occupancy).await
    }

    async fn end_active_session(&self, at: DateTime<Utc>) -> StoreResult<Option<SessionTotals>> {
        self.check_online()?;
        self.inner.end_active_session(at).await
    }

    async fn recent_events(&self, limit: usize) -> StoreResult<Vec<StoredEvent>> {
        self.check_online()?;
        self.inner.recent_events(limit).await
    }

    async fn reset(&self) -> StoreResult<()> {
        self.check_online()?;
        self.inner.reset().await
    }
}

fn event(direction: Direction, track_id: u64) -> CountEvent {
    CountEvent::new(direction, 0.8, track_id, Utc::now())
}

fn setup(capacity: usize) -> (DeliveryHandle, Arc<FlakyStore>, DeliveryConsumer) {
    let handle = DeliveryHandle::new(capacity).unwrap();
    let store = Arc::new(FlakyStore::new());
    let consumer = DeliveryConsumer::new(handle.clone(), store.clone(), 5);
    (handle, store, consumer)
}

#[test]
fn test_drained_events_are_backed_up() {
    let handle = DeliveryHandle::new(10).unwrap();
    handle.enqueue(event(Direction::In, 1));
    handle.enqueue(event(Direction::Out, 2));

    let drained = handle.drain();
    let backed_up = handle.recoverable();
    assert_eq!(drained, backed_up);
    assert_eq!(handle.pending(), 0);
    assert!(handle.drain().is_empty());
}

#[test]
fn test_handle_rejects_zero_capacity() {
    assert!(DeliveryHandle::new(0).is_err());
}

#[tokio::test]
async fn test_process_pending_without_events() {
    let (_handle, _store, consumer) = setup(10);

    let report = consumer.process_pending().await;
    assert_eq!(report.status, OperationStatus::NoEvents);
    assert_eq!(report.saved_count, 0);
}

#[tokio::test]
async fn test_process_pending_saves_and_recomputes_occupancy() {
    let (handle, store, consumer) = setup(10);
    handle.enqueue(event(Direction::In, 1));
    handle.enqueue(event(Direction::In, 2));
    handle.enqueue(event(Direction::Out, 1));

    let report = consumer.process_pending().await;

    assert_eq!(report.status, OperationStatus::Success);
    assert_eq!(report.saved_count, 3);
    assert_eq!(report.failed_count, 0);
    assert_eq!(report.current_occupancy, 1);
    assert_eq!(report.peak_occupancy, 1);
    assert_eq!(report.total_entries_today, 2);
    assert_eq!(report.total_exits_today, 1);
    assert!(report.session_id.is_some());
    assert_eq!(store.inner.event_count(), 3);
}

#[tokio::test]
async fn test_failed_event_does_not_abort_batch() {
    let (handle, store, consumer) = setup(10);
    store.fail_track(2);
    for track in 1..=3 {
        handle.enqueue(event(Direction::In, track));
    }

    let report = consumer.process_pending().await;

    assert_eq!(report.status, OperationStatus::Partial);
    assert_eq!(report.saved_count, 2);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.failed_events[0].track_id, 2);
    assert!(report.warning.is_some());
    assert_eq!(report.current_occupancy, 2);
}

#[tokio::test]
async fn test_drained_events_survive_store_outage() {
    let (handle, store, consumer) = setup(10);
    store.go_offline();
    handle.enqueue(event(Direction::In, 1));
    handle.enqueue(event(Direction::Out, 2));

    let report = consumer.process_pending().await;

    assert_eq!(report.status, OperationStatus::Error);
    assert_eq!(report.failed_count, 2);
    assert_eq!(handle.pending(), 0);

    let recoverable: Vec<u64> = handle.recoverable().iter().map(|e| e.track_id).collect();
    assert_eq!(recoverable, vec![1, 2]);
}

#[tokio::test]
async fn test_recovery_with_empty_backup_is_info() {
    let (_handle, _store, consumer) = setup(10);

    let report = consumer.recover().await;
    assert_eq!(report.status, OperationStatus::Info);
}

#[tokio::test]
async fn test_partial_recovery_keeps_backup_intact() {
    let (handle, store, consumer) = setup(10);
    store.go_offline();
    for track in 1..=3 {
        handle.enqueue(event(Direction::In, track));
    }
    consumer.process_pending().await;

    store.heal();
    store.fail_track(3);

    let report = consumer.recover().await;
    assert_eq!(report.status, OperationStatus::Partial);
    assert_eq!(report.recovered_count, 2);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.cleared_count, 0);
    assert_eq!(report.remaining_count, 3);
    assert_eq!(handle.recoverable().len(), 3);
}

#[tokio::test]
async fn test_full_recovery_clears_backup() {
    let (handle, store, consumer) = setup(10);
    store.go_offline();
    handle.enqueue(event(Direction::In, 1));
    handle.enqueue(event(Direction::In, 2));
    consumer.process_pending().await;

    store.heal();
    let report = consumer.recover().await;

    assert_eq!(report.status, OperationStatus::Success);
    assert_eq!(report.recovered_count, 2);
    assert_eq!(report.cleared_count, 2);
    assert_eq!(report.remaining_count, 0);
    assert!(handle.recoverable().is_empty());

    let stats = consumer.stats().await;
    assert_eq!(stats.today_entries, 2);
    assert_eq!(stats.current_occupancy, 2);
}

#[tokio::test]
async fn test_recovery_while_offline_reports_error() {
    let (handle, store, consumer) = setup(10);
    handle.enqueue(event(Direction::Out, 1));
    handle.drain();
    store.go_offline();

    let report = consumer.recover().await;
    assert_eq!(report.status, OperationStatus::Error);
    assert_eq!(report.remaining_count, 1);
}

#[tokio::test]
async fn test_stats_report_recent_events() {
    let (handle, _store, consumer) = setup(10);
    for track in 1..=7 {
        handle.enqueue(event(Direction::In, track));
    }
    handle.enqueue(event(Direction::Out, 8));
    consumer.process_pending().await;

    let stats = consumer.stats().await;

    assert_eq!(stats.status, OperationStatus::Success);
    assert_eq!(stats.today_entries, 7);
    assert_eq!(stats.today_exits, 1);
    assert_eq!(stats.current_occupancy, 6);
    assert_eq!(stats.peak_occupancy, 6);
    assert_eq!(stats.session_entries, 7);
    assert_eq!(stats.recent_events.len(), 5);
    assert_eq!(stats.recent_events[0].timestamp.len(), 8);
}

#[tokio::test]
async fn test_stats_when_store_offline() {
    let (_handle, store, consumer) = setup(10);
    store.go_offline();

    let stats = consumer.stats().await;
    assert_eq!(stats.status, OperationStatus::Error);
    assert!(stats.message.is_some());
}

#[tokio::test]
async fn test_end_session() {
    let (handle, _store, consumer) = setup(10);

    let report = consumer.end_session().await;
    assert_eq!(report.status, OperationStatus::Info);

    handle.enqueue(event(Direction::In, 1));
    consumer.process_pending().await;

    let report = consumer.end_session().await;
    assert_eq!(report.status, OperationStatus::Success);
    assert_eq!(report.total_entries, Some(1));
    assert_eq!(report.total_exits, Some(0));

    // the next pass opens a fresh session
    handle.enqueue(event(Direction::In, 2));
    let batch = consumer.process_pending().await;
    assert_ne!(batch.session_id, report.session_id);
}

#[tokio::test]
async fn test_reset_requires_confirmation() {
    let (handle, store, consumer) = setup(10);
    handle.enqueue(event(Direction::In, 1));
    consumer.process_pending().await;

    let report = consumer.reset("yes").await;
    assert_eq!(report.status, OperationStatus::Error);
    assert_eq!(store.inner.event_count(), 1);

    let report = consumer.reset("RESET").await;
    assert_eq!(report.status, OperationStatus::Success);
    assert_eq!(store.inner.event_count(), 0);
    assert!(handle.recoverable().is_empty());
}

#[tokio::test]
async fn test_status_reflects_store_and_backup() {
    let (handle, store, consumer) = setup(10);
    consumer.ensure_ready().await.unwrap();
    handle.enqueue(event(Direction::In, 1));

    let status = consumer.status(true).await;
    assert_eq!(status.status, OperationStatus::Success);
    assert_eq!(status.auto_save, "operational");
    assert_eq!(status.session, "active");
    assert_eq!(status.today_data, "active");
    assert_eq!(status.camera, "active");
    assert_eq!(status.pending_events, 1);

    store.go_offline();
    let status = consumer.status(false).await;
    assert_eq!(status.status, OperationStatus::Error);
    assert_eq!(status.auto_save, "degraded");
    assert_eq!(status.database, "unreachable");
    assert_eq!(status.camera, "inactive");
}

#[tokio::test]
async fn test_ensure_ready_fails_when_offline() {
    let (_handle, store, consumer) = setup(10);
    store.go_offline();
    assert!(consumer.ensure_ready().await.is_err());
}

#[tokio::test]
async fn test_report_serializes_snake_case_status() {
    let (_handle, _store, consumer) = setup(10);
    let report = consumer.process_pending().await;

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "no_events");
    assert!(json.get("warning").is_none());
}

#[tokio::test]
async fn test_poller_delivers_until_cancelled() {
    let (handle, store, consumer) = setup(10);
    let consumer = Arc::new(consumer);
    let token = CancellationToken::new();

    let task = DeliveryPoller::new(Arc::clone(&consumer), Duration::from_millis(10))
        .spawn(token.clone());

    handle.enqueue(event(Direction::In, 1));
    let mut delivered = false;
    for _ in 0..100 {
        if store.inner.event_count() == 1 {
            delivered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(delivered);

    token.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();
}
