use super::handle::DeliveryHandle;
use super::report::{
    BatchReport, OperationStatus, RecentEvent, RecoveryReport, ResetReport, SessionReport,
    StatsReport, StatusReport,
};
use super::store::{CountStore, DailyTotals, StoreResult, StoredEvent};
use crate::error::Result;
use crate::events::CountEvent;
use chrono::{Local, NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Moves drained events into a `CountStore`
///
/// Every operation returns a report instead of an error. Delivery passes and
/// recovery replays are serialized so a recovery never clears events that a
/// concurrent pass has just shadowed into the backup.
pub struct DeliveryConsumer {
    handle: DeliveryHandle,
    store: Arc<dyn CountStore>,
    recent_limit: usize,
    delivery_lock: Mutex<()>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn outcome(saved: usize, failed: usize) -> OperationStatus {
    match (saved, failed) {
        (_, 0) => OperationStatus::Success,
        (0, _) => OperationStatus::Error,
        _ => OperationStatus::Partial,
    }
}

impl DeliveryConsumer {
    pub fn new(handle: DeliveryHandle, store: Arc<dyn CountStore>, recent_limit: usize) -> Self {
        Self {
            handle,
            store,
            recent_limit,
            delivery_lock: Mutex::new(()),
        }
    }

    pub fn handle(&self) -> &DeliveryHandle {
        &self.handle
    }

    /// Make sure today's record and an open session exist
    pub async fn ensure_ready(&self) -> Result<()> {
        self.store.ping().await?;
        let day = self.store.daily_totals(today()).await?;
        info!("Today's count record ready: {}", day.date);

        let session = self.store.ensure_active_session().await?;
        info!("Counting session {} active", session.id);
        Ok(())
    }

    /// Drain the queue and persist every event, isolating failures per event
    pub async fn process_pending(&self) -> BatchReport {
        let _guard = self.delivery_lock.lock().await;

        let events = self.handle.drain();
        if events.is_empty() {
            return BatchReport::no_events();
        }

        info!("Processing {} count events for automatic saving", events.len());

        let session = match self.store.ensure_active_session().await {
            Ok(session) => session,
            Err(e) => {
                error!("Failed to open counting session: {}", e);
                return BatchReport::failed(format!("Failed to create session: {}", e), events);
            }
        };

        let day = today();
        let total = events.len();
        let (saved, failed) = self.persist_all(session.id, day, events).await;
        let totals = self.refresh_occupancy(day).await;

        let status = outcome(saved.len(), failed.len());
        let mut report = BatchReport::no_events();
        report.status = status;
        report.message = format!("Auto-saved {}/{} count events", saved.len(), total);
        report.saved_count = saved.len();
        report.failed_count = failed.len();
        report.session_id = Some(session.id);
        if let Some(totals) = totals {
            report.current_occupancy = totals.current_occupancy;
            report.peak_occupancy = totals.peak_occupancy;
            report.total_entries_today = totals.total_entries;
            report.total_exits_today = totals.total_exits;
        }
        if !failed.is_empty() {
            warn!("{} events failed to save", failed.len());
            report.warning = Some(format!("{} events failed to save", failed.len()));
        }
        report.events = saved;
        report.failed_events = failed;

        info!("Auto-save complete: {} events saved", report.saved_count);
        report
    }

    /// Replay the backup; clear it only when every event was persisted
    pub async fn recover(&self) -> RecoveryReport {
        let _guard = self.delivery_lock.lock().await;

        let events = self.handle.recoverable();
        if events.is_empty() {
            return RecoveryReport::new(
                OperationStatus::Info,
                "No backup events to recover".to_string(),
            );
        }

        info!("Attempting to recover {} backup events", events.len());
        let total = events.len();

        let session = match self.store.ensure_active_session().await {
            Ok(session) => session,
            Err(e) => {
                error!("Backup recovery failed: {}", e);
                let mut report = RecoveryReport::new(OperationStatus::Error, e.to_string());
                report.failed_count = total;
                report.remaining_count = self.handle.backup().len();
                return report;
            }
        };

        let day = today();
        let (saved, failed) = self.persist_all(session.id, day, events).await;
        self.refresh_occupancy(day).await;

        let status = outcome(saved.len(), failed.len());
        let mut report = RecoveryReport::new(
            status,
            format!("Recovered {}/{} events from backup", saved.len(), total),
        );
        report.recovered_count = saved.len();
        report.failed_count = failed.len();

        if failed.is_empty() {
            report.cleared_count = self.handle.clear_recovered();
            info!("Successfully recovered {} events from backup", saved.len());
        } else {
            warn!(
                "Backup recovery incomplete ({} failed), keeping backup intact",
                failed.len()
            );
        }
        report.remaining_count = self.handle.backup().len();
        report
    }

    pub async fn stats(&self) -> StatsReport {
        match self.collect_stats().await {
            Ok(report) => report,
            Err(e) => {
                error!("Error getting stats: {}", e);
                StatsReport::error(e.to_string())
            }
        }
    }

    async fn collect_stats(&self) -> StoreResult<StatsReport> {
        let totals = self.store.daily_totals(today()).await?;
        let session = self.store.active_session().await?;
        let recent = self.store.recent_events(self.recent_limit).await?;

        Ok(StatsReport {
            status: OperationStatus::Success,
            message: None,
            current_occupancy: totals.occupancy(),
            today_entries: totals.total_entries,
            today_exits: totals.total_exits,
            peak_occupancy: totals.peak_occupancy,
            session_entries: session.as_ref().map_or(0, |s| s.total_entries),
            session_exits: session.as_ref().map_or(0, |s| s.total_exits),
            recent_events: recent.iter().map(RecentEvent::from).collect(),
        })
    }

    pub async fn end_session(&self) -> SessionReport {
        match self.store.end_active_session(Utc::now()).await {
            Ok(Some(session)) => {
                info!("Ended counting session {}", session.id);
                let mut report = SessionReport::new(
                    OperationStatus::Success,
                    format!("Session {} ended successfully", session.id),
                );
                report.session_id = Some(session.id);
                report.total_entries = Some(session.total_entries);
                report.total_exits = Some(session.total_exits);
                report
            }
            Ok(None) => {
                info!("End session requested but no active session found");
                SessionReport::new(OperationStatus::Info, "No active session to end".to_string())
            }
            Err(e) => {
                error!("Failed to end session: {}", e);
                SessionReport::new(OperationStatus::Error, e.to_string())
            }
        }
    }

    /// Wipe the store and the backup; `confirmation` must read `reset`
    pub async fn reset(&self, confirmation: &str) -> ResetReport {
        if !confirmation.trim().eq_ignore_ascii_case("reset") {
            return ResetReport {
                status: OperationStatus::Error,
                message: "Invalid confirmation".to_string(),
            };
        }

        let _guard = self.delivery_lock.lock().await;
        match self.store.reset().await {
            Ok(()) => {
                let cleared = self.handle.clear_recovered();
                info!("All count data has been reset ({} backup events dropped)", cleared);
                ResetReport {
                    status: OperationStatus::Success,
                    message: "All counts have been reset".to_string(),
                }
            }
            Err(e) => {
                error!("Error resetting counts: {}", e);
                ResetReport {
                    status: OperationStatus::Error,
                    message: e.to_string(),
                }
            }
        }
    }

    pub async fn status(&self, capture_running: bool) -> StatusReport {
        let delivery = self.handle.stats();
        let camera = if capture_running { "active" } else { "inactive" };

        let mut report = StatusReport {
            status: OperationStatus::Success,
            auto_save: "operational",
            database: "connected",
            session: "none",
            today_data: "none",
            camera,
            session_id: None,
            entries_today: 0,
            exits_today: 0,
            pending_events: delivery.pending,
            recoverable_events: delivery.recoverable,
            evicted_events: delivery.evicted,
            message: None,
        };

        let lookup = async {
            self.store.ping().await?;
            let session = self.store.active_session().await?;
            let totals = self.store.find_daily_totals(today()).await?;
            StoreResult::Ok((session, totals))
        };

        match lookup.await {
            Ok((session, totals)) => {
                if let Some(session) = session {
                    report.session = "active";
                    report.session_id = Some(session.id);
                }
                if let Some(totals) = totals {
                    report.today_data = "active";
                    report.entries_today = totals.total_entries;
                    report.exits_today = totals.total_exits;
                }
            }
            Err(e) => {
                error!("Auto-save status check failed: {}", e);
                report.status = OperationStatus::Error;
                report.auto_save = "degraded";
                report.database = "unreachable";
                report.message = Some(e.to_string());
            }
        }

        report
    }

    async fn persist_all(
        &self,
        session_id: u64,
        day: NaiveDate,
        events: Vec<CountEvent>,
    ) -> (Vec<StoredEvent>, Vec<CountEvent>) {
        let mut saved = Vec::with_capacity(events.len());
        let mut failed = Vec::new();

        for (index, event) in events.into_iter().enumerate() {
            match self.store.persist_event(session_id, day, &event).await {
                Ok(stored) => {
                    debug!(
                        "Saved {} event #{} as record {}",
                        stored.direction,
                        index + 1,
                        stored.id
                    );
                    saved.push(stored);
                }
                Err(e) => {
                    warn!("Failed to save event #{} ({}): {}", index + 1, event.id, e);
                    failed.push(event);
                }
            }
        }

        (saved, failed)
    }

    /// Recompute occupancy from today's totals and store it
    async fn refresh_occupancy(&self, day: NaiveDate) -> Option<DailyTotals> {
        let update = async {
            let totals = self.store.daily_totals(day).await?;
            self.store.record_occupancy(day, totals.occupancy()).await
        };

        match update.await {
            Ok(totals) => {
                info!("Updated occupancy: {} people", totals.current_occupancy);
                Some(totals)
            }
            Err(e) => {
                error!("Failed to update occupancy: {}", e);
                None
            }
        }
    }
}
