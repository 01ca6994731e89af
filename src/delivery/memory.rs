use super::store::{CountStore, DailyTotals, SessionTotals, StoreResult, StoredEvent};
use crate::error::PersistenceError;
use crate::events::{CountEvent, Direction};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Default)]
struct MemoryState {
    sessions: Vec<SessionTotals>,
    days: BTreeMap<NaiveDate, DailyTotals>,
    events: Vec<StoredEvent>,
    next_session_id: u64,
    next_event_id: u64,
}

impl MemoryState {
    fn active_session_mut(&mut self) -> Option<&mut SessionTotals> {
        self.sessions.iter_mut().rev().find(|s| s.is_active())
    }

    fn day_mut(&mut self, day: NaiveDate) -> &mut DailyTotals {
        self.days.entry(day).or_insert_with(|| {
            info!("Created new daily count record for {}", day);
            DailyTotals::new(day)
        })
    }
}

/// In-process count store
///
/// Keeps sessions, per-day totals and the event log behind one mutex, so each
/// `persist_event` is applied atomically. Contents are lost on restart.
pub struct MemoryCountStore {
    state: Mutex<MemoryState>,
}

impl MemoryCountStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                next_session_id: 1,
                next_event_id: 1,
                ..Default::default()
            }),
        }
    }

    /// All sessions, oldest first
    pub fn sessions(&self) -> Vec<SessionTotals> {
        self.state.lock().sessions.clone()
    }

    pub fn event_count(&self) -> usize {
        self.state.lock().events.len()
    }
}

impl Default for MemoryCountStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CountStore for MemoryCountStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn ensure_active_session(&self) -> StoreResult<SessionTotals> {
        let mut state = self.state.lock();
        if let Some(session) = state.active_session_mut() {
            return Ok(session.clone());
        }

        let session = SessionTotals {
            id: state.next_session_id,
            start_time: Utc::now(),
            end_time: None,
            total_entries: 0,
            total_exits: 0,
        };
        state.next_session_id += 1;
        state.sessions.push(session.clone());

        info!("Created counting session {}", session.id);
        Ok(session)
    }

    async fn active_session(&self) -> StoreResult<Option<SessionTotals>> {
        Ok(self.state.lock().active_session_mut().map(|s| s.clone()))
    }

    async fn persist_event(
        &self,
        session_id: u64,
        day: NaiveDate,
        event: &CountEvent,
    ) -> StoreResult<StoredEvent> {
        let mut state = self.state.lock();
        let people = event.people_count as u64;

        let session = state
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.is_active())
            .ok_or(PersistenceError::SessionMissing)?;
        match event.direction {
            Direction::In => session.total_entries += people,
            Direction::Out => session.total_exits += people,
        }

        let totals = state.day_mut(day);
        match event.direction {
            Direction::In => totals.total_entries += people,
            Direction::Out => totals.total_exits += people,
        }

        let stored = StoredEvent::from_event(state.next_event_id, session_id, event);
        state.next_event_id += 1;
        state.events.push(stored.clone());

        debug!(
            "Stored event {} ({}) in session {}",
            stored.id, stored.direction, session_id
        );
        Ok(stored)
    }

    async fn daily_totals(&self, day: NaiveDate) -> StoreResult<DailyTotals> {
        Ok(self.state.lock().day_mut(day).clone())
    }

    async fn find_daily_totals(&self, day: NaiveDate) -> StoreResult<Option<DailyTotals>> {
        Ok(self.state.lock().days.get(&day).cloned())
    }

    async fn record_occupancy(&self, day: NaiveDate, occupancy: u64) -> StoreResult<DailyTotals> {
        let mut state = self.state.lock();
        let totals = state.day_mut(day);
        totals.current_occupancy = occupancy;
        if occupancy > totals.peak_occupancy {
            totals.peak_occupancy = occupancy;
            info!("New peak occupancy: {}", occupancy);
        }
        Ok(totals.clone())
    }

    async fn end_active_session(&self, at: DateTime<Utc>) -> StoreResult<Option<SessionTotals>> {
        let mut state = self.state.lock();
        Ok(state.active_session_mut().map(|session| {
            session.end_time = Some(at);
            session.clone()
        }))
    }

    async fn recent_events(&self, limit: usize) -> StoreResult<Vec<StoredEvent>> {
        let state = self.state.lock();
        let mut newest: Vec<&StoredEvent> = state.events.iter().collect();
        newest.sort_unstable_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));

        // only the returned records are cloned
        Ok(newest.into_iter().take(limit).cloned().collect())
    }

    async fn reset(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.sessions.clear();
        state.days.clear();
        state.events.clear();
        Ok(())
    }
}
