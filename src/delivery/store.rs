use crate::error::PersistenceError;
use crate::events::{CountEvent, Direction};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

pub type StoreResult<T> = std::result::Result<T, PersistenceError>;

/// Running totals of one counting session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionTotals {
    pub id: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_entries: u64,
    pub total_exits: u64,
}

impl SessionTotals {
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Running totals of one calendar day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub total_entries: u64,
    pub total_exits: u64,
    pub peak_occupancy: u64,
    pub current_occupancy: u64,
}

impl DailyTotals {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            total_entries: 0,
            total_exits: 0,
            peak_occupancy: 0,
            current_occupancy: 0,
        }
    }

    /// `max(0, entries - exits)`, derived from the totals and never stored as truth
    pub fn occupancy(&self) -> u64 {
        self.total_entries.saturating_sub(self.total_exits)
    }
}

/// A count event as the store recorded it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEvent {
    /// Store-assigned record identifier
    pub id: u64,
    /// Identifier of the originating `CountEvent`
    pub event_id: Uuid,
    pub session_id: u64,
    pub direction: Direction,
    pub people_count: u32,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

impl StoredEvent {
    pub fn from_event(id: u64, session_id: u64, event: &CountEvent) -> Self {
        Self {
            id,
            event_id: event.id,
            session_id,
            direction: event.direction,
            people_count: event.people_count,
            confidence: event.confidence,
            timestamp: event.timestamp,
        }
    }
}

/// Durable destination for delivered count events
///
/// `persist_event` must apply the event record and both aggregate bumps as
/// one unit: either all of them land or none do.
#[async_trait]
pub trait CountStore: Send + Sync {
    /// Check that the store is reachable
    async fn ping(&self) -> StoreResult<()>;

    /// Return the open session, creating one if none is open
    async fn ensure_active_session(&self) -> StoreResult<SessionTotals>;

    async fn active_session(&self) -> StoreResult<Option<SessionTotals>>;

    /// Record one event and add its `people_count` to the session's and the
    /// day's entry or exit total
    async fn persist_event(
        &self,
        session_id: u64,
        day: NaiveDate,
        event: &CountEvent,
    ) -> StoreResult<StoredEvent>;

    /// Totals for `day`, creating an empty record if none exists
    async fn daily_totals(&self, day: NaiveDate) -> StoreResult<DailyTotals>;

    /// Totals for `day` without creating a record
    async fn find_daily_totals(&self, day: NaiveDate) -> StoreResult<Option<DailyTotals>>;

    /// Set the day's current occupancy and raise its peak if exceeded
    async fn record_occupancy(&self, day: NaiveDate, occupancy: u64) -> StoreResult<DailyTotals>;

    /// Close the open session, if any, returning its final totals
    async fn end_active_session(&self, at: DateTime<Utc>) -> StoreResult<Option<SessionTotals>>;

    /// Most recent stored events, newest first
    async fn recent_events(&self, limit: usize) -> StoreResult<Vec<StoredEvent>>;

    /// Delete every event, session and daily record
    async fn reset(&self) -> StoreResult<()>;
}
