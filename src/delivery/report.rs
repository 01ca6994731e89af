use super::store::StoredEvent;
use crate::events::{CountEvent, Direction};
use serde::Serialize;

/// Outcome class carried by every consumer-facing report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Success,
    Partial,
    NoEvents,
    Info,
    Error,
}

/// Result of one delivery pass over the event queue
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub status: OperationStatus,
    pub message: String,
    pub saved_count: usize,
    pub failed_count: usize,
    /// Records the store accepted, in delivery order
    pub events: Vec<StoredEvent>,
    /// Events the store refused; they remain in the backup for recovery
    pub failed_events: Vec<CountEvent>,
    pub current_occupancy: u64,
    pub peak_occupancy: u64,
    pub session_id: Option<u64>,
    pub total_entries_today: u64,
    pub total_exits_today: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl BatchReport {
    pub fn no_events() -> Self {
        Self::empty(OperationStatus::NoEvents, "No new count events".to_string())
    }

    /// Whole batch failed before any event reached the store
    pub fn failed(message: String, events: Vec<CountEvent>) -> Self {
        let mut report = Self::empty(OperationStatus::Error, message);
        report.failed_count = events.len();
        report.failed_events = events;
        report
    }

    fn empty(status: OperationStatus, message: String) -> Self {
        Self {
            status,
            message,
            saved_count: 0,
            failed_count: 0,
            events: Vec::new(),
            failed_events: Vec::new(),
            current_occupancy: 0,
            peak_occupancy: 0,
            session_id: None,
            total_entries_today: 0,
            total_exits_today: 0,
            warning: None,
        }
    }
}

/// Result of replaying the backup store
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryReport {
    pub status: OperationStatus,
    pub message: String,
    pub recovered_count: usize,
    pub failed_count: usize,
    /// Events dropped from the backup after a fully successful replay
    pub cleared_count: usize,
    /// Events still held in the backup
    pub remaining_count: usize,
}

impl RecoveryReport {
    pub fn new(status: OperationStatus, message: String) -> Self {
        Self {
            status,
            message,
            recovered_count: 0,
            failed_count: 0,
            cleared_count: 0,
            remaining_count: 0,
        }
    }
}

/// Recent event as shown to dashboards
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentEvent {
    pub direction: Direction,
    pub people_count: u32,
    /// Wall-clock time formatted `HH:MM:SS`
    pub timestamp: String,
    pub confidence: f32,
}

impl From<&StoredEvent> for RecentEvent {
    fn from(event: &StoredEvent) -> Self {
        Self {
            direction: event.direction,
            people_count: event.people_count,
            timestamp: event.timestamp.format("%H:%M:%S").to_string(),
            confidence: event.confidence,
        }
    }
}

/// Real-time statistics
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub status: OperationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub current_occupancy: u64,
    pub today_entries: u64,
    pub today_exits: u64,
    pub peak_occupancy: u64,
    pub session_entries: u64,
    pub session_exits: u64,
    pub recent_events: Vec<RecentEvent>,
}

impl StatsReport {
    pub fn error(message: String) -> Self {
        Self {
            status: OperationStatus::Error,
            message: Some(message),
            current_occupancy: 0,
            today_entries: 0,
            today_exits: 0,
            peak_occupancy: 0,
            session_entries: 0,
            session_exits: 0,
            recent_events: Vec::new(),
        }
    }
}

/// Result of closing the active session
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub status: OperationStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_entries: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_exits: Option<u64>,
}

impl SessionReport {
    pub fn new(status: OperationStatus, message: String) -> Self {
        Self {
            status,
            message,
            session_id: None,
            total_entries: None,
            total_exits: None,
        }
    }
}

/// Health of the delivery path
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: OperationStatus,
    /// `operational` or `degraded`
    pub auto_save: &'static str,
    /// `connected` or `unreachable`
    pub database: &'static str,
    /// `active` or `none`
    pub session: &'static str,
    /// `active` or `none`
    pub today_data: &'static str,
    /// `active` or `inactive`
    pub camera: &'static str,
    pub session_id: Option<u64>,
    pub entries_today: u64,
    pub exits_today: u64,
    pub pending_events: usize,
    pub recoverable_events: usize,
    pub evicted_events: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Result of wiping all counts
#[derive(Debug, Clone, Serialize)]
pub struct ResetReport {
    pub status: OperationStatus,
    pub message: String,
}
