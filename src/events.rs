use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Crossing direction relative to the counting line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Exit side to entry side
    In,
    /// Entry side to exit side
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected line crossing. Immutable once created.
///
/// `id` is unique per crossing and is what a consumer deduplicates on if it
/// needs exactly-once semantics on top of at-least-once delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountEvent {
    pub id: Uuid,
    pub direction: Direction,
    pub people_count: u32,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
    pub track_id: u64,
}

impl CountEvent {
    pub fn new(
        direction: Direction,
        confidence: f32,
        track_id: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            direction,
            people_count: 1,
            confidence,
            timestamp,
            track_id,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        format!(
            "Person {} - {} (confidence: {:.2})",
            self.track_id, self.direction, self.confidence
        )
    }
}
