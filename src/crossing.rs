use crate::events::{CountEvent, Direction};
use crate::geometry::{CountingLine, LineSide, Point};
use chrono::{DateTime, Utc};
use tracing::info;

/// Decides whether a center moved across the counting line
#[derive(Debug, Clone, Copy)]
pub struct CrossingDetector {
    line: CountingLine,
}

impl CrossingDetector {
    pub fn new(line: CountingLine) -> Self {
        Self { line }
    }

    pub fn line(&self) -> CountingLine {
        self.line
    }

    /// Direction of travel if `old` and `new` lie strictly on opposite sides.
    /// A center exactly on the line is on neither side.
    pub fn crossing_direction(&self, old: Point, new: Point) -> Option<Direction> {
        match (self.line.side_of(old.x), self.line.side_of(new.x)) {
            (LineSide::Exit, LineSide::Entry) => Some(Direction::In),
            (LineSide::Entry, LineSide::Exit) => Some(Direction::Out),
            _ => None,
        }
    }

    /// Build the count event for a track's move, if it crossed
    pub fn check(
        &self,
        old: Point,
        new: Point,
        confidence: f32,
        track_id: u64,
        timestamp: DateTime<Utc>,
    ) -> Option<CountEvent> {
        let direction = self.crossing_direction(old, new)?;
        let event = CountEvent::new(direction, confidence, track_id, timestamp);
        info!("Count event: {}", event.description());
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> CrossingDetector {
        CrossingDetector::new(CountingLine::new(50))
    }

    fn check(old_x: i32, new_x: i32) -> Option<CountEvent> {
        detector().check(
            Point::new(old_x, 100),
            Point::new(new_x, 100),
            0.8,
            7,
            Utc::now(),
        )
    }

    #[test]
    fn test_exit_to_entry_is_in() {
        let event = check(40, 60).unwrap();
        assert_eq!(event.direction, Direction::In);
        assert_eq!(event.track_id, 7);
        assert_eq!(event.confidence, 0.8);
    }

    #[test]
    fn test_entry_to_exit_is_out() {
        let event = check(60, 40).unwrap();
        assert_eq!(event.direction, Direction::Out);
    }

    #[test]
    fn test_same_side_never_counts() {
        assert!(check(10, 40).is_none());
        assert!(check(60, 90).is_none());
        assert!(check(45, 45).is_none());
    }

    #[test]
    fn test_touching_the_line_does_not_count() {
        assert!(check(40, 50).is_none());
        assert!(check(50, 60).is_none());
        assert!(check(50, 50).is_none());
        assert!(check(60, 50).is_none());
    }
}
