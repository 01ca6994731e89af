use crate::config::TrackerConfig;
use crate::crossing::CrossingDetector;
use crate::detection::Detection;
use crate::events::CountEvent;
use crate::geometry::Point;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};
use tracing::{debug, trace};

/// One tracked person, owned by the tracker
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: u64,
    pub last_center: Point,
    pub last_seen: SystemTime,
    pub confidence: f32,
    pub created_at: SystemTime,
}

/// What a single `update` call changed
#[derive(Debug, Clone, Default)]
pub struct TrackerUpdate {
    /// Crossing events in track-id order
    pub events: Vec<CountEvent>,
    /// Identities of tracks matched this frame
    pub matched: Vec<u64>,
    /// Identities of tracks created this frame
    pub created: Vec<u64>,
    /// Identities of tracks removed for exceeding the disappearance timeout
    pub expired: Vec<u64>,
}

/// Greedy nearest-neighbour centroid tracker
///
/// Tracks are visited in ascending identity order and each claims the closest
/// unclaimed detection strictly within `min_distance`. This is not a globally
/// optimal assignment: under ambiguous overlaps the lower identity wins.
pub struct CentroidTracker {
    tracks: BTreeMap<u64, Track>,
    next_track_id: u64,
    min_distance: f64,
    max_disappeared: Duration,
}

impl CentroidTracker {
    pub fn new(min_distance: f64, max_disappeared: Duration) -> Self {
        debug!(
            "Created centroid tracker (min distance {:.1}px, max disappeared {:?})",
            min_distance, max_disappeared
        );

        Self {
            tracks: BTreeMap::new(),
            next_track_id: 1,
            min_distance,
            max_disappeared,
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.min_distance_for_tracking, config.max_disappeared())
    }

    /// Feed one frame of detections observed at `now`
    pub fn update(
        &mut self,
        detections: &[Detection],
        crossing: &CrossingDetector,
        now: SystemTime,
    ) -> TrackerUpdate {
        let mut update = TrackerUpdate::default();
        let mut claimed = vec![false; detections.len()];
        let event_time = DateTime::<Utc>::from(now);

        for (track_id, track) in self.tracks.iter_mut() {
            let mut best: Option<(usize, f64)> = None;

            for (index, detection) in detections.iter().enumerate() {
                if claimed[index] {
                    continue;
                }

                let distance = track.last_center.distance_to(&detection.center);
                if distance < self.min_distance
                    && best.map_or(true, |(_, best_distance)| distance < best_distance)
                {
                    best = Some((index, distance));
                }
            }

            if let Some((index, distance)) = best {
                let detection = &detections[index];
                claimed[index] = true;

                trace!(
                    "Track {} matched detection {} at distance {:.1}",
                    track_id,
                    index,
                    distance
                );

                if let Some(event) = crossing.check(
                    track.last_center,
                    detection.center,
                    detection.confidence,
                    *track_id,
                    event_time,
                ) {
                    update.events.push(event);
                }

                track.last_center = detection.center;
                track.last_seen = now;
                track.confidence = detection.confidence;
                update.matched.push(*track_id);
            }
        }

        for (detection, _) in detections
            .iter()
            .zip(claimed.iter())
            .filter(|(_, claimed)| !**claimed)
        {
            let id = self.next_track_id;
            self.next_track_id += 1;

            self.tracks.insert(
                id,
                Track {
                    id,
                    last_center: detection.center,
                    last_seen: now,
                    confidence: detection.confidence,
                    created_at: now,
                },
            );
            update.created.push(id);
            debug!(
                "New track {} at ({}, {})",
                id, detection.center.x, detection.center.y
            );
        }

        let max_disappeared = self.max_disappeared;
        self.tracks.retain(|id, track| {
            let unseen = now.duration_since(track.last_seen).unwrap_or_default();
            if unseen > max_disappeared {
                update.expired.push(*id);
                debug!("Track {} expired after {:?} unseen", id, unseen);
                false
            } else {
                true
            }
        });

        update
    }

    pub fn active_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, id: u64) -> Option<&Track> {
        self.tracks.get(&id)
    }

    /// Active tracks in identity order
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// Identity the next new track will receive
    pub fn next_track_id(&self) -> u64 {
        self.next_track_id
    }

    /// Drop every active track; identities are still never reused
    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Direction;
    use crate::geometry::{CountingLine, CountingZones};

    fn at(seconds: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + seconds)
    }

    fn tracker() -> CentroidTracker {
        CentroidTracker::new(50.0, Duration::from_secs(10))
    }

    #[test]
    fn test_unmatched_detections_become_tracks() {
        let mut tracker = tracker();
        let crossing = CrossingDetector::new(CountingLine::new(320));

        let update = tracker.update(
            &[Detection::at(100, 100, 0.9), Detection::at(400, 100, 0.8)],
            &crossing,
            at(0),
        );

        assert_eq!(update.created, vec![1, 2]);
        assert!(update.events.is_empty());
        assert_eq!(tracker.active_count(), 2);
        assert_eq!(tracker.track(2).unwrap().last_center, Point::new(400, 100));
    }

    #[test]
    fn test_crossing_in_then_out() {
        let mut tracker = tracker();
        let crossing = CrossingDetector::new(CountingLine::new(50));

        tracker.update(&[Detection::at(40, 10, 0.9)], &crossing, at(0));

        let update = tracker.update(&[Detection::at(60, 10, 0.7)], &crossing, at(1));
        assert_eq!(update.events.len(), 1);
        assert_eq!(update.events[0].direction, Direction::In);
        assert_eq!(update.events[0].track_id, 1);
        assert_eq!(update.events[0].confidence, 0.7);

        let update = tracker.update(&[Detection::at(40, 10, 0.9)], &crossing, at(2));
        assert_eq!(update.events.len(), 1);
        assert_eq!(update.events[0].direction, Direction::Out);

        let update = tracker.update(&[Detection::at(30, 10, 0.9)], &crossing, at(3));
        assert!(update.events.is_empty());
        assert_eq!(tracker.next_track_id(), 2);
    }

    #[test]
    fn test_matched_track_is_updated_in_place() {
        let mut tracker = tracker();
        let crossing = CrossingDetector::new(CountingLine::new(320));

        tracker.update(&[Detection::at(100, 100, 0.6)], &crossing, at(0));
        let update = tracker.update(&[Detection::at(110, 105, 0.95)], &crossing, at(2));

        assert_eq!(update.matched, vec![1]);
        let track = tracker.track(1).unwrap();
        assert_eq!(track.last_center, Point::new(110, 105));
        assert_eq!(track.last_seen, at(2));
        assert_eq!(track.created_at, at(0));
        assert_eq!(track.confidence, 0.95);
    }

    #[test]
    fn test_distance_threshold_is_exclusive() {
        let mut tracker = tracker();
        let crossing = CrossingDetector::new(CountingLine::new(1000));

        tracker.update(&[Detection::at(0, 0, 0.9)], &crossing, at(0));
        let update = tracker.update(&[Detection::at(30, 40, 0.9)], &crossing, at(1));

        // distance is exactly 50: not eligible, so a second track appears
        assert!(update.matched.is_empty());
        assert_eq!(update.created, vec![2]);
    }

    #[test]
    fn test_contention_first_track_wins() {
        let mut tracker = tracker();
        let crossing = CrossingDetector::new(CountingLine::new(1000));

        tracker.update(
            &[Detection::at(100, 100, 0.9), Detection::at(140, 100, 0.9)],
            &crossing,
            at(0),
        );

        // one detection between both tracks, closer to track 2
        let update = tracker.update(&[Detection::at(125, 100, 0.9)], &crossing, at(1));

        assert_eq!(update.matched, vec![1]);
        assert!(update.created.is_empty());
        assert_eq!(tracker.track(1).unwrap().last_center, Point::new(125, 100));
        // track 2 missed this frame but survives until the timeout
        assert_eq!(tracker.track(2).unwrap().last_center, Point::new(140, 100));
        assert_eq!(tracker.track(2).unwrap().last_seen, at(0));
    }

    #[test]
    fn test_nearest_detection_is_chosen() {
        let mut tracker = tracker();
        let crossing = CrossingDetector::new(CountingLine::new(1000));

        tracker.update(&[Detection::at(100, 100, 0.9)], &crossing, at(0));
        let update = tracker.update(
            &[Detection::at(130, 100, 0.9), Detection::at(110, 100, 0.9)],
            &crossing,
            at(1),
        );

        assert_eq!(tracker.track(1).unwrap().last_center, Point::new(110, 100));
        assert_eq!(update.created, vec![2]);
        assert_eq!(tracker.track(2).unwrap().last_center, Point::new(130, 100));
    }

    #[test]
    fn test_expired_track_is_not_resurrected() {
        let mut tracker = tracker();
        let crossing = CrossingDetector::new(CountingLine::new(320));

        tracker.update(&[Detection::at(100, 100, 0.9)], &crossing, at(0));

        let update = tracker.update(&[], &crossing, at(10));
        assert!(update.expired.is_empty());
        assert_eq!(tracker.active_count(), 1);

        let update = tracker.update(&[], &crossing, at(11));
        assert_eq!(update.expired, vec![1]);
        assert_eq!(tracker.active_count(), 0);

        let update = tracker.update(&[Detection::at(102, 100, 0.9)], &crossing, at(12));
        assert_eq!(update.created, vec![2]);
        assert!(tracker.track(1).is_none());
    }

    #[test]
    fn test_zero_detections_produce_no_crossings() {
        let mut tracker = tracker();
        let crossing = CrossingDetector::new(CountingLine::new(320));

        tracker.update(&[Detection::at(300, 100, 0.9)], &crossing, at(0));
        for second in 1..=20 {
            let update = tracker.update(&[], &crossing, at(second));
            assert!(update.events.is_empty());
        }
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn test_two_people_cross_in_together() {
        let zones = CountingZones::from_frame(640, 480);
        let crossing = CrossingDetector::new(zones.line);
        // wide gate so both people stay matched across a 285px stride
        let mut tracker = CentroidTracker::new(300.0, Duration::from_secs(10));

        let update = tracker.update(
            &[Detection::at(45, 100, 0.9), Detection::at(300, 100, 0.8)],
            &crossing,
            at(0),
        );
        assert_eq!(update.created, vec![1, 2]);
        assert!(update.events.is_empty());

        let update = tracker.update(
            &[Detection::at(330, 100, 0.85), Detection::at(340, 100, 0.75)],
            &crossing,
            at(1),
        );

        assert_eq!(update.events.len(), 2);
        assert!(update.events.iter().all(|e| e.direction == Direction::In));
        let ids: Vec<u64> = update.events.iter().map(|e| e.track_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(update.created.is_empty());
    }

    #[test]
    fn test_identities_strictly_increase() {
        let mut tracker = CentroidTracker::new(50.0, Duration::from_secs(2));
        let crossing = CrossingDetector::new(CountingLine::new(320));
        let mut seen = Vec::new();

        for step in 0..30u64 {
            let x = ((step * 97) % 600) as i32;
            let detections = if step % 4 == 3 {
                Vec::new()
            } else {
                vec![Detection::at(x, 50, 0.9), Detection::at(600 - x, 300, 0.9)]
            };
            let update = tracker.update(&detections, &crossing, at(step));
            seen.extend(update.created);
        }

        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
