use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Live counters published by the capture loop
#[derive(Debug, Default)]
pub struct CaptureStats {
    pub frames_processed: AtomicU64,
    pub detections: AtomicU64,
    pub events_emitted: AtomicU64,
    pub detector_failures: AtomicU64,
    pub active_tracks: AtomicU64,
    pub last_frame_id: AtomicU64,
    pub running: AtomicBool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStatsSnapshot {
    pub frames_processed: u64,
    pub detections: u64,
    pub events_emitted: u64,
    pub detector_failures: u64,
    pub active_tracks: u64,
    pub last_frame_id: u64,
    pub running: bool,
}

impl CaptureStats {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> CaptureStatsSnapshot {
        CaptureStatsSnapshot {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            detections: self.detections.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            detector_failures: self.detector_failures.load(Ordering::Relaxed),
            active_tracks: self.active_tracks.load(Ordering::Relaxed),
            last_frame_id: self.last_frame_id.load(Ordering::Relaxed),
            running: self.is_running(),
        }
    }
}
