use super::source::{CaptureGuard, FrameSource};
use super::stats::CaptureStats;
use crate::config::CounterConfig;
use crate::crossing::CrossingDetector;
use crate::delivery::DeliveryHandle;
use crate::detection::{DetectionFilter, PersonDetector};
use crate::error::{CounterError, Result};
use crate::frame::FrameData;
use crate::geometry::CountingZones;
use crate::tracker::CentroidTracker;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Why the capture loop returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureExit {
    /// Stop was requested
    Stopped,
    /// The source ran out of frames
    SourceExhausted,
    /// Opening or reading the source failed
    SourceFailed(String),
}

/// Per-frame work: detect, filter, track, enqueue crossings
///
/// Owns the tracker exclusively; nothing outside the capture thread touches
/// track state.
pub struct FramePipeline {
    detector: Box<dyn PersonDetector>,
    filter: DetectionFilter,
    tracker: CentroidTracker,
    handle: DeliveryHandle,
    stats: Arc<CaptureStats>,
    zones: Option<CountingZones>,
}

impl FramePipeline {
    pub fn new(
        config: &CounterConfig,
        detector: Box<dyn PersonDetector>,
        handle: DeliveryHandle,
        stats: Arc<CaptureStats>,
    ) -> Self {
        Self {
            detector,
            filter: DetectionFilter::new(&config.detector, config.camera.mirror),
            tracker: CentroidTracker::from_config(&config.tracker),
            handle,
            stats,
            zones: None,
        }
    }

    pub fn zones(&self) -> Option<&CountingZones> {
        self.zones.as_ref()
    }

    pub fn tracker(&self) -> &CentroidTracker {
        &self.tracker
    }

    /// Process one frame, returning how many count events it produced
    pub fn process(&mut self, frame: &FrameData) -> usize {
        self.stats.frames_processed.fetch_add(1, Ordering::Relaxed);
        self.stats.last_frame_id.store(frame.id, Ordering::Relaxed);

        let crossing = self.crossing_for(frame);

        let raw = match self.detector.detect(frame) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Detection failed on frame {}, skipping: {}", frame.id, e);
                self.stats.detector_failures.fetch_add(1, Ordering::Relaxed);
                return 0;
            }
        };

        let detections = self.filter.apply(&raw, frame.width);
        self.stats
            .detections
            .fetch_add(detections.len() as u64, Ordering::Relaxed);

        let update = self.tracker.update(&detections, &crossing, frame.timestamp);
        let emitted = update.events.len();
        for event in update.events {
            self.handle.enqueue(event);
        }

        self.stats
            .active_tracks
            .store(self.tracker.active_count() as u64, Ordering::Relaxed);
        self.stats
            .events_emitted
            .fetch_add(emitted as u64, Ordering::Relaxed);

        debug!(
            "Frame {}: {} detections, {} tracks, {} events",
            frame.id,
            detections.len(),
            self.tracker.active_count(),
            emitted
        );
        emitted
    }

    fn crossing_for(&mut self, frame: &FrameData) -> CrossingDetector {
        let (width, height) = frame.dimensions();

        match self.zones {
            Some(zones) if zones.matches(width, height) => CrossingDetector::new(zones.line),
            previous => {
                if previous.is_some() {
                    info!(
                        "Frame geometry changed to {}x{}, resetting counting zones and tracks",
                        width, height
                    );
                    self.tracker.clear();
                }
                let zones = CountingZones::from_frame(width, height);
                self.zones = Some(zones);
                CrossingDetector::new(zones.line)
            }
        }
    }
}

/// The producer: pulls frames from a source and feeds the pipeline
pub struct CaptureLoop {
    source: Box<dyn FrameSource>,
    pipeline: FramePipeline,
    stats: Arc<CaptureStats>,
}

impl CaptureLoop {
    pub fn new(
        config: &CounterConfig,
        source: Box<dyn FrameSource>,
        detector: Box<dyn PersonDetector>,
        handle: DeliveryHandle,
    ) -> Self {
        let stats = Arc::new(CaptureStats::default());
        let pipeline = FramePipeline::new(config, detector, handle, Arc::clone(&stats));

        Self {
            source,
            pipeline,
            stats,
        }
    }

    pub fn stats(&self) -> Arc<CaptureStats> {
        Arc::clone(&self.stats)
    }

    /// Run until stopped or the source ends. The token is checked once per
    /// frame; the source is released on every exit path.
    pub fn run(self, token: &CancellationToken) -> CaptureExit {
        let CaptureLoop {
            source,
            mut pipeline,
            stats,
        } = self;

        let mut guard = match CaptureGuard::open(source) {
            Ok(guard) => guard,
            Err(e) => {
                error!("Failed to open frame source: {}", e);
                return CaptureExit::SourceFailed(e.to_string());
            }
        };

        stats.running.store(true, Ordering::Release);
        info!("Capture loop started on {}", guard.describe());

        let exit = loop {
            if token.is_cancelled() {
                break CaptureExit::Stopped;
            }

            match guard.read_frame() {
                Ok(Some(frame)) => {
                    pipeline.process(&frame);
                }
                Ok(None) => break CaptureExit::SourceExhausted,
                Err(e) => {
                    error!("Failed to grab frame: {}", e);
                    break CaptureExit::SourceFailed(e.to_string());
                }
            }
        };

        guard.release();
        stats.running.store(false, Ordering::Release);

        let snapshot = stats.snapshot();
        info!(
            "Capture loop ended ({:?}) after {} frames, {} events",
            exit, snapshot.frames_processed, snapshot.events_emitted
        );
        exit
    }

    /// Run on a dedicated named thread
    pub fn spawn(self, token: CancellationToken) -> Result<CaptureHandle> {
        let stats = self.stats();
        let thread_token = token.clone();

        let join = std::thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || self.run(&thread_token))
            .map_err(|e| CounterError::component("capture", format!("spawn failed: {}", e)))?;

        Ok(CaptureHandle { token, join, stats })
    }
}

/// Control handle for a capture thread
pub struct CaptureHandle {
    token: CancellationToken,
    join: JoinHandle<CaptureExit>,
    stats: Arc<CaptureStats>,
}

impl CaptureHandle {
    /// Ask the loop to stop after the current frame
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub fn stats(&self) -> Arc<CaptureStats> {
        Arc::clone(&self.stats)
    }

    /// Block until the thread exits
    pub fn join(self) -> CaptureExit {
        match self.join.join() {
            Ok(exit) => exit,
            Err(_) => {
                self.stats.running.store(false, Ordering::Release);
                error!("Capture thread panicked");
                CaptureExit::SourceFailed("capture thread panicked".to_string())
            }
        }
    }
}
