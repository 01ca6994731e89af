use super::source::FrameSource;
use crate::detection::{PersonDetector, RawDetection};
use crate::error::{CaptureError, CounterError, Result};
use crate::frame::FrameData;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, trace};

/// One line of a replay file
///
/// ```json
/// {"width":640,"height":480,"t":0.5,"detections":[{"label":"person","confidence":0.9,"bbox":{"x":10,"y":20,"width":40,"height":90}}]}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayFrame {
    pub width: u32,
    pub height: u32,
    /// Seconds since the start of the recording
    #[serde(default)]
    pub t: Option<f64>,
    #[serde(default)]
    pub detections: Vec<RawDetection>,
}

/// Frame source that plays back recorded detections from a JSON-lines file
///
/// Each frame's payload is the JSON of its detections, which
/// [`ReplayDetector`] decodes. Blank lines and lines starting with `#` are
/// skipped.
pub struct ReplaySource {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    line_number: usize,
    next_frame_id: u64,
    fps: u32,
    pace: bool,
    base_time: SystemTime,
    last_emit: Option<Instant>,
}

impl ReplaySource {
    pub fn new<P: AsRef<Path>>(path: P, fps: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            reader: None,
            line_number: 0,
            next_frame_id: 1,
            fps,
            pace: false,
            base_time: SystemTime::now(),
            last_emit: None,
        }
    }

    /// Sleep between frames so playback runs at `fps`
    pub fn with_pacing(mut self, pace: bool) -> Self {
        self.pace = pace;
        self
    }

    fn frame_timestamp(&self, offset: Option<f64>, index: u64) -> Result<SystemTime> {
        let seconds = match offset {
            Some(seconds) => seconds.max(0.0),
            None if self.fps > 0 => index as f64 / self.fps as f64,
            None => return Ok(SystemTime::now()),
        };

        Duration::try_from_secs_f64(seconds)
            .ok()
            .and_then(|elapsed| self.base_time.checked_add(elapsed))
            .ok_or_else(|| {
                CaptureError::ReadFailed {
                    details: format!(
                        "line {}: time offset {}s is out of range",
                        self.line_number, seconds
                    ),
                }
                .into()
            })
    }

    fn wait_for_slot(&mut self) {
        if !self.pace || self.fps == 0 {
            return;
        }

        let period = Duration::from_secs_f64(1.0 / self.fps as f64);
        if let Some(last) = self.last_emit {
            let elapsed = last.elapsed();
            if elapsed < period {
                std::thread::sleep(period - elapsed);
            }
        }
        self.last_emit = Some(Instant::now());
    }
}

impl FrameSource for ReplaySource {
    fn describe(&self) -> String {
        format!("replay:{}", self.path.display())
    }

    fn open(&mut self) -> Result<()> {
        let file = File::open(&self.path).map_err(|e| CaptureError::DeviceOpen {
            device: self.path.display().to_string(),
            details: e.to_string(),
        })?;

        self.reader = Some(BufReader::new(file));
        self.line_number = 0;
        self.next_frame_id = 1;
        self.base_time = SystemTime::now();
        self.last_emit = None;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<FrameData>> {
        let mut line = String::new();

        let parsed = loop {
            let reader = self.reader.as_mut().ok_or(CaptureError::NotOpen)?;

            line.clear();
            let read = reader
                .read_line(&mut line)
                .map_err(|e| CaptureError::ReadFailed {
                    details: e.to_string(),
                })?;
            if read == 0 {
                debug!("Replay {} exhausted after {} lines", self.path.display(), self.line_number);
                return Ok(None);
            }
            self.line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let frame: ReplayFrame =
                serde_json::from_str(trimmed).map_err(|e| CaptureError::ReadFailed {
                    details: format!("line {}: {}", self.line_number, e),
                })?;
            break frame;
        };

        self.wait_for_slot();

        let id = self.next_frame_id;
        self.next_frame_id += 1;
        let timestamp = self.frame_timestamp(parsed.t, id - 1)?;
        let payload = serde_json::to_vec(&parsed.detections)?;

        trace!(
            "Replay frame {} ({}x{}, {} detections)",
            id,
            parsed.width,
            parsed.height,
            parsed.detections.len()
        );

        Ok(Some(FrameData::new(
            id,
            timestamp,
            payload,
            parsed.width,
            parsed.height,
        )))
    }

    fn release(&mut self) {
        self.reader = None;
    }
}

/// Detector that decodes the detections a [`ReplaySource`] embedded in each frame
#[derive(Debug, Default)]
pub struct ReplayDetector;

impl ReplayDetector {
    pub fn new() -> Self {
        Self
    }
}

impl PersonDetector for ReplayDetector {
    fn detect(&mut self, frame: &FrameData) -> Result<Vec<RawDetection>> {
        serde_json::from_slice(&frame.data).map_err(|e| {
            CounterError::detector(format!("frame {} payload: {}", frame.id, e))
        })
    }
}
