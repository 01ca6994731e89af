use crate::config::DetectorConfig;
use crate::error::Result;
use crate::frame::FrameData;
use crate::geometry::{BoundingBox, Point};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Unfiltered object detector output for one object in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(rename = "label")]
    pub class_label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// A qualifying person detection; produced and discarded every frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub center: Point,
}

impl Detection {
    pub fn new(confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            confidence,
            bbox,
            center: bbox.center(),
        }
    }

    /// Detection with a 1x1 box around a center point
    pub fn at(x: i32, y: i32, confidence: f32) -> Self {
        Self {
            confidence,
            bbox: BoundingBox::new(x, y, 1, 1),
            center: Point::new(x, y),
        }
    }
}

/// Object detector consuming a frame
///
/// Implementations wrap a pretrained model; they must not hold state that
/// the tracker depends on.
pub trait PersonDetector: Send {
    fn detect(&mut self, frame: &FrameData) -> Result<Vec<RawDetection>>;
}

/// Keeps confident detections of the counted class and derives centers
#[derive(Debug, Clone)]
pub struct DetectionFilter {
    min_confidence: f32,
    class_label: String,
    mirror: bool,
}

impl DetectionFilter {
    pub fn new(config: &DetectorConfig, mirror: bool) -> Self {
        Self {
            min_confidence: config.min_confidence,
            class_label: config.class_label.clone(),
            mirror,
        }
    }

    pub fn apply(&self, raw: &[RawDetection], frame_width: u32) -> Vec<Detection> {
        raw.iter()
            .filter(|d| d.confidence > self.min_confidence && d.class_label == self.class_label)
            .map(|d| {
                let bbox = if self.mirror {
                    d.bbox.mirrored(frame_width as i32)
                } else {
                    d.bbox
                };
                let detection = Detection::new(d.confidence, bbox);
                trace!(
                    "Accepted {} detection at ({}, {}) confidence {:.2}",
                    self.class_label,
                    detection.center.x,
                    detection.center.y,
                    detection.confidence
                );
                detection
            })
            .collect()
    }
}
