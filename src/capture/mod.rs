mod producer;
mod replay;
mod source;
mod stats;

pub use producer::{CaptureExit, CaptureHandle, CaptureLoop, FramePipeline};
pub use replay::{ReplayDetector, ReplayFrame, ReplaySource};
pub use source::{CaptureGuard, FrameSource};
pub use stats::{CaptureStats, CaptureStatsSnapshot};
