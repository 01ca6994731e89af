use crate::error::Result;
use crate::frame::FrameData;
use tracing::{debug, info};

/// A device or file producing frames for the capture loop
pub trait FrameSource: Send {
    /// Human-readable name used in logs
    fn describe(&self) -> String;

    fn open(&mut self) -> Result<()>;

    /// Next frame, or `None` once the source has no more frames
    fn read_frame(&mut self) -> Result<Option<FrameData>>;

    /// Release the underlying device. Must tolerate repeated calls.
    fn release(&mut self);
}

/// Scoped ownership of an opened frame source
///
/// The source is released exactly once, either through [`CaptureGuard::release`]
/// or when the guard is dropped, so every exit path of the capture loop
/// (stop, error, panic unwind) gives the device back.
pub struct CaptureGuard {
    source: Box<dyn FrameSource>,
    released: bool,
}

impl CaptureGuard {
    pub fn open(mut source: Box<dyn FrameSource>) -> Result<Self> {
        source.open()?;
        info!("Opened frame source {}", source.describe());
        Ok(Self {
            source,
            released: false,
        })
    }

    pub fn read_frame(&mut self) -> Result<Option<FrameData>> {
        self.source.read_frame()
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.source.release();
            self.released = true;
            debug!("Released frame source {}", self.source.describe());
        }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}
