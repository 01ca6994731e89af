pub mod app;
pub mod backup;
pub mod capture;
pub mod config;
pub mod crossing;
pub mod delivery;
pub mod detection;
pub mod error;
pub mod events;
pub mod frame;
pub mod geometry;
pub mod queue;
pub mod tracker;

#[cfg(feature = "api")]
pub mod api;

pub use app::{ComponentState, CounterOrchestrator, ShutdownReason};
pub use backup::{BackupStore, BackupStoreBuilder};
pub use capture::{
    CaptureExit, CaptureLoop, CaptureStats, FramePipeline, FrameSource, ReplayDetector,
    ReplaySource,
};
pub use config::CounterConfig;
pub use crossing::CrossingDetector;
pub use delivery::{
    CountStore, DeliveryConsumer, DeliveryHandle, DeliveryPoller, MemoryCountStore,
    OperationStatus,
};
pub use detection::{Detection, DetectionFilter, PersonDetector, RawDetection};
pub use error::{CounterError, Result};
pub use events::{CountEvent, Direction};
pub use frame::FrameData;
pub use geometry::{BoundingBox, CountingLine, CountingZones, Point, Zone};
pub use queue::EventQueue;
pub use tracker::{CentroidTracker, TrackerUpdate};

#[cfg(feature = "api")]
pub use api::{ApiServer, ApiState};
