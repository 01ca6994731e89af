use crate::capture::CaptureExit;

/// Component lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// System shutdown reason
#[derive(Debug, Clone)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    UserRequest,
    /// The capture loop ended on its own
    CaptureEnded(CaptureExit),
}

impl ShutdownReason {
    /// Whether the process should exit with a failure code
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ShutdownReason::Error(_) | ShutdownReason::CaptureEnded(CaptureExit::SourceFailed(_))
        )
    }
}
