use thiserror::Error;

#[derive(Error, Debug)]
pub enum CounterError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Detector error: {details}")]
    Detector { details: String },

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

/// Failures of the frame source feeding the producer loop
#[derive(Error, Debug, Clone)]
pub enum CaptureError {
    #[error("Failed to open capture device {device}: {details}")]
    DeviceOpen { device: String, details: String },

    #[error("Failed to read frame: {details}")]
    ReadFailed { details: String },

    #[error("Capture source is not open")]
    NotOpen,
}

/// Failures reported by a count store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    #[error("Store unavailable: {details}")]
    Unavailable { details: String },

    #[error("Store rejected write: {details}")]
    Rejected { details: String },

    #[error("No active counting session")]
    SessionMissing,
}

impl CounterError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn detector<S: Into<String>>(details: S) -> Self {
        Self::Detector {
            details: details.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CounterError>;
