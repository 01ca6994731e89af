use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CounterConfig {
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
    pub tracker: TrackerConfig,
    pub delivery: DeliveryConfig,
    pub api: ApiConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Frames per second; replay sources are paced at this rate (0 = unpaced)
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Mirror detections horizontally before tracking
    #[serde(default = "default_camera_mirror")]
    pub mirror: bool,

    /// JSON-lines detection replay file used instead of a live camera
    #[serde(default)]
    pub replay_path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectorConfig {
    /// Detections at or below this confidence are discarded
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Detector class label that is counted
    #[serde(default = "default_class_label")]
    pub class_label: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TrackerConfig {
    /// Maximum center distance (pixels, exclusive) for matching a detection to a track
    #[serde(default = "default_min_distance_for_tracking")]
    pub min_distance_for_tracking: f64,

    /// Seconds a track may go unseen before it is removed
    #[serde(default = "default_max_disappeared_seconds")]
    pub max_disappeared_seconds: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeliveryConfig {
    /// Number of drained events retained for recovery
    #[serde(default = "default_backup_capacity")]
    pub backup_capacity: usize,

    /// Automatic delivery interval in milliseconds (0 disables the poller)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Number of recent events reported by the stats endpoint
    #[serde(default = "default_recent_events_limit")]
    pub recent_events_limit: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    /// Serve the HTTP API
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,

    /// IP address to bind to
    #[serde(default = "default_api_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Shut the process down once the capture loop ends on its own
    #[serde(default = "default_exit_on_capture_end")]
    pub exit_on_capture_end: bool,
}

impl TrackerConfig {
    /// Expiry timeout; values out of range saturate instead of panicking
    pub fn max_disappeared(&self) -> Duration {
        let seconds = self.max_disappeared_seconds;
        if seconds.is_nan() || seconds <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }
}

impl DeliveryConfig {
    pub fn poll_interval(&self) -> Option<Duration> {
        if self.poll_interval_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.poll_interval_ms))
        }
    }
}

impl CounterConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("people-counter.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.fps", default_camera_fps())?
            .set_default("camera.mirror", default_camera_mirror())?
            .set_default("detector.min_confidence", default_min_confidence() as f64)?
            .set_default("detector.class_label", default_class_label())?
            .set_default(
                "tracker.min_distance_for_tracking",
                default_min_distance_for_tracking(),
            )?
            .set_default(
                "tracker.max_disappeared_seconds",
                default_max_disappeared_seconds(),
            )?
            .set_default(
                "delivery.backup_capacity",
                default_backup_capacity() as i64,
            )?
            .set_default("delivery.poll_interval_ms", default_poll_interval_ms())?
            .set_default(
                "delivery.recent_events_limit",
                default_recent_events_limit() as i64,
            )?
            .set_default("api.enabled", default_api_enabled())?
            .set_default("api.ip", default_api_ip())?
            .set_default("api.port", default_api_port())?
            .set_default("system.exit_on_capture_end", default_exit_on_capture_end())?
            .add_source(File::with_name(&path_str).required(false))
            // COUNTER_TRACKER__MAX_DISAPPEARED_SECONDS=5
            .add_source(
                Environment::with_prefix("COUNTER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: CounterConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.detector.min_confidence) {
            return Err(ConfigError::Message(
                "Detector min_confidence must be between 0 and 1".to_string(),
            ));
        }

        if self.detector.class_label.trim().is_empty() {
            return Err(ConfigError::Message(
                "Detector class_label must not be empty".to_string(),
            ));
        }

        let min_distance = self.tracker.min_distance_for_tracking;
        if !min_distance.is_finite() || min_distance <= 0.0 {
            return Err(ConfigError::Message(
                "Tracker min_distance_for_tracking must be a finite number greater than 0"
                    .to_string(),
            ));
        }

        let max_disappeared = self.tracker.max_disappeared_seconds;
        if !max_disappeared.is_finite() || max_disappeared <= 0.0 {
            return Err(ConfigError::Message(
                "Tracker max_disappeared_seconds must be a finite number greater than 0"
                    .to_string(),
            ));
        }

        if Duration::try_from_secs_f64(max_disappeared).is_err() {
            return Err(ConfigError::Message(format!(
                "Tracker max_disappeared_seconds {} is too large",
                max_disappeared
            )));
        }

        if self.delivery.backup_capacity == 0 {
            return Err(ConfigError::Message(
                "Backup capacity must be greater than 0".to_string(),
            ));
        }

        if self.api.enabled && self.api.port == 0 {
            return Err(ConfigError::Message(
                "API port must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                fps: default_camera_fps(),
                mirror: default_camera_mirror(),
                replay_path: None,
            },
            detector: DetectorConfig {
                min_confidence: default_min_confidence(),
                class_label: default_class_label(),
            },
            tracker: TrackerConfig {
                min_distance_for_tracking: default_min_distance_for_tracking(),
                max_disappeared_seconds: default_max_disappeared_seconds(),
            },
            delivery: DeliveryConfig {
                backup_capacity: default_backup_capacity(),
                poll_interval_ms: default_poll_interval_ms(),
                recent_events_limit: default_recent_events_limit(),
            },
            api: ApiConfig {
                enabled: default_api_enabled(),
                ip: default_api_ip(),
                port: default_api_port(),
            },
            system: SystemConfig {
                exit_on_capture_end: default_exit_on_capture_end(),
            },
        }
    }
}

// Default value functions
fn default_camera_fps() -> u32 {
    30
}
fn default_camera_mirror() -> bool {
    false
}

fn default_min_confidence() -> f32 {
    0.5
}
fn default_class_label() -> String {
    "person".to_string()
}

fn default_min_distance_for_tracking() -> f64 {
    50.0
}
fn default_max_disappeared_seconds() -> f64 {
    10.0
}

fn default_backup_capacity() -> usize {
    1000
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_recent_events_limit() -> usize {
    5
}

fn default_api_enabled() -> bool {
    true
}
fn default_api_ip() -> String {
    "127.0.0.1".to_string()
}
fn default_api_port() -> u16 {
    5000
}

fn default_exit_on_capture_end() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CounterConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.tracker.min_distance_for_tracking, 50.0);
        assert_eq!(config.tracker.max_disappeared(), Duration::from_secs(10));
        assert_eq!(config.delivery.backup_capacity, 1000);
        assert_eq!(config.detector.class_label, "person");
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[tracker]\nmin_distance_for_tracking = 80.0\n\n[delivery]\nbackup_capacity = 250\npoll_interval_ms = 0\n\n[camera]\nreplay_path = \"frames.jsonl\""
        )
        .unwrap();

        let config = CounterConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.tracker.min_distance_for_tracking, 80.0);
        assert_eq!(config.tracker.max_disappeared_seconds, 10.0);
        assert_eq!(config.delivery.backup_capacity, 250);
        assert!(config.delivery.poll_interval().is_none());
        assert_eq!(config.camera.replay_path.as_deref(), Some("frames.jsonl"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = CounterConfig::load_from_file("/nonexistent/people-counter.toml").unwrap();

        assert_eq!(config.camera.fps, 30);
        assert_eq!(config.api.port, 5000);
        assert_eq!(
            config.delivery.poll_interval(),
            Some(Duration::from_millis(1000))
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = CounterConfig::default();

        config.detector.class_label = " ".to_string();
        assert!(config.validate().is_err());
        config.detector.class_label = "person".to_string();
        assert!(config.validate().is_ok());

        config.delivery.backup_capacity = 0;
        assert!(config.validate().is_err());
        config.delivery.backup_capacity = 10;

        config.detector.min_confidence = 1.5;
        assert!(config.validate().is_err());
        config.detector.min_confidence = 0.5;

        config.tracker.max_disappeared_seconds = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tracker_limits_must_be_finite_and_representable() {
        let mut config = CounterConfig::default();

        for seconds in [1e300, f64::INFINITY, f64::NAN, -1.0] {
            config.tracker.max_disappeared_seconds = seconds;
            assert!(config.validate().is_err(), "accepted {}", seconds);
        }
        config.tracker.max_disappeared_seconds = 10.0;

        for distance in [f64::INFINITY, f64::NAN, 0.0] {
            config.tracker.min_distance_for_tracking = distance;
            assert!(config.validate().is_err(), "accepted {}", distance);
        }
        config.tracker.min_distance_for_tracking = 50.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_timeout_saturates() {
        let mut config = CounterConfig::default();

        config.tracker.max_disappeared_seconds = 1e300;
        assert_eq!(config.tracker.max_disappeared(), Duration::MAX);
        config.tracker.max_disappeared_seconds = f64::INFINITY;
        assert_eq!(config.tracker.max_disappeared(), Duration::MAX);
        config.tracker.max_disappeared_seconds = f64::NAN;
        assert_eq!(config.tracker.max_disappeared(), Duration::ZERO);

        // building a tracker from an unvalidated config must not panic
        let tracker = crate::tracker::CentroidTracker::from_config(&config.tracker);
        assert_eq!(tracker.active_count(), 0);
    }
}
