use super::types::{ComponentState, ShutdownReason};
use crate::capture::{CaptureExit, CaptureLoop, CaptureStats, FrameSource};
use crate::config::CounterConfig;
use crate::delivery::{CountStore, DeliveryConsumer, DeliveryHandle};
use crate::detection::PersonDetector;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub(super) type ShutdownSender = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

/// Wires the capture thread, delivery path and HTTP API together
pub struct CounterOrchestrator {
    pub(super) config: CounterConfig,
    pub(super) handle: DeliveryHandle,
    pub(super) consumer: Arc<DeliveryConsumer>,

    // Components
    pub(super) capture_loop: Option<CaptureLoop>,
    pub(super) capture_stats: Arc<CaptureStats>,
    pub(super) capture_task: Option<JoinHandle<CaptureExit>>,
    pub(super) poller_task: Option<JoinHandle<()>>,
    pub(super) api_task: Option<JoinHandle<()>>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: ShutdownSender,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl CounterOrchestrator {
    /// Create a new orchestrator around a frame source, a detector and a store
    pub fn new(
        config: CounterConfig,
        source: Box<dyn FrameSource>,
        detector: Box<dyn PersonDetector>,
        store: Arc<dyn CountStore>,
    ) -> Result<Self> {
        config.validate()?;

        let handle = DeliveryHandle::new(config.delivery.backup_capacity)?;
        let consumer = Arc::new(DeliveryConsumer::new(
            handle.clone(),
            store,
            config.delivery.recent_events_limit,
        ));

        let capture_loop = CaptureLoop::new(&config, source, detector, handle.clone());
        let capture_stats = capture_loop.stats();
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        info!(
            "Counter pipeline assembled (backup capacity {}, match distance {:.0}px)",
            config.delivery.backup_capacity, config.tracker.min_distance_for_tracking
        );

        Ok(Self {
            config,
            handle,
            consumer,
            capture_loop: Some(capture_loop),
            capture_stats,
            capture_task: None,
            poller_task: None,
            api_task: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Arc::new(Mutex::new(Some(shutdown_sender))),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &CounterConfig {
        &self.config
    }

    pub fn delivery_handle(&self) -> DeliveryHandle {
        self.handle.clone()
    }

    pub fn consumer(&self) -> Arc<DeliveryConsumer> {
        Arc::clone(&self.consumer)
    }

    pub fn capture_stats(&self) -> Arc<CaptureStats> {
        Arc::clone(&self.capture_stats)
    }

    /// Ask `run` to begin a graceful shutdown. Only the first request counts.
    pub async fn request_shutdown(&self, reason: ShutdownReason) -> bool {
        send_shutdown(&self.shutdown_sender, reason).await
    }
}

pub(super) async fn send_shutdown(sender: &ShutdownSender, reason: ShutdownReason) -> bool {
    match sender.lock().await.take() {
        Some(sender) => sender.send(reason).is_ok(),
        None => false,
    }
}
