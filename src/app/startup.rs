use super::orchestrator::send_shutdown;
use super::state::{API, CAPTURE, DELIVERY, POLLER};
use super::{ComponentState, CounterOrchestrator, ShutdownReason};
use crate::capture::CaptureExit;
use crate::delivery::DeliveryPoller;
use crate::error::{CounterError, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

impl CounterOrchestrator {
    /// Register components and prepare the store
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing people counter components");

        {
            let mut states = self.component_states.lock().await;
            states.insert(CAPTURE.to_string(), ComponentState::Stopped);
            states.insert(DELIVERY.to_string(), ComponentState::Stopped);

            if self.config.delivery.poll_interval().is_some() {
                states.insert(POLLER.to_string(), ComponentState::Stopped);
            }

            if self.api_enabled() {
                states.insert(API.to_string(), ComponentState::Stopped);
            }
        }

        // an unreachable store is not fatal: events wait in the backup
        if let Err(e) = self.consumer.ensure_ready().await {
            warn!("Count store not ready, delivery will retry: {}", e);
        }

        info!("All components initialized successfully");
        Ok(())
    }

    /// Start the capture thread, the delivery poller and the API server
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting people counter");

        self.set_component_state(DELIVERY, ComponentState::Running)
            .await;
        self.start_capture().await?;

        if let Some(period) = self.config.delivery.poll_interval() {
            self.set_component_state(POLLER, ComponentState::Starting)
                .await;
            let poller = DeliveryPoller::new(Arc::clone(&self.consumer), period);
            self.poller_task = Some(poller.spawn(self.cancellation_token.child_token()));
            self.set_component_state(POLLER, ComponentState::Running)
                .await;
        } else {
            info!("Automatic delivery disabled; events are saved on request");
        }

        if self.api_enabled() {
            self.start_api().await?;
        }

        info!("People counter started");
        Ok(())
    }

    async fn start_capture(&mut self) -> Result<()> {
        let capture_loop = self.capture_loop.take().ok_or_else(|| {
            CounterError::component(CAPTURE, "capture loop already started")
        })?;

        self.set_component_state(CAPTURE, ComponentState::Starting)
            .await;

        let capture = capture_loop
            .spawn(self.cancellation_token.child_token())
            .map_err(|e| {
                error!("Failed to start capture loop: {}", e);
                e
            })?;

        let states = Arc::clone(&self.component_states);
        let shutdown_sender = Arc::clone(&self.shutdown_sender);
        let token = self.cancellation_token.clone();
        let exit_on_end = self.config.system.exit_on_capture_end;

        // the thread join blocks, so it is awaited off the async workers
        self.capture_task = Some(tokio::spawn(async move {
            let exit = tokio::task::spawn_blocking(move || capture.join())
                .await
                .unwrap_or_else(|e| CaptureExit::SourceFailed(format!("join failed: {}", e)));

            let state = match exit {
                CaptureExit::SourceFailed(_) => ComponentState::Failed,
                _ => ComponentState::Stopped,
            };
            states.lock().await.insert(CAPTURE.to_string(), state);

            if !token.is_cancelled() {
                if exit_on_end {
                    info!("Capture ended ({:?}), shutting down", exit);
                    send_shutdown(&shutdown_sender, ShutdownReason::CaptureEnded(exit.clone()))
                        .await;
                } else {
                    warn!("Capture ended ({:?}); API stays up for delivery and recovery", exit);
                }
            }

            exit
        }));

        self.set_component_state(CAPTURE, ComponentState::Running)
            .await;
        info!("Capture loop started");
        Ok(())
    }

    #[cfg(feature = "api")]
    async fn start_api(&mut self) -> Result<()> {
        use crate::api::{ApiServer, ApiState};

        self.set_component_state(API, ComponentState::Starting).await;

        let server = ApiServer::new(
            self.config.api.clone(),
            ApiState::new(Arc::clone(&self.consumer), Arc::clone(&self.capture_stats)),
        );

        let listener = match server.listen().await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to start API server: {}", e);
                self.set_component_state(API, ComponentState::Failed).await;
                return Err(e);
            }
        };

        let token = self.cancellation_token.child_token();
        let states = Arc::clone(&self.component_states);

        self.api_task = Some(tokio::spawn(async move {
            if let Err(e) = server.serve(listener, token).await {
                error!("API server error: {}", e);
                states.lock().await.insert(API.to_string(), ComponentState::Failed);
            }
        }));

        self.set_component_state(API, ComponentState::Running).await;
        info!(
            "API server started on {}:{}",
            self.config.api.ip, self.config.api.port
        );
        Ok(())
    }

    #[cfg(not(feature = "api"))]
    async fn start_api(&mut self) -> Result<()> {
        Ok(())
    }

    pub(super) fn api_enabled(&self) -> bool {
        cfg!(feature = "api") && self.config.api.enabled
    }
}
