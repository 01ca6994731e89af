use super::state::{API, CAPTURE, DELIVERY, POLLER};
use super::{ComponentState, CounterOrchestrator};
use crate::capture::CaptureExit;
use crate::delivery::OperationStatus;
use crate::error::{CounterError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

const CAPTURE_STOP_TIMEOUT: Duration = Duration::from_secs(5);
const DELIVERY_STOP_TIMEOUT: Duration = Duration::from_secs(10);
const TASK_STOP_TIMEOUT: Duration = Duration::from_secs(2);

impl CounterOrchestrator {
    /// Stop every component and flush the queue one last time
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        self.cancellation_token.cancel();

        let mut exit_code = 0;

        // producer first so nothing is enqueued after the final pass
        if let Err(e) = self.stop_capture().await {
            error!("Error stopping capture: {}", e);
            exit_code = 1;
        }

        if let Some(task) = self.poller_task.take() {
            if let Err(e) = self.stop_task(POLLER, task).await {
                error!("Error stopping poller: {}", e);
                exit_code = 1;
            }
        }

        if let Err(e) = self.flush_delivery().await {
            error!("Error flushing delivery: {}", e);
            exit_code = 1;
        }

        if let Some(task) = self.api_task.take() {
            if let Err(e) = self.stop_task(API, task).await {
                error!("Error stopping API server: {}", e);
                exit_code = 1;
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    async fn stop_capture(&mut self) -> Result<()> {
        let Some(task) = self.capture_task.take() else {
            self.set_component_state(CAPTURE, ComponentState::Stopped)
                .await;
            return Ok(());
        };

        // the watcher task records the final state itself
        let exit = self
            .stop_with_timeout(CAPTURE, CAPTURE_STOP_TIMEOUT, async move {
                task.await
                    .map_err(|e| CounterError::component(CAPTURE, format!("join failed: {}", e)))
            })
            .await?;

        match exit {
            CaptureExit::SourceFailed(reason) => {
                self.set_component_state(CAPTURE, ComponentState::Failed)
                    .await;
                Err(CounterError::component(CAPTURE, reason))
            }
            _ => Ok(()),
        }
    }

    async fn flush_delivery(&mut self) -> Result<()> {
        let consumer = self.consumer();
        let report = self
            .stop_with_timeout(DELIVERY, DELIVERY_STOP_TIMEOUT, async move {
                Ok(consumer.process_pending().await)
            })
            .await?;

        match report.status {
            OperationStatus::Success => {
                info!("Final delivery pass saved {} events", report.saved_count)
            }
            OperationStatus::NoEvents | OperationStatus::Info => {}
            _ => warn!(
                "Final delivery pass incomplete ({} saved, {} recoverable): {}",
                report.saved_count,
                self.handle.backup().len(),
                report.message
            ),
        }

        Ok(())
    }

    async fn stop_task(&mut self, component: &str, task: JoinHandle<()>) -> Result<()> {
        let name = component.to_string();
        self.stop_with_timeout(component, TASK_STOP_TIMEOUT, async move {
            task.await
                .map_err(|e| CounterError::component(name, format!("join failed: {}", e)))
        })
        .await
    }

    async fn stop_with_timeout<T, F>(
        &mut self,
        component: &str,
        limit: Duration,
        stop: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        match timeout(limit, stop).await {
            Ok(Ok(value)) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(value)
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("Error stopping {} component: {}", component, e);
                Err(e)
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("{} component stop timeout", component);
                Err(CounterError::component(component, "stop timeout"))
            }
        }
    }
}
