use super::orchestrator::send_shutdown;
use super::{CounterOrchestrator, ShutdownReason};
use crate::error::{CounterError, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

impl CounterOrchestrator {
    /// Run until a signal, a shutdown request or the end of capture
    pub async fn run(&mut self) -> Result<i32> {
        info!("People counter is running");

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| CounterError::system("Shutdown receiver already taken"))?;

        self.setup_signal_handlers();

        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| CounterError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let exit_code = self.shutdown().await?;
        let exit_code = if shutdown_reason.is_failure() {
            exit_code.max(1)
        } else {
            exit_code
        };

        info!("People counter shutdown complete");
        Ok(exit_code)
    }

    fn setup_signal_handlers(&self) {
        // SIGTERM (systemd stop)
        #[cfg(unix)]
        {
            let sender = Arc::clone(&self.shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            error!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };

                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    send_shutdown(&sender, ShutdownReason::Signal("SIGTERM".to_string())).await;
                }
            });
        }

        let sender = Arc::clone(&self.shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                send_shutdown(&sender, ShutdownReason::Signal("SIGINT".to_string())).await;
            }
        });
    }
}
