use super::consumer::DeliveryConsumer;
use super::report::OperationStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Periodically runs a delivery pass until cancelled
pub struct DeliveryPoller {
    consumer: Arc<DeliveryConsumer>,
    period: Duration,
}

impl DeliveryPoller {
    pub fn new(consumer: Arc<DeliveryConsumer>, period: Duration) -> Self {
        Self { consumer, period }
    }

    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;

            info!("Delivery poller started (every {:?})", self.period);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let report = self.consumer.process_pending().await;
                        match report.status {
                            OperationStatus::NoEvents => trace!("No pending count events"),
                            OperationStatus::Success | OperationStatus::Info => {
                                debug!("Delivery pass: {}", report.message)
                            }
                            OperationStatus::Partial | OperationStatus::Error => {
                                warn!("Delivery pass degraded: {}", report.message)
                            }
                        }
                    }
                }
            }

            info!("Delivery poller stopped");
        })
    }
}
