use crate::capture::CaptureStats;
use crate::config::ApiConfig;
use crate::delivery::DeliveryConsumer;
use crate::error::{CounterError, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::{
    api_stats_handler, auto_save_status_handler, backup_recovery_handler,
    check_count_events_handler, end_session_handler, health_handler, reset_counts_handler,
};

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ApiState {
    pub(crate) consumer: Arc<DeliveryConsumer>,
    pub(crate) capture: Arc<CaptureStats>,
}

impl ApiState {
    pub fn new(consumer: Arc<DeliveryConsumer>, capture: Arc<CaptureStats>) -> Self {
        Self { consumer, capture }
    }
}

/// Build the JSON API router
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/check_count_events", get(check_count_events_handler))
        .route("/auto_save_status", get(auto_save_status_handler))
        .route("/api/stats", get(api_stats_handler))
        .route("/end_session", post(end_session_handler))
        .route("/backup_recovery", post(backup_recovery_handler))
        .route("/reset_counts", post(reset_counts_handler))
        .route("/health", get(health_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// HTTP front end for the delivery consumer
pub struct ApiServer {
    pub(crate) config: ApiConfig,
    pub(crate) state: ApiState,
}

impl ApiServer {
    pub fn new(config: ApiConfig, state: ApiState) -> Self {
        Self { config, state }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.ip, self.config.port)
    }

    /// Bind the configured address
    pub async fn listen(&self) -> Result<TcpListener> {
        let addr = self.address();
        info!("Starting count API server on {}", addr);

        TcpListener::bind(&addr).await.map_err(|e| {
            CounterError::component("api", format!("Failed to bind {}: {}", addr, e))
        })
    }

    /// Serve on an already bound listener until `token` is cancelled
    pub async fn serve(self, listener: TcpListener, token: CancellationToken) -> Result<()> {
        if let Ok(local) = listener.local_addr() {
            info!("Count API listening on {}", local);
        }

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await
            .map_err(|e| CounterError::component("api", format!("Server error: {}", e)))?;

        info!("Count API server stopped");
        Ok(())
    }

    /// Bind and serve until `token` is cancelled
    pub async fn start(self, token: CancellationToken) -> Result<()> {
        let listener = self.listen().await?;
        self.serve(listener, token).await
    }
}
