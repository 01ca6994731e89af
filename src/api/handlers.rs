use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Form,
};
use serde::Deserialize;
use tracing::{debug, info};

use super::server::ApiState;

/// Form body for `POST /reset_counts`
#[derive(Debug, Deserialize)]
pub struct ResetForm {
    #[serde(default)]
    pub confirmation: String,
}

/// Drain pending events into the store
pub async fn check_count_events_handler(State(state): State<ApiState>) -> impl IntoResponse {
    debug!("Delivery pass requested over HTTP");
    Json(state.consumer.process_pending().await)
}

pub async fn auto_save_status_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.consumer.status(state.capture.is_running()).await)
}

pub async fn api_stats_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.consumer.stats().await)
}

pub async fn end_session_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.consumer.end_session().await)
}

/// Replay the backup store
pub async fn backup_recovery_handler(State(state): State<ApiState>) -> impl IntoResponse {
    info!("Backup recovery requested over HTTP");
    Json(state.consumer.recover().await)
}

pub async fn reset_counts_handler(
    State(state): State<ApiState>,
    Form(form): Form<ResetForm>,
) -> impl IntoResponse {
    Json(state.consumer.reset(&form.confirmation).await)
}

/// Handler for health check endpoint
pub async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let capture = state.capture.snapshot();
    let delivery = state.consumer.handle().stats();

    let health_info = serde_json::json!({
        "status": "healthy",
        "capture": capture,
        "delivery": delivery,
    });

    (StatusCode::OK, Json(health_info))
}
