use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::domain::batch::BatchHandlerApi;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn health_ready(
    State(batch_handler): State<Arc<dyn BatchHandlerApi>>,
) -> impl IntoResponse {
    let readiness = batch_handler.readiness().await;
    let (status, label) = if readiness.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (
        status,
        Json(json!({
            "status": label,
            "configuration": if readiness.configuration { "loaded" } else { "invalid" },
            "record_store": if readiness.record_store { "running" } else { "stopped" },
        })),
    )
}
