use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::{
    domain::{
        batch::{BatchHandlerApi, BatchStarted, BatchStatus, StartBatchRequest},
        shared::UsageResponse,
    },
    error::AppResult,
};

pub struct BatchController {
    batch_handler: Arc<dyn BatchHandlerApi>,
}

impl BatchController {
    pub fn new(batch_handler: Arc<dyn BatchHandlerApi>) -> Self {
        Self { batch_handler }
    }

    /// POST /api/batches - Start converting the given records
    pub async fn start_batch(
        State(controller): State<Arc<BatchController>>,
        Json(request): Json<StartBatchRequest>,
    ) -> AppResult<(StatusCode, Json<BatchStarted>)> {
        let started = controller
            .batch_handler
            .start_batch(request.record_ids)
            .await?;

        tracing::info!(
            batch_id = %started.batch_id,
            total = started.total,
            "Batch accepted"
        );

        Ok((StatusCode::ACCEPTED, Json(started)))
    }

    /// GET /api/batches/current - Progress of the current or last batch
    pub async fn get_current(
        State(controller): State<Arc<BatchController>>,
    ) -> AppResult<Json<BatchStatus>> {
        let status = controller.batch_handler.current_status().await?;
        Ok(Json(status))
    }

    /// POST /api/batches/current/cancel - Ask the running batch to stop
    pub async fn cancel_current(
        State(controller): State<Arc<BatchController>>,
    ) -> AppResult<StatusCode> {
        controller.batch_handler.cancel_batch().await?;
        Ok(StatusCode::ACCEPTED)
    }

    /// GET /api/usage - Persisted usage of the active profile
    pub async fn get_usage(
        State(controller): State<Arc<BatchController>>,
    ) -> AppResult<Json<UsageResponse>> {
        let usage = controller.batch_handler.usage().await?;
        Ok(Json(usage))
    }
}
