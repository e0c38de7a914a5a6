pub mod request_id;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::controllers::{batch::BatchController, health};
use crate::domain::batch::BatchHandlerApi;
use crate::infrastructure::config::Config;

pub use request_id::{request_id_middleware, RequestId, X_REQUEST_ID};

/// Build the application router with all routes and layers
pub fn build_router(batch_handler: Arc<dyn BatchHandlerApi>) -> Router {
    let batch_controller = Arc::new(BatchController::new(batch_handler.clone()));

    let batch_routes = Router::new()
        .route("/api/batches", post(BatchController::start_batch))
        .route("/api/batches/current", get(BatchController::get_current))
        .route(
            "/api/batches/current/cancel",
            post(BatchController::cancel_current),
        )
        .route("/api/usage", get(BatchController::get_usage))
        .with_state(batch_controller);

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::health_ready))
        .with_state(batch_handler)
        .merge(batch_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server and serve until `shutdown` resolves
pub async fn start_http_server(
    config: Arc<Config>,
    batch_handler: Arc<dyn BatchHandlerApi>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(batch_handler);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
