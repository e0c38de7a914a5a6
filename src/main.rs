use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use fieldvoice_backend::domain::batch::{BatchHandler, BatchHandlerApi};
use fieldvoice_backend::infrastructure::config::{Config, LogFormat};
use fieldvoice_backend::infrastructure::http::start_http_server;
use fieldvoice_backend::infrastructure::owner::OwnerContext;
use fieldvoice_backend::infrastructure::repositories::{
    GeminiTtsRepositoryFactory, JsonRecordStore, ProfileRepository,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config);

    tracing::info!(
        "Starting FieldVoice Backend on {}:{}",
        config.host,
        config.port
    );

    // Open the record store and hand it to its owner thread
    let store = JsonRecordStore::open(&config.records_path, &config.media_dir)?;
    let owner = OwnerContext::spawn(Box::new(store))?;
    tracing::info!("Record owner context started");

    let profiles = Arc::new(ProfileRepository::new(&config.profile_config_path));
    match profiles.load().await {
        Ok(document) => {
            let profile_name = document.active_profile_name().unwrap_or_default();
            tracing::info!(profile = %profile_name, "Profile configuration loaded");
        }
        Err(e) => tracing::warn!(error = %e, "Profile configuration is not usable yet"),
    }

    tracing::info!(
        base_url = %config.gemini_base_url,
        timeout_secs = config.gemini_timeout_secs,
        "Initializing Gemini TTS client"
    );
    let tts_factory = Arc::new(GeminiTtsRepositoryFactory::new(
        config.gemini_base_url.clone(),
        config.gemini_timeout(),
    )?);

    let config = Arc::new(config);
    let batch_handler = Arc::new(BatchHandler::new(profiles, tts_factory, owner));

    start_http_server(
        config,
        batch_handler.clone() as Arc<dyn BatchHandlerApi>,
        shutdown_signal(),
    )
    .await?;

    // Let a running batch stop cleanly and persist its usage
    batch_handler.shutdown().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

fn init_logging(config: &Config) {
    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "fieldvoice_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "fieldvoice_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
