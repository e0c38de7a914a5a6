use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::dto::{BatchStarted, BatchState, BatchStatus, Readiness};
use super::error::BatchServiceError;
use super::events::{BatchEvent, LogLevel};
use super::model::BatchSummary;
use super::worker::BatchWorker;
use crate::domain::profile::{ConfigDocument, Profile};
use crate::domain::record::RecordId;
use crate::domain::shared::UsageResponse;
use crate::domain::tts::{FallbackTtsService, TtsService};
use crate::infrastructure::owner::OwnerHandle;
use crate::infrastructure::repositories::{ProfileRepository, TtsRepositoryFactory};

/// Log lines kept in the status snapshot
pub const MAX_LOG_LINES: usize = 500;

const MISSING_API_KEY: &str = "Configure an API key for the active profile before starting a batch";
const MISSING_MAPPINGS: &str =
    "Configure at least one enabled field mapping for the active profile before starting a batch";

struct ActiveBatch {
    status: Arc<RwLock<BatchStatus>>,
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

/// Owns the batch lifecycle: resolves the profile, runs one worker at a
/// time, relays its events and writes session usage back at the end.
pub struct BatchHandler {
    profiles: Arc<ProfileRepository>,
    tts_factory: Arc<dyn TtsRepositoryFactory>,
    owner: OwnerHandle,
    current: Mutex<Option<ActiveBatch>>,
}

impl BatchHandler {
    pub fn new(
        profiles: Arc<ProfileRepository>,
        tts_factory: Arc<dyn TtsRepositoryFactory>,
        owner: OwnerHandle,
    ) -> Self {
        Self {
            profiles,
            tts_factory,
            owner,
            current: Mutex::new(None),
        }
    }

    /// Wait until the current batch (if any) has fully finished,
    /// including the usage write-back
    pub async fn wait_for_completion(&self) {
        let done = self.current.lock().await.as_ref().map(|a| a.done.clone());
        if let Some(mut done) = done {
            // Sender dropped also means the relay is gone
            let _ = done.wait_for(|finished| *finished).await;
        }
    }

    /// Cancel a running batch and wait for it to wind down
    pub async fn shutdown(&self) {
        if self.cancel_batch().await.is_ok() {
            tracing::info!("Cancelling running batch for shutdown");
        }
        self.wait_for_completion().await;
    }

    fn check_configured(profile: &Profile) -> Result<(), BatchServiceError> {
        if !profile.has_api_key() {
            return Err(BatchServiceError::NotConfigured(MISSING_API_KEY.to_string()));
        }
        if !profile.has_enabled_mappings() {
            return Err(BatchServiceError::NotConfigured(MISSING_MAPPINGS.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
pub trait BatchHandlerApi: Send + Sync {
    /// Start a batch over `record_ids` with the active profile
    ///
    /// Fails when a batch is already running or the profile lacks an API
    /// key or enabled field mappings.
    async fn start_batch(&self, record_ids: Vec<RecordId>)
        -> Result<BatchStarted, BatchServiceError>;

    /// Request cancellation. Advisory: the worker finishes the current
    /// field before stopping.
    async fn cancel_batch(&self) -> Result<(), BatchServiceError>;

    /// Snapshot of the current or most recent batch
    async fn current_status(&self) -> Result<BatchStatus, BatchServiceError>;

    /// Persisted usage counters of the active profile
    async fn usage(&self) -> Result<UsageResponse, BatchServiceError>;

    async fn readiness(&self) -> Readiness;
}

#[async_trait]
impl BatchHandlerApi for BatchHandler {
    async fn start_batch(
        &self,
        record_ids: Vec<RecordId>,
    ) -> Result<BatchStarted, BatchServiceError> {
        if record_ids.is_empty() {
            return Err(BatchServiceError::Invalid(
                "record_ids must not be empty".to_string(),
            ));
        }

        let mut current = self.current.lock().await;
        if let Some(active) = current.as_ref() {
            if !active.status.read().await.is_finished() {
                return Err(BatchServiceError::Conflict);
            }
        }

        let document = self.profiles.load().await?;
        let (profile_name, profile) = document.active_profile()?;
        Self::check_configured(&profile)?;

        let tts_repo = self
            .tts_factory
            .create(&profile)
            .map_err(BatchServiceError::Dependency)?;
        let client = Arc::new(TtsService::new(
            tts_repo,
            profile.instruction().map(str::to_string),
        ));
        let tts = FallbackTtsService::from_profile(client, &profile);

        let batch_id = Uuid::new_v4();
        let total = record_ids.len();
        let cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = watch::channel(false);
        let status = Arc::new(RwLock::new(BatchStatus::new(
            batch_id,
            profile_name.clone(),
            total,
        )));

        tracing::info!(
            batch_id = %batch_id,
            profile = %profile_name,
            total,
            primary_model = %profile.primary_model,
            "Starting batch"
        );

        let worker = BatchWorker::new(
            record_ids,
            profile.clone(),
            tts,
            self.owner.clone(),
            events_tx,
            cancel.clone(),
        );
        tokio::spawn(worker.run());

        let relay = EventRelay {
            batch_id,
            status: status.clone(),
            profiles: self.profiles.clone(),
            document,
            profile,
        };
        tokio::spawn(async move {
            relay.run(events_rx).await;
            let _ = done_tx.send(true);
        });

        *current = Some(ActiveBatch {
            status,
            cancel,
            done: done_rx,
        });

        Ok(BatchStarted { batch_id, total })
    }

    async fn cancel_batch(&self) -> Result<(), BatchServiceError> {
        let current = self.current.lock().await;
        let active = current.as_ref().ok_or(BatchServiceError::NotRunning)?;

        let mut status = active.status.write().await;
        match status.state {
            BatchState::Completed => Err(BatchServiceError::NotRunning),
            BatchState::Cancelling => Ok(()),
            BatchState::Running => {
                active.cancel.cancel();
                status.state = BatchState::Cancelling;
                status.status = "Cancelling... finishing last item...".to_string();
                tracing::info!(batch_id = %status.batch_id, "Batch cancellation requested");
                Ok(())
            }
        }
    }

    async fn current_status(&self) -> Result<BatchStatus, BatchServiceError> {
        let current = self.current.lock().await;
        let active = current.as_ref().ok_or(BatchServiceError::NotFound)?;
        let status = active.status.read().await.clone();
        Ok(status)
    }

    async fn usage(&self) -> Result<UsageResponse, BatchServiceError> {
        let document = self.profiles.load().await?;
        let (profile, settings) = document.active_profile()?;
        Ok(UsageResponse {
            profile,
            usage: settings.usage_stats,
        })
    }

    async fn readiness(&self) -> Readiness {
        let configuration = match self.profiles.load().await {
            Ok(document) => document.active_profile().is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "Configuration not loadable");
                false
            }
        };

        Readiness {
            configuration,
            record_store: self.owner.is_alive(),
        }
    }
}

/// Applies worker events to the status snapshot, mirrors logs into
/// tracing and reconciles usage when the worker finishes
struct EventRelay {
    batch_id: Uuid,
    status: Arc<RwLock<BatchStatus>>,
    profiles: Arc<ProfileRepository>,
    document: ConfigDocument,
    profile: Profile,
}

impl EventRelay {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<BatchEvent>) {
        let mut summary = None;

        while let Some(event) = events.recv().await {
            match event {
                BatchEvent::Progress(update) => self.status.write().await.apply_progress(update),
                BatchEvent::Usage(usage) => self.status.write().await.usage = usage,
                BatchEvent::Log { level, message } => {
                    self.mirror(level, &message);
                    self.status
                        .write()
                        .await
                        .push_log(level, message, MAX_LOG_LINES);
                }
                BatchEvent::Finished(finished) => summary = Some(finished),
            }
        }

        match &summary {
            Some(summary) => self.reconcile_usage(summary).await,
            None => tracing::error!(batch_id = %self.batch_id, "Batch worker stopped without a summary"),
        }

        self.status.write().await.finish(summary);
    }

    fn mirror(&self, level: LogLevel, message: &str) {
        let batch_id = &self.batch_id;
        match level {
            LogLevel::Debug => tracing::debug!(batch_id = %batch_id, "{message}"),
            LogLevel::Info => tracing::info!(batch_id = %batch_id, "{message}"),
            LogLevel::Warn => tracing::warn!(batch_id = %batch_id, "{message}"),
            LogLevel::Error => tracing::error!(batch_id = %batch_id, "{message}"),
        }
    }

    /// Add the session counters to the working profile copy and write the
    /// whole document back. Last writer wins.
    async fn reconcile_usage(&mut self, summary: &BatchSummary) {
        let session = summary.usage;
        if session.requests == 0 && !session.has_tokens() {
            return;
        }

        self.profile.usage_stats.merge(&session);
        let result = match self.document.replace_active_profile(self.profile.clone()) {
            Ok(()) => self.profiles.save(&self.document).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => tracing::info!(
                batch_id = %self.batch_id,
                requests = session.requests,
                input_tokens = session.input_tokens,
                output_tokens = session.output_tokens,
                "Usage statistics saved"
            ),
            Err(e) => {
                tracing::error!(batch_id = %self.batch_id, error = %e, "Failed to save usage statistics");
                self.status.write().await.push_log(
                    LogLevel::Error,
                    format!("Failed to save usage statistics: {e}"),
                    MAX_LOG_LINES,
                );
            }
        }
    }
}
