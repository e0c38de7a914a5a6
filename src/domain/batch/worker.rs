use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::events::{BatchEvent, LogLevel, ProgressUpdate};
use super::model::{media_filename, BatchCounters, BatchSummary, StopReason, MAX_CONSECUTIVE_ERRORS};
use super::text::clean_text;
use crate::domain::profile::{FieldMapping, Profile};
use crate::domain::record::{sound_reference, Record, RecordId};
use crate::domain::shared::{seconds, sleep_unless_cancelled, UsageStats};
use crate::domain::tts::{describe_failure, FallbackTtsService, SynthesisResult};
use crate::infrastructure::owner::{OwnerCallError, OwnerHandle};
use crate::infrastructure::repositories::StoreError;

const STATUS_WAITING: &str = "Waiting...";
const STATUS_SKIPPED: &str = "Skipped...";

/// Runs one batch: records strictly in order, one API call at a time.
///
/// All record access goes through the owner handle. The profile is a
/// read-only copy; session counters and usage live here until the summary.
pub struct BatchWorker {
    record_ids: Vec<RecordId>,
    profile: Profile,
    tts: FallbackTtsService,
    owner: OwnerHandle,
    events: mpsc::UnboundedSender<BatchEvent>,
    cancel: CancellationToken,
    counters: BatchCounters,
    usage: UsageStats,
}

impl BatchWorker {
    pub fn new(
        record_ids: Vec<RecordId>,
        profile: Profile,
        tts: FallbackTtsService,
        owner: OwnerHandle,
        events: mpsc::UnboundedSender<BatchEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            record_ids,
            profile,
            tts,
            owner,
            events,
            cancel,
            counters: BatchCounters::default(),
            usage: UsageStats::default(),
        }
    }

    /// Process every record and emit the terminal summary
    pub async fn run(mut self) -> BatchSummary {
        let total = self.record_ids.len();
        tracing::info!(total, "Batch started");

        let reason = match self.process_all().await {
            Ok(()) => StopReason::Completed,
            Err(reason) => reason,
        };

        match reason {
            StopReason::Cancelled => self.log(LogLevel::Warn, "Processing cancelled by user."),
            StopReason::TooManyErrors => self.log(
                LogLevel::Error,
                format!("Stopping: {MAX_CONSECUTIVE_ERRORS} consecutive errors."),
            ),
            StopReason::Completed => {}
        }

        let summary = BatchSummary::new(reason, total, &self.counters, self.usage);
        self.log(LogLevel::Info, summary.message());
        self.emit(BatchEvent::Finished(summary.clone()));
        summary
    }

    async fn process_all(&mut self) -> Result<(), StopReason> {
        let record_ids = self.record_ids.clone();
        let total = record_ids.len();

        for (position, record_id) in record_ids.into_iter().enumerate() {
            self.check_abort()?;
            let index = position + 1;
            let status = self.process_record(index, total, record_id).await?;
            self.progress(index, total, status);
        }

        // A streak that ends on the last mapping still stops the batch
        if self.counters.breaker_tripped() {
            return Err(StopReason::TooManyErrors);
        }
        Ok(())
    }

    fn check_abort(&self) -> Result<(), StopReason> {
        if self.cancel.is_cancelled() {
            return Err(StopReason::Cancelled);
        }
        if self.counters.breaker_tripped() {
            return Err(StopReason::TooManyErrors);
        }
        Ok(())
    }

    async fn process_record(
        &mut self,
        index: usize,
        total: usize,
        record_id: RecordId,
    ) -> Result<&'static str, StopReason> {
        let read = self
            .owner
            .call_cancellable(move |store| store.get_record(record_id), &self.cancel)
            .await;

        let record = match read {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.log(LogLevel::Info, format!("Record {record_id}: Skipped (Deleted)"));
                return Ok(STATUS_SKIPPED);
            }
            Err(OwnerCallError::Cancelled) => return Err(StopReason::Cancelled),
            Err(e @ OwnerCallError::Timeout(_)) => {
                self.counters.record_failure();
                self.log(LogLevel::Error, format!("Record {record_id}: Read error - {e}"));
                return Ok(STATUS_SKIPPED);
            }
            Err(e) => {
                self.log(
                    LogLevel::Warn,
                    format!("Record {record_id}: Skipped (Read error - {e})"),
                );
                return Ok(STATUS_SKIPPED);
            }
        };

        let mappings: Vec<FieldMapping> = self
            .profile
            .mappings_for(&record.record_type)
            .into_iter()
            .cloned()
            .collect();

        for mapping in &mappings {
            self.check_abort()?;
            self.process_mapping(index, total, &record, mapping).await?;
        }

        Ok(STATUS_WAITING)
    }

    async fn process_mapping(
        &mut self,
        index: usize,
        total: usize,
        record: &Record,
        mapping: &FieldMapping,
    ) -> Result<(), StopReason> {
        let record_id = record.id;

        let Some(source) = record.field(&mapping.source_field) else {
            self.counters.record_failure();
            self.log(
                LogLevel::Error,
                format!(
                    "Record {record_id}: Error - Field '{}' missing",
                    mapping.source_field
                ),
            );
            return Ok(());
        };

        if self.profile.skip_existing_audio && record.has_audio(&mapping.target_field) {
            self.counters.record_skip();
            self.log(LogLevel::Info, format!("Record {record_id}: Skipped (Audio exists)"));
            return Ok(());
        }

        let text = clean_text(source);
        if text.is_empty() {
            self.counters.record_skip();
            self.log(LogLevel::Info, format!("Record {record_id}: Skipped (Empty text)"));
            return Ok(());
        }

        self.progress(index, total, format!("Generating ({index}/{total})..."));

        let delay = seconds(self.profile.request_delay);
        if !delay.is_zero() && !sleep_unless_cancelled(delay, &self.cancel).await {
            return Err(StopReason::Cancelled);
        }

        if self.profile.verbose_logging {
            self.log(
                LogLevel::Debug,
                format!(
                    "Record {record_id}: Sending {} chars from '{}' to {}",
                    text.chars().count(),
                    mapping.source_field,
                    self.tts.primary_model()
                ),
            );
        }

        let result = self.tts.synthesize_with_fallback(&text, &self.cancel).await;
        self.account_usage(&result);

        match result {
            SynthesisResult::Audio { audio, model, .. } => {
                self.counters.reset_streak();
                match self
                    .save_audio(record_id, mapping.target_field.clone(), audio)
                    .await
                {
                    Ok(filename) => {
                        self.counters.record_success();
                        let used_model = if model != self.profile.primary_model {
                            format!(" ({model})")
                        } else {
                            String::new()
                        };
                        self.log(LogLevel::Info, format!("Record {record_id}: Success{used_model}"));
                        if self.profile.verbose_logging {
                            self.log(
                                LogLevel::Debug,
                                format!("Record {record_id}: Saved {filename}"),
                            );
                        }
                    }
                    Err(e) => {
                        self.counters.record_failure();
                        self.log(LogLevel::Error, format!("Record {record_id}: Save error - {e}"));
                    }
                }
            }
            SynthesisResult::NoAudio { .. } if self.cancel.is_cancelled() => {
                return Err(StopReason::Cancelled);
            }
            SynthesisResult::NoAudio { reason, .. } => {
                self.counters.record_failure();
                self.log(
                    LogLevel::Error,
                    format!("Record {record_id}: API error - {}", describe_failure(&reason)),
                );
            }
        }

        Ok(())
    }

    /// Merge token counts into the session and announce the new totals.
    /// Only audio-bearing results count as a request.
    fn account_usage(&mut self, result: &SynthesisResult) {
        let is_audio = matches!(result, SynthesisResult::Audio { .. });
        let delta = result.usage();
        if !is_audio && !delta.has_tokens() {
            return;
        }

        self.usage.merge(&UsageStats {
            requests: u64::from(is_audio),
            input_tokens: delta.input_tokens,
            output_tokens: delta.output_tokens,
        });
        self.emit(BatchEvent::Usage(self.usage));
    }

    /// Write the media file, then re-read the record and point the target
    /// field at it. The earlier read is not reused since the record may
    /// have changed or been deleted meanwhile.
    async fn save_audio(
        &self,
        record_id: RecordId,
        target_field: String,
        audio: Vec<u8>,
    ) -> Result<String, OwnerCallError> {
        let filename = media_filename(record_id, Utc::now().timestamp_millis());
        let success_tag = self.profile.success_tag().map(str::to_string);

        self.owner
            .call(move |store| {
                let stored = store.write_media(&filename, &audio)?;
                let mut record = store
                    .get_record(record_id)?
                    .ok_or(StoreError::NotFound(record_id))?;
                record.set_field(&target_field, sound_reference(&stored));
                if let Some(tag) = &success_tag {
                    record.add_tag(tag);
                }
                store.update_record(record)?;
                Ok(stored)
            })
            .await
    }

    fn progress(&self, index: usize, total: usize, status: impl Into<String>) {
        self.emit(BatchEvent::Progress(ProgressUpdate {
            index,
            total,
            status: status.into(),
            success: self.counters.success,
            failed: self.counters.failed,
            skipped: self.counters.skipped,
        }));
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(BatchEvent::Log {
            level,
            message: message.into(),
        });
    }

    fn emit(&self, event: BatchEvent) {
        // Nobody listening is not an error for the worker
        let _ = self.events.send(event);
    }
}
