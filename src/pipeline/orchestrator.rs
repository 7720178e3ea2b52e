//! Pipeline orchestrator for Recap.
//!
//! Coordinates one item from admission to a stored summary. Each status
//! write is a compare-and-swap on the item's current status, committed
//! before the next stage starts, so a failed or interrupted run never loses
//! work that already finished.

use super::error::{ErrorSummary, PipelineError, Stage};
use super::failure::{classify, ArtifactPolicy, FailureClass, StageFailure};
use crate::admission::{Admission, AdmissionGate, DurationGate, SkipReason};
use crate::config::{Prompts, Settings};
use crate::distribution::{self, DistributionTrigger, Distributor};
use crate::fetch::{ArtifactHandle, Fetcher, YtDlpFetcher};
use crate::model::{Item, ItemId, ItemStatus, Metadata, Summary, Transcript};
use crate::store::{ItemStore, SqliteItemStore};
use crate::summarization::{OpenAiSummarizer, Summarizer, SummaryContext};
use crate::transcription::{Transcriber, WhisperTranscriber};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn, Instrument};
use uuid::Uuid;

/// Stage collaborators injected into the orchestrator.
pub struct Adapters {
    pub gate: Arc<dyn AdmissionGate>,
    pub fetcher: Arc<dyn Fetcher>,
    pub transcriber: Arc<dyn Transcriber>,
    pub summarizer: Arc<dyn Summarizer>,
    pub distributor: Arc<dyn Distributor>,
}

/// Successful result of [`Orchestrator::process`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    Completed {
        item_id: ItemId,
        transcript_id: Uuid,
        summary_id: Uuid,
        /// The run picked up from a transcript stored by an earlier run.
        resumed: bool,
    },
    Skipped {
        item_id: ItemId,
        reason: SkipReason,
    },
}

/// Result of one `process` call, as reported to callers outside the crate.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessReport {
    pub item_id: ItemId,
    /// `completed`, `skipped` or `failed`.
    pub status: &'static str,
    pub final_state: Option<ItemStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ProcessOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorSummary>,
}

impl ProcessReport {
    pub fn new(
        item_id: ItemId,
        result: &Result<ProcessOutcome, PipelineError>,
        final_state: Option<ItemStatus>,
    ) -> Self {
        let (status, outcome, error) = match result {
            Ok(outcome @ ProcessOutcome::Completed { .. }) => {
                ("completed", Some(outcome.clone()), None)
            }
            Ok(outcome @ ProcessOutcome::Skipped { .. }) => ("skipped", Some(outcome.clone()), None),
            Err(e) => ("failed", None, Some(e.summary())),
        };

        Self {
            item_id,
            status,
            final_state,
            outcome,
            error,
        }
    }
}

/// The main orchestrator for the Recap pipeline.
pub struct Orchestrator {
    store: Arc<dyn ItemStore>,
    adapters: Adapters,
    work_dir: PathBuf,
    /// Distribution triggers still in flight.
    distributions: Mutex<JoinSet<()>>,
}

impl Orchestrator {
    /// Create an orchestrator with the SQLite store and real adapters.
    pub fn from_settings(settings: &Settings) -> crate::error::Result<Self> {
        let store: Arc<dyn ItemStore> = Arc::new(SqliteItemStore::new(&settings.sqlite_path())?);
        Self::from_settings_with_store(settings, store)
    }

    /// Create an orchestrator with real adapters over the given store.
    pub fn from_settings_with_store(
        settings: &Settings,
        store: Arc<dyn ItemStore>,
    ) -> crate::error::Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let adapters = Adapters {
            gate: Arc::new(DurationGate::from_settings(&settings.admission)),
            fetcher: Arc::new(YtDlpFetcher::new(&settings.fetch)),
            transcriber: Arc::new(WhisperTranscriber::new(&settings.transcription)?),
            summarizer: Arc::new(OpenAiSummarizer::new(&settings.summarization, prompts)?),
            distributor: distribution::from_settings(&settings.distribution, store.clone())?,
        };

        Self::with_components(store, adapters, settings.work_dir())
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        store: Arc<dyn ItemStore>,
        adapters: Adapters,
        work_dir: PathBuf,
    ) -> crate::error::Result<Self> {
        std::fs::create_dir_all(&work_dir)?;

        Ok(Self {
            store,
            adapters,
            work_dir,
            distributions: Mutex::new(JoinSet::new()),
        })
    }

    pub fn store(&self) -> Arc<dyn ItemStore> {
        self.store.clone()
    }

    /// Directory holding the fetched artifact of one item.
    pub fn workspace_for(&self, id: ItemId) -> PathBuf {
        self.work_dir.join(id.to_string())
    }

    /// Drive one item through the pipeline.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn process(&self, id: ItemId) -> Result<ProcessOutcome, PipelineError> {
        let item = self
            .store
            .get_item(id)
            .await?
            .ok_or(PipelineError::NotFound(id))?;

        if !item.status.is_admissible() {
            let reason = if item.status.is_terminal() {
                "terminal state, reprocessing is not allowed"
            } else {
                "already being processed"
            };
            return Err(PipelineError::InvalidState {
                id,
                status: item.status,
                reason: reason.to_string(),
            });
        }

        if let Admission::Reject(reason) = self.adapters.gate.admit(&item) {
            return self.skip(&item, reason).await;
        }

        let transcript = self.store.transcript_for_item(id).await?;

        let mut run = Run::new(self, &item);
        match transcript {
            Some(transcript) => {
                info!("Transcript already stored, resuming at summarize");
                run.claim(ItemStatus::Summarizing).await?;
                run.summarize(transcript, true).await
            }
            None => run.full().await,
        }
    }

    /// Move a `FAILED` item back to `PENDING`.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn reset_failed(&self, id: ItemId) -> Result<(), PipelineError> {
        let item = self
            .store
            .get_item(id)
            .await?
            .ok_or(PipelineError::NotFound(id))?;

        if item.status != ItemStatus::Failed {
            return Err(PipelineError::InvalidState {
                id,
                status: item.status,
                reason: "only FAILED items can be reprocessed".to_string(),
            });
        }

        if !self
            .store
            .transition(id, ItemStatus::Failed, ItemStatus::Pending, None)
            .await?
        {
            return Err(self.lost_ownership(id, ItemStatus::Failed).await);
        }

        info!("Reset to PENDING");
        Ok(())
    }

    /// Reset a `FAILED` item and run it again.
    pub async fn reprocess(&self, id: ItemId) -> Result<ProcessOutcome, PipelineError> {
        self.reset_failed(id).await?;
        self.process(id).await
    }

    /// Build the caller-facing report for a finished call.
    pub async fn report(
        &self,
        id: ItemId,
        result: &Result<ProcessOutcome, PipelineError>,
    ) -> ProcessReport {
        let final_state = match self.store.get_item(id).await {
            Ok(item) => item.map(|i| i.status),
            Err(e) => {
                warn!("Could not read final state: {}", e);
                None
            }
        };
        ProcessReport::new(id, result, final_state)
    }

    async fn skip(&self, item: &Item, reason: SkipReason) -> Result<ProcessOutcome, PipelineError> {
        // SKIPPED is only reachable from PENDING; a FAILED item that no
        // longer passes the gate stays FAILED.
        if item.status != ItemStatus::Pending {
            warn!("Admission rejected a {} item: {}", item.status, reason);
            return Err(PipelineError::Permanent {
                stage: Stage::Admission,
                cause: "admission_rejected",
                message: reason.to_string(),
            });
        }

        let annotations = reason.to_annotations(Utc::now());
        if !self
            .store
            .transition(item.id, ItemStatus::Pending, ItemStatus::Skipped, Some(&annotations))
            .await?
        {
            return Err(self.lost_ownership(item.id, ItemStatus::Pending).await);
        }

        // A reprocessed item may still hold the artifact of its failed run
        self.release_workspace(&self.workspace_for(item.id)).await;

        info!("Skipped: {}", reason);
        Ok(ProcessOutcome::Skipped {
            item_id: item.id,
            reason,
        })
    }

    /// Error for a compare-and-swap that found a different status.
    async fn lost_ownership(&self, id: ItemId, expected: ItemStatus) -> PipelineError {
        match self.store.get_item(id).await {
            Ok(Some(current)) => PipelineError::InvalidState {
                id,
                status: current.status,
                reason: format!("expected {expected}, item was moved by another worker"),
            },
            Ok(None) => PipelineError::NotFound(id),
            Err(e) => PipelineError::Store(e),
        }
    }

    /// Hand a stored summary to the distributor without waiting for it.
    ///
    /// The item's status never depends on the outcome; failures are logged.
    fn trigger_distribution(&self, item: &Item, summary: &Summary) {
        let trigger = DistributionTrigger::new(item, summary);
        let distributor = self.adapters.distributor.clone();
        let task = async move {
            if let Err(e) = distributor.distribute(&trigger).await {
                warn!(summary_id = %trigger.summary_id, "Distribution trigger failed: {}", e);
            }
        };

        let mut tasks = self
            .distributions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task.in_current_span());
    }

    /// Wait for every distribution trigger spawned so far.
    ///
    /// Short-lived callers (the CLI) call this before exiting so a pending
    /// webhook is not dropped with the runtime.
    pub async fn drain_distributions(&self) {
        let mut tasks = std::mem::take(
            &mut *self
                .distributions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("Distribution task did not finish: {}", e);
            }
        }
    }

    async fn release_workspace(&self, workspace: &Path) {
        match tokio::fs::remove_dir_all(workspace).await {
            Ok(()) => debug!("Removed workspace {:?}", workspace),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove workspace {:?}: {}", workspace, e),
        }
    }
}

/// State of one `process` invocation that holds the item.
struct Run<'a> {
    orch: &'a Orchestrator,
    item: &'a Item,
    /// Last status this run committed.
    status: ItemStatus,
    workspace: PathBuf,
    artifact: Option<ArtifactHandle>,
}

impl<'a> Run<'a> {
    fn new(orch: &'a Orchestrator, item: &'a Item) -> Self {
        Self {
            orch,
            item,
            status: item.status,
            workspace: orch.workspace_for(item.id),
            artifact: None,
        }
    }

    /// Take the item out of an admissible state. The only concurrency guard.
    async fn claim(&mut self, to: ItemStatus) -> Result<(), PipelineError> {
        let from = self.status;
        if self
            .orch
            .store
            .transition(self.item.id, from, to, None)
            .await?
        {
            debug!("Claimed: {} -> {}", from, to);
            self.status = to;
            Ok(())
        } else {
            Err(self.orch.lost_ownership(self.item.id, from).await)
        }
    }

    async fn advance(
        &mut self,
        to: ItemStatus,
        annotations: Option<&Metadata>,
    ) -> Result<(), PipelineError> {
        let from = self.status;
        match self
            .orch
            .store
            .transition(self.item.id, from, to, annotations)
            .await
        {
            Ok(true) => {
                debug!("Checkpoint: {} -> {}", from, to);
                self.status = to;
                Ok(())
            }
            Ok(false) => Err(self.orch.lost_ownership(self.item.id, from).await),
            Err(e) => Err(self
                .fail(StageFailure::Unexpected {
                    stage: Stage::for_status(from),
                    message: format!("checkpoint {from} -> {to} failed: {e}"),
                })
                .await),
        }
    }

    async fn full(mut self) -> Result<ProcessOutcome, PipelineError> {
        self.claim(ItemStatus::Downloading).await?;

        let artifact = match self
            .orch
            .adapters
            .fetcher
            .fetch(&self.item.external_url, &self.workspace)
            .await
        {
            Ok(artifact) => artifact,
            Err(e) => return Err(self.fail(StageFailure::Fetch(e)).await),
        };
        info!(
            path = %artifact.path.display(),
            size_bytes = artifact.size_bytes,
            "Fetched artifact"
        );
        self.artifact = Some(artifact.clone());
        self.advance(ItemStatus::Downloaded, None).await?;

        self.advance(ItemStatus::Transcribing, None).await?;
        let output = match self.orch.adapters.transcriber.transcribe(&artifact).await {
            Ok(output) => output,
            Err(e) => return Err(self.fail(StageFailure::Transcribe(e)).await),
        };

        let transcript = Transcript::new(
            self.item.id,
            output.text,
            output.language,
            output.duration_seconds,
        );
        if let Err(e) = self.orch.store.insert_transcript(&transcript).await {
            return Err(self
                .fail(StageFailure::Unexpected {
                    stage: Stage::Transcribe,
                    message: format!("failed to store transcript: {e}"),
                })
                .await);
        }
        info!(words = transcript.word_count(), "Transcript stored");
        self.advance(ItemStatus::Transcribed, None).await?;

        self.advance(ItemStatus::Summarizing, None).await?;
        self.summarize(transcript, false).await
    }

    async fn summarize(
        mut self,
        transcript: Transcript,
        resumed: bool,
    ) -> Result<ProcessOutcome, PipelineError> {
        let existing = match self.orch.store.summary_for_transcript(transcript.id).await {
            Ok(existing) => existing,
            Err(e) => {
                return Err(self
                    .fail(StageFailure::Unexpected {
                        stage: Stage::Summarize,
                        message: format!("failed to read summary: {e}"),
                    })
                    .await)
            }
        };

        let summary = match existing {
            Some(summary) => {
                info!("Summary already stored, finishing");
                summary
            }
            None => {
                let context = SummaryContext {
                    title: self.item.title.clone(),
                    source_id: self.item.source_id.clone(),
                    external_url: self.item.external_url.clone(),
                };
                let output = match self
                    .orch
                    .adapters
                    .summarizer
                    .summarize(&transcript.text, &context)
                    .await
                {
                    Ok(output) => output,
                    Err(e) => return Err(self.fail(StageFailure::Summarize(e)).await),
                };

                let summary = Summary::new(&transcript, output.summary_text, output.provenance);
                if let Err(e) = self.orch.store.insert_summary(&summary).await {
                    return Err(self
                        .fail(StageFailure::Unexpected {
                            stage: Stage::Summarize,
                            message: format!("failed to store summary: {e}"),
                        })
                        .await);
                }
                info!(
                    model = %summary.provenance.model,
                    tokens = summary.provenance.total_tokens(),
                    "Summary stored"
                );
                summary
            }
        };

        if !summary.distributed {
            self.orch.trigger_distribution(self.item, &summary);
        }

        let mut annotations = Metadata::new();
        annotations.insert("last_error".into(), Value::Null);
        self.advance(ItemStatus::Completed, Some(&annotations)).await?;

        self.orch.release_workspace(&self.workspace).await;
        info!("Completed");

        Ok(ProcessOutcome::Completed {
            item_id: self.item.id,
            transcript_id: transcript.id,
            summary_id: summary.id,
            resumed,
        })
    }

    /// Record a stage failure: apply the artifact policy, persist `FAILED`,
    /// then hand back the classified error.
    async fn fail(&self, failure: StageFailure) -> PipelineError {
        let class = classify(&failure);
        let stage = failure.stage();

        if class.anomaly {
            error!(%stage, cause = failure.cause(), "Unexpected failure: {}", failure.message());
        } else {
            warn!(%stage, cause = failure.cause(), "Stage failed: {}", failure.message());
        }

        let artifact_path = match class.artifact {
            ArtifactPolicy::Keep => self.artifact.as_ref().map(|a| a.path.clone()),
            ArtifactPolicy::Delete | ArtifactPolicy::NoneCreated => {
                self.orch.release_workspace(&self.workspace).await;
                None
            }
        };

        let annotations = failure_annotations(&failure, &class, artifact_path.as_deref());
        match self
            .orch
            .store
            .transition(self.item.id, self.status, ItemStatus::Failed, Some(&annotations))
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!("Status moved on before FAILED could be recorded"),
            Err(e) => error!("Failed to record FAILED status: {}", e),
        }

        failure.into_error(&class)
    }
}

/// `last_error` diagnostic written alongside `FAILED`.
fn failure_annotations(
    failure: &StageFailure,
    class: &FailureClass,
    artifact_path: Option<&Path>,
) -> Metadata {
    let mut last_error = json!({
        "stage": failure.stage(),
        "kind": failure.cause(),
        "retryable": class.retryable,
        "message": failure.message(),
        "failed_at": Utc::now().to_rfc3339(),
    });
    if let Some(path) = artifact_path {
        last_error["artifact_path"] = json!(path.display().to_string());
    }

    let mut annotations = Metadata::new();
    annotations.insert("last_error".into(), last_error);
    annotations
}
