//! In-process fake adapters for pipeline and task tests.

use super::{Adapters, Orchestrator};
use crate::admission::DurationGate;
use crate::distribution::{DistributionTrigger, Distributor};
use crate::error::RecapError;
use crate::fetch::{ArtifactHandle, FetchError, Fetcher};
use crate::model::{Item, ItemId, ItemStatus, Metadata, Summary, SummaryProvenance, Transcript};
use crate::store::{ItemStore, MemoryItemStore};
use crate::summarization::{SummarizeError, Summarizer, SummaryContext, SummaryOutput};
use crate::transcription::{TranscribeError, Transcriber, TranscriptOutput};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Notify;
use uuid::Uuid;

#[derive(Default)]
pub(crate) struct FakeFetcher {
    pub calls: AtomicUsize,
    pub failures: Mutex<VecDeque<FetchError>>,
    /// Another writer that fails the item while the download runs.
    pub interloper: Mutex<Option<(Arc<dyn ItemStore>, ItemId)>>,
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(
        &self,
        _source_url: &str,
        workspace: &Path,
    ) -> Result<ArtifactHandle, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let interloper = self.interloper.lock().unwrap().take();
        if let Some((store, id)) = interloper {
            let moved = store
                .transition(id, ItemStatus::Downloading, ItemStatus::Failed, None)
                .await
                .unwrap();
            assert!(moved, "interloper expects the item mid-download");
        }

        let failure = self.failures.lock().unwrap().pop_front();
        match failure {
            Some(FetchError::InvalidReference(msg)) => Err(FetchError::InvalidReference(msg)),
            Some(err) => {
                // Leave a partial download behind, like yt-dlp does
                std::fs::create_dir_all(workspace).unwrap();
                std::fs::write(workspace.join("media.webm.part"), b"partial").unwrap();
                Err(err)
            }
            None => {
                std::fs::create_dir_all(workspace).unwrap();
                let path = workspace.join("media.mp3");
                std::fs::write(&path, b"ID3 fake audio").unwrap();
                Ok(ArtifactHandle::from_path(path).unwrap())
            }
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeTranscriber {
    pub calls: AtomicUsize,
    pub failures: Mutex<VecDeque<TranscribeError>>,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(
        &self,
        artifact: &ArtifactHandle,
    ) -> Result<TranscriptOutput, TranscribeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(artifact.path.exists(), "artifact must exist while transcribing");

        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(TranscriptOutput {
            text: "welcome back to the show today we talk about rust".to_string(),
            language: Some("en".to_string()),
            duration_seconds: 1800.0,
        })
    }
}

#[derive(Default)]
pub(crate) struct FakeSummarizer {
    pub calls: AtomicUsize,
    pub failures: Mutex<VecDeque<SummarizeError>>,
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(
        &self,
        text: &str,
        context: &SummaryContext,
    ) -> Result<SummaryOutput, SummarizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(SummaryOutput {
            summary_text: format!("{}: {} words", context.title, text.split_whitespace().count()),
            provenance: SummaryProvenance {
                model: "fake-model".to_string(),
                prompt_tokens: 120,
                completion_tokens: 30,
            },
        })
    }
}

#[derive(Default)]
pub(crate) struct RecordingDistributor {
    pub triggers: Mutex<Vec<DistributionTrigger>>,
    pub fail: bool,
    /// When set, each trigger waits for a permit before it is recorded.
    pub hold: Option<Arc<Notify>>,
}

#[async_trait]
impl Distributor for RecordingDistributor {
    async fn distribute(&self, trigger: &DistributionTrigger) -> crate::error::Result<()> {
        if let Some(hold) = &self.hold {
            hold.notified().await;
        }
        self.triggers.lock().unwrap().push(trigger.clone());
        if self.fail {
            Err(RecapError::InvalidInput("webhook returned 502".into()))
        } else {
            Ok(())
        }
    }
}

/// Store wrapper that yields after every read, so concurrent callers
/// interleave between reading a status and acting on it.
pub(crate) struct YieldingStore(pub Arc<MemoryItemStore>);

#[async_trait]
impl ItemStore for YieldingStore {
    async fn insert_item(&self, item: &Item) -> crate::error::Result<()> {
        self.0.insert_item(item).await
    }

    async fn get_item(&self, id: ItemId) -> crate::error::Result<Option<Item>> {
        let item = self.0.get_item(id).await;
        tokio::task::yield_now().await;
        item
    }

    async fn find_by_url(&self, url: &str) -> crate::error::Result<Option<Item>> {
        self.0.find_by_url(url).await
    }

    async fn list_items(
        &self,
        status: Option<ItemStatus>,
        limit: Option<usize>,
    ) -> crate::error::Result<Vec<Item>> {
        self.0.list_items(status, limit).await
    }

    async fn transition(
        &self,
        id: ItemId,
        from: ItemStatus,
        to: ItemStatus,
        annotations: Option<&Metadata>,
    ) -> crate::error::Result<bool> {
        self.0.transition(id, from, to, annotations).await
    }

    async fn insert_transcript(&self, transcript: &Transcript) -> crate::error::Result<()> {
        self.0.insert_transcript(transcript).await
    }

    async fn transcript_for_item(&self, id: ItemId) -> crate::error::Result<Option<Transcript>> {
        self.0.transcript_for_item(id).await
    }

    async fn insert_summary(&self, summary: &Summary) -> crate::error::Result<()> {
        self.0.insert_summary(summary).await
    }

    async fn summary_for_transcript(
        &self,
        transcript_id: Uuid,
    ) -> crate::error::Result<Option<Summary>> {
        self.0.summary_for_transcript(transcript_id).await
    }

    async fn mark_summary_distributed(
        &self,
        summary_id: Uuid,
        at: DateTime<Utc>,
    ) -> crate::error::Result<bool> {
        self.0.mark_summary_distributed(summary_id, at).await
    }

    async fn soft_delete_item(&self, id: ItemId) -> crate::error::Result<bool> {
        self.0.soft_delete_item(id).await
    }

    async fn purge_item(&self, id: ItemId) -> crate::error::Result<bool> {
        self.0.purge_item(id).await
    }
}

pub(crate) struct Harness {
    pub store: Arc<MemoryItemStore>,
    pub fetcher: Arc<FakeFetcher>,
    pub transcriber: Arc<FakeTranscriber>,
    pub summarizer: Arc<FakeSummarizer>,
    pub distributor: Arc<RecordingDistributor>,
    pub orchestrator: Arc<Orchestrator>,
    _work_dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(RecordingDistributor::default())
    }

    pub fn build(distributor: RecordingDistributor) -> Self {
        Self::assemble(distributor, false)
    }

    /// Orchestrator reads go through a [`YieldingStore`].
    pub fn racing() -> Self {
        Self::assemble(RecordingDistributor::default(), true)
    }

    fn assemble(distributor: RecordingDistributor, yielding: bool) -> Self {
        let work_dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryItemStore::new());
        let orchestrator_store: Arc<dyn ItemStore> = if yielding {
            Arc::new(YieldingStore(store.clone()))
        } else {
            store.clone()
        };
        let fetcher = Arc::new(FakeFetcher::default());
        let transcriber = Arc::new(FakeTranscriber::default());
        let summarizer = Arc::new(FakeSummarizer::default());
        let distributor = Arc::new(distributor);

        let adapters = Adapters {
            gate: Arc::new(DurationGate::new(7200)),
            fetcher: fetcher.clone(),
            transcriber: transcriber.clone(),
            summarizer: summarizer.clone(),
            distributor: distributor.clone(),
        };
        let orchestrator = Arc::new(
            Orchestrator::with_components(
                orchestrator_store,
                adapters,
                work_dir.path().to_path_buf(),
            )
            .unwrap(),
        );

        Self {
            store,
            fetcher,
            transcriber,
            summarizer,
            distributor,
            orchestrator,
            _work_dir: work_dir,
        }
    }

    pub async fn add(&self, duration: Option<u32>) -> ItemId {
        let item = Item::new(
            "channel-1",
            "Episode 42",
            format!("https://example.com/watch?v={}", uuid::Uuid::new_v4()),
            duration,
        );
        self.store.insert_item(&item).await.unwrap();
        item.id
    }

    pub async fn item(&self, id: ItemId) -> Item {
        self.store.get_item(id).await.unwrap().unwrap()
    }

    pub fn adapter_calls(&self) -> (usize, usize, usize) {
        (
            self.fetcher.calls.load(Ordering::SeqCst),
            self.transcriber.calls.load(Ordering::SeqCst),
            self.summarizer.calls.load(Ordering::SeqCst),
        )
    }

    pub fn workspace_exists(&self, id: ItemId) -> bool {
        self.orchestrator.workspace_for(id).exists()
    }
}
