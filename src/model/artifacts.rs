//! Derived artifacts: transcripts and summaries.

use super::ItemId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A transcript, owned 1:1 by an item. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: Uuid,
    pub item_id: ItemId,
    /// Full transcript text.
    pub text: String,
    /// Detected or requested language.
    pub language: Option<String>,
    /// Audio duration in seconds.
    pub duration_seconds: f64,
    pub created_at: DateTime<Utc>,
}

impl Transcript {
    pub fn new(
        item_id: ItemId,
        text: String,
        language: Option<String>,
        duration_seconds: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            text,
            language,
            duration_seconds,
            created_at: Utc::now(),
        }
    }

    /// Word count, used for log lines.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Where a summary came from and what it cost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryProvenance {
    /// Model identifier reported by the summarizer.
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl SummaryProvenance {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A summary, owned 1:1 by a transcript. Created exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: Uuid,
    pub transcript_id: Uuid,
    pub item_id: ItemId,
    pub text: String,
    pub provenance: SummaryProvenance,
    /// Set by the distribution side once the summary went out.
    pub distributed: bool,
    pub distributed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Summary {
    pub fn new(transcript: &Transcript, text: String, provenance: SummaryProvenance) -> Self {
        Self {
            id: Uuid::new_v4(),
            transcript_id: transcript.id,
            item_id: transcript.item_id,
            text,
            provenance,
            distributed: false,
            distributed_at: None,
            created_at: Utc::now(),
        }
    }
}
