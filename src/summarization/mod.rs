//! Summarization of transcripts.

mod openai;

pub use openai::OpenAiSummarizer;

use crate::model::SummaryProvenance;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// What the summarizer knows about the item besides its text.
#[derive(Debug, Clone, Default)]
pub struct SummaryContext {
    pub title: String,
    pub source_id: String,
    pub external_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOutput {
    pub summary_text: String,
    pub provenance: SummaryProvenance,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SummarizeError {
    /// The upstream service refused or failed the request.
    #[error("upstream error (status {status_code:?}): {message}")]
    Upstream {
        status_code: Option<u16>,
        /// How long the upstream asked us to wait, when it said.
        retry_after: Option<Duration>,
        message: String,
    },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl SummarizeError {
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SummarizeError::Upstream { retry_after, .. } => *retry_after,
            SummarizeError::InvalidResponse(_) => None,
        }
    }
}

/// Trait for summarization services.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        text: &str,
        context: &SummaryContext,
    ) -> Result<SummaryOutput, SummarizeError>;
}
