//! Transcription of fetched artifacts.

mod whisper;

pub use whisper::WhisperTranscriber;

use crate::fetch::ArtifactHandle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Text recovered from an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptOutput {
    pub text: String,
    /// Detected or hinted language, if the service reported one.
    pub language: Option<String>,
    pub duration_seconds: f64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscribeError {
    #[error("transcription failed: {0}")]
    ProcessingFailure(String),
}

/// Trait for transcription services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a fetched artifact. The artifact is left in place.
    async fn transcribe(&self, artifact: &ArtifactHandle)
        -> Result<TranscriptOutput, TranscribeError>;
}
