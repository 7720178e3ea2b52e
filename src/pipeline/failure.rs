//! Stage failure classification.
//!
//! Every stage error the pipeline can observe is mapped here, and only here,
//! to a retry policy and an artifact policy.

use super::error::{PipelineError, Stage};
use crate::fetch::FetchError;
use crate::summarization::SummarizeError;
use crate::transcription::TranscribeError;
use std::time::Duration;

/// A failure observed while running a stage.
#[derive(Debug, Clone)]
pub enum StageFailure {
    Fetch(FetchError),
    Transcribe(TranscribeError),
    Summarize(SummarizeError),
    /// Anything outside the adapters' own error types, e.g. a store write.
    Unexpected { stage: Stage, message: String },
}

/// What to do with the fetched artifact after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactPolicy {
    /// The failure happens before anything is written.
    NoneCreated,
    Keep,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureClass {
    pub retryable: bool,
    pub artifact: ArtifactPolicy,
    /// Logged at error level as something we did not expect to see.
    pub anomaly: bool,
    pub retry_after: Option<Duration>,
}

impl StageFailure {
    pub fn stage(&self) -> Stage {
        match self {
            StageFailure::Fetch(_) => Stage::Fetch,
            StageFailure::Transcribe(_) => Stage::Transcribe,
            StageFailure::Summarize(_) => Stage::Summarize,
            StageFailure::Unexpected { stage, .. } => *stage,
        }
    }

    /// Error kind label recorded in diagnostics.
    pub fn cause(&self) -> &'static str {
        match self {
            StageFailure::Fetch(FetchError::InvalidReference(_)) => "invalid_reference",
            StageFailure::Fetch(FetchError::Unavailable(_)) => "unavailable",
            StageFailure::Fetch(FetchError::Network(_)) => "network",
            StageFailure::Fetch(FetchError::Extraction(_)) => "extraction",
            StageFailure::Transcribe(TranscribeError::ProcessingFailure(_)) => "processing_failure",
            StageFailure::Summarize(SummarizeError::Upstream { .. }) => "upstream",
            StageFailure::Summarize(SummarizeError::InvalidResponse(_)) => "invalid_response",
            StageFailure::Unexpected { .. } => "unexpected",
        }
    }

    pub fn message(&self) -> String {
        match self {
            StageFailure::Fetch(e) => e.to_string(),
            StageFailure::Transcribe(e) => e.to_string(),
            StageFailure::Summarize(e) => e.to_string(),
            StageFailure::Unexpected { message, .. } => message.clone(),
        }
    }

    pub fn into_error(self, class: &FailureClass) -> PipelineError {
        let stage = self.stage();
        let cause = self.cause();
        let message = self.message();

        if class.retryable {
            PipelineError::Transient {
                stage,
                cause,
                message,
                retry_after: class.retry_after,
            }
        } else {
            PipelineError::Permanent {
                stage,
                cause,
                message,
            }
        }
    }
}

/// Map a stage failure to its policies.
pub fn classify(failure: &StageFailure) -> FailureClass {
    let (retryable, artifact, anomaly) = match failure {
        StageFailure::Fetch(FetchError::InvalidReference(_)) => {
            (false, ArtifactPolicy::NoneCreated, false)
        }
        StageFailure::Fetch(FetchError::Unavailable(_)) => {
            (false, ArtifactPolicy::NoneCreated, false)
        }
        StageFailure::Fetch(FetchError::Network(_)) => (true, ArtifactPolicy::Delete, false),
        StageFailure::Fetch(FetchError::Extraction(_)) => (true, ArtifactPolicy::Delete, true),
        StageFailure::Transcribe(TranscribeError::ProcessingFailure(_)) => {
            (true, ArtifactPolicy::Keep, false)
        }
        StageFailure::Summarize(_) => (true, ArtifactPolicy::Delete, false),
        StageFailure::Unexpected { .. } => (true, ArtifactPolicy::Delete, true),
    };

    let retry_after = match failure {
        StageFailure::Summarize(e) => e.retry_after(),
        _ => None,
    };

    FailureClass {
        retryable,
        artifact,
        anomaly,
        retry_after,
    }
}
