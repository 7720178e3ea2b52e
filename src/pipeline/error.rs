//! Pipeline error taxonomy.

use crate::error::RecapError;
use crate::model::{ItemId, ItemStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Pipeline stage, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Admission,
    Fetch,
    Transcribe,
    Summarize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Admission => "admission",
            Stage::Fetch => "fetch",
            Stage::Transcribe => "transcribe",
            Stage::Summarize => "summarize",
        }
    }

    /// The stage that owns an in-progress status.
    pub fn for_status(status: ItemStatus) -> Self {
        match status {
            ItemStatus::Downloading | ItemStatus::Downloaded => Stage::Fetch,
            ItemStatus::Transcribing | ItemStatus::Transcribed => Stage::Transcribe,
            ItemStatus::Summarizing => Stage::Summarize,
            _ => Stage::Admission,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a `process` call did not complete or skip the item.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("item {0} not found")]
    NotFound(ItemId),

    /// The item is not in a state this call may act on, or another writer
    /// moved it while we held it.
    #[error("item {id} is {status}: {reason}")]
    InvalidState {
        id: ItemId,
        status: ItemStatus,
        reason: String,
    },

    #[error("{stage} failed permanently ({cause}): {message}")]
    Permanent {
        stage: Stage,
        cause: &'static str,
        message: String,
    },

    #[error("{stage} failed ({cause}): {message}")]
    Transient {
        stage: Stage,
        cause: &'static str,
        message: String,
        /// Minimum wait the upstream asked for.
        retry_after: Option<Duration>,
    },

    /// The store failed before the item was claimed.
    #[error(transparent)]
    Store(#[from] RecapError),
}

impl PipelineError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::NotFound(_) => "not_found",
            PipelineError::InvalidState { .. } => "invalid_state",
            PipelineError::Permanent { .. } => "permanent_stage_error",
            PipelineError::Transient { .. } => "transient_stage_error",
            PipelineError::Store(_) => "store_error",
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Transient { .. } | PipelineError::Store(_)
        )
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Permanent { stage, .. } | PipelineError::Transient { stage, .. } => {
                Some(*stage)
            }
            _ => None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            PipelineError::Transient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn summary(&self) -> ErrorSummary {
        ErrorSummary {
            kind: self.kind().to_string(),
            retryable: self.retryable(),
            stage: self.stage(),
            message: self.to_string(),
        }
    }
}

/// Serializable view of a [`PipelineError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub kind: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub message: String,
}
