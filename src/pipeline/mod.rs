//! The processing pipeline: admission, fetch, transcribe, summarize and the
//! distribution trigger, with a durable checkpoint after every stage.

mod error;
mod failure;
mod orchestrator;

#[cfg(test)]
pub(crate) mod fakes;

pub use error::{ErrorSummary, PipelineError, Stage};
pub use failure::{classify, ArtifactPolicy, FailureClass, StageFailure};
pub use orchestrator::{Adapters, Orchestrator, ProcessOutcome, ProcessReport};
