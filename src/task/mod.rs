//! Task execution wrapper around [`Orchestrator::process`].
//!
//! Delivery is at-least-once: an attempt is acknowledged only after
//! `process` returns, and retryable failures are re-run with exponential
//! backoff and jitter up to a hard ceiling. One concurrent run per item is
//! enforced by the orchestrator's claim, not here.
//!
//! [`Orchestrator::process`]: crate::pipeline::Orchestrator::process

mod policy;
mod runner;

pub use policy::RetryPolicy;
pub use runner::{Attempt, BatchReport, TaskDecision, TaskReport, TaskRunner};
