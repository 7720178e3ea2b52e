//! In-process task driver.

use super::RetryPolicy;
use crate::model::ItemId;
use crate::pipeline::{Orchestrator, PipelineError, ProcessOutcome};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// What the task wrapper does after one attempt returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskDecision {
    /// Done: completed, skipped, or failed with nothing left to try.
    Ack,
    Retry { after: Duration },
    /// Retryable, but the retry ceiling was reached.
    Abandon,
}

/// One delivery of a task.
#[derive(Debug)]
pub struct Attempt {
    pub number: u32,
    pub result: Result<ProcessOutcome, PipelineError>,
    pub decision: TaskDecision,
}

/// Final state of a driven task.
#[derive(Debug)]
pub struct TaskReport {
    pub item_id: ItemId,
    pub attempts: u32,
    pub result: Result<ProcessOutcome, PipelineError>,
    pub abandoned: bool,
}

/// Totals for a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub tasks: Vec<TaskReport>,
}

impl BatchReport {
    fn push(&mut self, report: TaskReport) {
        match &report.result {
            Ok(ProcessOutcome::Completed { .. }) => self.completed += 1,
            Ok(ProcessOutcome::Skipped { .. }) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
        self.tasks.push(report);
    }
}

/// Runs `process` with at-least-once semantics and bounded retries.
pub struct TaskRunner {
    orchestrator: Arc<Orchestrator>,
    policy: RetryPolicy,
}

impl TaskRunner {
    pub fn new(orchestrator: Arc<Orchestrator>, policy: RetryPolicy) -> Self {
        Self {
            orchestrator,
            policy,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Run one attempt and decide what happens next. The decision is only
    /// made after `process` has returned.
    pub async fn execute(&self, id: ItemId, attempt: u32) -> Attempt {
        let result = self.orchestrator.process(id).await;

        let decision = match &result {
            Ok(_) => TaskDecision::Ack,
            Err(e) if !e.retryable() => TaskDecision::Ack,
            Err(e) if self.policy.should_retry(attempt, e) => {
                let after = self.policy.delay_for(attempt, e, &mut rand::rng());
                TaskDecision::Retry { after }
            }
            Err(_) => TaskDecision::Abandon,
        };

        Attempt {
            number: attempt,
            result,
            decision,
        }
    }

    /// Run attempts until the task is acknowledged or abandoned.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn drive(&self, id: ItemId) -> TaskReport {
        let mut number = 1;

        loop {
            let attempt = self.execute(id, number).await;

            match attempt.decision {
                TaskDecision::Retry { after } => {
                    if let Err(e) = &attempt.result {
                        warn!(
                            attempt = number,
                            "Attempt failed, retrying in {:.1}s: {}",
                            after.as_secs_f64(),
                            e
                        );
                    }
                    tokio::time::sleep(after).await;
                    number += 1;
                }
                TaskDecision::Ack | TaskDecision::Abandon => {
                    let abandoned = attempt.decision == TaskDecision::Abandon;
                    if abandoned {
                        warn!(attempts = number, "Retry ceiling reached, giving up");
                    }
                    return TaskReport {
                        item_id: id,
                        attempts: number,
                        result: attempt.result,
                        abandoned,
                    };
                }
            }
        }
    }

    /// Reset a `FAILED` item to `PENDING` and drive it again.
    pub async fn reprocess(&self, id: ItemId) -> Result<TaskReport, PipelineError> {
        self.orchestrator.reset_failed(id).await?;
        Ok(self.drive(id).await)
    }

    /// Drive many items, at most `concurrency` at a time.
    pub async fn run_batch(&self, ids: Vec<ItemId>, concurrency: usize) -> BatchReport {
        info!("Processing {} items with {} workers", ids.len(), concurrency.max(1));

        let reports: Vec<TaskReport> = stream::iter(ids)
            .map(|id| self.drive(id))
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut batch = BatchReport::default();
        for report in reports {
            batch.push(report);
        }
        batch
    }
}
