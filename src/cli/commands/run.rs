//! Run command - process every pending item.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::model::ItemStatus;
use crate::pipeline::{Orchestrator, ProcessOutcome};
use crate::task::{RetryPolicy, TaskRunner};
use anyhow::Result;
use std::sync::Arc;

/// Run the pending queue.
pub async fn run_pending(
    limit: Option<usize>,
    concurrency: Option<usize>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Process) {
        Output::error(&format!("{}", e));
        Output::info("Run 'recap doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Arc::new(Orchestrator::from_settings(&settings)?);
    let pending = orchestrator
        .store()
        .list_items(Some(ItemStatus::Pending), limit)
        .await?;

    if pending.is_empty() {
        Output::info("Nothing pending. Use 'recap add <url>' to queue media.");
        return Ok(());
    }

    let concurrency = concurrency.unwrap_or(settings.worker.concurrency);
    let runner = TaskRunner::new(orchestrator, RetryPolicy::from_settings(&settings.retry));

    let spinner = Output::spinner(&format!("Processing {} item(s)...", pending.len()));
    let ids = pending.iter().map(|item| item.id).collect();
    let batch = runner.run_batch(ids, concurrency).await;
    runner.orchestrator().drain_distributions().await;
    spinner.finish_and_clear();

    Output::header("Results");
    for task in &batch.tasks {
        let title = pending
            .iter()
            .find(|item| item.id == task.item_id)
            .map(|item| item.title.as_str())
            .unwrap_or("?");
        match &task.result {
            Ok(ProcessOutcome::Completed { .. }) => Output::list_item(&format!("completed  {}", title)),
            Ok(ProcessOutcome::Skipped { reason, .. }) => {
                Output::list_item(&format!("skipped    {} ({})", title, reason))
            }
            Err(e) => Output::list_item(&format!(
                "failed     {} after {} attempt(s): {}",
                title, task.attempts, e
            )),
        }
    }

    println!();
    Output::kv("Completed", &batch.completed.to_string());
    Output::kv("Skipped", &batch.skipped.to_string());
    Output::kv("Failed", &batch.failed.to_string());

    if batch.failed > 0 {
        Output::info("Inspect failures with 'recap list --status failed'.");
    }
    Ok(())
}
