//! Process and reprocess commands.

use super::parse_item_id;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::{Orchestrator, ProcessOutcome, ProcessReport};
use crate::task::{RetryPolicy, TaskRunner};
use anyhow::Result;
use std::sync::Arc;

/// Run one item through the pipeline.
///
/// With `once` a single attempt is made; otherwise retryable failures are
/// retried with backoff until the configured ceiling.
pub async fn run_process(id: &str, once: bool, json: bool, settings: Settings) -> Result<()> {
    let id = parse_item_id(id)?;
    let runner = build_runner(&settings)?;

    let spinner = (!json).then(|| Output::spinner(&format!("Processing {}...", id)));
    let result = if once {
        runner.orchestrator().process(id).await
    } else {
        runner.drive(id).await.result
    };
    runner.orchestrator().drain_distributions().await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let report = runner.orchestrator().report(id, &result).await;
    print_report(&report, json)
}

/// Reset a failed item and process it again.
pub async fn run_reprocess(id: &str, json: bool, settings: Settings) -> Result<()> {
    let id = parse_item_id(id)?;
    let runner = build_runner(&settings)?;

    let spinner = (!json).then(|| Output::spinner(&format!("Reprocessing {}...", id)));
    let result = match runner.reprocess(id).await {
        Ok(task) => task.result,
        Err(e) => Err(e),
    };
    runner.orchestrator().drain_distributions().await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let report = runner.orchestrator().report(id, &result).await;
    print_report(&report, json)
}

fn build_runner(settings: &Settings) -> Result<TaskRunner> {
    if let Err(e) = preflight::check(Operation::Process) {
        Output::error(&format!("{}", e));
        Output::info("Run 'recap doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Arc::new(Orchestrator::from_settings(settings)?);
    Ok(TaskRunner::new(
        orchestrator,
        RetryPolicy::from_settings(&settings.retry),
    ))
}

fn print_report(report: &ProcessReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        match (&report.outcome, &report.error) {
            (Some(ProcessOutcome::Completed { summary_id, resumed, .. }), _) => {
                Output::success(&format!("Completed {}", report.item_id));
                Output::kv("Summary", &summary_id.to_string());
                if *resumed {
                    Output::kv("Resumed", "from stored transcript");
                }
            }
            (Some(ProcessOutcome::Skipped { reason, .. }), _) => {
                Output::warning(&format!("Skipped {}: {}", report.item_id, reason));
            }
            (None, Some(error)) => {
                Output::error(&format!("{}: {}", error.kind, error.message));
                if let Some(stage) = error.stage {
                    Output::kv("Stage", stage.as_str());
                }
                Output::kv("Retryable", &error.retryable.to_string());
            }
            (None, None) => {}
        }
        if let Some(state) = report.final_state {
            Output::kv("Status", &Output::status(state).to_string());
        }
    }

    if report.error.is_some() {
        std::process::exit(1);
    }
    Ok(())
}
