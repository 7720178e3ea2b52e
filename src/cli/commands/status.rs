//! Status command - show one item with its artifacts.

use super::{open_store, parse_item_id};
use crate::cli::output::{content_preview, format_duration};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;
use serde_json::json;

/// Show an item, its transcript and its summary.
pub async fn run_status(id: &str, json: bool, settings: &Settings) -> Result<()> {
    let id = parse_item_id(id)?;
    let store = open_store(settings)?;

    let item = store
        .get_item(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Item not found: {}", id))?;
    let transcript = store.transcript_for_item(id).await?;
    let summary = match &transcript {
        Some(t) => store.summary_for_transcript(t.id).await?,
        None => None,
    };

    if json {
        let view = json!({
            "item": item,
            "transcript": transcript,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    Output::header(&item.title);
    Output::kv("ID", &item.id.to_string());
    Output::kv("Status", &Output::status(item.status).to_string());
    Output::kv("Source", &item.source_id);
    Output::kv("URL", &item.external_url);
    if let Some(d) = item.duration_seconds {
        Output::kv("Duration", &format_duration(d as f64));
    }
    Output::kv("Updated", &item.updated_at.to_rfc3339());

    if let Some(reason) = item.skip_reason() {
        Output::kv("Skip reason", reason);
    }
    if let Some(error) = item.last_error() {
        Output::kv("Last error", &error.to_string());
    }

    if let Some(t) = &transcript {
        Output::header("Transcript");
        Output::kv("Words", &t.word_count().to_string());
        if let Some(lang) = &t.language {
            Output::kv("Language", lang);
        }
        Output::kv("Preview", &content_preview(&t.text, 200));
    }

    if let Some(s) = &summary {
        Output::header("Summary");
        Output::kv("Model", &s.provenance.model);
        Output::kv("Tokens", &s.provenance.total_tokens().to_string());
        Output::kv("Distributed", &s.distributed.to_string());
        println!();
        println!("{}", s.text);
    }

    Ok(())
}
