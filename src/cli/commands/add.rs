//! Add command - register a media URL as a pending item.

use super::open_store;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::fetch::{probe_metadata, ProbedMedia};
use crate::model::Item;
use anyhow::Result;

/// Run the add command.
pub async fn run_add(
    url: &str,
    source: Option<String>,
    title: Option<String>,
    duration: Option<u32>,
    settings: &Settings,
) -> Result<()> {
    let store = open_store(settings)?;

    if let Some(existing) = store.find_by_url(url).await? {
        Output::warning(&format!(
            "Already registered as {} ({})",
            existing.id, existing.status
        ));
        return Ok(());
    }

    let probed = if title.is_none() || duration.is_none() {
        probe(url, title.is_some()).await?
    } else {
        None
    };

    let item = build_item(url, source, title, duration, probed)?;
    store.insert_item(&item).await?;

    Output::success(&format!("Added '{}'", item.title));
    Output::kv("ID", &item.id.to_string());
    Output::kv("Source", &item.source_id);
    if item.duration_seconds.is_none() {
        Output::warning("Duration unknown; the admission check will let this item through.");
    }
    Ok(())
}

/// Probe the URL. A failed probe is fatal only when there is no title.
async fn probe(url: &str, have_title: bool) -> Result<Option<ProbedMedia>> {
    if let Err(e) = preflight::check(Operation::Probe) {
        if have_title {
            Output::warning(&format!("Skipping metadata probe: {}", e));
            return Ok(None);
        }
        Output::info("Pass --title and --duration to add without probing.");
        return Err(e.into());
    }

    let spinner = Output::spinner("Probing metadata...");
    let result = probe_metadata(url).await;
    spinner.finish_and_clear();

    match result {
        Ok(probed) => Ok(Some(probed)),
        Err(e) if have_title => {
            Output::warning(&format!("Metadata probe failed: {}", e));
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn build_item(
    url: &str,
    source: Option<String>,
    title: Option<String>,
    duration: Option<u32>,
    probed: Option<ProbedMedia>,
) -> Result<Item> {
    let (probed_title, probed_duration, channel) = match probed {
        Some(p) => (Some(p.title), p.duration_seconds, p.channel),
        None => (None, None, None),
    };

    let title = title
        .or(probed_title)
        .ok_or_else(|| anyhow::anyhow!("No title given and none could be probed"))?;
    let source = source
        .or(channel)
        .or_else(|| url::Url::parse(url).ok()?.host_str().map(str::to_string))
        .unwrap_or_else(|| "manual".to_string());

    Ok(Item::new(source, title, url, duration.or(probed_duration)))
}
