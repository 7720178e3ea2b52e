//! List command implementation.

use super::open_store;
use crate::cli::Output;
use crate::config::Settings;
use crate::model::ItemStatus;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(status: Option<&str>, limit: Option<usize>, settings: &Settings) -> Result<()> {
    let status = status
        .map(|s| s.parse::<ItemStatus>().map_err(anyhow::Error::msg))
        .transpose()?;

    let store = open_store(settings)?;
    let items = store.list_items(status, limit).await?;

    if items.is_empty() {
        match status {
            Some(s) => Output::info(&format!("No {} items.", s)),
            None => Output::info("No items yet. Use 'recap add <url>' to add content."),
        }
        return Ok(());
    }

    Output::header(&format!("Items ({})", items.len()));
    println!();
    for item in &items {
        Output::item_line(item);
    }

    if status.is_none() {
        println!();
        for s in ItemStatus::ALL {
            let count = items.iter().filter(|i| i.status == s).count();
            if count > 0 {
                Output::kv(s.as_str(), &count.to_string());
            }
        }
    }

    Ok(())
}
