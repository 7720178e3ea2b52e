//! Delete command implementation.

use super::{open_store, parse_item_id};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Soft-delete an item, or purge it with its artifacts.
pub async fn run_delete(id: &str, purge: bool, settings: &Settings) -> Result<()> {
    let id = parse_item_id(id)?;
    let store = open_store(settings)?;

    if let Some(item) = store.get_item(id).await? {
        if item.status.is_in_progress() {
            Output::warning(&format!(
                "Item is {}; a running worker may still write to it.",
                item.status
            ));
        }
    }

    let removed = if purge {
        store.purge_item(id).await?
    } else {
        store.soft_delete_item(id).await?
    };

    if !removed {
        Output::warning(&format!("No item {} to delete.", id));
        return Ok(());
    }

    if purge {
        let workspace = settings.work_dir().join(id.to_string());
        match std::fs::remove_dir_all(&workspace) {
            Ok(()) => Output::info(&format!("Removed workspace {}", workspace.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => Output::warning(&format!("Could not remove workspace: {}", e)),
        }
        Output::success(&format!("Purged {}", id));
    } else {
        Output::success(&format!("Deleted {}", id));
    }
    Ok(())
}
