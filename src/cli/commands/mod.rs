//! CLI command implementations.

mod add;
mod config;
mod delete;
mod doctor;
mod init;
mod list;
mod process;
mod run;
mod status;

pub use add::run_add;
pub use config::run_config;
pub use delete::run_delete;
pub use doctor::run_doctor;
pub use init::run_init;
pub use list::run_list;
pub use process::{run_process, run_reprocess};
pub use run::run_pending;
pub use status::run_status;

use crate::config::Settings;
use crate::model::ItemId;
use crate::store::{ItemStore, SqliteItemStore};
use std::sync::Arc;

/// Open the configured item store.
fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn ItemStore>> {
    Ok(Arc::new(SqliteItemStore::new(&settings.sqlite_path())?))
}

/// Parse an item ID given on the command line.
fn parse_item_id(id: &str) -> anyhow::Result<ItemId> {
    id.parse()
        .map_err(|e| anyhow::anyhow!("Invalid item ID '{}': {}", id, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_item_id() {
        let id = ItemId::new();
        assert_eq!(parse_item_id(&format!(" {} ", id)).unwrap(), id);
        assert!(parse_item_id("not-an-id").is_err());
    }
}
