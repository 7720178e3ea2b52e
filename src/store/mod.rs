//! Item store abstraction for Recap.
//!
//! Provides a trait-based interface over the durable state: items, their
//! transcripts and summaries. Every status write goes through
//! [`ItemStore::transition`], a compare-and-swap on the current status.

mod memory;
mod sqlite;

pub use memory::MemoryItemStore;
pub use sqlite::SqliteItemStore;

use crate::error::{RecapError, Result};
use crate::model::{Item, ItemId, ItemStatus, Metadata, Summary, Transcript};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Trait for item store implementations.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert a new item. Fails with `Conflict` if a live item has the same URL.
    async fn insert_item(&self, item: &Item) -> Result<()>;

    /// Get an item by ID. Soft-deleted items are not returned.
    async fn get_item(&self, id: ItemId) -> Result<Option<Item>>;

    /// Find a live item by its external URL.
    async fn find_by_url(&self, url: &str) -> Result<Option<Item>>;

    /// List live items, oldest first, optionally filtered by status.
    async fn list_items(&self, status: Option<ItemStatus>, limit: Option<usize>)
        -> Result<Vec<Item>>;

    /// Move an item from `from` to `to` if its status is still `from`.
    ///
    /// Annotations are merged into `extra_metadata` in the same write.
    /// Returns `false` when the item is missing or its status has moved on.
    async fn transition(
        &self,
        id: ItemId,
        from: ItemStatus,
        to: ItemStatus,
        annotations: Option<&Metadata>,
    ) -> Result<bool>;

    /// Insert the transcript for an item. A second insert is a `Conflict`.
    async fn insert_transcript(&self, transcript: &Transcript) -> Result<()>;

    /// Get the transcript for an item.
    async fn transcript_for_item(&self, id: ItemId) -> Result<Option<Transcript>>;

    /// Insert the summary for a transcript. A second insert is a `Conflict`.
    async fn insert_summary(&self, summary: &Summary) -> Result<()>;

    /// Get the summary for a transcript.
    async fn summary_for_transcript(&self, transcript_id: Uuid) -> Result<Option<Summary>>;

    /// Flag a summary as sent. Returns `false` if it was already flagged.
    async fn mark_summary_distributed(&self, summary_id: Uuid, at: DateTime<Utc>)
        -> Result<bool>;

    /// Set the soft-delete marker. Returns `false` if nothing was deleted.
    async fn soft_delete_item(&self, id: ItemId) -> Result<bool>;

    /// Remove an item with its transcript and summary.
    async fn purge_item(&self, id: ItemId) -> Result<bool>;
}

/// Reject writes the transition table does not allow.
pub(crate) fn check_transition(from: ItemStatus, to: ItemStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(RecapError::InvalidInput(format!(
            "illegal status transition {} -> {}",
            from, to
        )))
    }
}
