//! In-memory item store implementation.
//!
//! Useful for testing and dry runs.

use super::{check_transition, ItemStore};
use crate::error::{RecapError, Result};
use crate::model::{merge_metadata, Item, ItemId, ItemStatus, Metadata, Summary, Transcript};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Default)]
struct State {
    items: HashMap<ItemId, Item>,
    /// Keyed by item ID.
    transcripts: HashMap<ItemId, Transcript>,
    /// Keyed by transcript ID.
    summaries: HashMap<Uuid, Summary>,
}

/// In-memory item store.
#[derive(Default)]
pub struct MemoryItemStore {
    state: RwLock<State>,
}

impl MemoryItemStore {
    /// Create a new in-memory item store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|e| RecapError::Store(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|e| RecapError::Store(format!("Failed to acquire lock: {}", e)))
    }
}

fn live(item: &Item) -> bool {
    item.deleted_at.is_none()
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn insert_item(&self, item: &Item) -> Result<()> {
        let mut state = self.write()?;

        if state.items.contains_key(&item.id) {
            return Err(RecapError::Conflict(format!("item {} already exists", item.id)));
        }
        if state
            .items
            .values()
            .any(|i| live(i) && i.external_url == item.external_url)
        {
            return Err(RecapError::Conflict(format!(
                "item with url {} already exists",
                item.external_url
            )));
        }

        state.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        let state = self.read()?;
        Ok(state.items.get(&id).filter(|i| live(i)).cloned())
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Item>> {
        let state = self.read()?;
        Ok(state
            .items
            .values()
            .find(|i| live(i) && i.external_url == url)
            .cloned())
    }

    async fn list_items(
        &self,
        status: Option<ItemStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<Item>> {
        let state = self.read()?;

        let mut items: Vec<Item> = state
            .items
            .values()
            .filter(|i| live(i) && status.map_or(true, |s| i.status == s))
            .cloned()
            .collect();

        items.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_uuid().cmp(b.id.as_uuid()))
        });
        if let Some(limit) = limit {
            items.truncate(limit);
        }

        Ok(items)
    }

    async fn transition(
        &self,
        id: ItemId,
        from: ItemStatus,
        to: ItemStatus,
        annotations: Option<&Metadata>,
    ) -> Result<bool> {
        check_transition(from, to)?;

        let mut state = self.write()?;

        match state.items.get_mut(&id) {
            Some(item) if live(item) && item.status == from => {
                item.status = to;
                if let Some(annotations) = annotations {
                    merge_metadata(&mut item.extra_metadata, annotations);
                }
                item.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_transcript(&self, transcript: &Transcript) -> Result<()> {
        let mut state = self.write()?;

        if !state.items.contains_key(&transcript.item_id) {
            return Err(RecapError::Conflict(format!(
                "item {} does not exist",
                transcript.item_id
            )));
        }
        if state.transcripts.contains_key(&transcript.item_id) {
            return Err(RecapError::Conflict(format!(
                "transcript for item {} already exists",
                transcript.item_id
            )));
        }

        state.transcripts.insert(transcript.item_id, transcript.clone());
        Ok(())
    }

    async fn transcript_for_item(&self, id: ItemId) -> Result<Option<Transcript>> {
        let state = self.read()?;
        Ok(state.transcripts.get(&id).cloned())
    }

    async fn insert_summary(&self, summary: &Summary) -> Result<()> {
        let mut state = self.write()?;

        if !state
            .transcripts
            .values()
            .any(|t| t.id == summary.transcript_id)
        {
            return Err(RecapError::Conflict(format!(
                "transcript {} does not exist",
                summary.transcript_id
            )));
        }
        if state.summaries.contains_key(&summary.transcript_id) {
            return Err(RecapError::Conflict(format!(
                "summary for transcript {} already exists",
                summary.transcript_id
            )));
        }

        state.summaries.insert(summary.transcript_id, summary.clone());
        Ok(())
    }

    async fn summary_for_transcript(&self, transcript_id: Uuid) -> Result<Option<Summary>> {
        let state = self.read()?;
        Ok(state.summaries.get(&transcript_id).cloned())
    }

    async fn mark_summary_distributed(
        &self,
        summary_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.write()?;

        match state
            .summaries
            .values_mut()
            .find(|s| s.id == summary_id && !s.distributed)
        {
            Some(summary) => {
                summary.distributed = true;
                summary.distributed_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn soft_delete_item(&self, id: ItemId) -> Result<bool> {
        let mut state = self.write()?;

        match state.items.get_mut(&id) {
            Some(item) if live(item) => {
                let now = Utc::now();
                item.deleted_at = Some(now);
                item.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_item(&self, id: ItemId) -> Result<bool> {
        let mut state = self.write()?;

        if state.items.remove(&id).is_none() {
            return Ok(false);
        }
        if let Some(transcript) = state.transcripts.remove(&id) {
            state.summaries.remove(&transcript.id);
        }
        Ok(true)
    }
}
