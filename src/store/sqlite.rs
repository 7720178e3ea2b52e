//! SQLite-based item store implementation.

use super::{check_transition, ItemStore};
use crate::error::{RecapError, Result};
use crate::model::{
    merge_metadata, Item, ItemId, ItemStatus, Metadata, Summary, SummaryProvenance, Transcript,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    source_id TEXT NOT NULL,
    title TEXT NOT NULL,
    duration_seconds INTEGER,
    external_url TEXT NOT NULL,
    status TEXT NOT NULL,
    extra_metadata TEXT NOT NULL DEFAULT '{}',
    deleted_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_status ON items(status);

-- A soft-deleted item releases its URL
CREATE UNIQUE INDEX IF NOT EXISTS idx_items_live_url
    ON items(external_url) WHERE deleted_at IS NULL;

CREATE TABLE IF NOT EXISTS transcripts (
    id TEXT PRIMARY KEY,
    item_id TEXT NOT NULL UNIQUE REFERENCES items(id) ON DELETE CASCADE,
    text TEXT NOT NULL,
    language TEXT,
    duration_seconds REAL NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS summaries (
    id TEXT PRIMARY KEY,
    transcript_id TEXT NOT NULL UNIQUE REFERENCES transcripts(id) ON DELETE CASCADE,
    item_id TEXT NOT NULL,
    text TEXT NOT NULL,
    model TEXT NOT NULL,
    prompt_tokens INTEGER NOT NULL,
    completion_tokens INTEGER NOT NULL,
    distributed INTEGER NOT NULL DEFAULT 0,
    distributed_at TEXT,
    created_at TEXT NOT NULL
);
"#;

const ITEM_COLUMNS: &str = "id, source_id, title, duration_seconds, external_url, status, \
                            extra_metadata, deleted_at, created_at, updated_at";

/// SQLite-based item store.
pub struct SqliteItemStore {
    conn: Mutex<Connection>,
}

impl SqliteItemStore {
    /// Open (or create) a store at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL lets status queries read while a worker writes checkpoints
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let store = Self::init(conn)?;
        info!("Initialized SQLite item store at {:?}", path);
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RecapError::Store(format!("Failed to acquire lock: {}", e)))
    }
}

/// Raw item columns, converted outside the row closure so parse errors keep
/// their own error type.
struct ItemRow {
    id: String,
    source_id: String,
    title: String,
    duration_seconds: Option<u32>,
    external_url: String,
    status: String,
    extra_metadata: String,
    deleted_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ItemRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source_id: row.get(1)?,
            title: row.get(2)?,
            duration_seconds: row.get(3)?,
            external_url: row.get(4)?,
            status: row.get(5)?,
            extra_metadata: row.get(6)?,
            deleted_at: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_item(self) -> Result<Item> {
        Ok(Item {
            id: parse_item_id(&self.id)?,
            source_id: self.source_id,
            title: self.title,
            duration_seconds: self.duration_seconds,
            external_url: self.external_url,
            status: self.status.parse().map_err(RecapError::Store)?,
            extra_metadata: serde_json::from_str(&self.extra_metadata)?,
            deleted_at: self.deleted_at.as_deref().map(parse_time).transpose()?,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RecapError::Store(format!("Invalid timestamp '{}': {}", s, e)))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| RecapError::Store(format!("Invalid id '{}': {}", s, e)))
}

fn parse_item_id(s: &str) -> Result<ItemId> {
    parse_uuid(s).map(ItemId::from)
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    #[instrument(skip(self, item), fields(item_id = %item.id))]
    async fn insert_item(&self, item: &Item) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO items
            (id, source_id, title, duration_seconds, external_url, status,
             extra_metadata, deleted_at, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                item.id.to_string(),
                item.source_id,
                item.title,
                item.duration_seconds,
                item.external_url,
                item.status.as_str(),
                serde_json::to_string(&item.extra_metadata)?,
                item.deleted_at.map(|dt| dt.to_rfc3339()),
                item.created_at.to_rfc3339(),
                item.updated_at.to_rfc3339(),
            ],
        )?;

        debug!("Inserted item {}", item.id);
        Ok(())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM items WHERE id = ?1 AND deleted_at IS NULL",
                    ITEM_COLUMNS
                ),
                params![id.to_string()],
                ItemRow::from_row,
            )
            .optional()?;

        row.map(ItemRow::into_item).transpose()
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Item>> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM items WHERE external_url = ?1 AND deleted_at IS NULL",
                    ITEM_COLUMNS
                ),
                params![url],
                ItemRow::from_row,
            )
            .optional()?;

        row.map(ItemRow::into_item).transpose()
    }

    #[instrument(skip(self))]
    async fn list_items(
        &self,
        status: Option<ItemStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<Item>> {
        let conn = self.lock()?;

        // SQLite treats a negative LIMIT as "no limit"
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {}
            FROM items
            WHERE deleted_at IS NULL AND (?1 IS NULL OR status = ?1)
            ORDER BY created_at, id
            LIMIT ?2
            "#,
            ITEM_COLUMNS
        ))?;

        let rows = stmt.query_map(params![status.map(|s| s.as_str()), limit], ItemRow::from_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?.into_item()?);
        }

        debug!("Listed {} items", items.len());
        Ok(items)
    }

    #[instrument(skip(self, annotations))]
    async fn transition(
        &self,
        id: ItemId,
        from: ItemStatus,
        to: ItemStatus,
        annotations: Option<&Metadata>,
    ) -> Result<bool> {
        check_transition(from, to)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<(String, String)> = tx
            .query_row(
                "SELECT status, extra_metadata FROM items WHERE id = ?1 AND deleted_at IS NULL",
                params![id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((status, metadata_json)) = current else {
            return Ok(false);
        };

        if status != from.as_str() {
            debug!("Status of {} is {}, expected {}", id, status, from);
            return Ok(false);
        }

        let mut metadata: Metadata = serde_json::from_str(&metadata_json)?;
        if let Some(annotations) = annotations {
            merge_metadata(&mut metadata, annotations);
        }

        let updated = tx.execute(
            r#"
            UPDATE items
            SET status = ?1, extra_metadata = ?2, updated_at = ?3
            WHERE id = ?4 AND status = ?5 AND deleted_at IS NULL
            "#,
            params![
                to.as_str(),
                serde_json::to_string(&metadata)?,
                Utc::now().to_rfc3339(),
                id.to_string(),
                from.as_str(),
            ],
        )?;

        tx.commit()?;

        debug!("Item {} {} -> {}", id, from, to);
        Ok(updated == 1)
    }

    #[instrument(skip(self, transcript), fields(item_id = %transcript.item_id))]
    async fn insert_transcript(&self, transcript: &Transcript) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO transcripts (id, item_id, text, language, duration_seconds, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                transcript.id.to_string(),
                transcript.item_id.to_string(),
                transcript.text,
                transcript.language,
                transcript.duration_seconds,
                transcript.created_at.to_rfc3339(),
            ],
        )?;

        info!("Stored transcript for item {}", transcript.item_id);
        Ok(())
    }

    async fn transcript_for_item(&self, id: ItemId) -> Result<Option<Transcript>> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                r#"
                SELECT id, item_id, text, language, duration_seconds, created_at
                FROM transcripts WHERE item_id = ?1
                "#,
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, item_id, text, language, duration_seconds, created_at)| {
            Ok(Transcript {
                id: parse_uuid(&id)?,
                item_id: parse_item_id(&item_id)?,
                text,
                language,
                duration_seconds,
                created_at: parse_time(&created_at)?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self, summary), fields(item_id = %summary.item_id))]
    async fn insert_summary(&self, summary: &Summary) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO summaries
            (id, transcript_id, item_id, text, model, prompt_tokens, completion_tokens,
             distributed, distributed_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                summary.id.to_string(),
                summary.transcript_id.to_string(),
                summary.item_id.to_string(),
                summary.text,
                summary.provenance.model,
                summary.provenance.prompt_tokens,
                summary.provenance.completion_tokens,
                summary.distributed,
                summary.distributed_at.map(|dt| dt.to_rfc3339()),
                summary.created_at.to_rfc3339(),
            ],
        )?;

        info!("Stored summary for item {}", summary.item_id);
        Ok(())
    }

    async fn summary_for_transcript(&self, transcript_id: Uuid) -> Result<Option<Summary>> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                r#"
                SELECT id, transcript_id, item_id, text, model, prompt_tokens,
                       completion_tokens, distributed, distributed_at, created_at
                FROM summaries WHERE transcript_id = ?1
                "#,
                params![transcript_id.to_string()],
                |row| {
                    Ok((
                        (
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ),
                        SummaryProvenance {
                            model: row.get(4)?,
                            prompt_tokens: row.get(5)?,
                            completion_tokens: row.get(6)?,
                        },
                        row.get::<_, bool>(7)?,
                        row.get::<_, Option<String>>(8)?,
                        row.get::<_, String>(9)?,
                    ))
                },
            )
            .optional()?;

        row.map(
            |((id, transcript_id, item_id, text), provenance, distributed, distributed_at, created_at)| {
                Ok(Summary {
                    id: parse_uuid(&id)?,
                    transcript_id: parse_uuid(&transcript_id)?,
                    item_id: parse_item_id(&item_id)?,
                    text,
                    provenance,
                    distributed,
                    distributed_at: distributed_at.as_deref().map(parse_time).transpose()?,
                    created_at: parse_time(&created_at)?,
                })
            },
        )
        .transpose()
    }

    async fn mark_summary_distributed(
        &self,
        summary_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.lock()?;

        let updated = conn.execute(
            "UPDATE summaries SET distributed = 1, distributed_at = ?1 WHERE id = ?2 AND distributed = 0",
            params![at.to_rfc3339(), summary_id.to_string()],
        )?;

        Ok(updated == 1)
    }

    #[instrument(skip(self))]
    async fn soft_delete_item(&self, id: ItemId) -> Result<bool> {
        let conn = self.lock()?;

        let now = Utc::now().to_rfc3339();
        let updated = conn.execute(
            "UPDATE items SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
            params![now, id.to_string()],
        )?;

        Ok(updated == 1)
    }

    #[instrument(skip(self))]
    async fn purge_item(&self, id: ItemId) -> Result<bool> {
        let conn = self.lock()?;

        let deleted = conn.execute("DELETE FROM items WHERE id = ?1", params![id.to_string()])?;

        info!("Purged item {} ({} rows)", id, deleted);
        Ok(deleted == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(url: &str) -> Item {
        Item::new("channel", "Episode", url, Some(300))
    }

    #[tokio::test]
    async fn test_item_round_trip() {
        let store = SqliteItemStore::in_memory().unwrap();
        let item = item("https://example.com/a");
        store.insert_item(&item).await.unwrap();

        let loaded = store.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, item.id);
        assert_eq!(loaded.status, ItemStatus::Pending);
        assert_eq!(loaded.duration_seconds, Some(300));

        let by_url = store.find_by_url("https://example.com/a").await.unwrap();
        assert_eq!(by_url.map(|i| i.id), Some(item.id));
    }

    #[tokio::test]
    async fn test_duplicate_url_is_conflict() {
        let store = SqliteItemStore::in_memory().unwrap();
        store.insert_item(&item("https://example.com/a")).await.unwrap();

        let err = store.insert_item(&item("https://example.com/a")).await.unwrap_err();
        assert!(matches!(err, RecapError::Conflict(_)), "{err}");
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_swap() {
        let store = SqliteItemStore::in_memory().unwrap();
        let item = item("https://example.com/a");
        store.insert_item(&item).await.unwrap();

        let first = store
            .transition(item.id, ItemStatus::Pending, ItemStatus::Downloading, None)
            .await
            .unwrap();
        let second = store
            .transition(item.id, ItemStatus::Pending, ItemStatus::Downloading, None)
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        let loaded = store.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ItemStatus::Downloading);
    }

    #[tokio::test]
    async fn test_illegal_transition_rejected() {
        let store = SqliteItemStore::in_memory().unwrap();
        let item = item("https://example.com/a");
        store.insert_item(&item).await.unwrap();

        let result = store
            .transition(item.id, ItemStatus::Pending, ItemStatus::Completed, None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_transition_merges_annotations() {
        let store = SqliteItemStore::in_memory().unwrap();
        let item = item("https://example.com/a");
        store.insert_item(&item).await.unwrap();

        let mut annotations = Metadata::new();
        annotations.insert("skip_reason".into(), "duration_exceeded".into());
        store
            .transition(item.id, ItemStatus::Pending, ItemStatus::Skipped, Some(&annotations))
            .await
            .unwrap();

        let loaded = store.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ItemStatus::Skipped);
        assert_eq!(loaded.skip_reason(), Some("duration_exceeded"));
    }

    #[tokio::test]
    async fn test_transcript_and_summary_are_unique() {
        let store = SqliteItemStore::in_memory().unwrap();
        let item = item("https://example.com/a");
        store.insert_item(&item).await.unwrap();

        let transcript = Transcript::new(item.id, "hello world".into(), Some("en".into()), 12.5);
        store.insert_transcript(&transcript).await.unwrap();
        let again = Transcript::new(item.id, "other".into(), None, 1.0);
        assert!(matches!(
            store.insert_transcript(&again).await,
            Err(RecapError::Conflict(_))
        ));

        let summary = Summary::new(
            &transcript,
            "short".into(),
            SummaryProvenance {
                model: "gpt-4o-mini".into(),
                prompt_tokens: 10,
                completion_tokens: 3,
            },
        );
        store.insert_summary(&summary).await.unwrap();
        let duplicate = Summary::new(&transcript, "again".into(), SummaryProvenance::default());
        assert!(matches!(
            store.insert_summary(&duplicate).await,
            Err(RecapError::Conflict(_))
        ));

        let loaded = store.summary_for_transcript(transcript.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, summary.id);
        assert_eq!(loaded.provenance.total_tokens(), 13);
        assert!(!loaded.distributed);
    }

    #[tokio::test]
    async fn test_mark_distributed_once() {
        let store = SqliteItemStore::in_memory().unwrap();
        let item = item("https://example.com/a");
        store.insert_item(&item).await.unwrap();
        let transcript = Transcript::new(item.id, "text".into(), None, 1.0);
        store.insert_transcript(&transcript).await.unwrap();
        let summary = Summary::new(&transcript, "s".into(), SummaryProvenance::default());
        store.insert_summary(&summary).await.unwrap();

        assert!(store.mark_summary_distributed(summary.id, Utc::now()).await.unwrap());
        assert!(!store.mark_summary_distributed(summary.id, Utc::now()).await.unwrap());

        let loaded = store.summary_for_transcript(transcript.id).await.unwrap().unwrap();
        assert!(loaded.distributed);
        assert!(loaded.distributed_at.is_some());
    }

    #[tokio::test]
    async fn test_purge_cascades() {
        let store = SqliteItemStore::in_memory().unwrap();
        let item = item("https://example.com/a");
        store.insert_item(&item).await.unwrap();
        let transcript = Transcript::new(item.id, "text".into(), None, 1.0);
        store.insert_transcript(&transcript).await.unwrap();
        let summary = Summary::new(&transcript, "s".into(), SummaryProvenance::default());
        store.insert_summary(&summary).await.unwrap();

        assert!(store.purge_item(item.id).await.unwrap());

        assert!(store.get_item(item.id).await.unwrap().is_none());
        assert!(store.transcript_for_item(item.id).await.unwrap().is_none());
        assert!(store.summary_for_transcript(transcript.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_item() {
        let store = SqliteItemStore::in_memory().unwrap();
        let item = item("https://example.com/a");
        store.insert_item(&item).await.unwrap();

        assert!(store.soft_delete_item(item.id).await.unwrap());
        assert!(!store.soft_delete_item(item.id).await.unwrap());

        assert!(store.get_item(item.id).await.unwrap().is_none());
        assert!(store.list_items(None, None).await.unwrap().is_empty());
        let moved = store
            .transition(item.id, ItemStatus::Pending, ItemStatus::Downloading, None)
            .await
            .unwrap();
        assert!(!moved);
    }

    #[tokio::test]
    async fn test_soft_deleted_url_can_be_added_again() {
        let store = SqliteItemStore::in_memory().unwrap();
        let first = item("https://example.com/a");
        store.insert_item(&first).await.unwrap();
        assert!(matches!(
            store.insert_item(&item("https://example.com/a")).await,
            Err(RecapError::Conflict(_))
        ));

        store.soft_delete_item(first.id).await.unwrap();
        let second = item("https://example.com/a");
        store.insert_item(&second).await.unwrap();

        let found = store.find_by_url("https://example.com/a").await.unwrap().unwrap();
        assert_eq!(found.id, second.id);
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let store = SqliteItemStore::in_memory().unwrap();
        let a = item("https://example.com/a");
        let b = item("https://example.com/b");
        store.insert_item(&a).await.unwrap();
        store.insert_item(&b).await.unwrap();
        store
            .transition(b.id, ItemStatus::Pending, ItemStatus::Downloading, None)
            .await
            .unwrap();

        let pending = store.list_items(Some(ItemStatus::Pending), None).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a.id);

        let limited = store.list_items(None, Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
    }
}
