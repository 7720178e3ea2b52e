//! The item aggregate.

use super::ItemStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Open key-value map for skip and diagnostic annotations.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Opaque item identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ItemId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for ItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// A discovered piece of content flowing through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Unique item ID.
    pub id: ItemId,
    /// Channel or feed the item was discovered on.
    pub source_id: String,
    /// Title.
    pub title: String,
    /// Duration in seconds (if known).
    pub duration_seconds: Option<u32>,
    /// URL of the media.
    pub external_url: String,
    /// Current processing status.
    pub status: ItemStatus,
    /// Skip and diagnostic annotations.
    pub extra_metadata: Metadata,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Create a new pending item.
    pub fn new(
        source_id: impl Into<String>,
        title: impl Into<String>,
        external_url: impl Into<String>,
        duration_seconds: Option<u32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ItemId::new(),
            source_id: source_id.into(),
            title: title.into(),
            duration_seconds,
            external_url: external_url.into(),
            status: ItemStatus::Pending,
            extra_metadata: Metadata::new(),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The recorded skip reason, if the item was skipped.
    pub fn skip_reason(&self) -> Option<&str> {
        self.extra_metadata
            .get("skip_reason")
            .and_then(|v| v.as_str())
    }

    /// The last recorded failure summary, if any.
    pub fn last_error(&self) -> Option<&serde_json::Value> {
        self.extra_metadata.get("last_error")
    }
}

/// Merge annotations into a metadata map. A `null` value removes the key.
pub fn merge_metadata(target: &mut Metadata, annotations: &Metadata) {
    for (key, value) in annotations {
        if value.is_null() {
            target.remove(key);
        } else {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_item_is_pending() {
        let item = Item::new("channel-1", "Episode 1", "https://example.com/v/1", Some(600));

        assert_eq!(item.status, ItemStatus::Pending);
        assert!(item.extra_metadata.is_empty());
        assert!(item.deleted_at.is_none());
        assert_eq!(item.skip_reason(), None);
    }

    #[test]
    fn test_merge_metadata_null_removes() {
        let mut target = Metadata::new();
        target.insert("skip_reason".into(), json!("duration_exceeded"));
        target.insert("last_error".into(), json!({"stage": "fetch"}));

        let mut patch = Metadata::new();
        patch.insert("last_error".into(), serde_json::Value::Null);
        patch.insert("note".into(), json!(1));
        merge_metadata(&mut target, &patch);

        assert!(target.get("last_error").is_none());
        assert_eq!(target["skip_reason"], "duration_exceeded");
        assert_eq!(target["note"], 1);
    }

    #[test]
    fn test_item_id_parse() {
        let id = ItemId::new();
        let parsed: ItemId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<ItemId>().is_err());
    }
}
