//! Raw content fetching.
//!
//! A [`Fetcher`] turns an item's external URL into a local audio artifact
//! inside a workspace directory owned by the current pipeline invocation.

mod probe;
mod ytdlp;

pub use probe::{probe_metadata, ProbedMedia};
pub use ytdlp::YtDlpFetcher;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A fetched artifact on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl ArtifactHandle {
    /// Builds a handle from a file already on disk.
    pub fn from_path(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let size_bytes = std::fs::metadata(&path)?.len();
        Ok(Self { path, size_bytes })
    }
}

/// Failure modes of a fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The reference is malformed or not something we can fetch.
    #[error("invalid media reference: {0}")]
    InvalidReference(String),

    /// The resource exists in principle but cannot be retrieved (removed,
    /// private, geo-blocked).
    #[error("media unavailable: {0}")]
    Unavailable(String),

    #[error("network error: {0}")]
    Network(String),

    /// The download tool misbehaved in a way we do not recognise.
    #[error("extraction failed: {0}")]
    Extraction(String),
}

/// Trait for raw content fetchers.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `source_url` into `workspace`, creating it if needed.
    async fn fetch(&self, source_url: &str, workspace: &Path)
        -> Result<ArtifactHandle, FetchError>;
}
