//! Recap - durable media summarization pipeline
//!
//! Takes discovered media items through fetch, transcription and
//! summarization, then hands the summary to a distribution trigger.
//!
//! # Overview
//!
//! Every item carries a persisted status. Each stage boundary is a
//! compare-and-swap on that status, so:
//! - two workers never process the same item at once
//! - a crash or failure leaves a checkpoint to resume from
//! - transcripts and summaries are created at most once per item
//!
//! # Architecture
//!
//! - `model` - Items, statuses and the legal transition table
//! - `store` - Durable item store (SQLite, in-memory)
//! - `admission` - Gate deciding whether an item may be processed
//! - `fetch` - Media download via yt-dlp
//! - `transcription` - Speech-to-text via Whisper
//! - `summarization` - Summary generation via chat completions
//! - `distribution` - Notifying downstream consumers of new summaries
//! - `pipeline` - The orchestrator and failure classification
//! - `task` - At-least-once task execution with bounded retries
//!
//! # Example
//!
//! ```rust,no_run
//! use recap::config::Settings;
//! use recap::model::Item;
//! use recap::pipeline::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::from_settings(&settings)?;
//!
//!     let item = Item::new("channel", "Episode 1", "https://youtu.be/dQw4w9WgXcQ", Some(212));
//!     orchestrator.store().insert_item(&item).await?;
//!
//!     let outcome = orchestrator.process(item.id).await?;
//!     println!("{:?}", outcome);
//!     orchestrator.drain_distributions().await;
//!
//!     Ok(())
//! }
//! ```

pub mod admission;
pub mod cli;
pub mod config;
pub mod distribution;
pub mod error;
pub mod fetch;
pub mod media;
pub mod model;
pub mod openai;
pub mod pipeline;
pub mod store;
pub mod summarization;
pub mod task;
pub mod transcription;

pub use error::{RecapError, Result};
