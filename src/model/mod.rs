//! Domain model: items, their status machine, and derived artifacts.

mod artifacts;
mod item;
mod status;

pub use artifacts::{Summary, SummaryProvenance, Transcript};
pub use item::{merge_metadata, Item, ItemId, Metadata};
pub use status::ItemStatus;
