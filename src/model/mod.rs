//! Domain model shared by every crawler
//!
//! # Components
//!
//! - `Site`: which remote service an item came from, plus the naming rules derived from it
//! - `Visibility`: public/private partition used by bookmark-style feeds
//! - `ItemSummary`, `Item`, `MediaRef`: what flows from a feed into storage

mod item;
mod site;

// Re-export main types
pub use item::{url_basename, Item, ItemSummary, MediaKind, MediaRef};
pub use site::{Site, SnapshotLayout, Visibility};
