//! Knowledge cache module.
//!
//! Holds the last successfully fetched snapshot of every spreadsheet tab
//! and keeps it fresh on a timer.

mod cache;
mod refresher;
mod tab;

pub use cache::{KnowledgeCache, RefreshReport, TabFailed, TabRefreshed, TabStatus};
pub use refresher::{CacheRefresher, RefresherMessage};
pub use tab::{Record, Tab, TabSnapshot, UnknownTab};

#[cfg(test)]
pub(crate) use cache::tests::FakeSource;
