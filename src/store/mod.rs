pub mod json_file;

pub use json_file::JsonFileStore;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::ListingRecord;

/// Where result rows live between runs
/// Keeping this a trait allows other backends (SQLite, an RSS feed) later
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Every ad id stored so far; the dedup baseline for a run
    async fn known_ad_ids(&self) -> Result<HashSet<String>>;

    /// Append new records; rows already stored are never rewritten
    async fn append(&self, records: &[ListingRecord]) -> Result<()>;
}
