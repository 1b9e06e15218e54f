use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::ResultStore;
use crate::models::ListingRecord;

/// Keeps the whole result history as one pretty-printed JSON array.
///
/// Appending rewrites the file through a sibling temp file and a rename,
/// so a crash mid-write cannot corrupt rows from earlier runs.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// All stored rows, oldest first. A missing file is an empty history;
    /// an unreadable or unparseable one is an error, not a silent reset.
    pub async fn load_all(&self) -> Result<Vec<ListingRecord>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read results file {}", self.path.display())
                })
            }
        };
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse results file {}", self.path.display()))
    }
}

#[async_trait]
impl ResultStore for JsonFileStore {
    async fn known_ad_ids(&self) -> Result<HashSet<String>> {
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .map(|record| record.ad_id)
            .collect())
    }

    async fn append(&self, records: &[ListingRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut all = self.load_all().await?;
        all.extend_from_slice(records);

        let json = serde_json::to_string_pretty(&all).context("Failed to serialize results")?;
        let tmp = temp_path(&self.path);
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "results.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
