use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::Category;

/// One saved search, as configured
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSpec {
    pub active: bool,
    pub query: String,
    pub location: String,
    #[serde(default)]
    pub price_min: Option<i64>,
    #[serde(default)]
    pub price_max: Option<i64>,
    #[serde(default)]
    pub category: Category,
    /// Mileage bounds, honored for vehicle searches only
    #[serde(default)]
    pub km_min: Option<u32>,
    #[serde(default)]
    pub km_max: Option<u32>,
    /// Marketplace location id override; takes precedence over the location table
    #[serde(default)]
    pub location_id: Option<u32>,
}

/// One row of the city → marketplace location id table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationEntry {
    pub city: String,
    /// Rows without an id are skipped; such cities fall back to slug-only search
    #[serde(default)]
    pub location_id: Option<u32>,
}

/// Scalar settings; every field has a default so the section can be omitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_max_radius_km")]
    pub max_radius_km: u32,
    /// Informational only; the actual schedule lives in the external invoker
    #[serde(default = "default_fetch_frequency")]
    pub fetch_frequency: String,
    #[serde(default = "default_max_pages")]
    pub max_pages_per_search: u32,
    /// Minimum pause between requests, across all searches
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Stop paginating a search once a whole page is already known
    #[serde(default)]
    pub stop_on_known: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_max_radius_km() -> u32 {
    25
}

fn default_fetch_frequency() -> String {
    "daily".to_string()
}

fn default_max_pages() -> u32 {
    5
}

fn default_request_delay_ms() -> u64 {
    1200
}

fn default_timeout_secs() -> u64 {
    25
}

fn default_max_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_radius_km: default_max_radius_km(),
            fetch_frequency: default_fetch_frequency(),
            max_pages_per_search: default_max_pages(),
            request_delay_ms: default_request_delay_ms(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            stop_on_known: false,
            user_agent: default_user_agent(),
        }
    }
}

/// The whole watch configuration: searches, location table, settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub settings: Settings,
    pub searches: Vec<SearchSpec>,
    #[serde(default)]
    pub locations: Vec<LocationEntry>,
}

impl WatchConfig {
    /// Load and parse the configuration file. Any failure here is fatal
    /// for the run; nothing has been fetched yet.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let raw = r#"{
            "settings": {"max_radius_km": 50, "stop_on_known": true},
            "searches": [
                {
                    "active": true,
                    "query": "iPhone 13",
                    "location": "Berlin",
                    "price_min": 200,
                    "price_max": 800
                },
                {
                    "active": false,
                    "query": "Golf 7",
                    "location": "Hamburg",
                    "category": "vehicle",
                    "km_max": 150000,
                    "location_id": 9409
                }
            ],
            "locations": [
                {"city": "Berlin", "location_id": 3331},
                {"city": "Neustadt"}
            ]
        }"#;

        let config: WatchConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.settings.max_radius_km, 50);
        assert!(config.settings.stop_on_known);
        assert_eq!(config.settings.max_pages_per_search, 5);
        assert_eq!(config.searches.len(), 2);
        assert_eq!(config.searches[0].category, Category::Generic);
        assert_eq!(config.searches[1].category, Category::Vehicle);
        assert_eq!(config.searches[1].km_max, Some(150000));
        assert_eq!(config.searches[1].location_id, Some(9409));
        assert_eq!(config.locations[0].location_id, Some(3331));
        assert_eq!(config.locations[1].location_id, None);
    }

    #[test]
    fn settings_section_is_optional() {
        let raw = r#"{"searches": []}"#;
        let config: WatchConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.settings.max_radius_km, 25);
        assert_eq!(config.settings.fetch_frequency, "daily");
        assert_eq!(config.settings.request_delay_ms, 1200);
        assert_eq!(config.settings.max_retries, 3);
        assert!(!config.settings.stop_on_known);
        assert!(config.locations.is_empty());
    }
}
