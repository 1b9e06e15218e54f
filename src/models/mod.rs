use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marketplace category of a saved search
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Generic,
    Vehicle,
}

/// One listing as extracted from a result page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    /// Stable marketplace ad id, the natural key for dedup
    pub ad_id: String,
    pub title: String,
    /// Price in whole euros; None when the card shows no parseable number
    pub price_eur: Option<i64>,
    /// Mileage, extracted for vehicle searches only
    pub km: Option<u32>,
    /// Location text as shown on the card
    pub location: String,
    /// Absolute detail-page URL
    pub url: String,
    /// Posting time when the card's indicator was resolvable
    pub posted_at: Option<DateTime<Utc>>,
}

/// A stored result row: one listing annotated with the search that found it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    pub ad_id: String,
    pub query: String,
    pub title: String,
    pub price_eur: Option<i64>,
    pub km: Option<u32>,
    pub location: String,
    pub url: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

impl ListingRecord {
    pub fn from_listing(listing: Listing, query: &str, fetched_at: DateTime<Utc>) -> Self {
        Self {
            ad_id: listing.ad_id,
            query: query.to_string(),
            title: listing.title,
            price_eur: listing.price_eur,
            km: listing.km,
            location: listing.location,
            url: listing.url,
            posted_at: listing.posted_at,
            fetched_at,
        }
    }
}
