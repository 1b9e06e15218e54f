use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::models::{Listing, ListingRecord};

/// Merge one run's raw per-search hits into the records worth keeping.
///
/// Already-known ids are dropped, the first occurrence wins when several
/// searches surface the same ad, and every kept record carries the query
/// that found it plus the shared run timestamp. Input order is preserved.
pub fn merge_new_listings(
    hits: &[(String, Vec<Listing>)],
    known: &HashSet<String>,
    fetched_at: DateTime<Utc>,
) -> Vec<ListingRecord> {
    let mut seen_this_run: HashSet<String> = HashSet::new();
    let mut records = Vec::new();

    for (query, listings) in hits {
        for listing in listings {
            if known.contains(&listing.ad_id) {
                continue;
            }
            if !seen_this_run.insert(listing.ad_id.clone()) {
                continue;
            }
            records.push(ListingRecord::from_listing(
                listing.clone(),
                query,
                fetched_at,
            ));
        }
    }

    records
}
