use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::config::{SearchSpec, WatchConfig};
use crate::dedup::merge_new_listings;
use crate::kleinanzeigen::{locations, LocationIndex, SearchPager, StopReason};
use crate::models::{Category, Listing, ListingRecord};
use crate::store::ResultStore;

/// Counters for one full run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub searches_run: usize,
    pub searches_failed: usize,
    pub pages_fetched: usize,
    pub listings_seen: usize,
    pub skipped_cards: usize,
    pub new_records: usize,
}

/// What one run produced: the counters plus the appended records,
/// in the order they were stored
#[derive(Debug)]
pub struct RunReport {
    pub summary: RunSummary,
    pub new_records: Vec<ListingRecord>,
}

/// Execute every active search once and append whatever is new.
///
/// The known-id set is snapshotted once up front and the store is written
/// once at the end; a failing search is logged and skipped, never fatal.
pub async fn run(config: &WatchConfig, store: &dyn ResultStore) -> Result<RunReport> {
    let run_started_at = Utc::now();
    let known = store.known_ad_ids().await?;
    info!("{} listing id(s) already on record", known.len());

    let index = LocationIndex::build(&config.locations);
    let pager = SearchPager::new(&config.settings)?;

    let mut summary = RunSummary::default();
    let mut hits: Vec<(String, Vec<Listing>)> = Vec::new();

    for spec in config.searches.iter().filter(|s| s.active) {
        let resolved = locations::resolve(
            &spec.location,
            spec.location_id,
            &index,
            config.settings.max_radius_km,
        );
        if resolved.is_nationwide() {
            info!(
                "'{}': no location id for '{}', searching nationwide",
                spec.query, spec.location
            );
        }

        let outcome = pager.run_search(spec, &resolved, &known).await;
        summary.searches_run += 1;
        summary.pages_fetched += outcome.pages_fetched;
        summary.listings_seen += outcome.listings.len();
        summary.skipped_cards += outcome.skipped_cards;

        match outcome.stop {
            StopReason::FetchFailed => {
                summary.searches_failed += 1;
                warn!("Fetch failed for '{}' @ {}", spec.query, spec.location);
            }
            StopReason::Blocked => {
                summary.searches_failed += 1;
                warn!(
                    "'{}' @ {} hit a consent or anti-bot wall",
                    spec.query, spec.location
                );
            }
            _ => {}
        }

        info!(
            "'{}' @ {}: {} listing(s) over {} page(s) ({:?})",
            spec.query,
            spec.location,
            outcome.listings.len(),
            outcome.pages_fetched,
            outcome.stop
        );

        hits.push((spec.query.clone(), apply_km_bounds(outcome.listings, spec)));
    }

    let new_records = merge_new_listings(&hits, &known, run_started_at);
    summary.new_records = new_records.len();

    if !new_records.is_empty() {
        store.append(&new_records).await?;
    }

    Ok(RunReport {
        summary,
        new_records,
    })
}

/// The URL-level mileage filter is advisory; enforce the bounds again on
/// what actually came back. A vehicle without readable mileage fails any
/// bound that is set. Inverted bounds are dropped at URL build time and
/// are ignored here as well.
fn apply_km_bounds(listings: Vec<Listing>, spec: &SearchSpec) -> Vec<Listing> {
    if spec.category != Category::Vehicle {
        return listings;
    }
    let (min, max) = (spec.km_min, spec.km_max);
    if min.is_none() && max.is_none() {
        return listings;
    }
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return listings;
        }
    }
    listings
        .into_iter()
        .filter(|listing| km_within(listing.km, min, max))
        .collect()
}

fn km_within(km: Option<u32>, min: Option<u32>, max: Option<u32>) -> bool {
    match km {
        Some(km) => min.map_or(true, |lo| km >= lo) && max.map_or(true, |hi| km <= hi),
        None => false,
    }
}
