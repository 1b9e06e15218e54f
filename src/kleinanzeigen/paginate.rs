use std::collections::HashSet;

use anyhow::Result;
use tracing::{debug, warn};

use super::extract::{ExtractedPage, ListingExtractor};
use super::fetch::{looks_like_consent, FetcherConfig, PageFetcher};
use super::locations::ResolvedLocation;
use super::query::build_search_url;
use crate::config::{SearchSpec, Settings};
use crate::models::Listing;

/// Why a search stopped walking result pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A page past the last result came back without cards
    EndOfResults,
    /// The configured page cap was reached
    MaxPages,
    /// A page kept failing after all retries
    FetchFailed,
    /// A follow-up page held only already-known listings
    AllKnown,
    /// A consent or anti-bot interstitial instead of results
    Blocked,
}

/// Everything one search produced, however it ended
#[derive(Debug)]
pub struct SearchOutcome {
    /// Listings in page-then-card order, raw; known ids are filtered later
    pub listings: Vec<Listing>,
    pub pages_fetched: usize,
    pub skipped_cards: usize,
    pub stop: StopReason,
}

/// Walks the result pages of one search: build URL, fetch, extract,
/// decide whether to keep going. Failures end the search, not the run.
pub struct SearchPager {
    fetcher: PageFetcher,
    extractor: ListingExtractor,
    max_pages: u32,
    stop_on_known: bool,
}

impl SearchPager {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            fetcher: PageFetcher::new(FetcherConfig::from_settings(settings))?,
            extractor: ListingExtractor::new(),
            max_pages: settings.max_pages_per_search,
            stop_on_known: settings.stop_on_known,
        })
    }

    /// Fetch result pages for one search until a stop condition hits.
    pub async fn run_search(
        &self,
        spec: &SearchSpec,
        resolved: &ResolvedLocation,
        known: &HashSet<String>,
    ) -> SearchOutcome {
        let mut listings = Vec::new();
        let mut pages_fetched = 0;
        let mut skipped_cards = 0;

        for page in 1..=self.max_pages {
            let url = build_search_url(spec, resolved, page);
            let body = match self.fetcher.fetch_page(&url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Giving up on page {} of '{}': {}", page, spec.query, e);
                    return SearchOutcome {
                        listings,
                        pages_fetched,
                        skipped_cards,
                        stop: StopReason::FetchFailed,
                    };
                }
            };
            pages_fetched += 1;

            let extracted = self.extractor.extract(&body, spec.category);
            debug!(
                "Page {} of '{}': {} listings, {} cards skipped",
                page,
                spec.query,
                extracted.listings.len(),
                extracted.skipped_cards
            );

            let stop = assess_page(
                &body,
                &extracted,
                page,
                self.max_pages,
                self.stop_on_known,
                known,
            );
            skipped_cards += extracted.skipped_cards;
            listings.extend(extracted.listings);

            if let Some(stop) = stop {
                return SearchOutcome {
                    listings,
                    pages_fetched,
                    skipped_cards,
                    stop,
                };
            }
        }

        // Only reachable with a zero page cap
        SearchOutcome {
            listings,
            pages_fetched,
            skipped_cards,
            stop: StopReason::MaxPages,
        }
    }
}

/// Decide whether pagination stops after this page, and why.
///
/// A cardless page normally means the results ran out, unless the body is
/// a consent wall. The all-known cutoff is opt-in and never applies to the
/// first page, where promoted ads mix old listings between new ones.
fn assess_page(
    body: &str,
    extracted: &ExtractedPage,
    page: u32,
    max_pages: u32,
    stop_on_known: bool,
    known: &HashSet<String>,
) -> Option<StopReason> {
    if extracted.is_end_of_results() {
        if looks_like_consent(body) {
            return Some(StopReason::Blocked);
        }
        return Some(StopReason::EndOfResults);
    }

    if stop_on_known
        && page >= 2
        && !extracted.listings.is_empty()
        && extracted
            .listings
            .iter()
            .all(|listing| known.contains(&listing.ad_id))
    {
        return Some(StopReason::AllKnown);
    }

    if page >= max_pages {
        return Some(StopReason::MaxPages);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn listing(ad_id: &str) -> Listing {
        Listing {
            ad_id: ad_id.to_string(),
            title: "Thing".to_string(),
            price_eur: Some(10),
            km: None,
            location: "Berlin".to_string(),
            url: format!("https://www.kleinanzeigen.de/s-anzeige/thing/{ad_id}-1-1"),
            posted_at: None,
        }
    }

    fn page_with(listings: Vec<Listing>, skipped_cards: usize) -> ExtractedPage {
        ExtractedPage {
            listings,
            skipped_cards,
        }
    }

    #[test]
    fn empty_page_ends_the_results() {
        let stop = assess_page(
            "<html>Keine Ergebnisse</html>",
            &page_with(vec![], 0),
            2,
            5,
            false,
            &HashSet::new(),
        );
        assert_eq!(stop, Some(StopReason::EndOfResults));
    }

    #[test]
    fn cardless_consent_wall_is_blocked_not_end() {
        let stop = assess_page(
            "Ihre Einwilligung zu Cookies",
            &page_with(vec![], 0),
            1,
            5,
            false,
            &HashSet::new(),
        );
        assert_eq!(stop, Some(StopReason::Blocked));
    }

    #[test]
    fn page_of_only_skipped_cards_keeps_going() {
        let stop = assess_page("x", &page_with(vec![], 3), 1, 5, false, &HashSet::new());
        assert_eq!(stop, None);
    }

    #[test]
    fn page_cap_stops_pagination() {
        let stop = assess_page(
            "x",
            &page_with(vec![listing("100000001")], 0),
            5,
            5,
            false,
            &HashSet::new(),
        );
        assert_eq!(stop, Some(StopReason::MaxPages));
    }

    #[test]
    fn all_known_cutoff_skips_the_first_page() {
        let known: HashSet<String> = ["100000001".to_string()].into_iter().collect();
        let extracted = page_with(vec![listing("100000001")], 0);

        assert_eq!(assess_page("x", &extracted, 1, 5, true, &known), None);
        assert_eq!(
            assess_page("x", &extracted, 2, 5, true, &known),
            Some(StopReason::AllKnown)
        );
    }

    #[test]
    fn all_known_cutoff_is_opt_in() {
        let known: HashSet<String> = ["100000001".to_string()].into_iter().collect();
        let extracted = page_with(vec![listing("100000001")], 0);
        assert_eq!(assess_page("x", &extracted, 2, 5, false, &known), None);
    }

    #[test]
    fn one_unknown_listing_defeats_the_cutoff() {
        let known: HashSet<String> = ["100000001".to_string()].into_iter().collect();
        let extracted = page_with(vec![listing("100000001"), listing("100000002")], 0);
        assert_eq!(assess_page("x", &extracted, 2, 5, true, &known), None);
    }

    #[test]
    fn fresh_page_below_the_cap_continues() {
        let stop = assess_page(
            "x",
            &page_with(vec![listing("100000009")], 1),
            2,
            5,
            false,
            &HashSet::new(),
        );
        assert_eq!(stop, None);
    }

    #[tokio::test]
    async fn zero_page_cap_fetches_nothing() {
        let settings = Settings {
            max_pages_per_search: 0,
            ..Settings::default()
        };
        let pager = SearchPager::new(&settings).unwrap();
        let spec = SearchSpec {
            active: true,
            query: "iPhone 13".to_string(),
            location: "Berlin".to_string(),
            price_min: None,
            price_max: None,
            category: Category::Generic,
            km_min: None,
            km_max: None,
            location_id: None,
        };
        let resolved = ResolvedLocation {
            slug: "berlin".to_string(),
            location_token: Some("3331".to_string()),
            radius_km: Some(25),
        };

        let outcome = pager.run_search(&spec, &resolved, &HashSet::new()).await;
        assert_eq!(outcome.pages_fetched, 0);
        assert!(outcome.listings.is_empty());
        assert_eq!(outcome.stop, StopReason::MaxPages);
    }
}
