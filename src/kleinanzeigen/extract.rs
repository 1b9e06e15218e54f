use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::BASE_HOST;
use crate::models::{Category, Listing};

/// Everything one result page yielded
#[derive(Debug, Default)]
pub struct ExtractedPage {
    /// Successfully extracted listings, in page order
    pub listings: Vec<Listing>,
    /// Cards present in the markup without an extractable ad id
    pub skipped_cards: usize,
}

impl ExtractedPage {
    /// No cards at all: the page is past the end of the results
    pub fn is_end_of_results(&self) -> bool {
        self.listings.is_empty() && self.skipped_cards == 0
    }
}

/// Parses listing cards out of raw result-page HTML.
///
/// The selector lists carry fallbacks for the markup variants the site has
/// shipped over time; extraction is best-effort per field, so one mangled
/// card degrades to skips and Nones instead of failing the page.
pub struct ListingExtractor {
    cards: Selector,
    title_link: Selector,
    price: Selector,
    meta: Selector,
    price_re: Regex,
    km_re: Regex,
    ad_id_re: Regex,
}

impl ListingExtractor {
    pub fn new() -> Self {
        Self {
            cards: Selector::parse("article.aditem, li.ad-listitem, div.aditem").unwrap(),
            title_link: Selector::parse(
                ".aditem-main--middle--title a, a.ellipsis, a.ellipsis-text",
            )
            .unwrap(),
            price: Selector::parse(
                ".aditem-main--middle--price-shipping .aditem-main--middle--price, \
                 .aditem-main--middle--price, .aditem-price",
            )
            .unwrap(),
            meta: Selector::parse(".aditem-main--top .aditem-main--top--left, .aditem-main--top")
                .unwrap(),
            price_re: Regex::new(r"(\d{1,3}(?:[.\s]\d{3})*|\d+)(?:[,.]\d{1,2})?").unwrap(),
            km_re: Regex::new(r"(?i)(\d{1,3}(?:[.\s]\d{3})+|\d{1,6})\s*km").unwrap(),
            ad_id_re: Regex::new(r"/(\d{6,})-").unwrap(),
        }
    }

    /// Extract all listing cards from one page of raw HTML.
    pub fn extract(&self, body: &str, category: Category) -> ExtractedPage {
        let document = Html::parse_document(body);
        let today = Utc::now().date_naive();

        let mut page = ExtractedPage::default();
        let mut seen: HashSet<String> = HashSet::new();
        for card in document.select(&self.cards) {
            match self.extract_card(card, category, today) {
                Some(listing) => {
                    // A nested card wrapper matches the selector list twice
                    // for the same ad; keep the first occurrence.
                    if seen.insert(listing.ad_id.clone()) {
                        page.listings.push(listing);
                    }
                }
                None => page.skipped_cards += 1,
            }
        }
        page
    }

    /// One card. None means the card had no usable ad id and is skipped;
    /// it cannot be deduplicated or referenced without one.
    fn extract_card(
        &self,
        card: ElementRef,
        category: Category,
        today: NaiveDate,
    ) -> Option<Listing> {
        let link = card.select(&self.title_link).next()?;
        let href = link.value().attr("href")?;
        let url = absolute_url(href);

        let ad_id = card
            .value()
            .attr("data-adid")
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| self.ad_id_from_url(&url))?;

        let title = link.text().collect::<String>().trim().to_string();

        let price_eur = card
            .select(&self.price)
            .next()
            .and_then(|el| self.parse_price_eur(&joined_text(el)));

        let km = match category {
            Category::Vehicle => self.extract_km(&joined_text(card)),
            Category::Generic => None,
        };

        let meta_text = card
            .select(&self.meta)
            .next()
            .map(joined_text)
            .unwrap_or_default();
        let (posted_raw, location) = split_meta(&meta_text);
        let posted_at = posted_raw
            .as_deref()
            .and_then(|raw| parse_posted_at(raw, today));

        Some(Listing {
            ad_id,
            title,
            price_eur,
            km,
            location,
            url,
            posted_at,
        })
    }

    /// Price text to whole euros. Thousands separators and decimal tails
    /// are tolerated, "VB" and the like simply surround the number, and a
    /// give-away ("zu verschenken") counts as zero. No number means None.
    fn parse_price_eur(&self, text: &str) -> Option<i64> {
        let cleaned = text.replace('\u{a0}', " ");
        if cleaned.to_lowercase().contains("verschenken") {
            return Some(0);
        }
        let captures = self.price_re.captures(&cleaned)?;
        captures[1].replace(['.', ' '], "").parse().ok()
    }

    /// Mileage from the card's free text, e.g. "123.456 km".
    fn extract_km(&self, text: &str) -> Option<u32> {
        let cleaned = text.replace('\u{a0}', " ");
        let captures = self.km_re.captures(&cleaned)?;
        captures[1].replace(['.', ' '], "").parse().ok()
    }

    /// The numeric ad id embedded in a detail URL, e.g.
    /// `/s-anzeige/iphone-13/2371234567-173-3331`.
    fn ad_id_from_url(&self, url: &str) -> Option<String> {
        self.ad_id_re
            .captures(url)
            .map(|captures| captures[1].to_string())
    }
}

impl Default for ListingExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Element text with inner fragments trimmed and space-joined
fn joined_text(el: ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// The meta line reads "posted-at • location", or just the location
fn split_meta(meta: &str) -> (Option<String>, String) {
    let parts: Vec<&str> = meta
        .split('•')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    match parts.as_slice() {
        [] => (None, String::new()),
        [location] => (None, (*location).to_string()),
        [posted, location, ..] => (Some((*posted).to_string()), (*location).to_string()),
    }
}

/// "Heute, 10:30", "Gestern, 14:22" or "11.08.2026"; anything else is None
fn parse_posted_at(raw: &str, today: NaiveDate) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix("Heute") {
        return Some(day_and_time(today, rest));
    }
    if let Some(rest) = raw.strip_prefix("Gestern") {
        return Some(day_and_time(today.pred_opt()?, rest));
    }
    NaiveDate::parse_from_str(raw, "%d.%m.%Y")
        .ok()
        .map(|date| day_and_time(date, ""))
}

fn day_and_time(date: NaiveDate, rest: &str) -> DateTime<Utc> {
    let time = NaiveTime::parse_from_str(rest.trim_start_matches(',').trim(), "%H:%M")
        .unwrap_or(NaiveTime::MIN);
    date.and_time(time).and_utc()
}

fn absolute_url(href: &str) -> String {
    match Url::parse(href) {
        Ok(url) => url.into(),
        Err(_) => Url::parse(BASE_HOST)
            .and_then(|base| base.join(href))
            .map(Into::into)
            .unwrap_or_else(|_| format!("{}{}", BASE_HOST, href)),
    }
}
