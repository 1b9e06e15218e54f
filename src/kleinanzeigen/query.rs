use tracing::warn;
use url::form_urlencoded;

use super::locations::ResolvedLocation;
use super::BASE_HOST;
use crate::config::SearchSpec;
use crate::models::Category;

/// Render the search-result URL for one page of one search.
///
/// Every marketplace-specific path and qualifier lives in this module, so
/// a URL-scheme change on the site touches only this file and the
/// extractor. Pure: identical inputs always yield the identical URL.
///
/// Shape: `/s-{slug}[/seite:{page}]/{query}/k0[l{token}][r{radius}]
/// [p{min}p{max}][+autos.km_i:{min}%2C{max}]`
pub fn build_search_url(spec: &SearchSpec, resolved: &ResolvedLocation, page: u32) -> String {
    let query: String = form_urlencoded::byte_serialize(spec.query.trim().as_bytes()).collect();

    let mut url = format!("{}/s-{}", BASE_HOST, resolved.slug);
    if page > 1 {
        url.push_str(&format!("/seite:{}", page));
    }
    url.push_str(&format!("/{}/k0", query));
    if let Some(token) = &resolved.location_token {
        url.push_str(&format!("l{}", token));
    }
    if let Some(radius) = resolved.radius_km {
        url.push_str(&format!("r{}", radius));
    }
    if let Some(segment) = price_segment(spec) {
        url.push_str(&segment);
    }
    if let Some(segment) = km_segment(spec) {
        url.push_str(&segment);
    }
    url
}

/// `p{min}p{max}` with an empty side when unbounded. An inverted pair is
/// inconsistent; both bounds are dropped so the search still runs.
fn price_segment(spec: &SearchSpec) -> Option<String> {
    if spec.price_min.is_none() && spec.price_max.is_none() {
        return None;
    }
    if let (Some(lo), Some(hi)) = (spec.price_min, spec.price_max) {
        if lo > hi {
            warn!(
                "Ignoring inverted price bounds {}..{} for '{}'",
                lo, hi, spec.query
            );
            return None;
        }
    }
    let lo = spec.price_min.map(|v| v.to_string()).unwrap_or_default();
    let hi = spec.price_max.map(|v| v.to_string()).unwrap_or_default();
    Some(format!("p{}p{}", lo, hi))
}

/// The mileage attribute filter, vehicle searches only. Bounds supplied
/// on another category are a configuration slip, not an error.
fn km_segment(spec: &SearchSpec) -> Option<String> {
    if spec.km_min.is_none() && spec.km_max.is_none() {
        return None;
    }
    if spec.category != Category::Vehicle {
        warn!(
            "Ignoring km bounds on non-vehicle search '{}'",
            spec.query
        );
        return None;
    }
    if let (Some(lo), Some(hi)) = (spec.km_min, spec.km_max) {
        if lo > hi {
            warn!(
                "Ignoring inverted km bounds {}..{} for '{}'",
                lo, hi, spec.query
            );
            return None;
        }
    }
    let lo = spec.km_min.map(|v| v.to_string()).unwrap_or_default();
    let hi = spec.km_max.map(|v| v.to_string()).unwrap_or_default();
    Some(format!("+autos.km_i:{}%2C{}", lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(query: &str) -> SearchSpec {
        SearchSpec {
            active: true,
            query: query.to_string(),
            location: "Berlin".to_string(),
            price_min: None,
            price_max: None,
            category: Category::Generic,
            km_min: None,
            km_max: None,
            location_id: None,
        }
    }

    fn berlin() -> ResolvedLocation {
        ResolvedLocation {
            slug: "berlin".to_string(),
            location_token: Some("3331".to_string()),
            radius_km: Some(25),
        }
    }

    fn nationwide(slug: &str) -> ResolvedLocation {
        ResolvedLocation {
            slug: slug.to_string(),
            location_token: None,
            radius_km: None,
        }
    }

    #[test]
    fn berlin_search_with_price_bounds() {
        let mut spec = spec("iPhone 13");
        spec.price_min = Some(200);
        spec.price_max = Some(800);

        let url = build_search_url(&spec, &berlin(), 1);
        assert_eq!(
            url,
            "https://www.kleinanzeigen.de/s-berlin/iPhone+13/k0l3331r25p200p800"
        );
    }

    #[test]
    fn unknown_town_is_slug_only() {
        let mut spec = spec("iPhone 13");
        spec.price_min = Some(200);
        spec.price_max = Some(800);

        let url = build_search_url(&spec, &nationwide("unknowntown"), 1);
        assert_eq!(
            url,
            "https://www.kleinanzeigen.de/s-unknowntown/iPhone+13/k0p200p800"
        );
    }

    #[test]
    fn is_deterministic() {
        let mut spec = spec("Thinkpad X1");
        spec.price_max = Some(500);
        let first = build_search_url(&spec, &berlin(), 3);
        let second = build_search_url(&spec, &berlin(), 3);
        assert_eq!(first, second);
    }

    #[test]
    fn later_pages_carry_the_page_segment() {
        let url = build_search_url(&spec("fahrrad"), &berlin(), 2);
        assert_eq!(
            url,
            "https://www.kleinanzeigen.de/s-berlin/seite:2/fahrrad/k0l3331r25"
        );
    }

    #[test]
    fn page_one_has_no_page_segment() {
        let url = build_search_url(&spec("fahrrad"), &berlin(), 1);
        assert!(!url.contains("seite:"));
    }

    #[test]
    fn vehicle_search_renders_km_filter() {
        let mut spec = spec("Golf 7");
        spec.category = Category::Vehicle;
        spec.km_min = Some(50000);
        spec.km_max = Some(150000);

        let url = build_search_url(&spec, &berlin(), 1);
        assert!(url.ends_with("k0l3331r25+autos.km_i:50000%2C150000"));
    }

    #[test]
    fn km_bounds_on_generic_search_are_dropped() {
        let mut spec = spec("iPhone 13");
        spec.km_min = Some(1000);

        let url = build_search_url(&spec, &berlin(), 1);
        assert!(!url.contains("km_i"));
    }

    #[test]
    fn inverted_price_bounds_are_dropped() {
        let mut spec = spec("iPhone 13");
        spec.price_min = Some(800);
        spec.price_max = Some(200);

        let url = build_search_url(&spec, &berlin(), 1);
        assert_eq!(
            url,
            "https://www.kleinanzeigen.de/s-berlin/iPhone+13/k0l3331r25"
        );
    }

    #[test]
    fn open_ended_price_bound_leaves_one_side_empty() {
        let mut spec = spec("sofa");
        spec.price_max = Some(150);
        let url = build_search_url(&spec, &berlin(), 1);
        assert!(url.ends_with("k0l3331r25pp150"));
    }

    #[test]
    fn query_text_is_form_encoded() {
        let url = build_search_url(&spec("Golf & Co"), &berlin(), 1);
        assert!(url.contains("/Golf+%26+Co/"));
    }
}
