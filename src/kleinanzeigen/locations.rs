use std::collections::HashMap;

use crate::config::LocationEntry;

/// Geographic anchor for one search, as the marketplace understands it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocation {
    /// Path slug for the location segment of the search URL
    pub slug: String,
    /// Marketplace location id or postal code, digits only
    pub location_token: Option<String>,
    /// Search radius; only meaningful together with a token
    pub radius_km: Option<u32>,
}

impl ResolvedLocation {
    /// True when results will not be geographically filtered and may span
    /// the whole country
    pub fn is_nationwide(&self) -> bool {
        self.location_token.is_none()
    }
}

/// Lookup table from normalized city names to marketplace location ids
#[derive(Debug, Default)]
pub struct LocationIndex {
    by_city: HashMap<String, u32>,
}

impl LocationIndex {
    pub fn build(entries: &[LocationEntry]) -> Self {
        let mut by_city = HashMap::new();
        for entry in entries {
            let city = normalize_city(&entry.city);
            if city.is_empty() {
                continue;
            }
            if let Some(id) = entry.location_id {
                by_city.insert(city, id);
            }
        }
        Self { by_city }
    }

    pub fn get(&self, city: &str) -> Option<u32> {
        self.by_city.get(&normalize_city(city)).copied()
    }
}

/// Resolve a configured location string to a marketplace anchor.
///
/// Precedence: the per-search override id, then an exact match in the city
/// table, then an all-digits input passed through as a postal code. An
/// unknown city is not an error: the search degrades to slug-only mode.
pub fn resolve(
    location: &str,
    override_id: Option<u32>,
    index: &LocationIndex,
    max_radius_km: u32,
) -> ResolvedLocation {
    let slug = slugify(location);

    let token = override_id
        .or_else(|| index.get(location))
        .map(|id| id.to_string())
        .or_else(|| {
            let trimmed = location.trim();
            (!trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()))
                .then(|| trimmed.to_string())
        });

    match token {
        Some(token) => ResolvedLocation {
            slug,
            location_token: Some(token),
            radius_km: Some(max_radius_km),
        },
        None => ResolvedLocation {
            slug,
            location_token: None,
            radius_km: None,
        },
    }
}

pub fn normalize_city(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Lowercased, spaces to dashes; an empty location slugs to the whole country
pub fn slugify(location: &str) -> String {
    let slug = location.trim().to_lowercase().replace(' ', "-");
    if slug.is_empty() {
        "deutschland".to_string()
    } else {
        slug
    }
}
