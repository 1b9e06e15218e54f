pub mod extract;
pub mod fetch;
pub mod locations;
pub mod paginate;
pub mod query;

pub use extract::{ExtractedPage, ListingExtractor};
pub use fetch::{FetchError, FetcherConfig, PageFetcher};
pub use locations::{resolve, LocationIndex, ResolvedLocation};
pub use paginate::{SearchOutcome, SearchPager, StopReason};
pub use query::build_search_url;

/// Base URL of the marketplace, without a trailing slash
pub const BASE_HOST: &str = "https://www.kleinanzeigen.de";
