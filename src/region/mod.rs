//! Region handling: geocoding, country-code lookup, and text filtering.

pub mod country;
pub mod filter;
pub mod resolver;

pub use country::{country_aliases, country_code_for, country_name_for_code};
pub use filter::{filter_posts, main_region_token};
pub use resolver::{RegionResolver, ResolvedRegion};
