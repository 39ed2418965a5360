//! Source clients: each fetches raw items from one upstream and normalizes
//! them into [`UnifiedPost`]s.
//!
//! Clients never fail the fan-out. A broken upstream comes back as
//! [`SourceOutcome::Degraded`], which callers treat as zero items but which
//! stays distinguishable from a legitimately empty result in the logs.

pub mod firehose;
pub mod gdelt;
pub mod mock;
pub mod newsapi;

use async_trait::async_trait;

use crate::error::RateLimitInfo;
use crate::model::{SourceTag, UnifiedPost};
use crate::region::{country_code_for, country_name_for_code};

/// What one source client produced for a request.
#[derive(Debug)]
pub enum SourceOutcome {
    /// The upstream answered with items.
    Items(Vec<UnifiedPost>),
    /// The upstream answered but had nothing matching.
    Empty,
    /// The upstream broke (transport, non-2xx, malformed payload); recovered
    /// locally as zero items.
    Degraded(String),
    /// The upstream refused the request due to quota.
    RateLimited(RateLimitInfo),
}

impl SourceOutcome {
    /// Collapse to the item list; `Empty`, `Degraded`, and `RateLimited` all
    /// yield nothing.
    #[must_use]
    pub fn into_posts(self) -> Vec<UnifiedPost> {
        match self {
            Self::Items(posts) => posts,
            _ => Vec::new(),
        }
    }

    #[must_use]
    pub fn rate_limit(&self) -> Option<&RateLimitInfo> {
        match self {
            Self::RateLimited(info) => Some(info),
            _ => None,
        }
    }
}

/// Region scope handed to each source client.
#[derive(Debug, Clone)]
pub struct FetchScope {
    /// Trimmed region query; empty means a global request.
    pub region_query: String,
    /// ISO code derived from the query (static table, default "us").
    pub country_code: String,
    /// Display name for the country code, when known.
    pub country_name: Option<String>,
}

impl FetchScope {
    #[must_use]
    pub fn for_query(region_query: &str) -> Self {
        let region_query = region_query.trim().to_string();
        let country_code = country_code_for(&region_query).to_string();
        let country_name = country_name_for_code(&country_code).map(ToString::to_string);
        Self {
            region_query,
            country_code,
            country_name,
        }
    }

    #[must_use]
    pub fn is_global(&self) -> bool {
        self.region_query.is_empty()
    }
}

/// Trait over the per-upstream fetchers.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Provenance tag stamped onto produced posts.
    fn source(&self) -> SourceTag;

    /// Fetch and normalize items for the scope. Must not panic and must not
    /// return transport errors; represent them as [`SourceOutcome::Degraded`].
    async fn fetch(&self, scope: &FetchScope) -> SourceOutcome;
}
