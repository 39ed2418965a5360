//! Pipeline error taxonomy.
//!
//! Only errors that make the whole response impossible to construct are
//! represented here; per-source and per-classification failures are recovered
//! at their point of parallelization and never reach this type.

use serde::Serialize;
use thiserror::Error;

/// Rate-limit metadata sniffed from an upstream 429 response.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    /// Seconds until the quota resets, when the upstream reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    /// Remaining quota, when the upstream reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
    /// Which upstream imposed the limit.
    pub source: String,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The geocoder returned zero candidates for the region query.
    #[error("region not found: {region}")]
    RegionNotFound { region: String },

    /// The geocoding upstream itself failed (transport, non-2xx, missing key).
    #[error("geocoding unavailable: {reason}")]
    GeocodeUnavailable { reason: String },

    /// Every source returned zero items.
    #[error("no posts found for region: {region}")]
    NoPosts { region: String },

    /// Sources returned items but none survived the region filter.
    #[error("found {fetched} posts but none matched region: {region}")]
    NoneMatchedRegion { region: String, fetched: usize },

    /// All sources came back empty and at least one was rate limited.
    #[error("upstream rate limited")]
    RateLimited { info: RateLimitInfo },

    /// A required credential is missing and no degraded mode exists.
    #[error("missing credential: {name}")]
    MissingCredential { name: String },

    /// A chat request field is missing or malformed.
    #[error("invalid input: {field}: {message}")]
    InvalidInput { field: String, message: String },

    /// The LLM backend failed on a path with no degraded fallback (chat).
    #[error("language model call failed: {reason}")]
    LlmFailed { reason: String },

    /// The LLM returned a successful but empty completion.
    #[error("language model returned an empty answer")]
    EmptyAnswer,
}

impl PipelineError {
    /// Human-actionable suggestion for terminal, user-facing errors.
    #[must_use]
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::RegionNotFound { .. } => {
                Some("Try a more specific place name, e.g. \"Paris, France\" or a major city.")
            }
            Self::NoPosts { .. } => {
                Some("Try a larger region or a different spelling; coverage varies by area.")
            }
            Self::NoneMatchedRegion { .. } => Some(
                "Posts were fetched but none mentioned this region; try a well-known city name.",
            ),
            Self::RateLimited { .. } => Some("An upstream API quota was hit; retry shortly."),
            _ => None,
        }
    }
}
