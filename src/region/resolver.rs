//! Forward geocoding for region queries.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::PipelineError;
use crate::model::Coordinates;

const USER_AGENT: &str = concat!("moodmap/", env!("CARGO_PKG_VERSION"));

/// A resolved region center.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRegion {
    pub center: Coordinates,
    pub display_name: String,
}

impl ResolvedRegion {
    /// The fixed fallback for blank queries.
    #[must_use]
    pub fn global() -> Self {
        Self {
            center: Coordinates { lat: 0.0, lon: 0.0 },
            display_name: "Global".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: GeocodeGeometry,
    formatted: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeGeometry {
    lat: f64,
    lng: f64,
}

/// Client for an OpenCage-style forward geocoding API.
#[derive(Clone)]
pub struct RegionResolver {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RegionResolver {
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized.
    #[must_use]
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Resolve a free-text region to a center coordinate and display name.
    ///
    /// A blank query resolves to the global fallback without any upstream
    /// call. The first candidate's center is used.
    ///
    /// # Errors
    ///
    /// `RegionNotFound` when the geocoder returns zero candidates;
    /// `GeocodeUnavailable` when the call itself fails (missing credential,
    /// transport error, non-2xx status).
    pub async fn resolve(&self, region_query: &str) -> Result<ResolvedRegion, PipelineError> {
        let query = region_query.trim();
        if query.is_empty() {
            return Ok(ResolvedRegion::global());
        }

        let Some(api_key) = self.api_key.as_deref() else {
            return Err(PipelineError::GeocodeUnavailable {
                reason: "GEOCODE_API_KEY is not configured".to_string(),
            });
        };

        let url = format!("{}/geocode/v1/json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("key", api_key), ("limit", "1")])
            .send()
            .await
            .map_err(|e| PipelineError::GeocodeUnavailable {
                reason: format!("transport error: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::GeocodeUnavailable {
                reason: format!("geocoder returned status {status}"),
            });
        }

        let parsed: GeocodeResponse =
            response
                .json()
                .await
                .map_err(|e| PipelineError::GeocodeUnavailable {
                    reason: format!("malformed geocoder response: {e}"),
                })?;

        let Some(first) = parsed.results.into_iter().next() else {
            return Err(PipelineError::RegionNotFound {
                region: query.to_string(),
            });
        };

        let display_name = first.formatted.unwrap_or_else(|| query.to_string());
        debug!(region = %query, lat = first.geometry.lat, lon = first.geometry.lng, "Region resolved");

        Ok(ResolvedRegion {
            center: Coordinates {
                lat: first.geometry.lat,
                lon: first.geometry.lng,
            },
            display_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blank_query_resolves_globally_without_upstream() {
        // Base URL is unroutable; a request would fail, proving none is made.
        let resolver = RegionResolver::new("http://127.0.0.1:0", Some("key".to_string()));
        for query in ["", "   ", "\t"] {
            let resolved = resolver.resolve(query).await.unwrap();
            assert_eq!(resolved.display_name, "Global");
            assert!((resolved.center.lat).abs() < f64::EPSILON);
            assert!((resolved.center.lon).abs() < f64::EPSILON);
        }
    }

    #[tokio::test]
    async fn test_missing_credential_is_unavailable_not_not_found() {
        let resolver = RegionResolver::new("http://127.0.0.1:0", None);
        let err = resolver.resolve("paris").await.unwrap_err();
        assert!(matches!(err, PipelineError::GeocodeUnavailable { .. }));
    }
}
