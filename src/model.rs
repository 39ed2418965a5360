//! Core data model shared across the ingestion pipeline.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Provenance tag for an ingested item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Newsapi,
    Gdelt,
    Bluesky,
    Mock,
}

impl SourceTag {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Newsapi => "newsapi",
            Self::Gdelt => "gdelt",
            Self::Bluesky => "bluesky",
            Self::Mock => "mock",
        }
    }
}

/// A resolved geographic center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// One ingested item, pre-classification.
///
/// `lat`/`lon` are both `Some` or both `None`; use [`UnifiedPost::with_coords`]
/// to set them so partially populated coordinates cannot occur.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedPost {
    pub text: String,
    pub created_at: String,
    pub source: SourceTag,
    pub uri: String,
    pub cid: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<f64>,
}

impl UnifiedPost {
    /// Build a post with no genuine geocode. `created_at` falls back to the
    /// ingestion time when the source omits it.
    #[must_use]
    pub fn new(text: String, created_at: Option<String>, source: SourceTag, index: usize) -> Self {
        Self {
            text,
            created_at: created_at.unwrap_or_else(|| Utc::now().to_rfc3339()),
            source,
            uri: format!("{}-{index}", source.as_str()),
            cid: format!("{}-cid-{index}", source.as_str()),
            lat: None,
            lon: None,
            tone: None,
        }
    }

    /// Attach a genuine coordinate pair. Non-finite values are ignored so the
    /// both-or-neither invariant holds.
    #[must_use]
    pub fn with_coords(mut self, lat: f64, lon: f64) -> Self {
        if lat.is_finite() && lon.is_finite() {
            self.lat = Some(lat);
            self.lon = Some(lon);
        }
        self
    }

    /// The post's genuine coordinate pair, if it has one.
    #[must_use]
    pub fn coords(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Truncate text at a char boundary for transport economy.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_coords_rejects_non_finite() {
        let post = UnifiedPost::new("hello".to_string(), None, SourceTag::Gdelt, 0)
            .with_coords(f64::NAN, 2.0);
        assert!(post.lat.is_none());
        assert!(post.lon.is_none());

        let post = UnifiedPost::new("hello".to_string(), None, SourceTag::Gdelt, 0)
            .with_coords(48.85, f64::INFINITY);
        assert!(post.coords().is_none());
    }

    #[test]
    fn test_coords_both_or_neither() {
        let post = UnifiedPost::new("hello".to_string(), None, SourceTag::Gdelt, 1)
            .with_coords(48.85, 2.35);
        assert_eq!(post.coords(), Some((48.85, 2.35)));
    }

    #[test]
    fn test_synthesized_identifiers() {
        let post = UnifiedPost::new("x".to_string(), None, SourceTag::Newsapi, 7);
        assert_eq!(post.uri, "newsapi-7");
        assert_eq!(post.cid, "newsapi-cid-7");
    }

    #[test]
    fn test_created_at_defaults_to_ingestion_time() {
        let post = UnifiedPost::new("x".to_string(), None, SourceTag::Bluesky, 0);
        assert!(!post.created_at.is_empty());

        let post = UnifiedPost::new(
            "x".to_string(),
            Some("2024-01-01T00:00:00Z".to_string()),
            SourceTag::Bluesky,
            0,
        );
        assert_eq!(post.created_at, "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello world", 5), "hello");
        // Multi-byte chars are not split
        assert_eq!(truncate_chars("héllo", 2), "hé");
    }

    #[test]
    fn test_source_tag_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SourceTag::Newsapi).unwrap(),
            "\"newsapi\""
        );
        assert_eq!(
            serde_json::to_string(&SourceTag::Bluesky).unwrap(),
            "\"bluesky\""
        );
    }
}
