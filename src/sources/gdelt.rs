//! GDELT Doc API client.
//!
//! The upstream's per-country filter parameter is unreliable, so the country
//! name is folded into the free-text query and a secondary in-process filter
//! is applied afterwards. GDELT sometimes returns HTML error pages with a 200
//! status; those parse as empty, never as an error.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{FetchScope, SourceClient, SourceOutcome};
use crate::model::{SourceTag, UnifiedPost};
use crate::region::country_aliases;

const USER_AGENT: &str = concat!("moodmap/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct DocResponse {
    #[serde(default)]
    articles: Vec<DocArticle>,
}

#[derive(Debug, Deserialize)]
struct DocArticle {
    title: Option<String>,
    url: Option<String>,
    seendate: Option<String>,
    #[serde(rename = "sourcecountry")]
    source_country: Option<String>,
    tone: Option<f64>,
    lat: Option<f64>,
    lon: Option<f64>,
}

pub struct GdeltClient {
    client: reqwest::Client,
    base_url: String,
    max_records: usize,
}

impl GdeltClient {
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized.
    #[must_use]
    pub fn new(base_url: &str, max_records: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            // GDELT caps maxrecords at 250
            max_records: max_records.min(250),
        }
    }
}

#[async_trait]
impl SourceClient for GdeltClient {
    fn source(&self) -> SourceTag {
        SourceTag::Gdelt
    }

    async fn fetch(&self, scope: &FetchScope) -> SourceOutcome {
        let query = if scope.is_global() {
            "news".to_string()
        } else {
            match &scope.country_name {
                Some(name) => format!("{} \"{}\"", scope.region_query, name),
                None => scope.region_query.clone(),
            }
        };

        let url = format!(
            "{}/api/v2/doc/doc?query={}&mode=ArtList&maxrecords={}&sort=DateDesc&format=json",
            self.base_url,
            urlencoding::encode(&query),
            self.max_records
        );

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => return SourceOutcome::Degraded(format!("gdelt transport error: {e}")),
        };

        if !response.status().is_success() {
            debug!(status = %response.status(), "GDELT returned non-success, treating as empty");
            return SourceOutcome::Empty;
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return SourceOutcome::Degraded(format!("gdelt body read error: {e}")),
        };

        // GDELT serves HTML error pages with 200; a failed parse is "empty".
        let parsed: DocResponse = match serde_json::from_str(&body) {
            Ok(p) => p,
            Err(_) => {
                warn!("GDELT returned a malformed (non-JSON) payload, treating as empty");
                return SourceOutcome::Empty;
            }
        };

        if parsed.articles.is_empty() {
            return SourceOutcome::Empty;
        }

        let posts = to_posts(parsed.articles);
        let filtered: Vec<UnifiedPost> = match (&scope.country_name, scope.is_global()) {
            (Some(name), false) => apply_country_filter(posts, name, self.max_records),
            _ => posts.into_iter().map(|(post, _)| post).collect(),
        };

        if filtered.is_empty() {
            SourceOutcome::Empty
        } else {
            SourceOutcome::Items(filtered)
        }
    }
}

fn to_posts(articles: Vec<DocArticle>) -> Vec<(UnifiedPost, Option<String>)> {
    articles
        .into_iter()
        .enumerate()
        .filter_map(|(index, article)| {
            let text = article.title.unwrap_or_default().trim().to_string();
            if text.is_empty() {
                return None;
            }
            let created_at = article.seendate.and_then(|d| normalize_seendate(&d));
            let mut post = UnifiedPost::new(text, created_at, SourceTag::Gdelt, index);
            if let Some(url) = article.url {
                post.uri = url;
            }
            post.tone = article.tone;
            if let (Some(lat), Some(lon)) = (article.lat, article.lon) {
                post = post.with_coords(lat, lon);
            }
            Some((post, article.source_country))
        })
        .collect()
}

/// Secondary country filter, recall-over-precision.
///
/// Keeps articles whose source-country field exactly matches, or whose text
/// mentions the country name or a known alias. If that keeps fewer than half
/// the request limit, filtering is abandoned and the unfiltered list is
/// returned instead.
fn apply_country_filter(
    posts: Vec<(UnifiedPost, Option<String>)>,
    country_name: &str,
    limit: usize,
) -> Vec<UnifiedPost> {
    let country_lower = country_name.to_lowercase();
    let aliases = country_aliases(&country_lower);

    let kept: Vec<UnifiedPost> = posts
        .iter()
        .filter(|(post, source_country)| {
            if source_country
                .as_deref()
                .is_some_and(|sc| sc.to_lowercase() == country_lower)
            {
                return true;
            }
            let text = post.text.to_lowercase();
            text.contains(&country_lower) || aliases.iter().any(|alias| text.contains(alias))
        })
        .map(|(post, _)| post.clone())
        .collect();

    if kept.len() < limit / 2 {
        debug!(
            kept = kept.len(),
            total = posts.len(),
            threshold = limit / 2,
            "GDELT country filter too aggressive, returning unfiltered results"
        );
        posts.into_iter().map(|(post, _)| post).collect()
    } else {
        kept
    }
}

/// GDELT's `seendate` is `YYYYMMDDTHHMMSSZ`; convert to RFC 3339.
fn normalize_seendate(seendate: &str) -> Option<String> {
    chrono::NaiveDateTime::parse_from_str(seendate, "%Y%m%dT%H%M%SZ")
        .ok()
        .map(|dt| format!("{}Z", dt.format("%Y-%m-%dT%H:%M:%S")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gdelt_post(
        text: &str,
        source_country: Option<&str>,
        index: usize,
    ) -> (UnifiedPost, Option<String>) {
        (
            UnifiedPost::new(text.to_string(), None, SourceTag::Gdelt, index),
            source_country.map(ToString::to_string),
        )
    }

    #[test]
    fn test_country_filter_keeps_alias_mentions() {
        // Limit 4 → threshold 2; two survivors keep the filter in force.
        let posts = vec![
            gdelt_post("USA unemployment falls again", None, 0),
            gdelt_post("America debates new policy", None, 1),
            gdelt_post("Ein ganz anderes Thema heute", None, 2),
        ];
        let kept = apply_country_filter(posts, "united states", 4);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_country_filter_matches_source_country_field() {
        let posts = vec![
            gdelt_post("Local headline with no mention", Some("United States"), 0),
            gdelt_post("America debates new policy", None, 1),
            gdelt_post("Unrelated story", None, 2),
        ];
        let kept = apply_country_filter(posts, "united states", 4);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_country_filter_abandoned_below_half_limit() {
        let posts = vec![
            gdelt_post("USA unemployment falls again", None, 0),
            gdelt_post("Unrelated story one", None, 1),
            gdelt_post("Unrelated story two", None, 2),
        ];
        // Limit 10 → threshold 5; only 1 survivor, so the filter is dropped.
        let kept = apply_country_filter(posts, "united states", 10);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_normalize_seendate() {
        assert_eq!(
            normalize_seendate("20240315T120000Z").as_deref(),
            Some("2024-03-15T12:00:00Z")
        );
        assert!(normalize_seendate("not a date").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_upstream_degrades() {
        let client = GdeltClient::new("http://127.0.0.1:1", 250);
        let outcome = client.fetch(&FetchScope::for_query("paris")).await;
        assert!(matches!(outcome, SourceOutcome::Degraded(_)));
    }
}
