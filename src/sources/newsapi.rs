//! NewsAPI "everything search" client.
//!
//! Never supplies coordinates; a non-2xx or empty-article response is "no
//! results", not a hard error, so the orchestrator can proceed with partial
//! data from other sources.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{FetchScope, SourceClient, SourceOutcome};
use crate::error::RateLimitInfo;
use crate::model::{SourceTag, UnifiedPost};

const USER_AGENT: &str = concat!("moodmap/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    url: Option<String>,
}

pub struct NewsApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    page_size: usize,
    max_pages: usize,
}

impl NewsApiClient {
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized.
    #[must_use]
    pub fn new(base_url: &str, api_key: Option<String>, page_size: usize, max_pages: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            page_size,
            max_pages,
        }
    }

    async fn fetch_page(
        &self,
        api_key: &str,
        query: &str,
        page: usize,
    ) -> Result<SourcePage, SourceOutcome> {
        let url = format!("{}/v2/everything", self.base_url);
        let page_size = self.page_size.to_string();
        let page_str = page.to_string();

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", api_key)
            .query(&[
                ("q", query),
                ("pageSize", page_size.as_str()),
                ("page", page_str.as_str()),
                ("sortBy", "publishedAt"),
            ])
            .send()
            .await
            .map_err(|e| SourceOutcome::Degraded(format!("newsapi transport error: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let info = sniff_rate_limit(&response);
            return Err(SourceOutcome::RateLimited(info));
        }
        if !status.is_success() {
            debug!(status = %status, "NewsAPI returned non-success, treating as no results");
            return Err(SourceOutcome::Empty);
        }

        let parsed: EverythingResponse = response
            .json()
            .await
            .map_err(|e| SourceOutcome::Degraded(format!("newsapi malformed payload: {e}")))?;

        Ok(SourcePage {
            full: parsed.articles.len() >= self.page_size,
            articles: parsed.articles,
        })
    }
}

struct SourcePage {
    articles: Vec<Article>,
    full: bool,
}

#[async_trait]
impl SourceClient for NewsApiClient {
    fn source(&self) -> SourceTag {
        SourceTag::Newsapi
    }

    async fn fetch(&self, scope: &FetchScope) -> SourceOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            return SourceOutcome::Degraded("NEWSAPI_KEY is not configured".to_string());
        };

        // Query by explicit region name; a global request gets a broad query.
        let query = if scope.is_global() {
            "news".to_string()
        } else {
            scope.region_query.clone()
        };

        let mut articles = Vec::new();
        for page in 1..=self.max_pages {
            match self.fetch_page(api_key, &query, page).await {
                Ok(fetched) => {
                    let page_was_full = fetched.full;
                    articles.extend(fetched.articles);
                    if !page_was_full {
                        break;
                    }
                }
                // First-page failures decide the outcome; later pages keep
                // whatever was already gathered.
                Err(outcome) if articles.is_empty() => return outcome,
                Err(_) => {
                    warn!(page, "NewsAPI pagination stopped early, keeping partial results");
                    break;
                }
            }
        }

        if articles.is_empty() {
            return SourceOutcome::Empty;
        }

        let posts: Vec<UnifiedPost> = articles
            .into_iter()
            .enumerate()
            .filter_map(|(index, article)| {
                let title = article.title.unwrap_or_default();
                let description = article.description.unwrap_or_default();
                let text = format!("{title}. {description}")
                    .trim_matches(|c: char| c == '.' || c.is_whitespace())
                    .to_string();
                if text.is_empty() {
                    return None;
                }
                let mut post =
                    UnifiedPost::new(text, article.published_at, SourceTag::Newsapi, index);
                if let Some(url) = article.url {
                    post.uri = url;
                }
                Some(post)
            })
            .collect();

        if posts.is_empty() {
            SourceOutcome::Empty
        } else {
            SourceOutcome::Items(posts)
        }
    }
}

fn sniff_rate_limit(response: &reqwest::Response) -> RateLimitInfo {
    let header_u64 = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
    };
    RateLimitInfo {
        retry_after_secs: header_u64("retry-after").or_else(|| header_u64("x-ratelimit-reset")),
        remaining: header_u64("x-ratelimit-remaining"),
        source: "newsapi".to_string(),
    }
}
