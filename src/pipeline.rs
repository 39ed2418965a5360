//! Ingestion orchestrator: region string in, cached emotion-mapped response
//! out.
//!
//! Per-request flow: cache lookup → resolve → parallel source fan-out →
//! region filter → batch classification → GeoJSON + summary → cache write.
//! Individual source failures never fail a request; only an unresolvable
//! region or a complete absence of usable posts is terminal.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{Clock, SystemClock, TtlCache};
use crate::classify::{Emotion, EmotionClassifier, EmotionResult, EmotionsSummary};
use crate::config::Config;
use crate::error::PipelineError;
use crate::llm::{ChatModel, HttpChatModel};
use crate::mapdata::{format_features, FeatureCollection};
use crate::model::{truncate_chars, Coordinates, UnifiedPost};
use crate::region::filter::{filter_posts, llm_assist, rejected_posts};
use crate::region::RegionResolver;
use crate::sources::firehose::{FirehoseSource, PostBuffer};
use crate::sources::gdelt::GdeltClient;
use crate::sources::mock::MockSource;
use crate::sources::newsapi::NewsApiClient;
use crate::sources::{FetchScope, SourceClient};

/// Transport cap on top-post text.
const TOP_POST_TEXT_MAX_CHARS: usize = 280;

/// Below this many keyword matches the opt-in LLM assist pass kicks in.
const SPARSE_MATCH_THRESHOLD: usize = 5;

/// One confidence-ranked evidence post. Deserializable because chat requests
/// echo it back as evidence context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopPost {
    pub text: String,
    pub emotion: Emotion,
}

/// The full per-region response payload; cached verbatim.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionResponse {
    pub region: String,
    pub coordinates: Coordinates,
    pub geo_json: FeatureCollection,
    pub emotions_summary: EmotionsSummary,
    pub top_posts: Vec<TopPost>,
    pub posts: Vec<UnifiedPost>,
}

/// Tunables the orchestrator needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub spread_radius_km: f64,
    pub top_posts_limit: usize,
    pub filter_llm_assist: bool,
}

pub struct Pipeline {
    resolver: RegionResolver,
    sources: Vec<Arc<dyn SourceClient>>,
    classifier: EmotionClassifier,
    model: Arc<dyn ChatModel>,
    cache: TtlCache<RegionResponse>,
    options: PipelineOptions,
}

impl Pipeline {
    /// Wire up the production collaborators from configuration.
    #[must_use]
    pub fn from_config(config: &Config, firehose_buffer: Option<Arc<PostBuffer>>) -> Self {
        let resolver = RegionResolver::new(&config.geocode_base_url, config.geocode_api_key.clone());

        // Concatenation order is a stable convention: news, then geo events,
        // then the social buffer. It only matters for top-post tie-breaking.
        let mut sources: Vec<Arc<dyn SourceClient>> = vec![
            Arc::new(NewsApiClient::new(
                &config.newsapi_base_url,
                config.newsapi_key.clone(),
                config.newsapi_page_size,
                config.newsapi_max_pages,
            )),
            Arc::new(GdeltClient::new(
                &config.gdelt_base_url,
                config.gdelt_max_records,
            )),
        ];
        if let Some(buffer) = firehose_buffer {
            sources.push(Arc::new(FirehoseSource::new(buffer)));
        }
        if config.mock_source_enabled {
            sources.push(Arc::new(MockSource));
        }

        let model: Arc<dyn ChatModel> = Arc::new(HttpChatModel::new(
            &config.llm_base_url,
            config.llm_api_key.clone(),
            &config.llm_model,
        ));

        Self::new(
            resolver,
            sources,
            model,
            Arc::new(SystemClock),
            config.cache_ttl,
            PipelineOptions {
                spread_radius_km: config.spread_radius_km,
                top_posts_limit: config.top_posts_limit,
                filter_llm_assist: config.filter_llm_assist,
            },
        )
    }

    /// Assemble from explicit parts (tests inject scripted collaborators and
    /// a manual clock here).
    #[must_use]
    pub fn new(
        resolver: RegionResolver,
        sources: Vec<Arc<dyn SourceClient>>,
        model: Arc<dyn ChatModel>,
        clock: Arc<dyn Clock>,
        cache_ttl: std::time::Duration,
        options: PipelineOptions,
    ) -> Self {
        Self {
            resolver,
            sources,
            classifier: EmotionClassifier::new(model.clone()),
            model,
            cache: TtlCache::new(cache_ttl, clock),
            options,
        }
    }

    /// Handle one region request end to end.
    ///
    /// # Errors
    ///
    /// Terminal errors only: unresolvable region, zero posts fetched, zero
    /// posts surviving the region filter, or an all-empty fan-out where some
    /// upstream was rate limited.
    pub async fn handle_region_request(
        &self,
        region_query: &str,
    ) -> Result<RegionResponse, PipelineError> {
        let region_query = region_query.trim();
        let cache_key = TtlCache::<RegionResponse>::key_for(region_query);

        if let Some(cached) = self.cache.get(&cache_key) {
            debug!(key = %cache_key, "Cache hit");
            return Ok(cached);
        }

        let resolved = self.resolver.resolve(region_query).await?;
        let scope = FetchScope::for_query(region_query);

        let all_posts = self.fan_out(&scope).await?;

        let filtered = if scope.is_global() {
            all_posts
        } else {
            self.filter_for_region(&all_posts, region_query).await?
        };

        let texts: Vec<String> = filtered.iter().map(|p| p.text.clone()).collect();
        let results = self.classifier.classify_batch(&texts).await;

        let mut summary = EmotionsSummary::default();
        for result in &results {
            summary.record(result.emotion);
        }

        let classified: Vec<(UnifiedPost, EmotionResult)> = filtered
            .iter()
            .cloned()
            .zip(results.iter().copied())
            .collect();

        let geo_json = format_features(&classified, resolved.center, self.options.spread_radius_km);
        let top_posts = self.top_posts(&classified);

        let response = RegionResponse {
            region: resolved.display_name,
            coordinates: resolved.center,
            geo_json,
            emotions_summary: summary,
            top_posts,
            posts: filtered,
        };

        info!(
            key = %cache_key,
            posts = response.posts.len(),
            features = response.geo_json.features.len(),
            "Pipeline run complete, caching response"
        );
        self.cache.insert(cache_key, response.clone());

        Ok(response)
    }

    /// Fan out to all source clients in parallel. Each client's failure was
    /// already recovered inside the client; here we only log degradations,
    /// collect rate-limit hints, and concatenate in registration order.
    async fn fan_out(&self, scope: &FetchScope) -> Result<Vec<UnifiedPost>, PipelineError> {
        let fetches = self.sources.iter().map(|source| source.fetch(scope));
        let outcomes = futures_util::future::join_all(fetches).await;

        let mut posts = Vec::new();
        let mut rate_limit = None;
        for (source, outcome) in self.sources.iter().zip(outcomes) {
            if let crate::sources::SourceOutcome::Degraded(reason) = &outcome {
                warn!(source = source.source().as_str(), %reason, "Source degraded");
            }
            if let Some(info) = outcome.rate_limit() {
                rate_limit = Some(info.clone());
            }
            posts.extend(outcome.into_posts());
        }

        if posts.is_empty() {
            if let Some(info) = rate_limit {
                return Err(PipelineError::RateLimited { info });
            }
            return Err(PipelineError::NoPosts {
                region: if scope.is_global() {
                    "global".to_string()
                } else {
                    scope.region_query.clone()
                },
            });
        }

        Ok(posts)
    }

    /// Step 6: region filter plus the optional LLM assist pass.
    async fn filter_for_region(
        &self,
        all_posts: &[UnifiedPost],
        region_query: &str,
    ) -> Result<Vec<UnifiedPost>, PipelineError> {
        let mut filtered = filter_posts(all_posts, region_query);

        if self.options.filter_llm_assist && filtered.len() < SPARSE_MATCH_THRESHOLD {
            let rejects = rejected_posts(all_posts, region_query);
            let rescued = llm_assist(&self.model, &rejects, region_query).await;
            filtered.extend(rescued);
        }

        if filtered.is_empty() {
            return Err(PipelineError::NoneMatchedRegion {
                region: region_query.to_string(),
                fetched: all_posts.len(),
            });
        }
        Ok(filtered)
    }

    /// Step 8: qualifying posts sorted by descending confidence, truncated.
    ///
    /// The sort is stable, so posts with exactly equal confidence keep the
    /// source concatenation order.
    fn top_posts(
        &self,
        classified: &[(UnifiedPost, EmotionResult)],
    ) -> Vec<TopPost> {
        let mut qualifying: Vec<&(UnifiedPost, EmotionResult)> = classified
            .iter()
            .filter(|(post, _)| !post.text.trim().is_empty())
            .collect();
        qualifying.sort_by(|a, b| {
            b.1.confidence
                .partial_cmp(&a.1.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        qualifying
            .into_iter()
            .take(self.options.top_posts_limit)
            .map(|(post, result)| TopPost {
                text: truncate_chars(&post.text, TOP_POST_TEXT_MAX_CHARS),
                emotion: result.emotion,
            })
            .collect()
    }
}
