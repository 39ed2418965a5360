//! Canned posts for credential-free demo runs.

use async_trait::async_trait;

use super::{FetchScope, SourceClient, SourceOutcome};
use crate::model::{SourceTag, UnifiedPost};

const SAMPLE_TEXTS: &[&str] = &[
    "Crowds celebrate the festival downtown, music everywhere",
    "Residents worried after another night of power cuts",
    "Local team wins the championship after twenty years",
    "Flooding closes two bridges, commuters furious",
    "New community garden brings neighbors together",
    "Hospital staff warn of longer waiting times this winter",
];

/// Deterministic stand-in source, enabled by `MOCK_SOURCE_ENABLED`.
pub struct MockSource;

#[async_trait]
impl SourceClient for MockSource {
    fn source(&self) -> SourceTag {
        SourceTag::Mock
    }

    async fn fetch(&self, scope: &FetchScope) -> SourceOutcome {
        let region = if scope.is_global() {
            "the world".to_string()
        } else {
            scope.region_query.clone()
        };

        let posts = SAMPLE_TEXTS
            .iter()
            .enumerate()
            .map(|(index, text)| {
                UnifiedPost::new(
                    format!("{text} in {region}"),
                    None,
                    SourceTag::Mock,
                    index,
                )
            })
            .collect();

        SourceOutcome::Items(posts)
    }
}
