//! Keyword- and regex-based region filtering.
//!
//! The filter fails closed: an unrecognized region query shorter than three
//! characters yields zero matches rather than passing everything through.

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use crate::llm::{ChatModel, ChatParams};
use crate::model::UnifiedPost;

/// Curated keyword lists per canonical region token. Multi-word entries and
/// hashtags match by phrase containment; single words match on word
/// boundaries.
const REGION_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "new york",
        &[
            "new york", "nyc", "#nyc", "manhattan", "brooklyn", "queens", "bronx",
            "staten island", "harlem", "wall street",
        ],
    ),
    (
        "los angeles",
        &["los angeles", "#la", "hollywood", "santa monica", "venice beach", "lakers"],
    ),
    (
        "london",
        &["london", "#london", "westminster", "camden", "soho", "canary wharf"],
    ),
    (
        "paris",
        &["paris", "#paris", "montmartre", "louvre", "seine", "eiffel"],
    ),
    (
        "tokyo",
        &["tokyo", "#tokyo", "shibuya", "shinjuku", "akihabara", "ginza"],
    ),
    (
        "mumbai",
        &["mumbai", "#mumbai", "bombay", "bandra", "colaba", "bollywood"],
    ),
    (
        "sydney",
        &["sydney", "#sydney", "bondi", "parramatta", "darling harbour"],
    ),
    (
        "berlin",
        &["berlin", "#berlin", "kreuzberg", "neukölln", "brandenburg gate"],
    ),
    (
        "toronto",
        &["toronto", "#toronto", "scarborough", "etobicoke", "raptors"],
    ),
    (
        "rio de janeiro",
        &["rio de janeiro", "#rio", "copacabana", "ipanema", "carioca"],
    ),
];

/// Suffixes stripped when deriving the canonical token from a raw query.
const TRAILING_SUFFIXES: &[&str] = &[
    " city", " county", " state", " province", " metro", " area", " region",
];

/// Reduce a raw region query to its canonical main-region token.
///
/// Membership in the curated table wins (longest key contained in the query);
/// otherwise the text before the first comma, minus trailing suffixes.
#[must_use]
pub fn main_region_token(region_query: &str) -> String {
    let query = region_query.trim().to_lowercase();

    let mut best: Option<&str> = None;
    for (key, _) in REGION_KEYWORDS {
        if query.contains(key) && best.is_none_or(|b| b.len() < key.len()) {
            best = Some(key);
        }
    }
    if let Some(key) = best {
        return key.to_string();
    }

    let mut token = query.split(',').next().unwrap_or("").trim().to_string();
    for suffix in TRAILING_SUFFIXES {
        if let Some(stripped) = token.strip_suffix(suffix) {
            token = stripped.trim().to_string();
        }
    }
    token
}

/// Keep posts plausibly about the requested region.
///
/// Pure and synchronous. See [`llm_assist`] for the optional second pass over
/// rejected posts.
#[must_use]
pub fn filter_posts(posts: &[UnifiedPost], region_query: &str) -> Vec<UnifiedPost> {
    let token = main_region_token(region_query);

    let keywords = REGION_KEYWORDS
        .iter()
        .find(|(key, _)| *key == token)
        .map(|(_, keywords)| *keywords);

    match keywords {
        Some(keywords) => posts
            .iter()
            .filter(|post| {
                let text = post.text.to_lowercase();
                keywords.iter().any(|keyword| keyword_matches(&text, keyword))
            })
            .cloned()
            .collect(),
        None if token.chars().count() >= 3 => {
            let Some(pattern) = word_boundary_regex(&token) else {
                return Vec::new();
            };
            posts
                .iter()
                .filter(|post| pattern.is_match(&post.text.to_lowercase()))
                .cloned()
                .collect()
        }
        // Too short and unrecognized: fail closed.
        None => Vec::new(),
    }
}

/// The complement of [`filter_posts`]: posts the keyword pass rejected.
///
/// `uri` is the stable identity for membership.
#[must_use]
pub fn rejected_posts(posts: &[UnifiedPost], region_query: &str) -> Vec<UnifiedPost> {
    let kept_uris: std::collections::HashSet<String> = filter_posts(posts, region_query)
        .into_iter()
        .map(|p| p.uri)
        .collect();
    posts
        .iter()
        .filter(|p| !kept_uris.contains(&p.uri))
        .cloned()
        .collect()
}

fn keyword_matches(normalized_text: &str, keyword: &str) -> bool {
    if keyword.contains(' ') || keyword.starts_with('#') {
        return normalized_text.contains(keyword);
    }
    word_boundary_regex(keyword).is_some_and(|re| re.is_match(normalized_text))
}

/// Word-boundary match so "rio" does not fire inside "prior".
fn word_boundary_regex(word: &str) -> Option<Regex> {
    Regex::new(&format!(r"\b{}\b", regex::escape(word))).ok()
}

const ASSIST_SYSTEM_PROMPT: &str = "You are a location-entity extractor. Answer with strict \
JSON only: {\"mentions_region\": true} if the text refers to the given region \
(including landmarks, neighborhoods, or demonyms), else {\"mentions_region\": false}.";

/// Cap on how many rejected posts the assist pass will send to the model.
const ASSIST_BATCH_CAP: usize = 20;

/// Opt-in LLM second pass over posts the keyword filter rejected.
///
/// Returns the subset of `rejects` the model says mention the region. Bounded
/// to [`ASSIST_BATCH_CAP`] posts; every per-post failure is treated as a
/// non-mention.
pub async fn llm_assist(
    model: &Arc<dyn ChatModel>,
    rejects: &[UnifiedPost],
    region_query: &str,
) -> Vec<UnifiedPost> {
    if !model.is_configured() || rejects.is_empty() {
        return Vec::new();
    }

    let sample = &rejects[..rejects.len().min(ASSIST_BATCH_CAP)];
    let params = ChatParams {
        temperature: 0.0,
        max_tokens: 20,
    };

    let checks = sample.iter().map(|post| {
        let user = format!("Region: {region_query}\nText: {}", post.text);
        let params = params.clone();
        async move {
            match model.chat(ASSIST_SYSTEM_PROMPT, &user, params).await {
                Ok(content) => content.contains("true"),
                Err(e) => {
                    debug!("Region assist call failed, treating as non-mention: {e}");
                    false
                }
            }
        }
    });

    let verdicts = futures_util::future::join_all(checks).await;
    let rescued: Vec<UnifiedPost> = sample
        .iter()
        .zip(verdicts)
        .filter_map(|(post, mentioned)| mentioned.then(|| post.clone()))
        .collect();

    if !rescued.is_empty() {
        warn!(
            count = rescued.len(),
            region = %region_query,
            "LLM assist rescued posts the keyword filter rejected"
        );
    }
    rescued
}
