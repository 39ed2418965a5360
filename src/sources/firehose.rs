//! Bluesky jetstream firehose: a long-lived, auto-reconnecting websocket
//! subscription feeding a bounded, time-windowed in-memory buffer.
//!
//! Delivery is best-effort. Buffer reads are snapshot copies and work
//! regardless of connection health; a down upstream just means the buffer
//! stops growing until the fixed-delay reconnect succeeds.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{FetchScope, SourceClient, SourceOutcome};
use crate::model::{SourceTag, UnifiedPost};
use crate::region::main_region_token;

const POST_COLLECTION: &str = "app.bsky.feed.post";

/// One decoded firehose frame.
///
/// Unknown shapes are a distinct variant, logged by the reader, never a
/// silent no-op.
#[derive(Debug)]
pub enum FirehoseEvent {
    Commit(CommitFrame),
    Identity,
    Account,
    Info,
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct CommitFrame {
    pub did: Option<String>,
    pub commit: Option<CommitBody>,
}

#[derive(Debug, Deserialize)]
pub struct CommitBody {
    pub operation: Option<String>,
    pub collection: Option<String>,
    pub rkey: Option<String>,
    pub cid: Option<String>,
    pub record: Option<PostRecord>,
}

#[derive(Debug, Deserialize)]
pub struct PostRecord {
    pub text: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
}

/// Decode one wire frame into a tagged event.
#[must_use]
pub fn decode_frame(payload: &[u8]) -> FirehoseEvent {
    #[derive(Deserialize)]
    struct Envelope {
        kind: Option<String>,
    }

    let Ok(envelope) = serde_json::from_slice::<Envelope>(payload) else {
        return FirehoseEvent::Unknown;
    };

    match envelope.kind.as_deref() {
        Some("commit") => serde_json::from_slice::<CommitFrame>(payload)
            .map_or(FirehoseEvent::Unknown, FirehoseEvent::Commit),
        Some("identity") => FirehoseEvent::Identity,
        Some("account") => FirehoseEvent::Account,
        Some("info") => FirehoseEvent::Info,
        _ => FirehoseEvent::Unknown,
    }
}

/// Extract a post from a commit frame, if it is a "create" on the post
/// collection with non-empty text.
#[must_use]
pub fn post_from_commit(frame: &CommitFrame) -> Option<UnifiedPost> {
    let commit = frame.commit.as_ref()?;
    if commit.operation.as_deref() != Some("create")
        || commit.collection.as_deref() != Some(POST_COLLECTION)
    {
        return None;
    }
    let record = commit.record.as_ref()?;
    let text = record.text.as_deref()?.trim().to_string();
    if text.is_empty() {
        return None;
    }

    let mut post = UnifiedPost::new(text, record.created_at.clone(), SourceTag::Bluesky, 0);
    if let (Some(did), Some(rkey)) = (frame.did.as_deref(), commit.rkey.as_deref()) {
        post.uri = format!("at://{did}/{POST_COLLECTION}/{rkey}");
    }
    if let Some(cid) = commit.cid.clone() {
        post.cid = cid;
    }
    Some(post)
}

struct Buffered {
    post: UnifiedPost,
    received_at: Instant,
}

/// Bounded, time-windowed post buffer shared between the reader task and
/// request handlers.
pub struct PostBuffer {
    inner: RwLock<VecDeque<Buffered>>,
    capacity: usize,
    window: Duration,
}

impl PostBuffer {
    #[must_use]
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            inner: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
            window,
        }
    }

    /// Append a post, evicting anything over capacity or past the window.
    pub fn push(&self, post: UnifiedPost) {
        let mut buffer = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        buffer.push_back(Buffered {
            post,
            received_at: Instant::now(),
        });
        while buffer.len() > self.capacity {
            buffer.pop_front();
        }
        let window = self.window;
        while buffer
            .front()
            .is_some_and(|b| b.received_at.elapsed() > window)
        {
            buffer.pop_front();
        }
    }

    /// Snapshot the buffered posts, optionally keeping only those containing
    /// `needle` (case-insensitive substring).
    #[must_use]
    pub fn snapshot(&self, needle: Option<&str>) -> Vec<UnifiedPost> {
        let buffer = self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let needle_lower = needle.map(str::to_lowercase);
        buffer
            .iter()
            .filter(|b| {
                needle_lower
                    .as_deref()
                    .is_none_or(|n| b.post.text.to_lowercase().contains(n))
            })
            .map(|b| b.post.clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run the firehose reader forever, reconnecting after a fixed delay on any
/// close or error. No exponential backoff: a down upstream produces a steady
/// retry cadence.
pub async fn run_loop(url: String, buffer: Arc<PostBuffer>, reconnect_delay: Duration) {
    loop {
        match connect_async(&url).await {
            Ok((stream, _)) => {
                info!(url = %url, "Firehose connected");
                read_until_close(stream, &buffer).await;
                warn!("Firehose connection closed, reconnecting");
            }
            Err(e) => {
                warn!("Firehose connection failed: {e}");
            }
        }
        tokio::time::sleep(reconnect_delay).await;
    }
}

async fn read_until_close<S>(mut stream: S, buffer: &PostBuffer)
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(message) = stream.next().await {
        let payload = match message {
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Binary(bytes)) => bytes,
            Ok(Message::Close(_)) => return,
            Ok(_) => continue,
            Err(e) => {
                warn!("Firehose read error: {e}");
                return;
            }
        };

        match decode_frame(&payload) {
            FirehoseEvent::Commit(frame) => {
                if let Some(post) = post_from_commit(&frame) {
                    buffer.push(post);
                }
            }
            FirehoseEvent::Identity | FirehoseEvent::Account | FirehoseEvent::Info => {}
            FirehoseEvent::Unknown => {
                debug!("Unrecognized firehose frame shape, skipping");
            }
        }
    }
}

/// Source client view over the buffer: synchronous snapshot reads, filtered
/// by the region token for scoped requests.
pub struct FirehoseSource {
    buffer: Arc<PostBuffer>,
}

impl FirehoseSource {
    #[must_use]
    pub fn new(buffer: Arc<PostBuffer>) -> Self {
        Self { buffer }
    }
}

#[async_trait]
impl SourceClient for FirehoseSource {
    fn source(&self) -> SourceTag {
        SourceTag::Bluesky
    }

    async fn fetch(&self, scope: &FetchScope) -> SourceOutcome {
        let posts = if scope.is_global() {
            self.buffer.snapshot(None)
        } else {
            let token = main_region_token(&scope.region_query);
            self.buffer.snapshot(Some(&token))
        };

        if posts.is_empty() {
            SourceOutcome::Empty
        } else {
            SourceOutcome::Items(posts)
        }
    }
}
