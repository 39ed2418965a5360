//! Grounded chat: answers a user question about a region using only the
//! evidence the pipeline already produced for it.

use std::sync::Arc;

use tracing::debug;

use crate::classify::{Emotion, EmotionsSummary};
use crate::error::PipelineError;
use crate::llm::{ChatModel, ChatParams, LlmError};
use crate::pipeline::TopPost;

/// Moderate temperature for response variety; answers are grounded by the
/// prompt, not by determinism.
const CHAT_TEMPERATURE: f32 = 0.7;
const CHAT_MAX_TOKENS: u32 = 500;
const QUESTION_MAX_CHARS: usize = 2000;

const CHAT_SYSTEM_PROMPT: &str = "\
You are a calm, neutral analyst of public mood in a geographic region. \
Answer the user's question using ONLY the evidence posts and emotion counts \
provided. Cite posts by their number, like [3], when you draw on them. Never \
invent facts, events, or posts that are not in the evidence. If the evidence \
is thin (few posts or low counts), say so explicitly rather than overstating. \
Keep answers concise and conversational.";

pub struct ChatResponder {
    model: Arc<dyn ChatModel>,
}

impl ChatResponder {
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Answer a question about a region, grounded in the supplied summary and
    /// evidence posts.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank or oversized question, `MissingCredential`
    /// when no LLM credential is configured, `RateLimited`/`LlmFailed` on
    /// upstream failure, and `EmptyAnswer` when the model returns a
    /// successful but empty completion.
    pub async fn answer(
        &self,
        question: &str,
        summary: &EmotionsSummary,
        sample_posts: &[TopPost],
        region: &str,
    ) -> Result<String, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::InvalidInput {
                field: "question".to_string(),
                message: "question must be a non-empty string".to_string(),
            });
        }
        if question.chars().count() > QUESTION_MAX_CHARS {
            return Err(PipelineError::InvalidInput {
                field: "question".to_string(),
                message: format!("question exceeds {QUESTION_MAX_CHARS} characters"),
            });
        }

        let user_message = build_user_message(question, summary, sample_posts, region);
        debug!(region, posts = sample_posts.len(), "Forwarding chat question");

        let answer = self
            .model
            .chat(
                CHAT_SYSTEM_PROMPT,
                &user_message,
                ChatParams {
                    temperature: CHAT_TEMPERATURE,
                    max_tokens: CHAT_MAX_TOKENS,
                },
            )
            .await
            .map_err(|e| match e {
                LlmError::MissingCredential => PipelineError::MissingCredential {
                    name: "LLM_API_KEY".to_string(),
                },
                LlmError::RateLimited(info) => PipelineError::RateLimited { info },
                LlmError::EmptyContent => PipelineError::EmptyAnswer,
                other => PipelineError::LlmFailed {
                    reason: other.to_string(),
                },
            })?;

        let answer = answer.trim().to_string();
        if answer.is_empty() {
            return Err(PipelineError::EmptyAnswer);
        }
        Ok(answer)
    }
}

/// Build the user message: question, region-and-count summary (narrowed to
/// the emotions the question mentions, when it mentions any), and the
/// numbered, emotion-tagged evidence posts.
fn build_user_message(
    question: &str,
    summary: &EmotionsSummary,
    sample_posts: &[TopPost],
    region: &str,
) -> String {
    let region_label = if region.trim().is_empty() {
        "the world"
    } else {
        region
    };

    let mentioned: Vec<Emotion> = Emotion::ALL
        .iter()
        .copied()
        .filter(|emotion| {
            question
                .to_lowercase()
                .contains(emotion.as_str())
        })
        .collect();
    let shown: &[Emotion] = if mentioned.is_empty() {
        &Emotion::ALL
    } else {
        &mentioned
    };

    let counts = shown
        .iter()
        .map(|&emotion| format!("{}: {}", emotion.as_str(), summary.count(emotion)))
        .collect::<Vec<_>>()
        .join(", ");

    let mut message = format!(
        "Region: {region_label}\nEmotion counts: {counts}\n\nEvidence posts:\n"
    );
    if sample_posts.is_empty() {
        message.push_str("(none available)\n");
    } else {
        for (index, post) in sample_posts.iter().enumerate() {
            message.push_str(&format!(
                "[{}] ({}) {}\n",
                index + 1,
                post.emotion.as_str(),
                post.text
            ));
        }
    }
    message.push_str(&format!("\nQuestion: {question}"));
    message
}
