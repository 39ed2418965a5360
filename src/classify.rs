//! Six-label emotion classification over the LLM backend.
//!
//! Classification is best-effort by contract: any upstream failure, malformed
//! completion, or missing credential degrades to a neutral result rather than
//! propagating. The pipeline never fails because classification did.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::{ChatModel, ChatParams, LlmError};

const CLASSIFY_SYSTEM_PROMPT: &str = "You are an emotion classifier. Classify the dominant \
emotion of the text into exactly one of: anger, sadness, fear, joy, hope, neutral. \
Respond with strict JSON only, no prose, in the form \
{\"emotion\": \"<label>\", \"confidence\": <number between 0 and 1>}.";

/// Minimum trimmed length before the model is consulted at all.
const MIN_MEANINGFUL_CHARS: usize = 3;

/// The fixed six-way emotion enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Anger,
    Sadness,
    Fear,
    Joy,
    Hope,
    Neutral,
}

impl Emotion {
    pub const ALL: [Self; 6] = [
        Self::Anger,
        Self::Sadness,
        Self::Fear,
        Self::Joy,
        Self::Hope,
        Self::Neutral,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anger => "anger",
            Self::Sadness => "sadness",
            Self::Fear => "fear",
            Self::Joy => "joy",
            Self::Hope => "hope",
            Self::Neutral => "neutral",
        }
    }

    /// Parse a model-supplied label; anything unrecognized coerces to neutral.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "anger" => Self::Anger,
            "sadness" => Self::Sadness,
            "fear" => Self::Fear,
            "joy" => Self::Joy,
            "hope" => Self::Hope,
            _ => Self::Neutral,
        }
    }

    /// Deterministic display color per emotion, for heat-map rendering.
    #[must_use]
    pub fn color(self) -> &'static str {
        match self {
            Self::Anger => "#e53935",
            Self::Sadness => "#3949ab",
            Self::Fear => "#8e24aa",
            Self::Joy => "#fdd835",
            Self::Hope => "#43a047",
            Self::Neutral => "#9e9e9e",
        }
    }
}

/// Output of classifying one text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionResult {
    pub emotion: Emotion,
    pub confidence: f64,
}

impl EmotionResult {
    #[must_use]
    pub fn neutral(confidence: f64) -> Self {
        Self {
            emotion: Emotion::Neutral,
            confidence,
        }
    }
}

/// Per-label counts; all six keys are always present on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionsSummary {
    pub anger: usize,
    pub sadness: usize,
    pub fear: usize,
    pub joy: usize,
    pub hope: usize,
    pub neutral: usize,
}

impl EmotionsSummary {
    pub fn record(&mut self, emotion: Emotion) {
        match emotion {
            Emotion::Anger => self.anger += 1,
            Emotion::Sadness => self.sadness += 1,
            Emotion::Fear => self.fear += 1,
            Emotion::Joy => self.joy += 1,
            Emotion::Hope => self.hope += 1,
            Emotion::Neutral => self.neutral += 1,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.anger + self.sadness + self.fear + self.joy + self.hope + self.neutral
    }

    #[must_use]
    pub fn count(&self, emotion: Emotion) -> usize {
        match emotion {
            Emotion::Anger => self.anger,
            Emotion::Sadness => self.sadness,
            Emotion::Fear => self.fear,
            Emotion::Joy => self.joy,
            Emotion::Hope => self.hope,
            Emotion::Neutral => self.neutral,
        }
    }
}

/// Raw completion payload before validation.
#[derive(Debug, Deserialize)]
struct RawClassification {
    emotion: Option<String>,
    confidence: Option<f64>,
}

/// Emotion classifier backed by a [`ChatModel`].
#[derive(Clone)]
pub struct EmotionClassifier {
    model: Arc<dyn ChatModel>,
}

impl EmotionClassifier {
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Classify one text. Never fails; see module docs for the degradation
    /// ladder.
    pub async fn classify(&self, text: &str) -> EmotionResult {
        let trimmed = text.trim();
        if trimmed.chars().count() < MIN_MEANINGFUL_CHARS {
            return EmotionResult {
                emotion: Emotion::Neutral,
                confidence: 1.0,
            };
        }

        if !self.model.is_configured() {
            return EmotionResult::neutral(0.5);
        }

        let params = ChatParams {
            temperature: 0.1,
            max_tokens: 60,
        };

        match self.model.chat(CLASSIFY_SYSTEM_PROMPT, trimmed, params).await {
            Ok(content) => parse_classification(&content),
            Err(LlmError::MissingCredential) => EmotionResult::neutral(0.5),
            Err(e) => {
                warn!("Emotion classification failed, defaulting to neutral: {e}");
                EmotionResult::neutral(0.5)
            }
        }
    }

    /// Classify a batch concurrently. Results are joined positionally, so
    /// index `i` of the output always corresponds to index `i` of the input
    /// regardless of completion order.
    pub async fn classify_batch(&self, texts: &[String]) -> Vec<EmotionResult> {
        let futures = texts.iter().map(|text| self.classify(text));
        futures_util::future::join_all(futures).await
    }
}

/// Validate a raw completion into an [`EmotionResult`].
///
/// Unrecognized or missing labels coerce to neutral; missing confidence
/// defaults to 0.5; out-of-range confidence is clamped to [0, 1].
fn parse_classification(content: &str) -> EmotionResult {
    let cleaned = strip_code_fences(content);

    let Ok(raw) = serde_json::from_str::<RawClassification>(cleaned) else {
        debug!("Unparseable classifier output: {cleaned}");
        return EmotionResult::neutral(0.5);
    };

    let emotion = raw
        .emotion
        .as_deref()
        .map_or(Emotion::Neutral, Emotion::from_label);

    let confidence = raw
        .confidence
        .filter(|c| c.is_finite())
        .map_or(0.5, |c| c.clamp(0.0, 1.0));

    EmotionResult { emotion, confidence }
}

/// Models sometimes wrap JSON in markdown fences despite instructions.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted model that returns a fixed completion and counts calls.
    struct FixedModel {
        response: String,
        configured: bool,
        calls: AtomicUsize,
    }

    impl FixedModel {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                configured: true,
                calls: AtomicUsize::new(0),
            }
        }

        fn unconfigured() -> Self {
            Self {
                response: String::new(),
                configured: false,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatModel for FixedModel {
        async fn chat(
            &self,
            _system: &str,
            _user: &str,
            _params: ChatParams,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.configured {
                Ok(self.response.clone())
            } else {
                Err(LlmError::MissingCredential)
            }
        }

        fn is_configured(&self) -> bool {
            self.configured
        }
    }

    #[tokio::test]
    async fn test_short_input_short_circuits_without_model_call() {
        let model = Arc::new(FixedModel::new(r#"{"emotion":"joy","confidence":0.9}"#));
        let classifier = EmotionClassifier::new(model.clone());

        for text in ["", "  ", "a", "hi", "  ab  "] {
            let result = classifier.classify(text).await;
            assert_eq!(result.emotion, Emotion::Neutral);
            assert!((result.confidence - 1.0).abs() < f64::EPSILON);
        }
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_credential_degrades_to_half_confidence_neutral() {
        let classifier = EmotionClassifier::new(Arc::new(FixedModel::unconfigured()));
        let result = classifier.classify("a perfectly ordinary sentence").await;
        assert_eq!(result.emotion, Emotion::Neutral);
        assert!((result.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_valid_completion_is_parsed() {
        let classifier = EmotionClassifier::new(Arc::new(FixedModel::new(
            r#"{"emotion":"anger","confidence":0.85}"#,
        )));
        let result = classifier.classify("this is outrageous").await;
        assert_eq!(result.emotion, Emotion::Anger);
        assert!((result.confidence - 0.85).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_batch_preserves_input_order() {
        let classifier = EmotionClassifier::new(Arc::new(FixedModel::new(
            r#"{"emotion":"joy","confidence":0.7}"#,
        )));
        let texts = vec![
            "first happy thing".to_string(),
            "x".to_string(), // short-circuits to {neutral, 1.0}
            "third happy thing".to_string(),
        ];
        let results = classifier.classify_batch(&texts).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].emotion, Emotion::Joy);
        assert_eq!(results[1].emotion, Emotion::Neutral);
        assert!((results[1].confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(results[2].emotion, Emotion::Joy);
    }

    #[test]
    fn test_parse_clamps_out_of_range_confidence() {
        let result = parse_classification(r#"{"emotion":"fear","confidence":1.7}"#);
        assert!((result.confidence - 1.0).abs() < f64::EPSILON);

        let result = parse_classification(r#"{"emotion":"fear","confidence":-0.2}"#);
        assert!(result.confidence.abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_coerces_unknown_label_to_neutral() {
        let result = parse_classification(r#"{"emotion":"ecstatic","confidence":0.9}"#);
        assert_eq!(result.emotion, Emotion::Neutral);
    }

    #[test]
    fn test_parse_defaults_missing_confidence() {
        let result = parse_classification(r#"{"emotion":"hope"}"#);
        assert_eq!(result.emotion, Emotion::Hope);
        assert!((result.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_rejects_nan_confidence() {
        // serde_json won't produce NaN from literals, but a null sneaks past
        // the Option into the finite filter path
        let result = parse_classification(r#"{"emotion":"joy","confidence":null}"#);
        assert!((result.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_handles_garbage() {
        let result = parse_classification("<html>Service Unavailable</html>");
        assert_eq!(result.emotion, Emotion::Neutral);
        assert!((result.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_strips_code_fences() {
        let result =
            parse_classification("```json\n{\"emotion\":\"sadness\",\"confidence\":0.6}\n```");
        assert_eq!(result.emotion, Emotion::Sadness);
    }

    #[test]
    fn test_summary_record_and_total() {
        let mut summary = EmotionsSummary::default();
        summary.record(Emotion::Joy);
        summary.record(Emotion::Joy);
        summary.record(Emotion::Fear);
        assert_eq!(summary.joy, 2);
        assert_eq!(summary.fear, 1);
        assert_eq!(summary.total(), 3);
    }

    #[test]
    fn test_summary_always_serializes_all_six_keys() {
        let json = serde_json::to_value(EmotionsSummary::default()).unwrap();
        let obj = json.as_object().unwrap();
        for label in ["anger", "sadness", "fear", "joy", "hope", "neutral"] {
            assert!(obj.contains_key(label), "missing key {label}");
        }
    }

    #[test]
    fn test_emotion_from_label_case_insensitive() {
        assert_eq!(Emotion::from_label("JOY"), Emotion::Joy);
        assert_eq!(Emotion::from_label(" Hope "), Emotion::Hope);
        assert_eq!(Emotion::from_label("grief"), Emotion::Neutral);
    }
}
