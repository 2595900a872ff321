//! Profile classifier — maps a structured profile onto one of the five
//! cognitive categories.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::error::AssessmentError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

use super::model::{Classification, ProfileLabel, StructuredProfile};
use super::prompts::{CLASSIFIER_SYSTEM_PROMPT, classification_prompt};

pub struct ProfileClassifier {
    llm: Arc<dyn LlmProvider>,
}

impl ProfileClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Classify a structured profile. Never fails on malformed classifier
    /// output: if no label can be extracted the result carries
    /// `ProfileLabel::Unknown`, which callers treat as "classification
    /// pending" and may retry.
    pub async fn classify(
        &self,
        profile: &StructuredProfile,
    ) -> Result<Classification, AssessmentError> {
        let profile_json = serde_json::to_string_pretty(profile)
            .map_err(|e| AssessmentError::Validation(format!("unserializable profile: {e}")))?;

        let request = CompletionRequest::new(vec![
            ChatMessage::system(CLASSIFIER_SYSTEM_PROMPT),
            ChatMessage::user(classification_prompt(&profile_json)),
        ])
        .with_max_tokens(512)
        .with_temperature(0.7);

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|e| AssessmentError::OracleUnavailable(e.to_string()))?;

        let classification = parse_classification(&response.content);
        if !classification.is_resolved() {
            tracing::warn!(
                raw = %truncate(&response.content, 200),
                "classifier output yielded no recognizable label"
            );
        }
        Ok(classification)
    }
}

static CLASSIFICATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Classification:\s*(.+?)(?:\n|$)").expect("valid regex"));
static RATIONALE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Rationale:\s*(.+)\z").expect("valid regex"));

/// Parse the classifier's `Classification: <label>` / `Rationale: <text>`
/// template. Splits on the literal `Rationale:` marker first; falls back to
/// independent pattern searches if the template is mangled.
pub fn parse_classification(text: &str) -> Classification {
    if text.contains("Classification:") && text.contains("Rationale:") {
        if let Some((head, tail)) = text.split_once("Rationale:") {
            let label_text = head.replace("Classification:", "");
            return Classification {
                label: ProfileLabel::from_text(label_text.trim()),
                rationale: tail.trim().to_string(),
            };
        }
    }

    let label = CLASSIFICATION_RE
        .captures(text)
        .map(|c| ProfileLabel::from_text(c[1].trim()))
        .unwrap_or(ProfileLabel::Unknown);
    let rationale = RATIONALE_RE
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();

    Classification { label, rationale }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
