//! Question oracle adapter — wraps the LLM behind the two interview modes.

use std::sync::Arc;

use crate::error::AssessmentError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

use super::prompts::{
    ASSESSMENT_SYSTEM_PROMPT, final_assessment_prompt, next_question_prompt,
};

/// Which kind of output the oracle is being asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleMode {
    /// Generate follow-up question number `question_number` (1-indexed).
    NextQuestion { question_number: usize },
    /// Produce the final five-trait assessment payload.
    FinalAssessment,
}

/// Adapter over the text-generation backend.
///
/// Oracle failures surface as [`AssessmentError::OracleUnavailable`] rather
/// than raw provider errors; the caller decides whether to retry or degrade.
pub struct QuestionOracle {
    llm: Arc<dyn LlmProvider>,
}

impl QuestionOracle {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Run one oracle call for the given transcript and mode. The returned
    /// text is trimmed and stripped of surrounding quotes but otherwise
    /// unmodified.
    pub async fn generate(
        &self,
        transcript: &str,
        mode: OracleMode,
    ) -> Result<String, AssessmentError> {
        let task = match mode {
            OracleMode::NextQuestion { question_number } => {
                next_question_prompt(transcript, question_number)
            }
            OracleMode::FinalAssessment => final_assessment_prompt(transcript),
        };

        let request = CompletionRequest::new(vec![
            ChatMessage::system(ASSESSMENT_SYSTEM_PROMPT),
            ChatMessage::user(task),
        ])
        .with_max_tokens(1024)
        .with_temperature(0.7);

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|e| AssessmentError::OracleUnavailable(e.to_string()))?;

        Ok(sanitize_oracle_text(&response.content))
    }
}

/// Trim whitespace and strip one pair of symmetric surrounding quotes.
pub fn sanitize_oracle_text(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    stripped.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_quotes_and_whitespace() {
        assert_eq!(sanitize_oracle_text("  \"What next?\"  \n"), "What next?");
        assert_eq!(sanitize_oracle_text("plain question"), "plain question");
        // Asymmetric quotes are left alone.
        assert_eq!(sanitize_oracle_text("\"unbalanced"), "\"unbalanced");
        assert_eq!(sanitize_oracle_text(""), "");
    }

    #[test]
    fn sanitize_keeps_interior_quotes() {
        assert_eq!(
            sanitize_oracle_text("\"You said \\\"maps\\\" earlier — why?\""),
            "You said \\\"maps\\\" earlier — why?"
        );
    }
}
