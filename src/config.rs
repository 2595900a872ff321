//! Configuration types.

/// The question every interview opens with. Returned verbatim on the first
/// `next-step` call, with no oracle involvement.
pub const DEFAULT_OPENING_QUESTION: &str = "How do you typically approach learning something completely new? Please describe your process and preferences.";

/// Interview configuration.
#[derive(Debug, Clone)]
pub struct AssessmentConfig {
    /// Fixed opening question for a brand-new session.
    pub opening_question: String,
    /// Number of answered turns required before the final assessment.
    pub question_target: usize,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            opening_question: DEFAULT_OPENING_QUESTION.to_string(),
            question_target: 5,
        }
    }
}
