//! Prompt templates and transcript formatting for the interview oracle
//! and the profile classifier.

use crate::assessment::model::Turn;

/// System prompt for the adaptive questioning oracle.
pub const ASSESSMENT_SYSTEM_PROMPT: &str = "\
You are a cognitive assessment expert specializing in dynamic questioning. Your goal is to \
evaluate a user's cognitive traits through an adaptive interview process.

For each interaction, analyze the user's previous responses carefully and generate a highly \
personalized follow-up question that builds upon their specific answers. Your questions should \
probe deeper into the following cognitive dimensions:

1. Working memory - How they process and retain information temporarily
2. Attention control - How they focus and filter distractions
3. Learning style - Whether they prefer visual, auditory, or kinesthetic learning
4. Planning orientation - How they approach tasks and organize their thinking
5. Decision-making style - Whether they rely more on intuition or analytical thinking

IMPORTANT RESPONSE FORMAT RULES:
- When asked to generate a question, provide ONLY the text of your question with no preamble, \
JSON wrapping, or analysis.
- Do not include any cognitive trait assessments with your questions.
- Make sure each question directly references content from the previous answer.
- Generic follow-up questions are not acceptable.
- Only provide the final assessment JSON when explicitly asked for it, never earlier.";

/// System prompt for the profile classifier.
pub const CLASSIFIER_SYSTEM_PROMPT: &str = "\
You are an expert cognitive scientist who classifies learners into profiles based on traits \
like working memory, attention, learning style, and decision making.";

/// The JSON schema the oracle must emit for the final assessment.
const ASSESSMENT_SCHEMA: &str = r#"{
  "working_memory": {"score": <int 1-10>, "level": "<low/moderate/high>", "explanation": "<brief evidence-based rationale>"},
  "attention_control": {"score": <int 1-10>, "level": "<low/moderate/high>", "explanation": "<brief evidence-based rationale>"},
  "learning_style": {"type": "<visual/auditory/kinesthetic>", "explanation": "<brief evidence-based rationale>"},
  "planning_orientation": {"score": <int 1-10>, "level": "<low/moderate/high>", "explanation": "<brief evidence-based rationale>"},
  "decision_making": {"type": "<intuitive/analytical>", "explanation": "<brief evidence-based rationale>"}
}"#;

/// Format a transcript for the oracle: ordered `Q<k>:` / `A<k>:` lines,
/// 1-indexed, interleaved in turn order.
///
/// This exact shape is part of the oracle contract — it anchors follow-up
/// generation to prior content.
pub fn format_transcript(turns: &[Turn]) -> String {
    let mut lines = Vec::with_capacity(turns.len() * 2);
    for (idx, turn) in turns.iter().enumerate() {
        if !turn.question.is_empty() {
            lines.push(format!("Q{}: {}", idx + 1, turn.question));
        }
        if let Some(response) = turn.response.as_deref() {
            if !response.is_empty() {
                lines.push(format!("A{}: {}", idx + 1, response));
            }
        }
    }
    lines.join("\n")
}

/// Task prompt asking the oracle for question number `question_number`.
pub fn next_question_prompt(transcript: &str, question_number: usize) -> String {
    format!(
        "Based on this conversation history:\n\
         {transcript}\n\n\
         Generate the next most relevant and personalized question (question #{question_number}).\n\n\
         IMPORTANT: Your response must ONLY contain the text of your next question, with no JSON \
         wrapping, no cognitive trait analysis, no explanations or commentary.\n\n\
         The question should directly reference content from their previous answer."
    )
}

/// Task prompt asking the oracle for the final five-trait assessment.
pub fn final_assessment_prompt(transcript: &str) -> String {
    format!(
        "Based on this conversation history:\n\
         {transcript}\n\n\
         The user has completed all 5 questions. Provide ONLY the final cognitive assessment in \
         this JSON format:\n{ASSESSMENT_SCHEMA}"
    )
}

/// Task prompt asking the classifier for a category label and rationale.
pub fn classification_prompt(profile_json: &str) -> String {
    format!(
        "You are given a cognitive assessment result in JSON format.\n\
         Analyze the scores and descriptions for:\n\
         - Working memory\n\
         - Attention control\n\
         - Learning style\n\
         - Planning orientation\n\
         - Decision making\n\n\
         Then classify the user into ONE of the following cognitive profiles:\n\
         - Methodical Thinker\n\
         - Adaptive Learner\n\
         - Strategic Planner\n\
         - Analytical Problem Solver\n\
         - Experimental Explorer\n\n\
         Provide a classification label and a short rationale.\n\n\
         INPUT:\n\
         {profile_json}\n\n\
         OUTPUT FORMAT:\n\
         Classification: <Profile Name>\n\
         Rationale: <Why this profile fits based on traits>"
    )
}
