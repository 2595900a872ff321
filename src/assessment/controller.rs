//! Turn controller — the conversation-state machine.
//!
//! Decides, from transcript state, whether to ask another question or
//! produce the final structured profile, and owns all session mutation.
//! Every operation locks the per-user session handle for its whole
//! duration (oracle calls included), so per-user requests are serial while
//! different users proceed in parallel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::AssessmentConfig;
use crate::error::AssessmentError;
use crate::llm::LlmProvider;
use crate::store::DocumentStore;

use super::classifier::ProfileClassifier;
use super::model::{Classification, ProfileRecord, Session, StructuredProfile, Turn};
use super::oracle::{OracleMode, QuestionOracle};
use super::parser::{ParsedAssessment, looks_like_assessment, parse_assessment};
use super::prompts::format_transcript;
use super::session::SessionStore;

/// Outcome of a `next_step` call.
#[derive(Debug, Clone)]
pub enum NextStep {
    /// Ask the user this question.
    Question { question: String },
    /// The interview is complete; these are the final artifacts.
    Final {
        profile: ProfileRecord,
        classification: Option<Classification>,
        conversation_history: Vec<Turn>,
    },
}

/// Stored classification view returned by the profile operation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProfileView {
    pub user_id: String,
    #[serde(flatten)]
    pub classification: Classification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_assessed_at: Option<DateTime<Utc>>,
}

/// Coordinates the interview flow across the session store, the question
/// oracle, the classifier, and the durable document store.
pub struct TurnController {
    sessions: Arc<dyn SessionStore>,
    documents: Arc<dyn DocumentStore>,
    oracle: QuestionOracle,
    classifier: ProfileClassifier,
    config: AssessmentConfig,
}

impl TurnController {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        documents: Arc<dyn DocumentStore>,
        llm: Arc<dyn LlmProvider>,
        config: AssessmentConfig,
    ) -> Self {
        Self {
            sessions,
            documents,
            oracle: QuestionOracle::new(Arc::clone(&llm)),
            classifier: ProfileClassifier::new(llm),
            config,
        }
    }

    /// Advance the interview for `user_id` by one step.
    ///
    /// - Brand-new session: returns the fixed opening question, no oracle call.
    /// - Open turn pending: re-returns the open question (a second call must
    ///   not create a second open turn).
    /// - Fewer than five answered turns: asks the oracle for the next
    ///   personalized question and appends it as a new open turn.
    /// - Five answered turns: requests the final assessment, parses it,
    ///   classifies on success, and persists the artifacts on the session.
    /// - Already finalized: returns the stored artifacts unchanged.
    pub async fn next_step(&self, user_id: &str) -> Result<NextStep, AssessmentError> {
        let handle = self.sessions.get_or_create(user_id).await;
        let mut session = handle.lock().await;

        if let Some(profile) = session.profile.clone() {
            return Ok(self.stored_final(&mut session, profile).await);
        }

        if session.turns.is_empty() {
            let question = self.config.opening_question.clone();
            debug!(user_id, "New session; returning opening question");
            session.append_question(&question);
            return Ok(NextStep::Question { question });
        }

        if let Some(open) = session.open_turn() {
            debug!(user_id, "Open turn pending; re-returning its question");
            return Ok(NextStep::Question {
                question: open.question.clone(),
            });
        }

        let answered = session.answered_count();
        let transcript = format_transcript(&session.turns);

        if answered < self.config.question_target {
            let question = self
                .oracle
                .generate(
                    &transcript,
                    OracleMode::NextQuestion {
                        question_number: answered + 1,
                    },
                )
                .await?;
            // The answered-turn count is authoritative; the content sniff is
            // only advisory here.
            if looks_like_assessment(&question) {
                warn!(
                    user_id,
                    answered,
                    "Oracle output resembles an assessment before the answer target; treating as a question"
                );
            }
            debug!(user_id, answered, "Appending oracle question");
            session.append_question(&question);
            return Ok(NextStep::Question { question });
        }

        let raw = self
            .oracle
            .generate(&transcript, OracleMode::FinalAssessment)
            .await?;
        if !looks_like_assessment(&raw) {
            warn!(
                user_id,
                raw = %truncate(&raw, 200),
                "Final-assessment output does not look like an assessment payload"
            );
        }

        match parse_assessment(&raw) {
            ParsedAssessment::Full(profile) => {
                Ok(self.finalize(&mut session, profile).await)
            }
            ParsedAssessment::Partial(profile) => {
                warn!(
                    user_id,
                    fields = profile.field_count(),
                    "Assessment parsed partially"
                );
                Ok(self.finalize(&mut session, profile).await)
            }
            ParsedAssessment::None => {
                warn!(
                    user_id,
                    raw = %truncate(&raw, 200),
                    "Assessment could not be parsed; storing raw oracle output"
                );
                let profile = ProfileRecord::Raw(raw);
                session.profile = Some(profile.clone());
                session.profile_assessed_at = Some(Utc::now());
                Ok(NextStep::Final {
                    profile,
                    classification: None,
                    conversation_history: session.turns.clone(),
                })
            }
        }
    }

    /// Record the user's answer on the most recently appended open turn.
    /// Returns the number of completed Q&A pairs.
    pub async fn submit_response(
        &self,
        user_id: &str,
        response: &str,
    ) -> Result<usize, AssessmentError> {
        if response.trim().is_empty() {
            return Err(AssessmentError::Validation(
                "user_response must not be empty".to_string(),
            ));
        }

        let handle = self
            .sessions
            .get(user_id)
            .await
            .ok_or_else(|| AssessmentError::NotFound(user_id.to_string()))?;
        let mut session = handle.lock().await;

        let turn = session
            .open_turn_mut()
            .ok_or_else(|| AssessmentError::NoOpenTurn(user_id.to_string()))?;
        turn.response = Some(response.to_string());

        let completed = session.answered_count();
        info!(user_id, completed, "Response recorded");
        Ok(completed)
    }

    /// Snapshot of the full session for the history endpoint.
    pub async fn history(&self, user_id: &str) -> Result<Session, AssessmentError> {
        let handle = self
            .sessions
            .get(user_id)
            .await
            .ok_or_else(|| AssessmentError::NotFound(user_id.to_string()))?;
        let session = handle.lock().await;
        Ok(session.clone())
    }

    /// Stored classification for `user_id`, computing it on demand when a
    /// structured profile exists but classification doesn't (or is still
    /// `Unknown`).
    pub async fn profile(&self, user_id: &str) -> Result<ProfileView, AssessmentError> {
        let handle = self
            .sessions
            .get(user_id)
            .await
            .ok_or_else(|| AssessmentError::NotFound(user_id.to_string()))?;
        let mut session = handle.lock().await;

        if let Some(classification) = &session.classification {
            if classification.is_resolved() {
                return Ok(ProfileView {
                    user_id: user_id.to_string(),
                    classification: classification.clone(),
                    profile_assessed_at: session.profile_assessed_at,
                });
            }
        }

        let structured = session
            .profile
            .as_ref()
            .and_then(ProfileRecord::as_structured)
            .cloned()
            .ok_or_else(|| AssessmentError::NoAssessment(user_id.to_string()))?;

        info!(user_id, "No stored classification; classifying now");
        let classification = self.classifier.classify(&structured).await?;
        session.classification = Some(classification.clone());
        Ok(ProfileView {
            user_id: user_id.to_string(),
            classification,
            profile_assessed_at: session.profile_assessed_at,
        })
    }

    /// Durably write the transcript and derived artifacts to the document
    /// store, merged into the user's existing document.
    pub async fn persist(&self, user_id: &str) -> Result<(), AssessmentError> {
        let handle = self
            .sessions
            .get(user_id)
            .await
            .ok_or_else(|| AssessmentError::NotFound(user_id.to_string()))?;
        let session = handle.lock().await;

        let profile = session
            .profile
            .as_ref()
            .ok_or_else(|| AssessmentError::NoAssessment(user_id.to_string()))?;

        let document = json!({
            "cognitive_profile": {
                "assessment": profile,
                "conversation_history": session.answered_turns().collect::<Vec<_>>(),
                "classification": session.classification,
                "is_final": true,
                "assessed_at": session.profile_assessed_at,
            }
        });

        self.documents.write(user_id, &document, true).await?;
        info!(user_id, "Cognitive profile persisted");
        Ok(())
    }

    /// Delete the session for `user_id`.
    pub async fn clear(&self, user_id: &str) -> Result<(), AssessmentError> {
        if self.sessions.remove(user_id).await {
            Ok(())
        } else {
            Err(AssessmentError::NotFound(user_id.to_string()))
        }
    }

    /// Number of live sessions (health endpoint).
    pub async fn active_sessions(&self) -> usize {
        self.sessions.active_count().await
    }

    /// Classify and persist a successfully parsed profile on the session.
    /// A classifier failure is not fatal: the profile is kept and the
    /// classification stays pending, recomputable via the profile route.
    async fn finalize(&self, session: &mut Session, profile: StructuredProfile) -> NextStep {
        let classification = match self.classifier.classify(&profile).await {
            Ok(classification) => Some(classification),
            Err(e) => {
                warn!(
                    user_id = %session.user_id,
                    error = %e,
                    "Classification failed; leaving it pending"
                );
                None
            }
        };

        let record = ProfileRecord::Structured(profile);
        session.profile = Some(record.clone());
        session.classification = classification.clone();
        session.profile_assessed_at = Some(Utc::now());
        info!(user_id = %session.user_id, "Final assessment recorded");

        NextStep::Final {
            profile: record,
            classification,
            conversation_history: session.turns.clone(),
        }
    }

    /// Re-return the stored final artifacts, backfilling a missing
    /// classification when a structured profile is available.
    async fn stored_final(&self, session: &mut Session, profile: ProfileRecord) -> NextStep {
        let needs_classification = session
            .classification
            .as_ref()
            .is_none_or(|c| !c.is_resolved());
        if needs_classification {
            if let Some(structured) = profile.as_structured() {
                match self.classifier.classify(structured).await {
                    Ok(classification) => session.classification = Some(classification),
                    Err(e) => warn!(
                        user_id = %session.user_id,
                        error = %e,
                        "Deferred classification still failing"
                    ),
                }
            }
        }

        NextStep::Final {
            profile,
            classification: session.classification.clone(),
            conversation_history: session.turns.clone(),
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::assessment::model::ProfileLabel;
    use crate::assessment::session::MemorySessionStore;
    use crate::error::LlmError;
    use crate::llm::{CompletionRequest, CompletionResponse};
    use crate::store::MemoryDocumentStore;

    const FULL_ASSESSMENT: &str = r#"{
        "working_memory": {"score": 7, "level": "high", "explanation": "retains detail"},
        "attention_control": {"score": 5, "level": "moderate", "explanation": "some drift"},
        "learning_style": {"type": "visual", "explanation": "prefers diagrams"},
        "planning_orientation": {"score": 8, "level": "high", "explanation": "plans ahead"},
        "decision_making": {"type": "analytical", "explanation": "weighs options"}
    }"#;

    const CLASSIFICATION_REPLY: &str =
        "Classification: Strategic Planner\nRationale: Strong planning with analytical decisions.";

    /// Scripted provider: pops canned replies in order, errors when the
    /// script runs out.
    struct ScriptedProvider {
        responses: Mutex<VecDeque<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl crate::llm::LlmProvider for ScriptedProvider {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.responses.lock().unwrap().pop_front() {
                Some(content) => Ok(CompletionResponse { content }),
                None => Err(LlmError::RequestFailed {
                    provider: "scripted".to_string(),
                    reason: "script exhausted".to_string(),
                }),
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    struct Harness {
        controller: TurnController,
        provider: Arc<ScriptedProvider>,
        documents: Arc<MemoryDocumentStore>,
        sessions: Arc<MemorySessionStore>,
    }

    fn harness(responses: &[&str]) -> Harness {
        let provider = ScriptedProvider::new(responses);
        let documents = Arc::new(MemoryDocumentStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let controller = TurnController::new(
            Arc::clone(&sessions) as Arc<dyn SessionStore>,
            Arc::clone(&documents) as Arc<dyn DocumentStore>,
            Arc::clone(&provider) as Arc<dyn crate::llm::LlmProvider>,
            AssessmentConfig::default(),
        );
        Harness {
            controller,
            provider,
            documents,
            sessions,
        }
    }

    async fn assert_one_open_turn_at_most(h: &Harness, user_id: &str) {
        let handle = h.sessions.get(user_id).await.unwrap();
        let session = handle.lock().await;
        let open = session.turns.iter().filter(|t| t.is_open()).count();
        assert!(open <= 1, "expected at most one open turn, found {open}");
    }

    fn expect_question(step: NextStep) -> String {
        match step {
            NextStep::Question { question } => question,
            NextStep::Final { .. } => panic!("expected a question, got final"),
        }
    }

    /// Drive a full five-answer interview.
    async fn run_interview(h: &Harness, user_id: &str) {
        for i in 0..5 {
            let step = h.controller.next_step(user_id).await.unwrap();
            expect_question(step);
            let completed = h
                .controller
                .submit_response(user_id, &format!("answer {}", i + 1))
                .await
                .unwrap();
            assert_eq!(completed, i + 1);
            assert_one_open_turn_at_most(h, user_id).await;
        }
    }

    #[tokio::test]
    async fn first_step_returns_opening_question_without_oracle() {
        let h = harness(&[]);
        let step = h.controller.next_step("u1").await.unwrap();
        let question = expect_question(step);
        assert_eq!(question, crate::config::DEFAULT_OPENING_QUESTION);
        assert_eq!(h.provider.call_count(), 0);
        assert_one_open_turn_at_most(&h, "u1").await;
    }

    #[tokio::test]
    async fn repeated_next_step_does_not_duplicate_open_turn() {
        let h = harness(&[]);
        let first = expect_question(h.controller.next_step("u1").await.unwrap());
        let second = expect_question(h.controller.next_step("u1").await.unwrap());
        assert_eq!(first, second);
        assert_eq!(h.provider.call_count(), 0);

        let handle = h.sessions.get("u1").await.unwrap();
        assert_eq!(handle.lock().await.turns.len(), 1);
    }

    #[tokio::test]
    async fn full_interview_produces_profile_and_classification() {
        let h = harness(&[
            "\"Question two?\"",
            "Question three?",
            "Question four?",
            "Question five?",
            FULL_ASSESSMENT,
            CLASSIFICATION_REPLY,
        ]);
        run_interview(&h, "u1").await;

        let step = h.controller.next_step("u1").await.unwrap();
        let NextStep::Final {
            profile,
            classification,
            conversation_history,
        } = step
        else {
            panic!("expected final step after five answers");
        };

        let structured = profile.as_structured().expect("structured profile");
        assert!(structured.is_complete());
        let classification = classification.expect("classification present");
        assert_eq!(classification.label, ProfileLabel::StrategicPlanner);
        assert!(
            ProfileLabel::CATEGORIES.contains(&classification.label),
            "label must come from the fixed category set"
        );
        assert_eq!(conversation_history.len(), 5);
        // 4 follow-up questions + 1 assessment + 1 classification.
        assert_eq!(h.provider.call_count(), 6);
    }

    #[tokio::test]
    async fn second_question_strips_surrounding_quotes() {
        let h = harness(&["\"What did you mean by that?\""]);
        expect_question(h.controller.next_step("u1").await.unwrap());
        h.controller.submit_response("u1", "first answer").await.unwrap();

        let question = expect_question(h.controller.next_step("u1").await.unwrap());
        assert_eq!(question, "What did you mean by that?");
    }

    #[tokio::test]
    async fn finalized_session_is_idempotent() {
        let h = harness(&[
            "Q2", "Q3", "Q4", "Q5",
            FULL_ASSESSMENT,
            CLASSIFICATION_REPLY,
        ]);
        run_interview(&h, "u1").await;
        h.controller.next_step("u1").await.unwrap();
        let calls_after_final = h.provider.call_count();

        // Re-requesting must return the stored artifacts with no new calls.
        let step = h.controller.next_step("u1").await.unwrap();
        assert!(matches!(step, NextStep::Final { .. }));
        assert_eq!(h.provider.call_count(), calls_after_final);

        let view = h.controller.profile("u1").await.unwrap();
        assert_eq!(view.classification.label, ProfileLabel::StrategicPlanner);
        assert_eq!(h.provider.call_count(), calls_after_final);
    }

    #[tokio::test]
    async fn submit_for_unknown_user_is_not_found() {
        let h = harness(&[]);
        let err = h.controller.submit_response("ghost", "hello").await.unwrap_err();
        assert!(matches!(err, AssessmentError::NotFound(_)));
    }

    #[tokio::test]
    async fn double_submit_fails_with_no_open_turn() {
        let h = harness(&[]);
        h.controller.next_step("u1").await.unwrap();
        h.controller.submit_response("u1", "answer").await.unwrap();

        let err = h.controller.submit_response("u1", "again").await.unwrap_err();
        assert!(matches!(err, AssessmentError::NoOpenTurn(_)));
        assert_one_open_turn_at_most(&h, "u1").await;
    }

    #[tokio::test]
    async fn empty_response_is_rejected() {
        let h = harness(&[]);
        h.controller.next_step("u1").await.unwrap();
        let err = h.controller.submit_response("u1", "   ").await.unwrap_err();
        assert!(matches!(err, AssessmentError::Validation(_)));
    }

    #[tokio::test]
    async fn unparseable_assessment_degrades_to_raw_profile() {
        let h = harness(&[
            "Q2", "Q3", "Q4", "Q5",
            "I am sorry, I refuse to emit JSON today.",
        ]);
        run_interview(&h, "u1").await;

        let step = h.controller.next_step("u1").await.unwrap();
        let NextStep::Final {
            profile,
            classification,
            ..
        } = step
        else {
            panic!("expected degraded final step");
        };
        assert_eq!(
            profile,
            ProfileRecord::Raw("I am sorry, I refuse to emit JSON today.".to_string())
        );
        assert!(classification.is_none());

        // No structured profile means the profile route reports NoAssessment.
        let err = h.controller.profile("u1").await.unwrap_err();
        assert!(matches!(err, AssessmentError::NoAssessment(_)));
    }

    #[tokio::test]
    async fn classifier_failure_leaves_classification_pending() {
        // Script ends right after the assessment, so the classify call fails.
        let h = harness(&["Q2", "Q3", "Q4", "Q5", FULL_ASSESSMENT]);
        run_interview(&h, "u1").await;

        let step = h.controller.next_step("u1").await.unwrap();
        let NextStep::Final {
            profile,
            classification,
            ..
        } = step
        else {
            panic!("expected final step");
        };
        assert!(profile.as_structured().is_some());
        assert!(classification.is_none());

        // A later profile call retries classification once the oracle is back.
        h.provider
            .responses
            .lock()
            .unwrap()
            .push_back(CLASSIFICATION_REPLY.to_string());
        let view = h.controller.profile("u1").await.unwrap();
        assert_eq!(view.classification.label, ProfileLabel::StrategicPlanner);
    }

    #[tokio::test]
    async fn oracle_failure_leaves_session_unchanged() {
        let h = harness(&[]);
        h.controller.next_step("u1").await.unwrap();
        h.controller.submit_response("u1", "answer").await.unwrap();

        // Script is empty: the question-generation call fails.
        let err = h.controller.next_step("u1").await.unwrap_err();
        assert!(matches!(err, AssessmentError::OracleUnavailable(_)));

        let handle = h.sessions.get("u1").await.unwrap();
        let session = handle.lock().await;
        assert_eq!(session.turns.len(), 1, "no turn may be appended on failure");
        assert!(session.open_turn().is_none());
    }

    #[tokio::test]
    async fn persist_requires_assessment_then_merges_document() {
        let h = harness(&[
            "Q2", "Q3", "Q4", "Q5",
            FULL_ASSESSMENT,
            CLASSIFICATION_REPLY,
        ]);
        h.controller.next_step("u1").await.unwrap();
        h.controller.submit_response("u1", "a1").await.unwrap();

        let err = h.controller.persist("u1").await.unwrap_err();
        assert!(matches!(err, AssessmentError::NoAssessment(_)));

        for i in 1..5 {
            h.controller.next_step("u1").await.unwrap();
            h.controller
                .submit_response("u1", &format!("a{}", i + 1))
                .await
                .unwrap();
        }
        h.controller.next_step("u1").await.unwrap();
        h.controller.persist("u1").await.unwrap();

        let doc = h.documents.read("u1").await.unwrap().expect("document written");
        let profile_doc = &doc["cognitive_profile"];
        assert_eq!(profile_doc["is_final"], true);
        assert_eq!(
            profile_doc["classification"]["profile_label"],
            "Strategic Planner"
        );
        assert_eq!(
            profile_doc["conversation_history"].as_array().unwrap().len(),
            5
        );
        assert!(profile_doc["assessment"]["working_memory"].is_object());
    }

    #[tokio::test]
    async fn clear_removes_session_and_history_404s() {
        let h = harness(&[]);
        h.controller.next_step("u1").await.unwrap();
        assert_eq!(h.controller.active_sessions().await, 1);

        h.controller.clear("u1").await.unwrap();
        assert_eq!(h.controller.active_sessions().await, 0);

        let err = h.controller.history("u1").await.unwrap_err();
        assert!(matches!(err, AssessmentError::NotFound(_)));
        let err = h.controller.clear("u1").await.unwrap_err();
        assert!(matches!(err, AssessmentError::NotFound(_)));
    }
}
