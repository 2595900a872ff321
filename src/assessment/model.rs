//! Interview session and cognitive profile data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One question/response pair in a session's transcript.
///
/// A turn is "open" while `response` is unset. Invariant: at most one open
/// turn exists per session at any time, and it is always the newest turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    #[serde(default)]
    pub response: Option<String>,
}

impl Turn {
    pub fn open(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            response: None,
        }
    }

    /// Whether this turn still awaits a response.
    pub fn is_open(&self) -> bool {
        self.response.is_none()
    }

    /// Whether this turn has a non-empty response recorded.
    pub fn is_answered(&self) -> bool {
        self.response
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty())
    }
}

/// Qualitative band for a 1–10 scored trait.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TraitLevel {
    Low,
    Moderate,
    High,
}

/// A scored cognitive trait (working memory, attention control,
/// planning orientation).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScaledTrait {
    /// Score on a 1–10 scale.
    pub score: u8,
    pub level: TraitLevel,
    pub explanation: String,
}

/// Preferred learning modality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LearningStyle {
    Visual,
    Auditory,
    Kinesthetic,
}

/// The user's learning-style trait.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LearningTrait {
    #[serde(rename = "type")]
    pub style: LearningStyle,
    pub explanation: String,
}

/// Dominant decision-making mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStyle {
    Intuitive,
    Analytical,
}

/// The user's decision-making trait.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecisionTrait {
    #[serde(rename = "type")]
    pub style: DecisionStyle,
    pub explanation: String,
}

/// The five-trait assessment payload produced after five answered turns.
///
/// Fields are optional because the output parser may only recover a subset
/// of the oracle's payload; `is_complete` distinguishes a full profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructuredProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_memory: Option<ScaledTrait>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attention_control: Option<ScaledTrait>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_style: Option<LearningTrait>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning_orientation: Option<ScaledTrait>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_making: Option<DecisionTrait>,
}

impl StructuredProfile {
    /// The five trait field names, in schema order.
    pub const FIELD_NAMES: [&'static str; 5] = [
        "working_memory",
        "attention_control",
        "learning_style",
        "planning_orientation",
        "decision_making",
    ];

    /// Number of trait fields present.
    pub fn field_count(&self) -> usize {
        [
            self.working_memory.is_some(),
            self.attention_control.is_some(),
            self.learning_style.is_some(),
            self.planning_orientation.is_some(),
            self.decision_making.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    /// Whether all five trait fields are present.
    pub fn is_complete(&self) -> bool {
        self.field_count() == Self::FIELD_NAMES.len()
    }
}

/// The persisted profile artifact: either a parsed structured profile, or
/// the oracle's raw text when no fields could be recovered (degraded mode).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ProfileRecord {
    Structured(StructuredProfile),
    Raw(String),
}

impl ProfileRecord {
    pub fn as_structured(&self) -> Option<&StructuredProfile> {
        match self {
            Self::Structured(profile) => Some(profile),
            Self::Raw(_) => None,
        }
    }
}

/// The five cognitive profile categories, plus `Unknown` for
/// "classification pending".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProfileLabel {
    #[serde(rename = "Methodical Thinker")]
    MethodicalThinker,
    #[serde(rename = "Adaptive Learner")]
    AdaptiveLearner,
    #[serde(rename = "Strategic Planner")]
    StrategicPlanner,
    #[serde(rename = "Analytical Problem Solver")]
    AnalyticalProblemSolver,
    #[serde(rename = "Experimental Explorer")]
    ExperimentalExplorer,
    Unknown,
}

impl ProfileLabel {
    /// The five real categories (excludes `Unknown`).
    pub const CATEGORIES: [ProfileLabel; 5] = [
        Self::MethodicalThinker,
        Self::AdaptiveLearner,
        Self::StrategicPlanner,
        Self::AnalyticalProblemSolver,
        Self::ExperimentalExplorer,
    ];

    /// Match free text against the category names, tolerating case and
    /// surrounding punctuation (the classifier sometimes wraps labels in
    /// markdown emphasis). Returns `Unknown` when nothing matches.
    pub fn from_text(text: &str) -> Self {
        let normalized = text.to_ascii_lowercase();
        for label in Self::CATEGORIES {
            if normalized.contains(&label.to_string().to_ascii_lowercase()) {
                return label;
            }
        }
        Self::Unknown
    }
}

impl std::fmt::Display for ProfileLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MethodicalThinker => "Methodical Thinker",
            Self::AdaptiveLearner => "Adaptive Learner",
            Self::StrategicPlanner => "Strategic Planner",
            Self::AnalyticalProblemSolver => "Analytical Problem Solver",
            Self::ExperimentalExplorer => "Experimental Explorer",
            Self::Unknown => "Unknown",
        };
        write!(f, "{s}")
    }
}

/// Single-label categorization derived from a structured profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Classification {
    #[serde(rename = "profile_label")]
    pub label: ProfileLabel,
    pub rationale: String,
}

impl Classification {
    /// Whether the classifier produced a real category. An `Unknown` label
    /// means classification is still pending and may be retried.
    pub fn is_resolved(&self) -> bool {
        self.label != ProfileLabel::Unknown
    }
}

/// Per-user interview session: transcript plus derived artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub turns: Vec<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_assessed_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            turns: Vec::new(),
            profile: None,
            classification: None,
            created_at: Utc::now(),
            profile_assessed_at: None,
        }
    }

    /// Number of turns with a non-empty response.
    pub fn answered_count(&self) -> usize {
        self.turns.iter().filter(|t| t.is_answered()).count()
    }

    /// The most recently appended open turn, if any.
    ///
    /// Scans from newest to oldest: only the latest turn can legitimately
    /// be open, and a submit must never target an earlier one.
    pub fn open_turn_mut(&mut self) -> Option<&mut Turn> {
        self.turns.iter_mut().rev().find(|t| t.is_open())
    }

    pub fn open_turn(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.is_open())
    }

    /// Append a new open turn with the given question text.
    pub fn append_question(&mut self, question: impl Into<String>) {
        self.turns.push(Turn::open(question));
    }

    /// Turns that have a recorded response, in order.
    pub fn answered_turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|t| !t.is_open())
    }

    /// Whether a final assessment has been produced for this session.
    pub fn is_final(&self) -> bool {
        self.profile.is_some()
    }
}
