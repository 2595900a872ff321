//! Cascading parser for the oracle's final-assessment payload.
//!
//! The oracle is an unstructured text interface, so parsing is a documented
//! fallback chain, first success wins:
//! 1. direct JSON parse of the full trimmed text,
//! 2. JSON parse of the first balanced brace-delimited span,
//! 3. per-field regex extraction, assembling whatever fields were found.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::assessment::model::{
    DecisionTrait, LearningTrait, ScaledTrait, StructuredProfile,
};

/// Outcome of parsing an assessment payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedAssessment {
    /// All five trait fields recovered.
    Full(StructuredProfile),
    /// At least one but not all fields recovered.
    Partial(StructuredProfile),
    /// Zero fields recovered by any strategy. Triggers the controller's
    /// degraded-mode path, not a fatal error.
    None,
}

impl ParsedAssessment {
    fn from_profile(profile: StructuredProfile) -> Self {
        if profile.is_complete() {
            Self::Full(profile)
        } else if profile.field_count() > 0 {
            Self::Partial(profile)
        } else {
            Self::None
        }
    }

    pub fn into_profile(self) -> Option<StructuredProfile> {
        match self {
            Self::Full(profile) | Self::Partial(profile) => Some(profile),
            Self::None => None,
        }
    }
}

/// Content sniff for "is this oracle output a final assessment rather than a
/// question": trimmed text begins with `{` and names at least one trait
/// field. Advisory only — the answered-turn count is the primary authority.
pub fn looks_like_assessment(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with('{')
        && StructuredProfile::FIELD_NAMES
            .iter()
            .any(|field| text.contains(field))
}

/// Parse an assessment payload via the fallback chain.
pub fn parse_assessment(raw: &str) -> ParsedAssessment {
    let trimmed = raw.trim();

    // 1. Direct parse of the full text.
    if let Some(profile) = parse_json_profile(trimmed) {
        return ParsedAssessment::from_profile(profile);
    }

    // 2. First balanced top-level brace span.
    if let Some(span) = balanced_brace_span(trimmed) {
        if span != trimmed {
            if let Some(profile) = parse_json_profile(span) {
                return ParsedAssessment::from_profile(profile);
            }
        }
    }

    // 3. Per-field regex extraction.
    ParsedAssessment::from_profile(extract_fields(trimmed))
}

/// Parse text as a profile object; only counts as success when at least one
/// trait field is present.
fn parse_json_profile(text: &str) -> Option<StructuredProfile> {
    serde_json::from_str::<StructuredProfile>(text)
        .ok()
        .filter(|profile| profile.field_count() > 0)
}

/// Find the first balanced top-level `{...}` span, respecting JSON string
/// literals and escapes.
fn balanced_brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Matches `"<field>": <value>` where `<value>` is a brace-delimited object
/// or a quoted string.
static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#""(working_memory|attention_control|learning_style|planning_orientation|decision_making)"\s*:\s*(\{[^}]*\}|"[^"]*")"#,
    )
    .expect("field extraction regex is valid")
});

/// Last-resort extraction: locate each known field independently and parse
/// its fragment; fragments that don't fit the trait schema are dropped.
fn extract_fields(text: &str) -> StructuredProfile {
    let mut profile = StructuredProfile::default();

    for captures in FIELD_RE.captures_iter(text) {
        let field = &captures[1];
        let fragment = &captures[2];
        let Ok(value) = serde_json::from_str::<Value>(fragment) else {
            continue;
        };
        match field {
            "working_memory" if profile.working_memory.is_none() => {
                profile.working_memory = serde_json::from_value::<ScaledTrait>(value).ok();
            }
            "attention_control" if profile.attention_control.is_none() => {
                profile.attention_control = serde_json::from_value::<ScaledTrait>(value).ok();
            }
            "learning_style" if profile.learning_style.is_none() => {
                profile.learning_style = serde_json::from_value::<LearningTrait>(value).ok();
            }
            "planning_orientation" if profile.planning_orientation.is_none() => {
                profile.planning_orientation = serde_json::from_value::<ScaledTrait>(value).ok();
            }
            "decision_making" if profile.decision_making.is_none() => {
                profile.decision_making = serde_json::from_value::<DecisionTrait>(value).ok();
            }
            _ => {}
        }
    }

    profile
}
