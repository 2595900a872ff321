//! Interview core: the conversation-state machine and profile-derivation
//! pipeline.

pub mod classifier;
pub mod controller;
pub mod model;
pub mod oracle;
pub mod parser;
pub mod prompts;
pub mod routes;
pub mod session;

pub use classifier::ProfileClassifier;
pub use controller::{NextStep, TurnController};
pub use model::{
    Classification, ProfileLabel, ProfileRecord, Session, StructuredProfile, Turn,
};
pub use oracle::{OracleMode, QuestionOracle};
pub use parser::{ParsedAssessment, parse_assessment};
pub use session::{MemorySessionStore, SessionStore};
