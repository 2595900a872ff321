//! Cognitive assessment agent — adaptive interview core.

pub mod assessment;
pub mod config;
pub mod error;
pub mod llm;
pub mod store;
