//! Error types for the cognitive assessment agent.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Assessment error: {0}")]
    Assessment(#[from] AssessmentError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Document-store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open store: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by the interview core.
///
/// These map one-to-one onto HTTP status classes in the routes module:
/// `Validation`, `NoOpenTurn` and `NoAssessment` are 400-class,
/// `NotFound` is 404, `OracleUnavailable` is 502.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error("Missing or invalid request field: {0}")]
    Validation(String),

    #[error("No session found for user {0}")]
    NotFound(String),

    #[error("No question awaiting a response for user {0}; request next-step first")]
    NoOpenTurn(String),

    #[error("No completed assessment exists for user {0}")]
    NoAssessment(String),

    #[error("Question oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for the agent.
pub type Result<T> = std::result::Result<T, Error>;
