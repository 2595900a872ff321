use std::sync::Arc;

use cognitive_agent::assessment::TurnController;
use cognitive_agent::assessment::routes::{AppState, assessment_routes};
use cognitive_agent::assessment::session::{MemorySessionStore, SessionStore};
use cognitive_agent::config::AssessmentConfig;
use cognitive_agent::llm::{LlmBackend, LlmConfig, create_provider};
use cognitive_agent::store::{DocumentStore, LibSqlDocumentStore};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Log to stderr and to a debug file simultaneously
    let file_appender = tracing_appender::rolling::never("logs", "api_debug.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    // Read API key from environment; Anthropic wins if both are set
    let (backend, api_key) = if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        (LlmBackend::Anthropic, key)
    } else if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        (LlmBackend::OpenAi, key)
    } else {
        eprintln!("Error: neither ANTHROPIC_API_KEY nor OPENAI_API_KEY is set");
        eprintln!("  export ANTHROPIC_API_KEY=sk-ant-...");
        std::process::exit(1);
    };

    let model = std::env::var("ASSESSMENT_MODEL").unwrap_or_else(|_| {
        match backend {
            LlmBackend::Anthropic => "claude-sonnet-4-20250514".to_string(),
            LlmBackend::OpenAi => "gpt-4o".to_string(),
        }
    });

    let port: u16 = std::env::var("ASSESSMENT_PORT")
        .unwrap_or_else(|_| "5002".to_string())
        .parse()
        .unwrap_or(5002);

    let db_path = std::env::var("ASSESSMENT_DB_PATH")
        .unwrap_or_else(|_| "./data/assessments.db".to_string());

    eprintln!("🧠 Cognitive Agent v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", model);
    eprintln!("   API: http://0.0.0.0:{}/next-step", port);
    eprintln!("   Store: {}\n", db_path);

    // Create LLM provider
    let llm_config = LlmConfig {
        backend,
        api_key: secrecy::SecretString::from(api_key),
        model,
    };
    let llm = create_provider(&llm_config)?;

    // ── Document store ───────────────────────────────────────────────────
    let documents: Arc<dyn DocumentStore> = Arc::new(
        LibSqlDocumentStore::new_local(std::path::Path::new(&db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open document store at {}: {}", db_path, e);
                std::process::exit(1);
            }),
    );

    // ── Interview core ───────────────────────────────────────────────────
    let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let controller = Arc::new(TurnController::new(
        sessions,
        documents,
        llm,
        AssessmentConfig::default(),
    ));

    let app = assessment_routes(AppState { controller });

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
