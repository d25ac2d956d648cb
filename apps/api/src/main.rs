mod config;
mod errors;
mod interview;
mod llm_client;
mod mcq;
mod models;
mod routes;
mod services;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::interview::questions::load_bank;
use crate::interview::registry::SessionRegistry;
use crate::interview::runtime::{Collaborators, SessionSettings};
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::services::deepgram::DeepgramTranscriber;
use crate::services::speech::HttpSynthesizer;
use crate::services::store::RestStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting interview API v{}", env!("CARGO_PKG_VERSION"));

    // One HTTP client shared by every outbound integration
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()
        .context("Failed to build HTTP client")?;

    let llm = LlmClient::new(http.clone(), config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let collaborators = Collaborators {
        transcriber: Arc::new(DeepgramTranscriber::new(
            http.clone(),
            config.deepgram_api_key.clone(),
        )),
        synthesizer: Arc::new(HttpSynthesizer::new(http.clone(), config.tts_url.clone())),
        scorer: Arc::new(llm),
        store: Arc::new(RestStore::new(http, config.store_url.clone())),
    };
    info!("Interview store at {}", config.store_url);

    let questions = load_bank(config.question_bank_path.as_deref())?;
    info!("Question bank loaded ({} questions)", questions.len());
    let mcq = mcq::builtin_bank()?;

    let state = AppState {
        sessions: SessionRegistry::new(),
        collaborators,
        settings: SessionSettings {
            company: config.company_name.clone(),
            interview_seconds: config.interview_seconds,
            settle_delay: config.settle_delay,
            debounce: config.debounce,
            finish_timeout: config.finish_timeout,
            questions: Arc::new(questions),
        },
        mcq: Arc::new(mcq),
        mcq_seconds: config.mcq_seconds,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
