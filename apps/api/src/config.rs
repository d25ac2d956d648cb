use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

const DEFAULT_TTS_URL: &str = "http://localhost:5000/speak";
const DEFAULT_STORE_URL: &str = "http://localhost:5000";
const DEFAULT_COMPANY_NAME: &str = "IMMCO Software Solutions";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub deepgram_api_key: String,
    pub tts_url: String,
    pub store_url: String,
    pub company_name: String,
    pub interview_seconds: u32,
    pub mcq_seconds: u32,
    pub question_bank_path: Option<PathBuf>,
    pub settle_delay: Duration,
    pub debounce: Duration,
    /// How long an ended interview waits for `finish` before its session is dropped.
    pub finish_timeout: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let interview_seconds = parse_env("INTERVIEW_SECONDS", 60u32)?;
        if interview_seconds == 0 {
            bail!("INTERVIEW_SECONDS must be greater than zero");
        }

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            deepgram_api_key: require_env("DEEPGRAM_API_KEY")?,
            tts_url: env_or("TTS_URL", DEFAULT_TTS_URL),
            store_url: env_or("STORE_URL", DEFAULT_STORE_URL),
            company_name: env_or("COMPANY_NAME", DEFAULT_COMPANY_NAME),
            interview_seconds,
            mcq_seconds: parse_env("MCQ_SECONDS", 120u32)?,
            question_bank_path: std::env::var("QUESTION_BANK_PATH").ok().map(PathBuf::from),
            settle_delay: Duration::from_millis(parse_env("SETTLE_DELAY_MS", 100u64)?),
            debounce: Duration::from_millis(parse_env("DEBOUNCE_MS", 500u64)?),
            finish_timeout: Duration::from_secs(parse_env("FINISH_TIMEOUT_SECS", 900u64)?),
            port: parse_env("PORT", 8080u16)?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
