//! External collaborators of an interview session.
//!
//! The interview core only ever sees these traits. Production implementations talk
//! HTTP (`deepgram`, `speech`, `store`, and `LlmClient` for scoring); tests plug in
//! in-memory fakes.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::interview::stages::Stage;
use crate::llm_client::LlmError;
use crate::models::candidate::CandidateInfo;
use crate::models::records::{
    ConversationRecord, InterviewRecord, InterviewSaved, McqRecord, RankingsRecord,
};

pub mod deepgram;
pub mod speech;
pub mod store;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned status {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("no speech was detected in the recording")]
    EmptyTranscript,

    #[error("stage '{0}' is not backed by a model")]
    NoModel(Stage),
}

/// Speech-to-text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Bytes, content_type: &str) -> Result<String, ServiceError>;
}

/// Text-to-speech. The returned audio is played to completion by the client.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Bytes, ServiceError>;
}

/// Language-model call for one interview stage: prompt in, free text out.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, stage: Stage, prompt: &str) -> Result<String, ServiceError>;
}

/// The external REST store that owns candidates and interview results.
#[async_trait]
pub trait InterviewStore: Send + Sync {
    async fn candidate_info(&self, candidate_id: i64) -> Result<CandidateInfo, ServiceError>;

    async fn save_conversation(&self, record: &ConversationRecord) -> Result<(), ServiceError>;

    async fn save_rankings(&self, record: &RankingsRecord) -> Result<(), ServiceError>;

    async fn save_interview(&self, record: &InterviewRecord)
        -> Result<InterviewSaved, ServiceError>;

    async fn save_mcq(&self, record: &McqRecord) -> Result<(), ServiceError>;
}
