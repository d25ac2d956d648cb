use std::sync::Arc;

use crate::interview::registry::SessionRegistry;
use crate::interview::runtime::{Collaborators, SessionSettings};
use crate::mcq::McqQuestion;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionRegistry,
    /// Transcription, synthesis, scoring and the external store. Swapped for fakes in tests.
    pub collaborators: Collaborators,
    /// Template for every spoken-interview session started by this process.
    pub settings: SessionSettings,
    pub mcq: Arc<Vec<McqQuestion>>,
    pub mcq_seconds: u32,
}
