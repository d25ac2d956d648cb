use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::AppError;
use crate::mcq::grading::{grade, AnswerSheet, Selection};
use crate::mcq::{public_view, PublicQuestion};
use crate::models::records::{InterviewRecord, McqRecord, MCQ_ROUND};
use crate::state::AppState;

#[derive(Serialize)]
pub struct McqPaperResponse {
    pub time_limit_seconds: u32,
    pub questions: Vec<PublicQuestion>,
}

#[derive(Deserialize)]
pub struct McqSubmitRequest {
    pub candidate_id: i64,
    #[serde(default)]
    pub answers: Vec<Selection>,
}

#[derive(Serialize)]
pub struct McqSubmitResponse {
    pub score: usize,
    pub total: usize,
    pub interview_id: Option<i64>,
}

/// GET /api/v1/mcq
pub async fn handle_get_paper(State(state): State<AppState>) -> Json<McqPaperResponse> {
    Json(McqPaperResponse {
        time_limit_seconds: state.mcq_seconds,
        questions: public_view(&state.mcq),
    })
}

/// POST /api/v1/mcq/submit
pub async fn handle_submit(
    State(state): State<AppState>,
    Json(req): Json<McqSubmitRequest>,
) -> Result<Json<McqSubmitResponse>, AppError> {
    let sheet = AnswerSheet::from_selections(&state.mcq, req.answers)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let graded = grade(&sheet);
    debug!(
        "Candidate {} answered {}/{} MCQ questions",
        req.candidate_id,
        sheet.answered(),
        graded.total
    );

    let store = &state.collaborators.store;
    let candidate = store.candidate_info(req.candidate_id).await?;
    let saved = store
        .save_interview(&InterviewRecord::pending(
            req.candidate_id,
            candidate.post_id,
            MCQ_ROUND,
            None,
        ))
        .await?;
    store
        .save_mcq(&McqRecord {
            candidate_name: candidate.candidate_name,
            candidate_id: req.candidate_id,
            post_id: candidate.post_id,
            mcq_responses: graded.responses,
        })
        .await?;

    info!(
        "MCQ round for candidate {} scored {}/{}",
        req.candidate_id, graded.score, graded.total
    );
    Ok(Json(McqSubmitResponse {
        score: graded.score,
        total: graded.total,
        interview_id: saved.interview_id,
    }))
}
