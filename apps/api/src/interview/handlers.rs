use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::machine::SessionSnapshot;
use crate::interview::runtime::{spawn_session, Command, SessionHandle};
use crate::state::AppState;

const DEFAULT_AUDIO_CONTENT_TYPE: &str = "audio/webm";

#[derive(Deserialize)]
pub struct CreateInterviewRequest {
    pub candidate_id: i64,
}

#[derive(Deserialize)]
pub struct AnswerRequest {
    pub text: String,
}

#[derive(Deserialize)]
pub struct SpeechFinishedRequest {
    pub utterance: u64,
}

#[derive(Deserialize)]
pub struct CaptureRequest {
    pub active: bool,
}

#[derive(Deserialize)]
pub struct CaptureErrorRequest {
    pub reason: String,
}

#[derive(Deserialize, Default)]
pub struct FinishRequest {
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Serialize)]
pub struct SessionView {
    pub id: Uuid,
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
}

impl SessionView {
    fn of(handle: &SessionHandle) -> Json<Self> {
        Json(Self {
            id: handle.id,
            snapshot: handle.snapshot(),
        })
    }
}

fn session(state: &AppState, id: Uuid) -> Result<SessionHandle, AppError> {
    state
        .sessions
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("Interview {id} not found")))
}

async fn dispatch(
    state: &AppState,
    id: Uuid,
    command: Command,
) -> Result<Json<SessionView>, AppError> {
    let handle = session(state, id)?;
    handle.send(command).await?;
    Ok(SessionView::of(&handle))
}

/// POST /api/v1/interviews
pub async fn handle_create(
    State(state): State<AppState>,
    Json(req): Json<CreateInterviewRequest>,
) -> (StatusCode, Json<SessionView>) {
    let handle = spawn_session(
        req.candidate_id,
        state.settings.clone(),
        state.collaborators.clone(),
        &state.sessions,
    );
    info!("Interview {} created for candidate {}", handle.id, req.candidate_id);
    (StatusCode::CREATED, SessionView::of(&handle))
}

/// GET /api/v1/interviews/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(SessionView::of(&session(&state, id)?))
}

/// POST /api/v1/interviews/:id/answer
pub async fn handle_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<SessionView>, AppError> {
    dispatch(&state, id, Command::SubmitText { text: req.text }).await
}

/// POST /api/v1/interviews/:id/audio
pub async fn handle_upload_audio(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<SessionView>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("audio") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_AUDIO_CONTENT_TYPE)
            .to_string();
        let audio = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Could not read audio: {e}")))?;
        if audio.is_empty() {
            return Err(AppError::Validation("Audio recording is empty".to_string()));
        }
        return dispatch(
            &state,
            id,
            Command::SubmitAudio {
                audio,
                content_type,
            },
        )
        .await;
    }
    Err(AppError::Validation("Missing 'audio' field".to_string()))
}

/// GET /api/v1/interviews/:id/audio
pub async fn handle_latest_audio(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let clip = session(&state, id)?
        .audio()
        .ok_or_else(|| AppError::NotFound("No audio is available".to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::HeaderName::from_static("x-utterance"),
                clip.utterance.to_string(),
            ),
        ],
        clip.audio,
    )
        .into_response())
}

/// POST /api/v1/interviews/:id/speech-finished
pub async fn handle_speech_finished(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SpeechFinishedRequest>,
) -> Result<Json<SessionView>, AppError> {
    dispatch(
        &state,
        id,
        Command::SpeechFinished {
            utterance: req.utterance,
        },
    )
    .await
}

/// POST /api/v1/interviews/:id/capture
pub async fn handle_capture(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CaptureRequest>,
) -> Result<Json<SessionView>, AppError> {
    dispatch(&state, id, Command::SetCapture { active: req.active }).await
}

/// POST /api/v1/interviews/:id/capture-error
pub async fn handle_capture_error(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CaptureErrorRequest>,
) -> Result<Json<SessionView>, AppError> {
    dispatch(&state, id, Command::CaptureFailed { reason: req.reason }).await
}

/// POST /api/v1/interviews/:id/leave
pub async fn handle_leave(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    dispatch(&state, id, Command::Leave).await
}

/// POST /api/v1/interviews/:id/finish
pub async fn handle_finish(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<FinishRequest>>,
) -> Result<Json<SessionView>, AppError> {
    let feedback = body.and_then(|Json(req)| req.feedback);
    dispatch(&state, id, Command::Finish { feedback }).await
}
