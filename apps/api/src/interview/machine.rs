//! Interview State Machine.
//!
//! `InterviewSession` owns everything one spoken interview needs: the question pool, the
//! conversation log, the cached candidate, the countdown and the speaking/listening/
//! processing/ending flags. Transition functions never perform I/O. They mutate the
//! session and return `Effect`s; the session actor executes those and reports the
//! outcome back through further transition calls.
//!
//! ```text
//! INIT -> WELCOME -> INTRODUCTION -> START -> QUESTION_LOOP -> ENDING -> TERMINATED
//! ```
//!
//! Exactly one stage call is in flight at a time. Every call carries a token; a response
//! whose token no longer matches (because the countdown forced ENDING in the meantime)
//! is discarded.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::interview::conversation::ConversationLog;
use crate::interview::extract::{extract_coverage, extract_ranking, RankingResult};
use crate::interview::prompts::StagePrompt;
use crate::interview::questions::{Question, QuestionPool, NO_MORE_QUESTIONS};
use crate::interview::stages::{generate, Generated, Stage};
use crate::models::candidate::CandidateInfo;
use crate::services::ServiceError;

/// Answers scoring below this get a follow-up question.
pub const COVERAGE_THRESHOLD: u8 = 60;
/// Follow-ups allowed per canonical question.
pub const MAX_FOLLOWUPS: u8 = 3;

pub const SCORING_RETRY_MESSAGE: &str = "Could not generate next question. Please try again.";
pub const RECORDING_ERROR_MESSAGE: &str =
    "There was an error with the recording. Please try again.";

const FALLBACK_CANDIDATE_NAME: &str = "Candidate";
const MAX_NOTICES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Init,
    Welcome,
    Introduction,
    Start,
    QuestionLoop,
    Ending,
    Terminated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Flags {
    pub listening: bool,
    pub speaking: bool,
    pub processing: bool,
    pub ending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    Followup,
    NextQuestion,
}

/// Follow up while coverage is below the threshold and the cap has not been hit.
/// A compare response without a coverage marker counts as sufficient.
pub fn decide(coverage: Option<u8>, followups: u8) -> NextStep {
    match coverage {
        Some(c) if c < COVERAGE_THRESHOLD && followups < MAX_FOLLOWUPS => NextStep::Followup,
        _ => NextStep::NextQuestion,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    TimeUp,
    CandidateLeft,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EndReason::TimeUp => "time up",
            EndReason::CandidateLeft => "candidate left",
        })
    }
}

/// Deferred work the machine asks to be woken up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Welcome,
    Generate,
    Decide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    /// Initial pause before the welcome.
    Settle,
    /// Pause before an automatic loop step.
    Debounce,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCall {
    pub token: u64,
    pub prompt: StagePrompt,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Call the model for one stage; answer with `on_model_response(token, ..)`.
    Invoke(StageCall),
    /// Synthesize and play `text`; answer with `on_speech_finished(utterance)`.
    Speak { utterance: u64, text: String },
    StopAudio,
    Schedule {
        continuation: Continuation,
        delay: Delay,
    },
    FlushConversation(ConversationLog),
    SaveRankings(RankingResult),
    SaveInterview { feedback: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    CaptureFailed,
    TranscriptionFailed,
    ScoringFailed,
    SpeechFailed,
    PersistenceFailed,
    RankingUnparseable,
    AnswerIgnored,
    NoMoreQuestions,
    TimeWarning,
    CandidateInfoUnavailable,
}

/// A user-facing warning or error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

/// Why a client command was refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("the microphone is not listening")]
    NotListening,

    #[error("the interviewer is still speaking or thinking")]
    Busy,

    #[error("the interview is ending")]
    Ending,

    #[error("the interview has not ended yet")]
    NotEnded,

    #[error("the interview summary is still being prepared")]
    SummaryPending,

    #[error("the interview is already being saved")]
    AlreadyFinishing,

    #[error("the interview is over")]
    Terminated,
}

/// Read-only view published to clients after every transition.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub candidate_id: i64,
    pub candidate_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub phase: Phase,
    pub flags: Flags,
    pub remaining_seconds: u32,
    pub total_seconds: u32,
    pub display: Option<String>,
    pub utterance: u64,
    pub current_question: Option<String>,
    pub followup_count: u8,
    pub coverage: Option<u8>,
    pub questions_remaining: usize,
    pub summary_ready: bool,
    pub ranking: Option<RankingResult>,
    pub notices: Vec<Notice>,
    pub conversation: ConversationLog,
}

#[derive(Debug)]
struct InFlight {
    token: u64,
    prompt: StagePrompt,
}

#[derive(Debug)]
pub struct InterviewSession {
    candidate_id: i64,
    company: String,
    candidate: Option<CandidateInfo>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,

    phase: Phase,
    flags: Flags,
    pool: QuestionPool,
    log: ConversationLog,
    last_asked: Option<Question>,
    /// Text of the follow-up currently being answered.
    open_followup: Option<String>,
    followup_count: u8,
    coverage: Option<u8>,

    awaiting_answer: bool,
    decision_pending: bool,
    needs_question: bool,
    last_completed: Option<Stage>,
    /// Set once the mic has been opened for `last_completed`.
    capture_armed: bool,
    transcribing: bool,
    welcome_sent: bool,
    summary_done: bool,
    finishing: bool,

    scheduled: Option<Continuation>,
    in_flight: Option<InFlight>,
    next_token: u64,
    utterance: u64,

    display: Option<String>,
    remaining_seconds: u32,
    total_seconds: u32,
    ranking: Option<RankingResult>,
    notices: Vec<Notice>,
}

impl InterviewSession {
    pub fn new(
        candidate_id: i64,
        company: impl Into<String>,
        questions: Vec<Question>,
        interview_seconds: u32,
    ) -> Self {
        Self {
            candidate_id,
            company: company.into(),
            candidate: None,
            started_at: Utc::now(),
            ended_at: None,
            phase: Phase::Init,
            flags: Flags::default(),
            pool: QuestionPool::new(questions),
            log: ConversationLog::new(),
            last_asked: None,
            open_followup: None,
            followup_count: 0,
            coverage: None,
            awaiting_answer: false,
            decision_pending: false,
            needs_question: false,
            last_completed: None,
            capture_armed: false,
            transcribing: false,
            welcome_sent: false,
            summary_done: false,
            finishing: false,
            scheduled: None,
            in_flight: None,
            next_token: 1,
            utterance: 0,
            display: None,
            remaining_seconds: interview_seconds,
            total_seconds: interview_seconds,
            ranking: None,
            notices: Vec::new(),
        }
    }

    pub fn candidate_id(&self) -> i64 {
        self.candidate_id
    }

    pub fn candidate(&self) -> Option<&CandidateInfo> {
        self.candidate.as_ref()
    }

    pub fn candidate_name(&self) -> &str {
        self.candidate
            .as_ref()
            .map(|c| c.candidate_name.as_str())
            .unwrap_or(FALLBACK_CANDIDATE_NAME)
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[cfg(test)]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    #[cfg(test)]
    pub fn followup_count(&self) -> u8 {
        self.followup_count
    }

    pub fn utterance(&self) -> u64 {
        self.utterance
    }

    #[cfg(test)]
    pub fn conversation(&self) -> &ConversationLog {
        &self.log
    }

    pub fn is_terminated(&self) -> bool {
        self.phase == Phase::Terminated
    }

    /// Ended, summarised and waiting only for the final save.
    pub fn awaiting_finish(&self) -> bool {
        self.phase == Phase::Ending && self.summary_done
    }

    fn is_closing(&self) -> bool {
        self.flags.ending || matches!(self.phase, Phase::Ending | Phase::Terminated)
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.phase == Phase::Terminated {
            return Err(SessionError::Terminated);
        }
        if self.is_closing() {
            return Err(SessionError::Ending);
        }
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            candidate_id: self.candidate_id,
            candidate_name: self.candidate_name().to_string(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            phase: self.phase,
            flags: self.flags,
            remaining_seconds: self.remaining_seconds,
            total_seconds: self.total_seconds,
            display: self.display.clone(),
            utterance: self.utterance,
            current_question: self
                .open_followup
                .clone()
                .or_else(|| self.last_asked.as_ref().map(|q| q.prompt.clone())),
            followup_count: self.followup_count,
            coverage: self.coverage,
            questions_remaining: self.pool.remaining(),
            summary_ready: self.summary_done,
            ranking: self.ranking.clone(),
            notices: self.notices.clone(),
            conversation: self.log.clone(),
        }
    }

    // ---- lifecycle -------------------------------------------------------------

    /// Caches the candidate lookup. A failed lookup leaves the placeholder name in place.
    pub fn set_candidate(&mut self, result: Result<CandidateInfo, ServiceError>) {
        match result {
            Ok(info) => {
                debug!(
                    "Candidate {} resolved as '{}' (post {})",
                    self.candidate_id, info.candidate_name, info.post_id
                );
                self.candidate = Some(info);
            }
            Err(e) => {
                warn!("Candidate {} lookup failed: {e}", self.candidate_id);
                self.notify(
                    NoticeKind::CandidateInfoUnavailable,
                    format!("Could not load candidate details: {e}"),
                );
            }
        }
    }

    /// Schedules the welcome after the settle delay. Only the first call has any effect.
    pub fn start(&mut self) -> Vec<Effect> {
        if self.phase != Phase::Init || self.welcome_sent || self.scheduled.is_some() {
            return Vec::new();
        }
        self.schedule(Continuation::Welcome, Delay::Settle)
    }

    pub fn on_continuation(&mut self, continuation: Continuation) -> Vec<Effect> {
        if self.scheduled != Some(continuation) {
            debug!("Ignoring stale continuation {continuation:?}");
            return Vec::new();
        }
        self.scheduled = None;
        // Busy sessions pick the work up again in `settle`.
        if self.is_closing() || self.flags.speaking || self.flags.processing {
            return Vec::new();
        }
        match continuation {
            Continuation::Welcome => self.run_welcome(),
            Continuation::Decide => self.run_decision(),
            Continuation::Generate => self.run_generate(),
        }
    }

    pub fn on_timer_tick(&mut self) -> Vec<Effect> {
        if self.is_closing() {
            return Vec::new();
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        let remaining = self.remaining_seconds;
        if remaining == 0 {
            return self.begin_ending(EndReason::TimeUp);
        }
        if self.is_warning_point(remaining) {
            self.notify(
                NoticeKind::TimeWarning,
                format!("{remaining} seconds remaining"),
            );
        }
        Vec::new()
    }

    fn is_warning_point(&self, remaining: u32) -> bool {
        let total = self.total_seconds;
        remaining == 10 || (total >= 4 && (remaining == total / 2 || remaining == total / 4))
    }

    pub fn leave(&mut self) -> Result<Vec<Effect>, SessionError> {
        if self.phase == Phase::Terminated {
            return Err(SessionError::Terminated);
        }
        Ok(self.begin_ending(EndReason::CandidateLeft))
    }

    /// Forces the session quiescent and starts the closing stages. Runs at most once.
    fn begin_ending(&mut self, reason: EndReason) -> Vec<Effect> {
        if self.is_closing() {
            return Vec::new();
        }
        info!(
            "Interview for candidate {} ending ({reason}), {}s left",
            self.candidate_id, self.remaining_seconds
        );
        self.phase = Phase::Ending;
        self.ended_at = Some(Utc::now());
        self.flags = Flags {
            ending: true,
            ..Flags::default()
        };
        if let Some(abandoned) = self.in_flight.take() {
            warn!(
                "Abandoning in-flight stage '{}' (token {})",
                abandoned.prompt.stage(),
                abandoned.token
            );
        }
        self.scheduled = None;
        self.decision_pending = false;
        self.needs_question = false;
        self.awaiting_answer = false;
        self.transcribing = false;
        // Invalidates playback reports for anything spoken before now.
        self.utterance += 1;

        let candidate = self.candidate_name().to_string();
        vec![
            Effect::StopAudio,
            self.invoke(StagePrompt::InterviewEnd { candidate }),
        ]
    }

    pub fn finish(&mut self, feedback: Option<String>) -> Result<Vec<Effect>, SessionError> {
        match self.phase {
            Phase::Terminated => return Err(SessionError::Terminated),
            Phase::Ending => {}
            _ => return Err(SessionError::NotEnded),
        }
        if !self.summary_done {
            return Err(SessionError::SummaryPending);
        }
        if self.finishing {
            return Err(SessionError::AlreadyFinishing);
        }
        self.finishing = true;
        let feedback = feedback
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());
        Ok(vec![Effect::SaveInterview { feedback }])
    }

    pub fn on_interview_saved(&mut self, result: Result<(), ServiceError>) {
        self.finishing = false;
        match result {
            Ok(()) => {
                info!("Interview for candidate {} terminated", self.candidate_id);
                self.phase = Phase::Terminated;
                self.flags = Flags::default();
            }
            Err(e) => {
                error!("Final save for candidate {} failed: {e}", self.candidate_id);
                self.notify(
                    NoticeKind::PersistenceFailed,
                    format!("Could not save the interview: {e}"),
                );
            }
        }
    }

    pub fn on_conversation_flushed(&mut self, result: Result<(), ServiceError>) {
        if let Err(e) = result {
            error!("Saving conversation for candidate {} failed: {e}", self.candidate_id);
            self.notify(
                NoticeKind::PersistenceFailed,
                format!("Could not save the conversation: {e}"),
            );
        }
    }

    pub fn on_rankings_saved(&mut self, result: Result<(), ServiceError>) {
        if let Err(e) = result {
            error!("Saving rankings for candidate {} failed: {e}", self.candidate_id);
            self.notify(
                NoticeKind::PersistenceFailed,
                format!("Could not save the rankings: {e}"),
            );
        }
    }

    // ---- capture -----------------------------------------------------------------

    /// Manual microphone toggle.
    pub fn set_capture(&mut self, active: bool) -> Result<(), SessionError> {
        self.ensure_open()?;
        if active && (self.flags.speaking || self.flags.processing) {
            return Err(SessionError::Busy);
        }
        self.flags.listening = active;
        if active {
            self.capture_armed = true;
        }
        Ok(())
    }

    pub fn on_capture_failed(&mut self, reason: &str) {
        if self.is_closing() {
            return;
        }
        warn!("Capture failed for candidate {}: {reason}", self.candidate_id);
        self.flags.listening = false;
        self.display = Some(RECORDING_ERROR_MESSAGE.to_string());
        self.notify(NoticeKind::CaptureFailed, format!("Recording failed: {reason}"));
    }

    /// A typed answer. Only accepted while the microphone is open.
    pub fn submit_text(&mut self, text: &str) -> Result<Vec<Effect>, SessionError> {
        self.ensure_open()?;
        if !self.flags.listening {
            return Err(SessionError::NotListening);
        }
        Ok(self.on_answer_captured(text))
    }

    /// Closes the microphone while a recording is transcribed.
    pub fn accept_audio(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        if !self.flags.listening {
            return Err(SessionError::NotListening);
        }
        self.flags.listening = false;
        self.flags.processing = true;
        self.transcribing = true;
        Ok(())
    }

    pub fn on_transcribed(&mut self, result: Result<String, ServiceError>) -> Vec<Effect> {
        if !self.transcribing {
            debug!("Ignoring transcript that arrived after the session moved on");
            return Vec::new();
        }
        self.transcribing = false;
        self.flags.processing = false;
        match result {
            Ok(text) => self.on_answer_captured(&text),
            Err(e) => {
                warn!("Transcription failed for candidate {}: {e}", self.candidate_id);
                self.notify(
                    NoticeKind::TranscriptionFailed,
                    format!("Could not transcribe the answer: {e}"),
                );
                self.flags.listening = true;
                Vec::new()
            }
        }
    }

    /// Routes a captured answer to the stage that consumes it.
    pub fn on_answer_captured(&mut self, transcript: &str) -> Vec<Effect> {
        if self.is_closing() {
            warn!("Dropping answer received while the interview is ending");
            return Vec::new();
        }
        if self.flags.processing {
            warn!("Dropping answer: a stage is already in flight");
            return Vec::new();
        }
        let transcript = transcript.trim();
        if transcript.is_empty() {
            self.notify(NoticeKind::AnswerIgnored, "No answer was heard. Please try again.");
            self.flags.listening = !self.flags.speaking;
            return Vec::new();
        }

        let Some(prompt) = self.answer_prompt(transcript) else {
            debug!("Answer ignored in phase {:?}", self.phase);
            self.notify(
                NoticeKind::AnswerIgnored,
                "No question is waiting for an answer right now.",
            );
            return Vec::new();
        };
        self.flags.listening = false;
        if self.phase == Phase::QuestionLoop {
            self.awaiting_answer = false;
        }
        vec![self.invoke(prompt)]
    }

    fn answer_prompt(&self, transcript: &str) -> Option<StagePrompt> {
        let transcript = transcript.to_string();
        match self.phase {
            Phase::Welcome => Some(StagePrompt::Introduction {
                candidate: self.candidate_name().to_string(),
                transcript,
            }),
            Phase::Introduction => Some(StagePrompt::Start { transcript }),
            Phase::QuestionLoop if self.awaiting_answer => {
                match (&self.open_followup, &self.last_asked) {
                    (Some(followup), _) => Some(StagePrompt::CompareFollowup {
                        question: followup.clone(),
                        transcript,
                    }),
                    (None, Some(question)) => Some(StagePrompt::Compare {
                        question: question.prompt.clone(),
                        expected_answer: question.expected_answer.clone(),
                        transcript,
                    }),
                    (None, None) => None,
                }
            }
            _ => None,
        }
    }

    // ---- speech ------------------------------------------------------------------

    pub fn on_speech_finished(&mut self, utterance: u64) -> Vec<Effect> {
        if utterance != self.utterance || !self.flags.speaking {
            debug!("Ignoring playback end for stale utterance {utterance}");
            return Vec::new();
        }
        self.flags.speaking = false;
        self.settle()
    }

    /// Synthesis failed: the text stays on screen and the interview carries on.
    pub fn on_speech_failed(&mut self, utterance: u64, err: &ServiceError) -> Vec<Effect> {
        if utterance != self.utterance || !self.flags.speaking {
            return Vec::new();
        }
        error!("Speech synthesis failed: {err}");
        self.notify(
            NoticeKind::SpeechFailed,
            format!("Could not play the interviewer's voice: {err}"),
        );
        self.flags.speaking = false;
        self.settle()
    }

    // ---- model -------------------------------------------------------------------

    pub fn on_model_response(
        &mut self,
        token: u64,
        result: Result<String, ServiceError>,
    ) -> Vec<Effect> {
        if self.in_flight.as_ref().map(|f| f.token) != Some(token) {
            warn!("Ignoring late model response (token {token})");
            return Vec::new();
        }
        let Some(call) = self.in_flight.take() else {
            return Vec::new();
        };
        self.flags.processing = false;

        let mut effects = match result {
            Ok(text) => self.stage_succeeded(call.prompt, text),
            Err(e) => self.stage_failed(call.prompt, e),
        };
        effects.extend(self.settle());
        effects
    }

    fn stage_succeeded(&mut self, prompt: StagePrompt, response: String) -> Vec<Effect> {
        let stage = prompt.stage();
        info!("Stage '{stage}' completed for candidate {}", self.candidate_id);
        if let Err(e) = stage.record(&mut self.log, prompt.transcript(), &response) {
            warn!("Conversation not updated for stage '{stage}': {e}");
        }

        match prompt {
            StagePrompt::Welcome { .. } => {
                self.phase = Phase::Welcome;
                self.complete(stage);
                self.present(response)
            }
            StagePrompt::Introduction { .. } => {
                self.phase = Phase::Introduction;
                self.complete(stage);
                self.present(response)
            }
            StagePrompt::Start { .. } => {
                self.phase = Phase::Start;
                self.complete(stage);
                self.needs_question = true;
                self.present(response)
            }
            StagePrompt::NextQuestion { .. } => {
                self.complete(stage);
                self.needs_question = true;
                self.present(response)
            }
            StagePrompt::Followup { .. } => {
                self.open_followup = Some(response.clone());
                self.awaiting_answer = true;
                self.coverage = None;
                self.complete(stage);
                self.present(response)
            }
            StagePrompt::Compare { .. } | StagePrompt::CompareFollowup { .. } => {
                let extraction = extract_coverage(&response);
                debug!("Coverage for stage '{stage}': {:?}", extraction.coverage);
                self.coverage = extraction.coverage;
                self.decision_pending = true;
                self.complete(stage);
                self.present(extraction.text)
            }
            StagePrompt::InterviewEnd { .. } => {
                let mut effects = self.present(response);
                effects.extend(self.wrap_up());
                effects
            }
            StagePrompt::Summary { .. } => {
                self.summary_done = true;
                match extract_ranking(&response) {
                    Ok(ranking) => {
                        info!(
                            "Candidate {} ranked Lan={} Sub={} Beh={}",
                            self.candidate_id,
                            ranking.fluency,
                            ranking.subject_knowledge,
                            ranking.professional_behavior
                        );
                        self.ranking = Some(ranking.clone());
                        vec![Effect::SaveRankings(ranking)]
                    }
                    Err(e) => {
                        error!("Summary for candidate {} unusable: {e}", self.candidate_id);
                        self.notify(
                            NoticeKind::RankingUnparseable,
                            format!("The interview summary could not be read: {e}"),
                        );
                        Vec::new()
                    }
                }
            }
        }
    }

    fn stage_failed(&mut self, prompt: StagePrompt, err: ServiceError) -> Vec<Effect> {
        let stage = prompt.stage();
        error!("Stage '{stage}' failed for candidate {}: {err}", self.candidate_id);
        self.notify(
            NoticeKind::ScoringFailed,
            format!("The interviewer could not respond: {err}"),
        );

        match prompt {
            StagePrompt::Summary { .. } => {
                self.summary_done = true;
                return Vec::new();
            }
            StagePrompt::InterviewEnd { .. } => return self.wrap_up(),
            _ => {}
        }

        self.display = Some(SCORING_RETRY_MESSAGE.to_string());
        match prompt {
            StagePrompt::Welcome { .. } => {
                self.phase = Phase::Welcome;
                self.complete(stage);
            }
            StagePrompt::Introduction { .. } | StagePrompt::Start { .. } => {
                self.flags.listening = true;
            }
            StagePrompt::Compare { .. } | StagePrompt::CompareFollowup { .. } => {
                self.awaiting_answer = true;
                self.flags.listening = true;
            }
            StagePrompt::NextQuestion { .. } => {
                self.needs_question = true;
            }
            StagePrompt::Followup { .. } => {
                self.followup_count = 0;
                self.open_followup = None;
                self.needs_question = true;
            }
            StagePrompt::InterviewEnd { .. } | StagePrompt::Summary { .. } => {}
        }
        Vec::new()
    }

    /// Flushes the log and asks for the summary.
    fn wrap_up(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.log.begin_flush() {
            Ok(log) => effects.push(Effect::FlushConversation(log)),
            Err(e) => warn!("Conversation flush skipped: {e}"),
        }
        let conversation = self.log.to_pretty_json();
        effects.push(self.invoke(StagePrompt::Summary { conversation }));
        effects
    }

    // ---- loop steps --------------------------------------------------------------

    fn run_welcome(&mut self) -> Vec<Effect> {
        if self.welcome_sent {
            return Vec::new();
        }
        self.welcome_sent = true;
        info!("Welcoming candidate {}", self.candidate_id);
        let prompt = StagePrompt::Welcome {
            company: self.company.clone(),
            candidate: self.candidate_name().to_string(),
        };
        vec![self.invoke(prompt)]
    }

    fn run_decision(&mut self) -> Vec<Effect> {
        if !self.decision_pending {
            return Vec::new();
        }
        self.decision_pending = false;
        match decide(self.coverage, self.followup_count) {
            NextStep::Followup => {
                self.followup_count += 1;
                let question = self
                    .open_followup
                    .clone()
                    .or_else(|| self.last_asked.as_ref().map(|q| q.prompt.clone()))
                    .unwrap_or_default();
                info!(
                    "Coverage {:?} below {COVERAGE_THRESHOLD}, follow-up {}/{MAX_FOLLOWUPS}",
                    self.coverage, self.followup_count
                );
                vec![self.invoke(StagePrompt::Followup { question })]
            }
            NextStep::NextQuestion => {
                self.followup_count = 0;
                self.open_followup = None;
                let candidate = self.candidate_name().to_string();
                vec![self.invoke(StagePrompt::NextQuestion { candidate })]
            }
        }
    }

    fn run_generate(&mut self) -> Vec<Effect> {
        if !self.needs_question {
            return Vec::new();
        }
        self.needs_question = false;
        self.phase = Phase::QuestionLoop;
        self.coverage = None;
        self.open_followup = None;

        match generate(&mut self.pool, &mut self.log) {
            Generated::Question { label, question } => {
                info!("{label} asked, {} left in pool", self.pool.remaining());
                let text = question.prompt.clone();
                self.last_asked = Some(question);
                self.awaiting_answer = true;
                self.complete(Stage::Generate);
                self.present(text)
            }
            Generated::Exhausted => {
                info!("Question pool exhausted for candidate {}", self.candidate_id);
                self.awaiting_answer = false;
                self.last_completed = None;
                self.notify(NoticeKind::NoMoreQuestions, NO_MORE_QUESTIONS);
                self.present(NO_MORE_QUESTIONS.to_string())
            }
        }
    }

    /// Picks up automatic work once the interviewer is neither speaking nor waiting on
    /// the model: pending decisions, question generation, or opening the microphone.
    fn settle(&mut self) -> Vec<Effect> {
        if self.is_closing()
            || self.flags.speaking
            || self.flags.processing
            || self.scheduled.is_some()
        {
            return Vec::new();
        }
        if self.decision_pending {
            return self.schedule(Continuation::Decide, Delay::Debounce);
        }
        if self.needs_question {
            return self.schedule(Continuation::Generate, Delay::Debounce);
        }
        if let Some(stage) = self.last_completed {
            if stage.awaits_answer() && !self.capture_armed {
                debug!("Opening microphone after '{stage}'");
                self.capture_armed = true;
                self.flags.listening = true;
            }
        }
        Vec::new()
    }

    // ---- helpers -----------------------------------------------------------------

    fn invoke(&mut self, prompt: StagePrompt) -> Effect {
        let token = self.next_token;
        self.next_token += 1;
        self.flags.processing = true;
        debug!("Invoking stage '{}' (token {token})", prompt.stage());
        self.in_flight = Some(InFlight {
            token,
            prompt: prompt.clone(),
        });
        Effect::Invoke(StageCall { token, prompt })
    }

    fn schedule(&mut self, continuation: Continuation, delay: Delay) -> Vec<Effect> {
        self.scheduled = Some(continuation);
        vec![Effect::Schedule {
            continuation,
            delay,
        }]
    }

    fn complete(&mut self, stage: Stage) {
        self.last_completed = Some(stage);
        self.capture_armed = false;
    }

    /// Shows `text` and speaks it. Blank text is shown without speech.
    fn present(&mut self, text: String) -> Vec<Effect> {
        self.flags.listening = false;
        self.display = Some(text.clone());
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.utterance += 1;
        self.flags.speaking = true;
        vec![Effect::Speak {
            utterance: self.utterance,
            text,
        }]
    }

    /// Records a notice unless it repeats the most recent one.
    fn notify(&mut self, kind: NoticeKind, message: impl Into<String>) {
        let notice = Notice {
            kind,
            message: message.into(),
        };
        if self.notices.last() == Some(&notice) {
            return;
        }
        self.notices.push(notice);
        if self.notices.len() > MAX_NOTICES {
            self.notices.remove(0);
        }
    }
}
