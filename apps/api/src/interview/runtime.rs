//! Session actor: runs one `InterviewSession` on its own task.
//!
//! HTTP handlers reach the session through a `SessionHandle`. Commands travel over an
//! `mpsc` channel with a `oneshot` reply; state flows back on `watch` channels. Every
//! effect the machine asks for runs on a spawned task that reports back as an internal
//! event, so the one-second countdown keeps ticking while the model is busy.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::interview::machine::{
    Continuation, Delay, Effect, InterviewSession, SessionError, SessionSnapshot,
};
use crate::interview::questions::Question;
use crate::interview::registry::SessionRegistry;
use crate::models::candidate::CandidateInfo;
use crate::models::records::{ConversationRecord, InterviewRecord, RankingsRecord, SPOKEN_ROUND};
use crate::services::{InterviewStore, Scorer, ServiceError, Synthesizer, Transcriber};

const COMMAND_BUFFER: usize = 32;
const TICK: Duration = Duration::from_secs(1);

/// The external services a session depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub transcriber: Arc<dyn Transcriber>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub scorer: Arc<dyn Scorer>,
    pub store: Arc<dyn InterviewStore>,
}

/// Per-session settings shared by every session the process starts.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub company: String,
    pub interview_seconds: u32,
    pub settle_delay: Duration,
    pub debounce: Duration,
    /// Time an ended interview may wait for `finish` before the session is dropped.
    pub finish_timeout: Duration,
    pub questions: Arc<Vec<Question>>,
}

/// Most recent synthesized utterance.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub utterance: u64,
    pub audio: Bytes,
}

#[derive(Debug)]
pub enum Command {
    SubmitText { text: String },
    SubmitAudio { audio: Bytes, content_type: String },
    SpeechFinished { utterance: u64 },
    SetCapture { active: bool },
    CaptureFailed { reason: String },
    Leave,
    Finish { feedback: Option<String> },
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Rejected(#[from] SessionError),

    #[error("session is no longer running")]
    Closed,
}

struct Envelope {
    command: Command,
    reply: oneshot::Sender<Result<(), SessionError>>,
}

enum Event {
    Continuation(Continuation),
    StageResult {
        token: u64,
        result: Result<String, ServiceError>,
    },
    Transcribed(Result<String, ServiceError>),
    Synthesized {
        utterance: u64,
        result: Result<Bytes, ServiceError>,
    },
    CandidateResolved(CandidateInfo),
    ConversationFlushed(Result<(), ServiceError>),
    RankingsSaved(Result<(), ServiceError>),
    InterviewSaved(Result<(), ServiceError>),
}

#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    commands: mpsc::Sender<Envelope>,
    snapshot: watch::Receiver<SessionSnapshot>,
    audio: watch::Receiver<Option<AudioClip>>,
}

impl SessionHandle {
    /// Sends a command and waits until the session has applied it.
    pub async fn send(&self, command: Command) -> Result<(), CommandError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Envelope { command, reply })
            .await
            .map_err(|_| CommandError::Closed)?;
        response.await.map_err(|_| CommandError::Closed)??;
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    #[cfg(test)]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    pub fn audio(&self) -> Option<AudioClip> {
        self.audio.borrow().clone()
    }
}

/// Starts a session actor for `candidate_id` and registers its handle. The actor
/// removes itself from `registry` when it stops.
pub fn spawn_session(
    candidate_id: i64,
    settings: SessionSettings,
    services: Collaborators,
    registry: &SessionRegistry,
) -> SessionHandle {
    let id = Uuid::new_v4();
    let session = InterviewSession::new(
        candidate_id,
        settings.company.clone(),
        settings.questions.as_ref().clone(),
        settings.interview_seconds,
    );

    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
    let (audio_tx, audio_rx) = watch::channel(None);

    let handle = SessionHandle {
        id,
        commands: command_tx,
        snapshot: snapshot_rx,
        audio: audio_rx,
    };
    registry.insert(handle.clone());

    let actor = SessionActor {
        id,
        session,
        settings,
        services,
        registry: registry.clone(),
        events: event_tx,
        snapshot: snapshot_tx,
        audio: audio_tx,
    };
    tokio::spawn(actor.run(command_rx, event_rx));

    handle
}

struct SessionActor {
    id: Uuid,
    session: InterviewSession,
    settings: SessionSettings,
    services: Collaborators,
    registry: SessionRegistry,
    events: mpsc::UnboundedSender<Event>,
    snapshot: watch::Sender<SessionSnapshot>,
    audio: watch::Sender<Option<AudioClip>>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Envelope>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        let candidate_id = self.session.candidate_id();
        info!("Session {} started for candidate {candidate_id}", self.id);

        let candidate = self.services.store.candidate_info(candidate_id).await;
        self.session.set_candidate(candidate);
        let effects = self.session.start();
        self.apply(effects);
        self.publish();

        let mut ticker = interval_at(Instant::now() + TICK, TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Armed once the summary is in; every command pushes the deadline back.
        let finish_deadline = sleep(self.settings.finish_timeout);
        tokio::pin!(finish_deadline);
        let mut awaiting_finish = false;

        loop {
            tokio::select! {
                envelope = commands.recv() => {
                    let Some(Envelope { command, reply }) = envelope else {
                        warn!("Session {} lost all handles, stopping", self.id);
                        break;
                    };
                    let result = self.handle_command(command);
                    self.publish();
                    let _ = reply.send(result);
                    if awaiting_finish {
                        finish_deadline
                            .as_mut()
                            .reset(Instant::now() + self.settings.finish_timeout);
                    }
                }
                Some(event) = events.recv() => {
                    self.handle_event(event);
                    self.publish();
                }
                _ = ticker.tick() => {
                    let effects = self.session.on_timer_tick();
                    self.apply(effects);
                    self.publish();
                }
                () = &mut finish_deadline, if awaiting_finish => {
                    warn!(
                        "Session {} was never finished within {:?}, stopping",
                        self.id, self.settings.finish_timeout
                    );
                    break;
                }
            }

            if self.session.is_terminated() {
                break;
            }
            if !awaiting_finish && self.session.awaiting_finish() {
                awaiting_finish = true;
                finish_deadline
                    .as_mut()
                    .reset(Instant::now() + self.settings.finish_timeout);
            }
        }
        self.registry.remove(&self.id);
        info!("Session {} stopped", self.id);
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.session.snapshot());
    }

    fn handle_command(&mut self, command: Command) -> Result<(), SessionError> {
        let effects = match command {
            Command::SubmitText { text } => self.session.submit_text(&text)?,
            Command::SubmitAudio {
                audio,
                content_type,
            } => {
                self.session.accept_audio()?;
                let transcriber = Arc::clone(&self.services.transcriber);
                let events = self.events.clone();
                tokio::spawn(async move {
                    let result = transcriber.transcribe(audio, &content_type).await;
                    let _ = events.send(Event::Transcribed(result));
                });
                Vec::new()
            }
            Command::SpeechFinished { utterance } => self.session.on_speech_finished(utterance),
            Command::SetCapture { active } => {
                self.session.set_capture(active)?;
                Vec::new()
            }
            Command::CaptureFailed { reason } => {
                self.session.on_capture_failed(&reason);
                Vec::new()
            }
            Command::Leave => self.session.leave()?,
            Command::Finish { feedback } => self.session.finish(feedback)?,
        };
        self.apply(effects);
        Ok(())
    }

    fn handle_event(&mut self, event: Event) {
        let effects = match event {
            Event::Continuation(continuation) => self.session.on_continuation(continuation),
            Event::StageResult { token, result } => self.session.on_model_response(token, result),
            Event::Transcribed(result) => self.session.on_transcribed(result),
            Event::Synthesized { utterance, result } => match result {
                Ok(audio) if utterance == self.session.utterance() => {
                    self.audio.send_replace(Some(AudioClip { utterance, audio }));
                    Vec::new()
                }
                Ok(_) => {
                    debug!("Dropping audio for stale utterance {utterance}");
                    Vec::new()
                }
                Err(e) => self.session.on_speech_failed(utterance, &e),
            },
            Event::CandidateResolved(info) => {
                self.session.set_candidate(Ok(info));
                Vec::new()
            }
            Event::ConversationFlushed(result) => {
                self.session.on_conversation_flushed(result);
                Vec::new()
            }
            Event::RankingsSaved(result) => {
                self.session.on_rankings_saved(result);
                Vec::new()
            }
            Event::InterviewSaved(result) => {
                self.session.on_interview_saved(result);
                Vec::new()
            }
        };
        self.apply(effects);
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        let events = self.events.clone();
        match effect {
            Effect::Invoke(call) => {
                let scorer = Arc::clone(&self.services.scorer);
                let stage = call.prompt.stage();
                let prompt = call.prompt.build();
                let token = call.token;
                tokio::spawn(async move {
                    let result = scorer.score(stage, &prompt).await;
                    let _ = events.send(Event::StageResult { token, result });
                });
            }
            Effect::Speak { utterance, text } => {
                let synthesizer = Arc::clone(&self.services.synthesizer);
                tokio::spawn(async move {
                    let result = synthesizer.synthesize(&text).await;
                    let _ = events.send(Event::Synthesized { utterance, result });
                });
            }
            Effect::StopAudio => {
                self.audio.send_replace(None);
            }
            Effect::Schedule {
                continuation,
                delay,
            } => {
                let delay = match delay {
                    Delay::Settle => self.settings.settle_delay,
                    Delay::Debounce => self.settings.debounce,
                };
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = events.send(Event::Continuation(continuation));
                });
            }
            Effect::FlushConversation(conversation) => {
                let lookup = self.candidate_lookup();
                tokio::spawn(async move {
                    let result = async {
                        let info = lookup.resolve(&events).await?;
                        let record = ConversationRecord {
                            conversation,
                            candidate_name: info.candidate_name,
                            candidate_id: lookup.candidate_id,
                            post_id: info.post_id,
                        };
                        lookup.store.save_conversation(&record).await
                    }
                    .await;
                    let _ = events.send(Event::ConversationFlushed(result));
                });
            }
            Effect::SaveRankings(ranking) => {
                let lookup = self.candidate_lookup();
                tokio::spawn(async move {
                    let result = async {
                        let info = lookup.resolve(&events).await?;
                        let record = RankingsRecord::new(
                            &ranking,
                            info.candidate_name,
                            lookup.candidate_id,
                            info.post_id,
                        );
                        lookup.store.save_rankings(&record).await
                    }
                    .await;
                    let _ = events.send(Event::RankingsSaved(result));
                });
            }
            Effect::SaveInterview { feedback } => {
                let lookup = self.candidate_lookup();
                tokio::spawn(async move {
                    let result = async {
                        let info = lookup.resolve(&events).await?;
                        let record = InterviewRecord::pending(
                            lookup.candidate_id,
                            info.post_id,
                            SPOKEN_ROUND,
                            feedback,
                        );
                        lookup.store.save_interview(&record).await.map(|_| ())
                    }
                    .await;
                    let _ = events.send(Event::InterviewSaved(result));
                });
            }
        }
    }

    fn candidate_lookup(&self) -> CandidateLookup {
        CandidateLookup {
            candidate_id: self.session.candidate_id(),
            cached: self.session.candidate().cloned(),
            store: Arc::clone(&self.services.store),
        }
    }
}

/// Candidate details for a persistence call: the cached value, or a fresh fetch when
/// the lookup at session start failed.
struct CandidateLookup {
    candidate_id: i64,
    cached: Option<CandidateInfo>,
    store: Arc<dyn InterviewStore>,
}

impl CandidateLookup {
    async fn resolve(
        &self,
        events: &mpsc::UnboundedSender<Event>,
    ) -> Result<CandidateInfo, ServiceError> {
        if let Some(info) = &self.cached {
            return Ok(info.clone());
        }
        let info = self.store.candidate_info(self.candidate_id).await?;
        let _ = events.send(Event::CandidateResolved(info.clone()));
        Ok(info)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::interview::machine::{NoticeKind, Phase};
    use crate::interview::stages::Stage;
    use crate::models::records::{InterviewSaved, McqRecord};

    /// Scripted model: one canned reply per stage.
    pub(crate) struct FakeScorer {
        replies: HashMap<Stage, String>,
    }

    impl FakeScorer {
        pub(crate) fn scripted() -> Self {
            let replies = [
                (Stage::Welcome, "Welcome to Acme, Asha. Please introduce yourself."),
                (Stage::Introduction, "Thanks. Tell me about a recent project."),
                (Stage::Start, "Great, let's get into the questions."),
                (Stage::Compare, "You covered part of it. Coverage=40"),
                (Stage::Followup, "What triggers a re-render?"),
                (Stage::CompareFollowup, "That is right. Coverage=80"),
                (Stage::NextQuestion, "Moving on to the next question."),
                (Stage::InterviewEnd, "Our time is up. Thank you, Asha."),
                (Stage::Summary, "Lan=8 Sub=7 Beh=9 Sum=Did well overall"),
            ]
            .into_iter()
            .map(|(stage, reply)| (stage, reply.to_string()))
            .collect();
            Self { replies }
        }
    }

    #[async_trait]
    impl Scorer for FakeScorer {
        async fn score(&self, stage: Stage, _prompt: &str) -> Result<String, ServiceError> {
            self.replies
                .get(&stage)
                .cloned()
                .ok_or(ServiceError::NoModel(stage))
        }
    }

    pub(crate) struct FakeSynthesizer;

    #[async_trait]
    impl Synthesizer for FakeSynthesizer {
        async fn synthesize(&self, text: &str) -> Result<Bytes, ServiceError> {
            Ok(Bytes::from(text.as_bytes().to_vec()))
        }
    }

    pub(crate) struct FakeTranscriber;

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn transcribe(&self, audio: Bytes, _content_type: &str) -> Result<String, ServiceError> {
            String::from_utf8(audio.to_vec()).map_err(|_| ServiceError::EmptyTranscript)
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeStore {
        /// Number of upcoming `candidate_info` calls that fail.
        pub(crate) lookup_failures: AtomicU32,
        pub(crate) lookups: AtomicU32,
        pub(crate) conversations: Mutex<Vec<ConversationRecord>>,
        pub(crate) rankings: Mutex<Vec<RankingsRecord>>,
        pub(crate) interviews: Mutex<Vec<InterviewRecord>>,
        pub(crate) mcq: Mutex<Vec<McqRecord>>,
    }

    #[async_trait]
    impl InterviewStore for FakeStore {
        async fn candidate_info(&self, _candidate_id: i64) -> Result<CandidateInfo, ServiceError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .lookup_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(ServiceError::Api {
                    service: "store",
                    status: 503,
                    message: "candidate service unavailable".to_string(),
                });
            }
            Ok(CandidateInfo {
                candidate_name: "Asha".to_string(),
                post_id: 7,
            })
        }

        async fn save_conversation(&self, record: &ConversationRecord) -> Result<(), ServiceError> {
            self.conversations.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn save_rankings(&self, record: &RankingsRecord) -> Result<(), ServiceError> {
            self.rankings.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn save_interview(
            &self,
            record: &InterviewRecord,
        ) -> Result<InterviewSaved, ServiceError> {
            self.interviews.lock().unwrap().push(record.clone());
            Ok(InterviewSaved {
                interview_id: Some(11),
            })
        }

        async fn save_mcq(&self, record: &McqRecord) -> Result<(), ServiceError> {
            self.mcq.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    pub(crate) fn collaborators(store: Arc<FakeStore>) -> Collaborators {
        Collaborators {
            transcriber: Arc::new(FakeTranscriber),
            synthesizer: Arc::new(FakeSynthesizer),
            scorer: Arc::new(FakeScorer::scripted()),
            store,
        }
    }

    pub(crate) fn settings(questions: usize) -> SessionSettings {
        SessionSettings {
            company: "Acme".to_string(),
            interview_seconds: 60,
            settle_delay: Duration::from_millis(100),
            debounce: Duration::from_millis(500),
            finish_timeout: Duration::from_secs(300),
            questions: Arc::new(
                (1..=questions)
                    .map(|i| Question {
                        id: format!("q{i}"),
                        prompt: format!("Question text {i}?"),
                        expected_answer: format!("Expected answer {i}"),
                    })
                    .collect(),
            ),
        }
    }

    async fn wait_until(
        handle: &SessionHandle,
        mut ready: impl FnMut(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        let mut rx = handle.subscribe();
        let snapshot = tokio::time::timeout(Duration::from_secs(600), rx.wait_for(|s| ready(s)))
            .await
            .expect("timed out waiting for session")
            .expect("session closed");
        snapshot.clone()
    }

    /// Waits for the next utterance and reports its playback as finished.
    async fn hear_next(handle: &SessionHandle, after: u64) -> SessionSnapshot {
        let spoken = wait_until(handle, |s| s.flags.speaking && s.utterance > after).await;
        handle
            .send(Command::SpeechFinished {
                utterance: spoken.utterance,
            })
            .await
            .unwrap();
        spoken
    }

    async fn answer(handle: &SessionHandle, text: &str) {
        wait_until(handle, |s| s.flags.listening).await;
        handle
            .send(Command::SubmitText {
                text: text.to_string(),
            })
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_interview_runs_to_termination() {
        let store = Arc::new(FakeStore::default());
        let registry = SessionRegistry::new();
        let handle = spawn_session(42, settings(5), collaborators(Arc::clone(&store)), &registry);

        let s = hear_next(&handle, 0).await;
        assert_eq!(s.phase, Phase::Welcome);
        assert_eq!(s.candidate_name, "Asha");
        answer(&handle, "Hello, I am Asha").await;

        let s = hear_next(&handle, s.utterance).await;
        assert_eq!(s.phase, Phase::Introduction);
        answer(&handle, "I build React apps").await;

        let s = hear_next(&handle, s.utterance).await;
        assert_eq!(s.phase, Phase::Start);

        let s = hear_next(&handle, s.utterance).await;
        assert_eq!(s.phase, Phase::QuestionLoop);
        let first_question = s.current_question.clone().unwrap();
        answer(&handle, "Components and props").await;

        let s = hear_next(&handle, s.utterance).await;
        assert_eq!(s.coverage, Some(40));
        assert_eq!(s.display.as_deref(), Some("You covered part of it."));

        let s = hear_next(&handle, s.utterance).await;
        assert_eq!(s.followup_count, 1);
        assert_eq!(s.current_question.as_deref(), Some("What triggers a re-render?"));
        answer(&handle, "State changes").await;

        let s = hear_next(&handle, s.utterance).await;
        assert_eq!(s.coverage, Some(80));

        let s = hear_next(&handle, s.utterance).await;
        assert_eq!(s.followup_count, 0);

        let s = hear_next(&handle, s.utterance).await;
        assert_ne!(s.current_question.as_deref(), Some(first_question.as_str()));

        let ended = wait_until(&handle, |s| s.summary_ready).await;
        assert_eq!(ended.phase, Phase::Ending);
        assert_eq!(ended.remaining_seconds, 0);
        let ranking = ended.ranking.expect("ranking");
        assert_eq!(
            (ranking.fluency, ranking.subject_knowledge, ranking.professional_behavior),
            (8, 7, 9)
        );
        assert_eq!(ranking.summary, "Did well overall");

        handle
            .send(Command::Finish {
                feedback: Some("Good fundamentals".to_string()),
            })
            .await
            .unwrap();
        wait_until(&handle, |s| s.phase == Phase::Terminated).await;
        assert!(matches!(
            handle.send(Command::Leave).await,
            Err(CommandError::Closed)
        ));
        assert_eq!(registry.len(), 0);

        let conversations = store.conversations.lock().unwrap();
        assert_eq!(conversations.len(), 1);
        let log = &conversations[0].conversation;
        for label in [
            "Welcome Message",
            "Introduction Question",
            "Start The Question Message",
            "Question 1",
            "Candidate Answer 1",
            "Question_Feedback 1",
            "Followup_Question 1",
            "Candidate Followup_Answer 1",
            "Followup_Question_Feedback 1",
            "Question 2",
            "Interview_End",
        ] {
            assert!(log.contains(label), "missing {label}");
        }
        assert_eq!(conversations[0].post_id, 7);

        let rankings = store.rankings.lock().unwrap();
        assert_eq!(rankings[0].rankings.3, "Did well overall");

        let interviews = store.interviews.lock().unwrap();
        assert_eq!(interviews[0].interview_stage, SPOKEN_ROUND);
        assert_eq!(
            interviews[0].interview_feedback.as_deref(),
            Some("Good fundamentals")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_audio_answer_is_transcribed() {
        let store = Arc::new(FakeStore::default());
        let handle = spawn_session(42, settings(2), collaborators(store), &SessionRegistry::new());

        hear_next(&handle, 0).await;
        wait_until(&handle, |s| s.flags.listening).await;
        handle
            .send(Command::SubmitAudio {
                audio: Bytes::from_static(b"Hello there"),
                content_type: "audio/webm".to_string(),
            })
            .await
            .unwrap();

        let s = wait_until(&handle, |s| s.phase == Phase::Introduction).await;
        assert_eq!(
            s.conversation.get("Candidate Welcome Reply"),
            Some("Hello there")
        );
        assert!(handle.audio().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_are_rejected_when_not_listening() {
        let store = Arc::new(FakeStore::default());
        let handle = spawn_session(42, settings(2), collaborators(store), &SessionRegistry::new());
        wait_until(&handle, |s| s.flags.speaking).await;

        let err = handle
            .send(Command::SubmitText {
                text: "too early".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Rejected(SessionError::NotListening)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_ends_interview_early() {
        let store = Arc::new(FakeStore::default());
        let handle = spawn_session(42, settings(2), collaborators(Arc::clone(&store)), &SessionRegistry::new());
        hear_next(&handle, 0).await;

        handle.send(Command::Leave).await.unwrap();
        let s = wait_until(&handle, |s| s.summary_ready).await;
        assert_eq!(s.phase, Phase::Ending);
        assert!(s.remaining_seconds > 0);
        assert!(handle.audio().map_or(true, |clip| clip.utterance > 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_candidate_lookup_is_retried_at_persistence() {
        let store = Arc::new(FakeStore {
            lookup_failures: AtomicU32::new(1),
            ..FakeStore::default()
        });
        let handle = spawn_session(
            42,
            settings(2),
            collaborators(Arc::clone(&store)),
            &SessionRegistry::new(),
        );

        let s = hear_next(&handle, 0).await;
        assert_eq!(s.candidate_name, "Candidate");
        assert!(s
            .notices
            .iter()
            .any(|n| n.kind == NoticeKind::CandidateInfoUnavailable));

        handle.send(Command::Leave).await.unwrap();
        wait_until(&handle, |s| s.summary_ready).await;
        handle.send(Command::Finish { feedback: None }).await.unwrap();
        wait_until(&handle, |s| s.phase == Phase::Terminated).await;
        assert!(matches!(
            handle.send(Command::Leave).await,
            Err(CommandError::Closed)
        ));

        assert!(store.lookups.load(Ordering::SeqCst) >= 2);
        let conversations = store.conversations.lock().unwrap();
        assert_eq!(conversations[0].post_id, 7);
        assert_eq!(conversations[0].candidate_name, "Asha");
        let rankings = store.rankings.lock().unwrap();
        assert_eq!(rankings[0].post_id, 7);
        let interviews = store.interviews.lock().unwrap();
        assert_eq!(interviews[0].post_id, 7);
    }
}
