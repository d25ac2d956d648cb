//! Stage Router: per-stage model budget and conversation storage.
//!
//! Every stage the interview can run is a `Stage` variant. Model-backed stages get a
//! `ModelProfile`; `Generate` has none because it draws straight from the question
//! pool. After a model call resolves, `Stage::record` writes the exchange into the
//! conversation log under that stage's labels.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::interview::conversation::{
    ConversationError, ConversationLog, LabelFamily, SingletonLabel,
};
use crate::interview::questions::{Question, QuestionPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Welcome,
    Introduction,
    Start,
    Generate,
    NextQuestion,
    Followup,
    Compare,
    CompareFollowup,
    InterviewEnd,
    Summary,
}

/// Output budget for one model-backed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelProfile {
    pub max_tokens: u32,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Welcome => "welcome",
            Stage::Introduction => "introduction",
            Stage::Start => "start",
            Stage::Generate => "generate",
            Stage::NextQuestion => "next_question",
            Stage::Followup => "followup",
            Stage::Compare => "compare",
            Stage::CompareFollowup => "comparefollowup",
            Stage::InterviewEnd => "interview_end",
            Stage::Summary => "summary",
        }
    }

    /// `None` for stages that never reach the model.
    pub fn model_profile(self) -> Option<ModelProfile> {
        let max_tokens = match self {
            Stage::Generate => return None,
            Stage::Welcome => 80,
            Stage::Introduction | Stage::Start => 60,
            Stage::NextQuestion => 80,
            Stage::Followup => 50,
            Stage::Compare | Stage::CompareFollowup => 120,
            Stage::InterviewEnd => 70,
            Stage::Summary => 300,
        };
        Some(ModelProfile { max_tokens })
    }

    /// Stages whose spoken output the candidate is expected to answer.
    /// The microphone opens automatically once their speech finishes.
    pub fn awaits_answer(self) -> bool {
        matches!(
            self,
            Stage::Welcome | Stage::Introduction | Stage::Generate | Stage::Followup
        )
    }

    /// Stores a resolved model exchange. `response` is the raw model text.
    pub fn record(
        self,
        log: &mut ConversationLog,
        transcript: Option<&str>,
        response: &str,
    ) -> Result<(), ConversationError> {
        let transcript = transcript.unwrap_or_default();
        match self {
            Stage::Welcome => log.set_once(SingletonLabel::WelcomeMessage, response)?,
            Stage::Introduction => {
                log.set_once(SingletonLabel::CandidateWelcomeReply, transcript)?;
                log.set_once(SingletonLabel::IntroductionQuestion, response)?;
            }
            Stage::Start => {
                log.set_once(SingletonLabel::CandidateIntroductionReply, transcript)?;
                log.set_once(SingletonLabel::StartQuestionMessage, response)?;
            }
            Stage::Compare => {
                log.append(LabelFamily::CandidateAnswer, transcript);
                log.append(LabelFamily::QuestionFeedback, response);
            }
            Stage::Followup => {
                log.append(LabelFamily::FollowupQuestion, response);
            }
            Stage::CompareFollowup => {
                log.append(LabelFamily::CandidateFollowupAnswer, transcript);
                log.append(LabelFamily::FollowupQuestionFeedback, response);
            }
            Stage::InterviewEnd => log.set_once(SingletonLabel::InterviewEnd, response)?,
            Stage::Generate | Stage::NextQuestion | Stage::Summary => {}
        }
        Ok(())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the `generate` pseudo-stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generated {
    Question { label: String, question: Question },
    Exhausted,
}

/// Draws the next question and logs it as `Question N`. No model round-trip.
pub fn generate(pool: &mut QuestionPool, log: &mut ConversationLog) -> Generated {
    match pool.draw() {
        Some(question) => {
            let label = log.append(LabelFamily::Question, question.prompt.clone());
            Generated::Question { label, question }
        }
        None => Generated::Exhausted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_of(n: usize) -> QuestionPool {
        QuestionPool::new(
            (1..=n)
                .map(|i| Question {
                    id: format!("q{i}"),
                    prompt: format!("Prompt {i}"),
                    expected_answer: format!("Expected {i}"),
                })
                .collect(),
        )
    }

    #[test]
    fn test_generate_has_no_model_profile() {
        assert!(Stage::Generate.model_profile().is_none());
        assert!(Stage::Compare.model_profile().is_some());
        assert!(Stage::Summary.model_profile().unwrap().max_tokens >= 200);
    }

    #[test]
    fn test_generate_logs_sequential_question_labels() {
        let mut pool = pool_of(2);
        let mut log = ConversationLog::new();

        let Generated::Question { label, question } = generate(&mut pool, &mut log) else {
            panic!("expected a question");
        };
        assert_eq!(label, "Question 1");
        assert_eq!(log.get("Question 1"), Some(question.prompt.as_str()));

        assert!(matches!(
            generate(&mut pool, &mut log),
            Generated::Question { ref label, .. } if label == "Question 2"
        ));
        assert_eq!(generate(&mut pool, &mut log), Generated::Exhausted);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_compare_records_answer_and_feedback_pairs() {
        let mut log = ConversationLog::new();
        Stage::Compare
            .record(&mut log, Some("first answer"), "ok Coverage=50")
            .unwrap();
        Stage::Compare
            .record(&mut log, Some("second answer"), "great Coverage=90")
            .unwrap();
        assert_eq!(log.get("Candidate Answer 2"), Some("second answer"));
        assert_eq!(log.get("Question_Feedback 2"), Some("great Coverage=90"));
    }

    #[test]
    fn test_compare_followup_uses_followup_families() {
        let mut log = ConversationLog::new();
        Stage::Followup.record(&mut log, None, "What is a hook?").unwrap();
        Stage::CompareFollowup
            .record(&mut log, Some("A function"), "Coverage=80")
            .unwrap();
        let labels: Vec<_> = log.labels().collect();
        assert_eq!(
            labels,
            vec![
                "Followup_Question 1",
                "Candidate Followup_Answer 1",
                "Followup_Question_Feedback 1"
            ]
        );
    }

    #[test]
    fn test_introduction_records_reply_then_question() {
        let mut log = ConversationLog::new();
        Stage::Introduction
            .record(&mut log, Some("Hello"), "Tell me about yourself")
            .unwrap();
        assert_eq!(log.get("Candidate Welcome Reply"), Some("Hello"));
        assert_eq!(log.get("Introduction Question"), Some("Tell me about yourself"));
    }

    #[test]
    fn test_interview_end_is_written_once() {
        let mut log = ConversationLog::new();
        Stage::InterviewEnd.record(&mut log, None, "Bye").unwrap();
        assert!(Stage::InterviewEnd.record(&mut log, None, "Bye again").is_err());
    }

    #[test]
    fn test_announcement_stages_store_nothing() {
        let mut log = ConversationLog::new();
        Stage::NextQuestion.record(&mut log, None, "Next one").unwrap();
        Stage::Summary
            .record(&mut log, None, "Lan=1 Sub=1 Beh=1 Sum=x")
            .unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn test_capture_stages() {
        assert!(Stage::Welcome.awaits_answer());
        assert!(Stage::Followup.awaits_answer());
        assert!(!Stage::Compare.awaits_answer());
        assert!(!Stage::Start.awaits_answer());
    }
}
