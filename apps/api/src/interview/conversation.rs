//! Conversation Log: the append-only record of one interview sitting.
//!
//! Repeatable exchanges are stored under numbered labels (`Candidate Answer 3`), where
//! the number is the next unused suffix for that family. One-off messages are stored
//! under fixed labels and may be written exactly once. Nothing is ever overwritten.
//!
//! The log serializes as a JSON object in insertion order, which is what both the
//! summary prompt and the external store receive.

use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("label '{0}' has already been written")]
    DuplicateLabel(String),

    #[error("conversation has already been flushed")]
    AlreadyFlushed,
}

/// Numbered label families. The label is `"<prefix> <n>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelFamily {
    Question,
    CandidateAnswer,
    QuestionFeedback,
    FollowupQuestion,
    CandidateFollowupAnswer,
    FollowupQuestionFeedback,
}

impl LabelFamily {
    pub fn prefix(self) -> &'static str {
        match self {
            LabelFamily::Question => "Question",
            LabelFamily::CandidateAnswer => "Candidate Answer",
            LabelFamily::QuestionFeedback => "Question_Feedback",
            LabelFamily::FollowupQuestion => "Followup_Question",
            LabelFamily::CandidateFollowupAnswer => "Candidate Followup_Answer",
            LabelFamily::FollowupQuestionFeedback => "Followup_Question_Feedback",
        }
    }
}

/// Labels that appear at most once per interview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingletonLabel {
    WelcomeMessage,
    CandidateWelcomeReply,
    IntroductionQuestion,
    CandidateIntroductionReply,
    StartQuestionMessage,
    InterviewEnd,
}

impl SingletonLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            SingletonLabel::WelcomeMessage => "Welcome Message",
            SingletonLabel::CandidateWelcomeReply => "Candidate Welcome Reply",
            SingletonLabel::IntroductionQuestion => "Introduction Question",
            SingletonLabel::CandidateIntroductionReply => "Candidate Introduction Reply",
            SingletonLabel::StartQuestionMessage => "Start The Question Message",
            SingletonLabel::InterviewEnd => "Interview_End",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    entries: Vec<(String, String)>,
    flushed: bool,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `text` under the next free label of `family` and returns that label.
    pub fn append(&mut self, family: LabelFamily, text: impl Into<String>) -> String {
        let label = self.next_label(family);
        self.entries.push((label.clone(), text.into()));
        label
    }

    /// Writes a one-off label. A second write to the same label is rejected.
    pub fn set_once(
        &mut self,
        label: SingletonLabel,
        text: impl Into<String>,
    ) -> Result<(), ConversationError> {
        let label = label.as_str();
        if self.contains(label) {
            return Err(ConversationError::DuplicateLabel(label.to_string()));
        }
        self.entries.push((label.to_string(), text.into()));
        Ok(())
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, text)| text.as_str())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.iter().any(|(l, _)| l == label)
    }

    #[cfg(test)]
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Marks the log as flushed and returns the copy to hand to the store.
    /// Only the first call succeeds.
    pub fn begin_flush(&mut self) -> Result<ConversationLog, ConversationError> {
        if self.is_flushed() {
            return Err(ConversationError::AlreadyFlushed);
        }
        self.flushed = true;
        Ok(self.clone())
    }

    /// Pretty JSON used as the conversation body of the summary prompt.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    fn next_label(&self, family: LabelFamily) -> String {
        let prefix = family.prefix();
        let mut index = 1;
        while self.contains(&format!("{prefix} {index}")) {
            index += 1;
        }
        format!("{prefix} {index}")
    }
}

impl Serialize for ConversationLog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, text) in &self.entries {
            map.serialize_entry(label, text)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_labels_start_at_one_and_increase() {
        let mut log = ConversationLog::new();
        assert_eq!(log.append(LabelFamily::CandidateAnswer, "a"), "Candidate Answer 1");
        assert_eq!(log.append(LabelFamily::CandidateAnswer, "b"), "Candidate Answer 2");
        assert_eq!(log.append(LabelFamily::CandidateAnswer, "c"), "Candidate Answer 3");
    }

    #[test]
    fn test_families_are_numbered_independently() {
        let mut log = ConversationLog::new();
        log.append(LabelFamily::Question, "q1");
        log.append(LabelFamily::Question, "q2");
        assert_eq!(
            log.append(LabelFamily::FollowupQuestion, "f"),
            "Followup_Question 1"
        );
        assert_eq!(
            log.append(LabelFamily::FollowupQuestionFeedback, "ff"),
            "Followup_Question_Feedback 1"
        );
        assert_eq!(log.append(LabelFamily::Question, "q3"), "Question 3");
    }

    #[test]
    fn test_existing_labels_are_never_overwritten() {
        let mut log = ConversationLog::new();
        log.append(LabelFamily::QuestionFeedback, "first");
        log.append(LabelFamily::QuestionFeedback, "second");
        assert_eq!(log.get("Question_Feedback 1"), Some("first"));
        assert_eq!(log.get("Question_Feedback 2"), Some("second"));
    }

    #[test]
    fn test_set_once_rejects_second_write() {
        let mut log = ConversationLog::new();
        log.set_once(SingletonLabel::InterviewEnd, "Thanks").unwrap();
        let err = log
            .set_once(SingletonLabel::InterviewEnd, "Thanks again")
            .unwrap_err();
        assert_eq!(err, ConversationError::DuplicateLabel("Interview_End".to_string()));
        assert_eq!(log.get("Interview_End"), Some("Thanks"));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_serializes_in_insertion_order() {
        let mut log = ConversationLog::new();
        log.set_once(SingletonLabel::WelcomeMessage, "Hi").unwrap();
        log.append(LabelFamily::Question, "What is JSX?");
        log.append(LabelFamily::CandidateAnswer, "A syntax extension");

        let json = serde_json::to_string(&log).unwrap();
        assert_eq!(
            json,
            r#"{"Welcome Message":"Hi","Question 1":"What is JSX?","Candidate Answer 1":"A syntax extension"}"#
        );
    }

    #[test]
    fn test_flush_happens_once() {
        let mut log = ConversationLog::new();
        log.set_once(SingletonLabel::WelcomeMessage, "Hi").unwrap();
        let copy = log.begin_flush().unwrap();
        assert_eq!(copy.len(), 1);
        assert!(log.is_flushed());
        assert_eq!(log.begin_flush().unwrap_err(), ConversationError::AlreadyFlushed);
    }
}
