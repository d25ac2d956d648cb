//! Payloads sent to the external interview store.

use serde::{Deserialize, Serialize};

use crate::interview::conversation::ConversationLog;
use crate::interview::extract::RankingResult;

/// Interview rounds as numbered by the store.
pub const MCQ_ROUND: u8 = 1;
pub const SPOKEN_ROUND: u8 = 2;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub conversation: ConversationLog,
    pub candidate_name: String,
    pub candidate_id: i64,
    pub post_id: i64,
}

/// `rankings` goes over the wire as `[fluency, subject, behaviour, summary]`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingsRecord {
    pub rankings: (u8, u8, u8, String),
    pub candidate_name: String,
    pub candidate_id: i64,
    pub post_id: i64,
}

impl RankingsRecord {
    pub fn new(ranking: &RankingResult, candidate_name: String, candidate_id: i64, post_id: i64) -> Self {
        Self {
            rankings: (
                ranking.fluency,
                ranking.subject_knowledge,
                ranking.professional_behavior,
                ranking.summary.clone(),
            ),
            candidate_name,
            candidate_id,
            post_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewRecord {
    pub candidate_id: i64,
    pub post_id: i64,
    pub interview_stage: u8,
    pub selected: String,
    pub report_to_hr: String,
    pub interview_feedback: Option<String>,
}

impl InterviewRecord {
    /// A fresh, not-yet-reviewed record for the given round.
    pub fn pending(candidate_id: i64, post_id: i64, round: u8, feedback: Option<String>) -> Self {
        Self {
            candidate_id,
            post_id,
            interview_stage: round,
            selected: "no".to_string(),
            report_to_hr: "no".to_string(),
            interview_feedback: feedback,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewSaved {
    #[serde(default)]
    pub interview_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McqResponse {
    pub question: String,
    pub selected_answer: String,
    pub correct_answer: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct McqRecord {
    pub candidate_name: String,
    pub candidate_id: i64,
    pub post_id: i64,
    pub mcq_responses: Vec<McqResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rankings_record_serializes_as_four_element_array() {
        let ranking = RankingResult {
            fluency: 8,
            subject_knowledge: 7,
            professional_behavior: 9,
            summary: "Did well overall".to_string(),
        };
        let record = RankingsRecord::new(&ranking, "Asha".to_string(), 12, 3);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["rankings"], serde_json::json!([8, 7, 9, "Did well overall"]));
        assert_eq!(json["candidateName"], "Asha");
        assert_eq!(json["postId"], 3);
    }

    #[test]
    fn test_interview_record_uses_store_field_names() {
        let record = InterviewRecord::pending(12, 3, SPOKEN_ROUND, None);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["interviewStage"], 2);
        assert_eq!(json["selected"], "no");
        assert_eq!(json["reportToHr"], "no");
        assert!(json["interviewFeedback"].is_null());
    }
}
