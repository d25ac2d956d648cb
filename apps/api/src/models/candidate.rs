use serde::{Deserialize, Serialize};

/// Candidate identity as returned by `GET /get-candidate-info/:id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateInfo {
    pub candidate_name: String,
    pub post_id: i64,
}
