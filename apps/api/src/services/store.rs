//! REST client for the external interview store.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::info;

use crate::models::candidate::CandidateInfo;
use crate::models::records::{
    ConversationRecord, InterviewRecord, InterviewSaved, McqRecord, RankingsRecord,
};
use crate::services::{InterviewStore, ServiceError};

#[derive(Debug, Deserialize)]
struct StoreErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
}

impl RestStore {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, ServiceError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        check(response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned + Default>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        let response = self.post(path, body).await?;
        let text = response.text().await?;
        // Some endpoints answer with an empty body.
        Ok(serde_json::from_str(&text).unwrap_or_default())
    }
}

/// Turns non-2xx responses into `ServiceError::Api`, preferring the store's
/// `{"error": "..."}` message when present.
async fn check(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<StoreErrorBody>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    Err(ServiceError::Api {
        service: "store",
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl InterviewStore for RestStore {
    async fn candidate_info(&self, candidate_id: i64) -> Result<CandidateInfo, ServiceError> {
        let response = self
            .client
            .get(self.url(&format!("get-candidate-info/{candidate_id}")))
            .header("Accept", "application/json")
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn save_conversation(&self, record: &ConversationRecord) -> Result<(), ServiceError> {
        self.post("save-conversation", record).await?;
        info!(
            "Conversation saved for candidate {} ({} entries)",
            record.candidate_id,
            record.conversation.len()
        );
        Ok(())
    }

    async fn save_rankings(&self, record: &RankingsRecord) -> Result<(), ServiceError> {
        self.post("save-rankings", record).await?;
        info!("Rankings saved for candidate {}", record.candidate_id);
        Ok(())
    }

    async fn save_interview(
        &self,
        record: &InterviewRecord,
    ) -> Result<InterviewSaved, ServiceError> {
        let saved: InterviewSaved = self.post_json("save-interview", record).await?;
        info!(
            "Interview round {} saved for candidate {} (id {:?})",
            record.interview_stage, record.candidate_id, saved.interview_id
        );
        Ok(saved)
    }

    async fn save_mcq(&self, record: &McqRecord) -> Result<(), ServiceError> {
        self.post("save-mcq", record).await?;
        info!(
            "MCQ responses saved for candidate {} ({} answers)",
            record.candidate_id,
            record.mcq_responses.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_normalised() {
        let store = RestStore::new(Client::new(), "http://localhost:5000/");
        assert_eq!(
            store.url("save-conversation"),
            "http://localhost:5000/save-conversation"
        );
    }

    #[test]
    fn test_candidate_info_uses_camel_case() {
        let info: CandidateInfo =
            serde_json::from_str(r#"{"candidateName":"Asha","postId":4}"#).unwrap();
        assert_eq!(info.candidate_name, "Asha");
        assert_eq!(info.post_id, 4);
    }
}
