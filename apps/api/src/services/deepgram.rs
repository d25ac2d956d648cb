//! Deepgram pre-recorded transcription.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::services::{ServiceError, Transcriber};

const DEEPGRAM_LISTEN_URL: &str =
    "https://api.deepgram.com/v1/listen?model=nova-2&language=en-US&smart_format=true";

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: ListenResults,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    channels: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    transcript: String,
}

impl ListenResponse {
    /// Transcript of the first alternative on the first channel.
    fn transcript(&self) -> Option<&str> {
        self.results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.trim())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Clone)]
pub struct DeepgramTranscriber {
    client: Client,
    api_key: String,
}

impl DeepgramTranscriber {
    pub fn new(client: Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl Transcriber for DeepgramTranscriber {
    async fn transcribe(&self, audio: Bytes, content_type: &str) -> Result<String, ServiceError> {
        let size = audio.len();
        let response = self
            .client
            .post(DEEPGRAM_LISTEN_URL)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", content_type)
            .body(audio)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Api {
                service: "deepgram",
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: ListenResponse = response.json().await?;
        let transcript = body.transcript().ok_or(ServiceError::EmptyTranscript)?;
        debug!("Transcribed {size} bytes into {} chars", transcript.len());
        Ok(transcript.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_is_read_from_first_alternative() {
        let json = r#"{"results":{"channels":[{"alternatives":[
            {"transcript":" React is a library ","confidence":0.98},
            {"transcript":"React is a lie bury"}
        ]}]}}"#;
        let body: ListenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.transcript(), Some("React is a library"));
    }

    #[test]
    fn test_blank_transcript_is_none() {
        let json = r#"{"results":{"channels":[{"alternatives":[{"transcript":"   "}]}]}}"#;
        let body: ListenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.transcript(), None);
    }

    #[test]
    fn test_missing_channels_is_none() {
        let json = r#"{"results":{"channels":[]}}"#;
        let body: ListenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.transcript(), None);
    }
}
