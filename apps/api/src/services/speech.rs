use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Serialize;

use crate::services::{ServiceError, Synthesizer};

#[derive(Debug, Serialize)]
struct SpeakRequest<'a> {
    text: &'a str,
}

/// Speech synthesis over HTTP: `POST {"text": ...}` returns the encoded audio.
#[derive(Clone)]
pub struct HttpSynthesizer {
    client: Client,
    url: String,
}

impl HttpSynthesizer {
    pub fn new(client: Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Bytes, ServiceError> {
        let response = self
            .client
            .post(&self.url)
            .json(&SpeakRequest { text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Api {
                service: "speech",
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response.bytes().await?)
    }
}
