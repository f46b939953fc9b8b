use crate::api::snippet;
use crate::audio::{SpeechSynthesizer, SynthesisRequest};
use crate::config::Config;
use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use tokio::fs;
use tracing::{debug, warn};

pub struct ElevenLabs {
    client: Client,
    base_url: String,
    api_key: String,
    model_id: String,
}

impl ElevenLabs {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            base_url: cfg.elevenlabs_base_url.clone(),
            api_key: cfg.elevenlabs_key.clone(),
            model_id: cfg.eleven_model_id.clone(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabs {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<(), ServiceError> {
        let url = format!(
            "{}/text-to-speech/{}?output_format=mp3_44100_128",
            self.base_url.trim_end_matches('/'),
            request.voice_id
        );

        let body = serde_json::json!({
            "text": request.text,
            "model_id": self.model_id,
        });

        let resp = self
            .client
            .post(url)
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            warn!(persona = %request.persona, index = request.index, status = status.as_u16(), "ElevenLabs TTS failed");
            return Err(ServiceError::Http {
                status: status.as_u16(),
                body: snippet(&raw, 400),
            });
        }

        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Err(ServiceError::EmptyResponse);
        }
        if let Some(parent) = request.out_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&request.out_path, &bytes).await?;

        debug!(persona = %request.persona, index = request.index, bytes = bytes.len(), path = %request.out_path.display(), "audio written");
        Ok(())
    }
}
