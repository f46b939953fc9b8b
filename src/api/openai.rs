//! OpenAI-compatible chat completions (Groq for dialogue, OpenAI for
//! caption correction).

use crate::api::snippet;
use crate::captions::CaptionCorrector;
use crate::config::Config;
use crate::error::ServiceError;
use crate::transcript::{CompletionClient, CompletionRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

pub struct ChatCompletions {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl ChatCompletions {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Dialogue generation endpoint.
    pub fn groq(client: Client, cfg: &Config) -> Self {
        Self::new(client, &cfg.groq_base_url, &cfg.groq_key, &cfg.transcript_model)
            .with_temperature(0.5)
            .with_max_tokens(4096)
    }

    /// Caption correction endpoint.
    pub fn openai(client: Client, cfg: &Config) -> Self {
        Self::new(client, &cfg.openai_base_url, &cfg.openai_key, &cfg.caption_model)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn request_body(&self, messages: Vec<Value>, json_object: bool) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(n) = self.max_tokens {
            body["max_tokens"] = json!(n);
        }
        if json_object {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }

    /// Text of the first choice; an absent or null content is `""`.
    pub async fn chat(&self, messages: Vec<Value>, json_object: bool) -> Result<String, ServiceError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(messages, json_object))
            .send()
            .await?;

        let status = resp.status();
        let raw = resp.text().await?;

        if !status.is_success() {
            warn!(model = %self.model, status = status.as_u16(), "chat completion HTTP failure");
            log_api_error(&raw);
            return Err(ServiceError::Http {
                status: status.as_u16(),
                body: snippet(&raw, 800),
            });
        }

        let content = extract_message_content(&raw).ok_or_else(|| {
            log_api_error(&raw);
            ServiceError::Parse(format!("no choices in response: {}", snippet(&raw, 200)))
        })?;
        debug!(model = %self.model, chars = content.len(), "chat completion received");
        Ok(content)
    }
}

#[async_trait]
impl CompletionClient for ChatCompletions {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        let messages = vec![
            json!({"role": "system", "content": request.system}),
            json!({"role": "user", "content": request.user}),
        ];
        self.chat(messages, request.json_object).await
    }
}

#[async_trait]
impl CaptionCorrector for ChatCompletions {
    async fn correct(&self, trusted: &str, rough: &str) -> Result<String, ServiceError> {
        let messages = vec![json!({"role": "system", "content": correction_prompt(trusted, rough)})];
        self.chat(messages, false).await
    }
}

pub fn correction_prompt(trusted: &str, rough: &str) -> String {
    format!(
        "The first item below is the correct transcript. The second is an SRT file generated from the same audio, which may misspell words \
or leave some out entirely. Using the transcript as the source of truth, return the SRT text with its wording corrected and any missing \
words restored. Keep every cue number and timestamp exactly as given and return only the SRT text.\n\n\
transcript:\n{trusted}\n\nsrt file text:\n{rough}"
    )
}

fn extract_message_content(resp_json: &str) -> Option<String> {
    let root: Value = serde_json::from_str(resp_json).ok()?;
    if root.get("error").is_some() {
        return None;
    }
    let message = root.get("choices")?.as_array()?.first()?.get("message")?;
    Some(
        message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    )
}

fn log_api_error(resp_json: &str) {
    let Ok(root) = serde_json::from_str::<Value>(resp_json) else {
        if !resp_json.is_empty() {
            warn!("raw body: {}", snippet(resp_json, 800));
        }
        return;
    };
    let Some(err) = root.get("error") else {
        return;
    };
    let field = |key: &str| err.get(key).and_then(Value::as_str).unwrap_or("-").to_string();
    warn!(
        message = %field("message"),
        kind = %field("type"),
        code = %field("code"),
        "chat completion error"
    );
}
