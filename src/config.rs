use crate::audio::DispatchSettings;
use crate::persona::{Persona, VoiceTable};
use crate::transcript::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "groq_api_key")]
    pub groq_key: String,
    #[serde(rename = "open_api_key")]
    pub openai_key: String,
    #[serde(rename = "elevenlabs_api_key")]
    pub elevenlabs_key: String,
    #[serde(rename = "eleven_model_id")]
    #[serde(default = "default_model_id")]
    pub eleven_model_id: String,
    #[serde(default = "default_voice_id")]
    pub default_voice_id: String,
    #[serde(default)]
    pub voice_ids: HashMap<Persona, String>,
    #[serde(default = "default_transcript_model")]
    pub transcript_model: String,
    #[serde(default = "default_caption_model")]
    pub caption_model: String,
    #[serde(default = "default_groq_base_url")]
    pub groq_base_url: String,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_elevenlabs_base_url")]
    pub elevenlabs_base_url: String,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// Tunables for retry, fan-out and file layout. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub transcript_attempts: u32,
    pub transcript_backoff_secs: u64,
    pub audio_concurrency: usize,
    pub audio_attempts: u32,
    pub caption_concurrency: usize,
    /// Per-call deadline for synthesis and correction; 0 disables it.
    pub task_timeout_secs: u64,
    pub background_count: u32,
    pub public_dir: PathBuf,
    pub context_path: PathBuf,
    pub job_manifest_path: PathBuf,
    pub status_dir: PathBuf,
    pub clean_outputs: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            transcript_attempts: 5,
            transcript_backoff_secs: 15,
            audio_concurrency: 5,
            audio_attempts: 2,
            caption_concurrency: 8,
            task_timeout_secs: 300,
            background_count: 13,
            public_dir: PathBuf::from("public"),
            context_path: PathBuf::from("src/tmp/context.tsx"),
            job_manifest_path: PathBuf::from("src/tmp/job.json"),
            status_dir: PathBuf::from("jobs"),
            clean_outputs: true,
        }
    }
}

impl PipelineSettings {
    pub fn voice_dir(&self) -> PathBuf {
        self.public_dir.join("voice")
    }

    pub fn srt_dir(&self) -> PathBuf {
        self.public_dir.join("srt")
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        (self.task_timeout_secs > 0).then(|| Duration::from_secs(self.task_timeout_secs))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.transcript_attempts,
            backoff: Duration::from_secs(self.transcript_backoff_secs),
        }
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            concurrency: self.audio_concurrency,
            attempts: self.audio_attempts,
            task_timeout: self.task_timeout(),
        }
    }
}

fn default_model_id() -> String {
    "eleven_multilingual_v2".to_string()
}

fn default_voice_id() -> String {
    "JBFqnCBsd6RMkjVDRZzb".to_string()
}

fn default_transcript_model() -> String {
    "llama3-70b-8192".to_string()
}

fn default_caption_model() -> String {
    "gpt-4-turbo".to_string()
}

fn default_groq_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_elevenlabs_base_url() -> String {
    "https://api.elevenlabs.io/v1".to_string()
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content).context("config.json: invalid JSON")?;

        if config.groq_key.is_empty() {
            anyhow::bail!("config.json: groq_api_key missing");
        }
        if config.openai_key.is_empty() {
            anyhow::bail!("config.json: open_api_key missing");
        }
        if config.elevenlabs_key.is_empty() {
            anyhow::bail!("config.json: elevenlabs_api_key missing");
        }
        if config.pipeline.transcript_attempts == 0 {
            anyhow::bail!("config.json: pipeline.transcript_attempts must be at least 1");
        }

        Ok(config)
    }

    pub fn voice_table(&self) -> VoiceTable {
        VoiceTable::new(self.voice_ids.clone(), self.default_voice_id.clone())
    }
}
