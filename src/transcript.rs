//! Transcript acquisition: a bounded, strictly sequential retry loop around a
//! completion service, with an explicit schema check on every response.

use crate::error::{PipelineError, Result, ServiceError, TranscriptRejection};
use crate::persona::Persona;
use anyhow::Context;
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_EXCHANGES: usize = 7;

/// One spoken line in playback order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueLine {
    #[serde(rename = "agentId")]
    pub speaker: Persona,
    pub text: String,
}

/// Prompt pair sent to a chat-style completion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    /// Ask the service to constrain output to a JSON object.
    pub json_object: bool,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the raw text of the first choice.
    async fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, ServiceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "agentId")]
    agent_id: String,
    text: String,
}

/// Validate a completion response as `{"transcript": [{agentId, text}, ...]}`.
///
/// Text surrounding the JSON object is tolerated; nothing else is repaired.
pub fn parse_transcript(raw: &str) -> std::result::Result<Vec<DialogueLine>, TranscriptRejection> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TranscriptRejection::Empty);
    }

    let root: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(err) => extract_json_object(trimmed)
            .and_then(|slice| serde_json::from_str(slice).ok())
            .ok_or_else(|| TranscriptRejection::Malformed(err.to_string()))?,
    };

    let entries = root
        .get("transcript")
        .ok_or_else(|| TranscriptRejection::SchemaViolation("missing `transcript` field".to_string()))?
        .as_array()
        .ok_or_else(|| TranscriptRejection::SchemaViolation("`transcript` is not a sequence".to_string()))?;

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let raw = RawEntry::deserialize(entry)
                .map_err(|e| TranscriptRejection::SchemaViolation(format!("entry {i}: {e}")))?;
            let speaker = raw
                .agent_id
                .parse::<Persona>()
                .map_err(|e| TranscriptRejection::SchemaViolation(format!("entry {i}: {e}")))?;
            Ok(DialogueLine {
                speaker,
                text: raw.text,
            })
        })
        .collect()
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

pub fn dialogue_request(topic: &str, agent_a: Persona, agent_b: Persona) -> CompletionRequest {
    let name_a = agent_a.display_name();
    let name_b = agent_b.display_name();
    let system = format!(
        "Create a dialogue for a short-form video on the topic of {topic}. The conversation is between {name_a} and {name_b}, \
who act as exaggerated, over-the-top caricatures of themselves. The dialogue should still give real insight into {topic}. \
Limit it to at most {MAX_EXCHANGES} exchanges, about one minute when spoken.\n\
Return STRICT JSON with this shape ONLY:\n\
  {{\"transcript\":[{{\"agentId\":\"{agent_a}\",\"text\":\"...\"}},{{\"agentId\":\"{agent_b}\",\"text\":\"...\"}}]}}\n\
agentId must be exactly {agent_a} or {agent_b}. text is that speaker's line."
    );
    let user = format!(
        "Generate a video about {topic}. Both speakers should talk about it the way they would, with their traits turned up so it is entertaining to watch."
    );

    CompletionRequest {
        system,
        user,
        json_object: true,
    }
}

pub struct TranscriptAcquirer {
    client: Arc<dyn CompletionClient>,
    policy: RetryPolicy,
}

impl TranscriptAcquirer {
    pub fn new(client: Arc<dyn CompletionClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Request a fresh dialogue until one validates or the attempt budget is
    /// spent. Every failed attempt except the last is followed by the backoff.
    pub async fn acquire_transcript(
        &self,
        topic: &str,
        agent_a: Persona,
        agent_b: Persona,
    ) -> Result<Vec<DialogueLine>> {
        let request = dialogue_request(topic, agent_a, agent_b);
        let max = self.policy.max_attempts;

        for attempt in 1..=max {
            debug!(attempt, max, topic, "requesting transcript");
            match self.client.complete(&request).await {
                Ok(raw) => match parse_transcript(&raw) {
                    Ok(lines) => {
                        info!(attempt, lines = lines.len(), topic, "valid transcript generated");
                        for (i, line) in lines.iter().enumerate() {
                            debug!("{}. {}: {:?}", i + 1, line.speaker, line.text);
                        }
                        return Ok(lines);
                    }
                    Err(why) => warn!(attempt, max, reason = %why, "transcript rejected"),
                },
                Err(err) => warn!(attempt, max, error = %err, "transcript request failed"),
            }

            if attempt < max {
                debug!(backoff_ms = self.policy.backoff.as_millis() as u64, "waiting before next attempt");
                tokio::time::sleep(self.policy.backoff).await;
            }
        }

        Err(PipelineError::ExhaustedRetries {
            topic: topic.to_string(),
            attempts: max,
        })
    }
}

/// Split narration into sentence lines (`[^.!?]+[.!?]+`), trimmed.
/// A trailing fragment without terminal punctuation is dropped.
pub fn split_into_lines(text: &str) -> anyhow::Result<Vec<String>> {
    let re = sentence_regex()?;
    Ok(re
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

fn sentence_regex() -> anyhow::Result<&'static Regex> {
    static SENTENCE_RE: OnceCell<Regex> = OnceCell::new();
    SENTENCE_RE.get_or_try_init(|| Regex::new(r"[^.!?]+[.!?]+").context("failed to compile sentence regex"))
}
