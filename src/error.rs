//! Error types for the generation pipeline.

use crate::persona::Persona;
use thiserror::Error;

/// Failure of a single call to a generation service (completion, synthesis,
/// correction). Always transient from the pipeline's point of view.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("service returned no content")]
    EmptyResponse,

    #[error("unexpected response shape: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else {
            ServiceError::Request(e.to_string())
        }
    }
}

/// Why a completion response was not accepted as a transcript.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscriptRejection {
    #[error("empty response")]
    Empty,

    #[error("response is not JSON: {0}")]
    Malformed(String),

    #[error("schema violation: {0}")]
    SchemaViolation(String),
}

/// Terminal pipeline failures. Anything with a safe fallback never gets here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to generate valid transcript after {attempts} attempts for topic: {topic}")]
    ExhaustedRetries { topic: String, attempts: u32 },

    #[error("audio synthesis failed for {persona} line {index}: {source}")]
    AudioDispatch {
        persona: Persona,
        index: usize,
        #[source]
        source: ServiceError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
