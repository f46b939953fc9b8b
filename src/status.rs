//! Job status reporting. Notifications are best effort: a failing store is
//! logged and never stops the pipeline.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    GeneratingTranscript,
    GeneratingAudio,
    Failed,
}

impl JobStage {
    pub fn label(self) -> &'static str {
        match self {
            JobStage::GeneratingTranscript => "Generating transcript",
            JobStage::GeneratingAudio => "Generating audio",
            JobStage::Failed => "Failed",
        }
    }

    pub fn progress(self) -> u8 {
        match self {
            JobStage::GeneratingTranscript => 0,
            JobStage::GeneratingAudio => 12,
            JobStage::Failed => 0,
        }
    }
}

/// Keyed, idempotent status update on an external job record.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn set_status(&self, job_id: &str, stage: &str, progress: u8) -> Result<()>;
}

/// Stage notifications for one job, or nothing at all on a local run.
#[derive(Clone, Default)]
pub struct StatusNotifier {
    target: Option<(String, Arc<dyn StatusReporter>)>,
}

impl StatusNotifier {
    pub fn local() -> Self {
        Self { target: None }
    }

    pub fn for_job(job_id: impl Into<String>, reporter: Arc<dyn StatusReporter>) -> Self {
        Self {
            target: Some((job_id.into(), reporter)),
        }
    }

    pub fn is_local(&self) -> bool {
        self.target.is_none()
    }

    pub async fn notify(&self, stage: JobStage) {
        let Some((job_id, reporter)) = &self.target else {
            return;
        };
        debug!(job_id = %job_id, stage = stage.label(), progress = stage.progress(), "updating job status");
        if let Err(err) = reporter.set_status(job_id, stage.label(), stage.progress()).await {
            warn!(job_id = %job_id, stage = stage.label(), error = %err, "status update failed");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub status: String,
    pub progress: u8,
    pub updated_at: DateTime<Utc>,
}

/// Keeps each job's status as `<dir>/<job_id>.json`.
pub struct JsonFileStatusStore {
    dir: PathBuf,
}

impl JsonFileStatusStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, job_id: &str) -> Result<PathBuf> {
        if job_id.is_empty() || job_id == ".." || job_id.contains(['/', '\\']) {
            anyhow::bail!("invalid job id: {job_id:?}");
        }
        Ok(self.dir.join(format!("{job_id}.json")))
    }

    pub async fn read(&self, job_id: &str) -> Result<JobStatus> {
        let path = self.path_for(job_id)?;
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read job status: {}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[async_trait]
impl StatusReporter for JsonFileStatusStore {
    async fn set_status(&self, job_id: &str, stage: &str, progress: u8) -> Result<()> {
        let path = self.path_for(job_id)?;
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create dir {}", self.dir.display()))?;

        let record = JobStatus {
            job_id: job_id.to_string(),
            status: stage.to_string(),
            progress: progress.min(100),
            updated_at: Utc::now(),
        };
        fs::write(&path, serde_json::to_vec_pretty(&record)?)
            .await
            .with_context(|| format!("Failed to write job status: {}", path.display()))?;
        Ok(())
    }
}
