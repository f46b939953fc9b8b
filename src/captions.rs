//! Caption reconciliation: align rough machine captions to the trusted
//! transcript, degrading to the rough caption wherever correction fails.

use crate::error::ServiceError;
use crate::srt;
use crate::with_deadline;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[async_trait]
pub trait CaptionCorrector: Send + Sync {
    /// Return `rough` with its wording fixed against `trusted`, keeping
    /// numbering and timing lines untouched.
    async fn correct(&self, trusted: &str, rough: &str) -> std::result::Result<String, ServiceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionPair {
    pub trusted_transcript: String,
    pub rough_caption: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledCaption {
    /// Corrected text, or exactly the rough caption when correction failed.
    pub content: String,
    pub index: usize,
    pub corrected: bool,
}

/// A pair plus the file its reconciled content replaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionFile {
    pub pair: CaptionPair,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileSummary {
    pub total: usize,
    pub corrected: usize,
    /// Every file was written with its rough caption after a batch failure.
    pub batch_fallback: bool,
}

pub struct CaptionReconciler {
    corrector: Arc<dyn CaptionCorrector>,
    concurrency: usize,
    task_timeout: Option<Duration>,
}

impl CaptionReconciler {
    pub fn new(corrector: Arc<dyn CaptionCorrector>, concurrency: usize, task_timeout: Option<Duration>) -> Self {
        Self {
            corrector,
            concurrency,
            task_timeout,
        }
    }

    /// One result per pair, ordered by pair index. Never fails.
    pub async fn reconcile(&self, pairs: &[CaptionPair]) -> Vec<ReconciledCaption> {
        info!(total = pairs.len(), concurrency = self.concurrency, "reconciling captions");

        let mut out: Vec<ReconciledCaption> = stream::iter(pairs)
            .map(|pair| self.reconcile_one(pair))
            .buffer_unordered(self.concurrency.max(1))
            .collect()
            .await;

        out.sort_by_key(|c| c.index);
        out
    }

    async fn reconcile_one(&self, pair: &CaptionPair) -> ReconciledCaption {
        let call = self.corrector.correct(&pair.trusted_transcript, &pair.rough_caption);
        let fallback = |reason: String| {
            warn!(index = pair.index, reason = %reason, "caption correction failed, keeping original");
            ReconciledCaption {
                content: pair.rough_caption.clone(),
                index: pair.index,
                corrected: false,
            }
        };

        match with_deadline(self.task_timeout, call).await {
            Ok(text) if !text.trim().is_empty() => {
                debug!(index = pair.index, "caption corrected");
                ReconciledCaption {
                    content: text,
                    index: pair.index,
                    corrected: true,
                }
            }
            Ok(_) => fallback(ServiceError::EmptyResponse.to_string()),
            Err(err) => fallback(err.to_string()),
        }
    }

    /// Reconcile and write one file per input. If the batch path fails, every
    /// file is rewritten with its rough caption instead.
    pub async fn reconcile_to_files(&self, files: &[CaptionFile]) -> Result<ReconcileSummary> {
        match self.try_reconcile_to_files(files).await {
            Ok(summary) => {
                info!(total = summary.total, corrected = summary.corrected, "caption files written");
                Ok(summary)
            }
            Err(err) => {
                warn!(error = %err, "caption reconciliation failed, writing original captions");
                write_originals(files).await?;
                Ok(ReconcileSummary {
                    total: files.len(),
                    corrected: 0,
                    batch_fallback: true,
                })
            }
        }
    }

    async fn try_reconcile_to_files(&self, files: &[CaptionFile]) -> Result<ReconcileSummary> {
        let pairs: Vec<CaptionPair> = files.iter().map(|f| f.pair.clone()).collect();
        let reconciled = self.reconcile(&pairs).await;

        let mut corrected = 0;
        for file in files {
            let Some(caption) = reconciled.iter().find(|c| c.index == file.pair.index) else {
                anyhow::bail!("no reconciled caption for index {}", file.pair.index);
            };
            srt::write_caption(&file.path, &caption.content).await?;
            if caption.corrected {
                corrected += 1;
            }
            debug!(index = caption.index, path = %file.path.display(), "wrote caption");
        }

        Ok(ReconcileSummary {
            total: files.len(),
            corrected,
            batch_fallback: false,
        })
    }
}

/// Best effort: attempts every file, then reports the first failure.
async fn write_originals(files: &[CaptionFile]) -> Result<()> {
    let mut first_err = None;
    for file in files {
        if let Err(err) = srt::write_caption(&file.path, &file.pair.rough_caption).await {
            warn!(path = %file.path.display(), error = %err, "failed to write original caption");
            first_err.get_or_insert(err);
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
