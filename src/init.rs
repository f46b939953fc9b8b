use crate::config::PipelineSettings;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};
use walkdir::WalkDir;

fn required_dirs(settings: &PipelineSettings) -> Vec<PathBuf> {
    let mut dirs = vec![settings.voice_dir(), settings.srt_dir(), settings.status_dir.clone()];
    for file in [&settings.context_path, &settings.job_manifest_path] {
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            dirs.push(parent.to_path_buf());
        }
    }
    dirs
}

pub async fn ensure_directories(settings: &PipelineSettings) -> Result<()> {
    for dir in required_dirs(settings) {
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create dir {}", dir.display()))?;
            info!("Created directory: {}", dir.display());
        }
    }
    Ok(())
}

/// Remove everything under `dir`, keeping `dir` itself. Returns how many
/// entries were removed; individual failures are logged and skipped.
pub async fn clear_directory_contents(dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in WalkDir::new(dir).min_depth(1).contents_first(true) {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        let path = entry.path();
        let result = if entry.file_type().is_dir() {
            fs::remove_dir(path).await
        } else {
            fs::remove_file(path).await
        };
        match result {
            Ok(()) => removed += 1,
            Err(err) => warn!("Failed to remove {}: {}", path.display(), err),
        }
    }
    Ok(removed)
}
