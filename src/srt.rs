use crate::persona::Persona;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// `<dir>/<PERSONA>-<index>.srt`
pub fn caption_path(dir: &Path, persona: Persona, index: usize) -> PathBuf {
    dir.join(format!("{persona}-{index}.srt"))
}

pub async fn read_caption(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .await
        .with_context(|| format!("read srt: {}", path.display()))
}

/// Replace the caption file at `path` with `content`.
pub async fn write_caption(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create srt dir: {}", parent.display()))?;
        }
    }

    let mut out = fs::File::create(path)
        .await
        .with_context(|| format!("create srt output: {}", path.display()))?;
    out.write_all(content.as_bytes())
        .await
        .with_context(|| format!("write srt output: {}", path.display()))?;
    out.flush()
        .await
        .with_context(|| format!("flush srt output: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_path_uses_persona_and_index() {
        let path = caption_path(Path::new("public/srt"), Persona::BenShapiro, 3);
        assert_eq!(path, PathBuf::from("public/srt/BEN_SHAPIRO-3.srt"));
    }

    #[tokio::test]
    async fn write_then_read_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/srt/JOE_ROGAN-0.srt");
        let body = "1\n00:00:00,000 --> 00:00:01,200\nHello there\n";

        write_caption(&path, body).await.unwrap();

        assert_eq!(read_caption(&path).await.unwrap(), body);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn full_device_write_is_an_error() {
        let result = write_caption(Path::new("/dev/full"), "1\n00:00:00,000 --> 00:00:01,000\nHi\n").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn missing_caption_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_caption(&dir.path().join("nope.srt")).await.unwrap_err();
        assert!(err.to_string().contains("nope.srt"));
    }
}
