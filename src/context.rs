//! The renderer hand-off: a small TypeScript module describing persona,
//! music, background clip and caption tracks. Always rewritten whole.

use crate::audio::AudioArtifact;
use crate::persona::Persona;
use crate::srt;
use anyhow::{Context, Result};
use rand::Rng;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use tokio::fs;

const FILLER_AGENT: &str = "JORDAN_PETERSON";
const FILLER_RAPPER: &str = "SPONGEBOB";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Music {
    None,
    Track(String),
}

impl Music {
    /// `NONE` (any case) or an empty name means no music.
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case("none") {
            Music::None
        } else {
            Music::Track(name.to_string())
        }
    }

    fn render(&self) -> String {
        match self {
            Music::None => "NONE".to_string(),
            Music::Track(name) => format!("/music/{name}.MP3"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoMode {
    Brainrot,
    Rap,
}

impl FromStr for VideoMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "brainrot" => Ok(VideoMode::Brainrot),
            "rap" => Ok(VideoMode::Rap),
            other => Err(format!("unknown video mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTrack {
    pub label: String,
    /// Relative to the renderer's public directory, `/`-separated.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextArtifact {
    pub persona: Persona,
    pub music: Music,
    pub background: u32,
    pub captions: Vec<CaptionTrack>,
}

/// Uniform in `1..=count`.
pub fn pick_background<R: Rng + ?Sized>(rng: &mut R, count: u32) -> u32 {
    rng.gen_range(1..=count.max(1))
}

impl ContextArtifact {
    /// Caption tracks follow artifact order; each track points at
    /// `<srt_dir>/<PERSONA>-<index>.srt` as seen from `public_dir`.
    pub fn for_job<R: Rng + ?Sized>(
        persona: Persona,
        music: Music,
        audios: &[AudioArtifact],
        srt_dir: &Path,
        public_dir: &Path,
        rng: &mut R,
        background_count: u32,
    ) -> Self {
        let captions = audios
            .iter()
            .map(|a| CaptionTrack {
                label: a.persona.label().to_string(),
                path: renderer_path(&srt::caption_path(srt_dir, a.persona, a.index), public_dir),
            })
            .collect();

        Self {
            persona,
            music,
            background: pick_background(rng, background_count),
            captions,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("\nimport { staticFile } from 'remotion';\n\n");
        out.push_str(&format!("export const music: string = '{}';\n", escape(&self.music.render())));
        out.push_str(&format!("export const initialAgentName = '{}';\n", self.persona));
        out.push_str(&format!("export const videoFileName = '/background/video-{}.mp4';\n", self.background));
        out.push_str("export const videoMode = 'brainrot';\n\n");

        out.push_str("export const subtitlesFileName = [\n");
        let tracks: Vec<String> = self
            .captions
            .iter()
            .map(|t| {
                format!(
                    "  {{\n    name: '{}',\n    file: staticFile('{}'),\n  }}",
                    escape(&t.label),
                    escape(&t.path)
                )
            })
            .collect();
        out.push_str(&tracks.join(",\n"));
        if !tracks.is_empty() {
            out.push('\n');
        }
        out.push_str("];\n");
        out
    }

    pub async fn write(&self, path: &Path) -> Result<()> {
        write_context(path, &self.render()).await
    }
}

/// Placeholder module so the renderer builds before any job has run.
pub fn filler_context<R: Rng + ?Sized>(mode: VideoMode, rng: &mut R, background_count: u32) -> String {
    match mode {
        VideoMode::Brainrot => format!(
            "\nexport const music: string = 'NONE';\nexport const initialAgentName = '{FILLER_AGENT}';\nexport const videoFileName = '/background/video-{}.mp4';\n\nexport const subtitlesFileName = [];\n",
            pick_background(rng, background_count)
        ),
        VideoMode::Rap => format!(
            "\nexport const rapper: string = '{FILLER_RAPPER}';\nexport const imageBackground: string = '/rap/{FILLER_RAPPER}.png';\n"
        ),
    }
}

pub async fn write_context(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create dir {}", parent.display()))?;
        }
    }
    fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write context: {}", path.display()))
}

fn renderer_path(path: &Path, public_dir: &Path) -> String {
    let rel: PathBuf = pathdiff::diff_paths(path, public_dir).unwrap_or_else(|| path.to_path_buf());
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn audios() -> Vec<AudioArtifact> {
        (0..2)
            .map(|index| AudioArtifact {
                persona: Persona::JoeRogan,
                path: PathBuf::from(format!("public/voice/JOE_ROGAN-{index}.mp3")),
                index,
            })
            .collect()
    }

    fn artifact(seed: u64) -> ContextArtifact {
        ContextArtifact::for_job(
            Persona::JoeRogan,
            Music::parse("WII_SHOP"),
            &audios(),
            Path::new("public/srt"),
            Path::new("public"),
            &mut StdRng::seed_from_u64(seed),
            13,
        )
    }

    #[test]
    fn renders_manifest_in_artifact_order() {
        let text = artifact(1).render();
        assert!(text.contains("export const music: string = '/music/WII_SHOP.MP3';"));
        assert!(text.contains("export const initialAgentName = 'JOE_ROGAN';"));
        assert!(text.contains("export const videoMode = 'brainrot';"));
        let first = text.find("staticFile('srt/JOE_ROGAN-0.srt')").unwrap();
        let second = text.find("staticFile('srt/JOE_ROGAN-1.srt')").unwrap();
        assert!(first < second);
    }

    #[test]
    fn no_music_uses_sentinel() {
        assert_eq!(Music::parse("none"), Music::None);
        assert_eq!(Music::parse(""), Music::None);
        let mut ctx = artifact(1);
        ctx.music = Music::None;
        assert!(ctx.render().contains("export const music: string = 'NONE';"));
    }

    #[test]
    fn same_seed_renders_identical_bytes() {
        assert_eq!(artifact(99).render(), artifact(99).render());
    }

    #[test]
    fn background_stays_in_range() {
        for seed in 0..500 {
            let bg = artifact(seed).background;
            assert!((1..=13).contains(&bg), "background {bg} out of range");
        }
        assert_eq!(pick_background(&mut StdRng::seed_from_u64(3), 0), 1);
    }

    #[test]
    fn quotes_are_escaped() {
        let mut ctx = artifact(1);
        ctx.music = Music::Track("don't stop".into());
        assert!(ctx.render().contains("'/music/don\\'t stop.MP3'"));
    }

    #[test]
    fn filler_per_mode() {
        let mut rng = StdRng::seed_from_u64(5);
        let brainrot = filler_context(VideoMode::Brainrot, &mut rng, 13);
        assert!(brainrot.contains("export const subtitlesFileName = [];"));
        assert!(brainrot.contains("JORDAN_PETERSON"));
        let rap = filler_context(VideoMode::Rap, &mut rng, 13);
        assert!(rap.contains("'/rap/SPONGEBOB.png'"));
        assert_eq!("RAP".parse::<VideoMode>().unwrap(), VideoMode::Rap);
    }

    #[tokio::test]
    async fn rewrite_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("src/tmp/context.tsx");

        artifact(7).write(&path).await.unwrap();
        let first = std::fs::read(&path).unwrap();
        artifact(7).write(&path).await.unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
    }
}
