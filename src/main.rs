use anyhow::{Context, Result};
use brainrot_shorts::config::Config;
use brainrot_shorts::context::{Music, VideoMode};
use brainrot_shorts::generator::{self, JobRequest, ScriptSource};
use brainrot_shorts::persona::Persona;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "brainrot-shorts", about = "Generate dialogue, voice lines and captions for short-form videos")]
struct Cli {
    /// Path to config.json
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Produce transcript, audio, context and job manifest for one topic.
    Generate {
        #[arg(long)]
        topic: String,
        /// Narrate this text with one random persona instead of generating a dialogue.
        #[arg(long, conflicts_with_all = ["agent_a", "agent_b"])]
        text_file: Option<PathBuf>,
        #[arg(long, default_value = "JOE_ROGAN")]
        agent_a: Persona,
        #[arg(long, default_value = "BARACK_OBAMA")]
        agent_b: Persona,
        /// Background track name, or NONE.
        #[arg(long, default_value = "NONE")]
        music: String,
        /// Job id for status updates; required unless --local.
        #[arg(long)]
        video_id: Option<String>,
        /// Skip status updates.
        #[arg(long)]
        local: bool,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Correct the rough captions of the last generated job in place.
    Captions,
    /// Write a placeholder context so the renderer builds.
    Filler {
        #[arg(long, default_value = "brainrot")]
        mode: VideoMode,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config).await?;

    match cli.command {
        Command::Generate {
            topic,
            text_file,
            agent_a,
            agent_b,
            music,
            video_id,
            local,
            seed,
        } => {
            let source = match text_file {
                Some(path) => ScriptSource::Narration {
                    text: tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("Failed to read text: {}", path.display()))?,
                },
                None => ScriptSource::Dialogue { agent_a, agent_b },
            };
            let request = JobRequest {
                topic,
                source,
                music: Music::parse(&music),
            };
            let output = generator::run_generation(&cfg, request, video_id.as_deref(), local, seed).await?;
            info!(
                persona = %output.persona,
                audios = output.audios.len(),
                manifest = %cfg.pipeline.job_manifest_path.display(),
                "generation finished"
            );
        }
        Command::Captions => {
            let summary = generator::run_captions(&cfg).await?;
            info!(
                total = summary.total,
                corrected = summary.corrected,
                fallback = summary.batch_fallback,
                "captions finished"
            );
        }
        Command::Filler { mode, seed } => {
            generator::write_filler(&cfg.pipeline, mode, seed).await?;
        }
    }

    Ok(())
}
