use crate::api::elevenlabs::ElevenLabs;
use crate::api::http_client;
use crate::api::openai::ChatCompletions;
use crate::audio::{AudioArtifact, AudioDispatcher, SpeechSynthesizer, dialogue_tasks};
use crate::captions::{CaptionFile, CaptionPair, CaptionReconciler, ReconcileSummary};
use crate::config::{Config, PipelineSettings};
use crate::context::{ContextArtifact, Music, VideoMode, filler_context, write_context};
use crate::init;
use crate::persona::{Persona, VoiceTable};
use crate::srt;
use crate::status::{JobStage, JsonFileStatusStore, StatusNotifier};
use crate::transcript::{CompletionClient, DialogueLine, TranscriptAcquirer, split_into_lines};
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::{error, info, warn};

const HTTP_TIMEOUT_SECS: u64 = 600;

fn now_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// Generated conversation between two personas.
    Dialogue { agent_a: Persona, agent_b: Persona },
    /// Given text, split into sentences and voiced by one random persona.
    Narration { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub topic: String,
    pub source: ScriptSource,
    pub music: Music,
}

/// What a finished generation hands to the caption stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutput {
    pub persona: Persona,
    pub audios: Vec<AudioArtifact>,
    pub transcript: Vec<DialogueLine>,
}

impl JobOutput {
    pub async fn save(&self, path: &Path) -> Result<()> {
        write_context(path, &serde_json::to_string_pretty(self)?).await
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read job manifest: {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid job manifest: {}", path.display()))
    }
}

pub struct Pipeline {
    acquirer: TranscriptAcquirer,
    audio: AudioDispatcher,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        voices: VoiceTable,
        settings: PipelineSettings,
    ) -> Self {
        let acquirer = TranscriptAcquirer::new(completion, settings.retry_policy());
        let audio = AudioDispatcher::new(synthesizer, voices, settings.voice_dir(), settings.dispatch_settings());
        Self {
            acquirer,
            audio,
            settings,
        }
    }

    pub fn from_config(cfg: &Config, client: reqwest::Client) -> Self {
        Self::new(
            Arc::new(ChatCompletions::groq(client.clone(), cfg)),
            Arc::new(ElevenLabs::new(client, cfg)),
            cfg.voice_table(),
            cfg.pipeline.clone(),
        )
    }

    /// Run one job. Any terminal failure marks the job `Failed` and leaves
    /// the previous context artifact untouched.
    pub async fn run_job<R: Rng + ?Sized>(
        &self,
        request: &JobRequest,
        status: &StatusNotifier,
        rng: &mut R,
    ) -> Result<JobOutput> {
        match self.generate(request, status, rng).await {
            Ok(output) => Ok(output),
            Err(err) => {
                error!(topic = %request.topic, error = %err, "job failed");
                status.notify(JobStage::Failed).await;
                Err(err)
            }
        }
    }

    async fn generate<R: Rng + ?Sized>(
        &self,
        request: &JobRequest,
        status: &StatusNotifier,
        rng: &mut R,
    ) -> Result<JobOutput> {
        info!(topic = %request.topic, local = status.is_local(), "starting job");
        status.notify(JobStage::GeneratingTranscript).await;

        let (persona, transcript) = match &request.source {
            ScriptSource::Dialogue { agent_a, agent_b } => {
                let lines = self
                    .acquirer
                    .acquire_transcript(&request.topic, *agent_a, *agent_b)
                    .await?;
                if lines.is_empty() {
                    anyhow::bail!("dialogue for topic {} has no lines", request.topic);
                }
                (*agent_a, lines)
            }
            ScriptSource::Narration { text } => {
                let lines = split_into_lines(text)?;
                if lines.is_empty() {
                    anyhow::bail!("narration for topic {} has no complete sentences", request.topic);
                }
                let persona = Persona::random(rng);
                info!(%persona, lines = lines.len(), "selected persona for narration");
                let transcript = lines
                    .into_iter()
                    .map(|text| DialogueLine { speaker: persona, text })
                    .collect();
                (persona, transcript)
            }
        };

        status.notify(JobStage::GeneratingAudio).await;

        // Previous job's assets stay until a script exists.
        if self.settings.clean_outputs {
            for dir in [self.settings.voice_dir(), self.settings.srt_dir()] {
                let removed = init::clear_directory_contents(&dir).await?;
                if removed > 0 {
                    info!("Cleared {} stale entries from {}", removed, dir.display());
                }
            }
        }
        let audios = self.audio.dispatch(dialogue_tasks(&transcript)).await?;

        let context = ContextArtifact::for_job(
            persona,
            request.music.clone(),
            &audios,
            &self.settings.srt_dir(),
            &self.settings.public_dir,
            rng,
            self.settings.background_count,
        );
        context.write(&self.settings.context_path).await?;
        info!(path = %self.settings.context_path.display(), background = context.background, "context written");

        let output = JobOutput {
            persona,
            audios,
            transcript,
        };
        output.save(&self.settings.job_manifest_path).await?;
        info!(audios = output.audios.len(), "job complete");
        Ok(output)
    }
}

/// Pair each artifact's rough caption file with its transcript line.
pub async fn load_caption_files(output: &JobOutput, srt_dir: &Path) -> Result<Vec<CaptionFile>> {
    let mut files = Vec::with_capacity(output.audios.len());
    for artifact in &output.audios {
        let line = output
            .transcript
            .get(artifact.index)
            .with_context(|| format!("no transcript line for audio {}", artifact.index))?;
        let path = srt::caption_path(srt_dir, artifact.persona, artifact.index);
        let rough_caption = srt::read_caption(&path).await?;
        files.push(CaptionFile {
            pair: CaptionPair {
                trusted_transcript: line.text.clone(),
                rough_caption,
                index: artifact.index,
            },
            path,
        });
    }
    Ok(files)
}

fn notifier_for(cfg: &Config, video_id: Option<&str>, local: bool) -> Result<StatusNotifier> {
    if local {
        return Ok(StatusNotifier::local());
    }
    let Some(video_id) = video_id else {
        anyhow::bail!("a video id is required unless running locally");
    };
    Ok(StatusNotifier::for_job(
        video_id,
        Arc::new(JsonFileStatusStore::new(&cfg.pipeline.status_dir)),
    ))
}

pub async fn run_generation(
    cfg: &Config,
    request: JobRequest,
    video_id: Option<&str>,
    local: bool,
    seed: Option<u64>,
) -> Result<JobOutput> {
    init::ensure_directories(&cfg.pipeline).await?;
    let status = notifier_for(cfg, video_id, local)?;
    let client = http_client(Duration::from_secs(HTTP_TIMEOUT_SECS))?;
    let pipeline = Pipeline::from_config(cfg, client);

    let mut rng = StdRng::seed_from_u64(seed.unwrap_or_else(now_seed));
    pipeline.run_job(&request, &status, &mut rng).await
}

pub async fn run_captions(cfg: &Config) -> Result<ReconcileSummary> {
    let output = JobOutput::load(&cfg.pipeline.job_manifest_path).await?;
    let files = load_caption_files(&output, &cfg.pipeline.srt_dir()).await?;

    let client = http_client(Duration::from_secs(HTTP_TIMEOUT_SECS))?;
    let reconciler = CaptionReconciler::new(
        Arc::new(ChatCompletions::openai(client, cfg)),
        cfg.pipeline.caption_concurrency,
        cfg.pipeline.task_timeout(),
    );
    let summary = reconciler.reconcile_to_files(&files).await?;
    if summary.batch_fallback {
        warn!("Captions written uncorrected");
    }
    Ok(summary)
}

pub async fn write_filler(settings: &PipelineSettings, mode: VideoMode, seed: Option<u64>) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed.unwrap_or_else(now_seed));
    let content = filler_context(mode, &mut rng, settings.background_count);
    write_context(&settings.context_path, &content).await?;
    info!(path = %settings.context_path.display(), "filler context written");
    Ok(())
}
