//! Per-line speech synthesis fan-out.
//!
//! Lines are dispatched with a concurrency ceiling and complete in any
//! order; the index carried by each task is the only reassembly key.

use crate::error::{PipelineError, Result, ServiceError};
use crate::persona::{Persona, VoiceTable};
use crate::transcript::DialogueLine;
use crate::with_deadline;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTask {
    pub persona: Persona,
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioArtifact {
    pub persona: Persona,
    pub path: PathBuf,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub voice_id: String,
    pub persona: Persona,
    pub text: String,
    pub index: usize,
    pub out_path: PathBuf,
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `request.text` and write the audio to `request.out_path`.
    async fn synthesize(&self, request: &SynthesisRequest) -> std::result::Result<(), ServiceError>;
}

#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    pub concurrency: usize,
    /// Tries per line before the whole dispatch is abandoned.
    pub attempts: u32,
    pub task_timeout: Option<Duration>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            concurrency: 5,
            attempts: 2,
            task_timeout: Some(Duration::from_secs(300)),
        }
    }
}

/// `<dir>/<PERSONA>-<index>.mp3`
pub fn audio_path(dir: &Path, persona: Persona, index: usize) -> PathBuf {
    dir.join(format!("{persona}-{index}.mp3"))
}

/// One task per line, all voiced by `persona`.
pub fn narration_tasks(lines: &[String], persona: Persona) -> Vec<AudioTask> {
    lines
        .iter()
        .enumerate()
        .map(|(index, text)| AudioTask {
            persona,
            index,
            text: text.clone(),
        })
        .collect()
}

/// One task per line, each voiced by its own speaker.
pub fn dialogue_tasks(lines: &[DialogueLine]) -> Vec<AudioTask> {
    lines
        .iter()
        .enumerate()
        .map(|(index, line)| AudioTask {
            persona: line.speaker,
            index,
            text: line.text.clone(),
        })
        .collect()
}

pub struct AudioDispatcher {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voices: VoiceTable,
    voice_dir: PathBuf,
    settings: DispatchSettings,
}

impl AudioDispatcher {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        voices: VoiceTable,
        voice_dir: impl Into<PathBuf>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            synthesizer,
            voices,
            voice_dir: voice_dir.into(),
            settings,
        }
    }

    pub async fn dispatch_audio(&self, lines: &[String], persona: Persona) -> Result<Vec<AudioArtifact>> {
        self.dispatch(narration_tasks(lines, persona)).await
    }

    /// Synthesize every task and return artifacts sorted by task index.
    /// The first line that fails all its attempts aborts the dispatch.
    pub async fn dispatch(&self, tasks: Vec<AudioTask>) -> Result<Vec<AudioArtifact>> {
        let total = tasks.len();
        info!(total, concurrency = self.settings.concurrency, "dispatching audio synthesis");

        let mut results = stream::iter(tasks)
            .map(|task| async move {
                let outcome = self.synthesize_task(&task).await;
                (task, outcome)
            })
            .buffer_unordered(self.settings.concurrency.max(1));

        let mut artifacts = Vec::with_capacity(total);
        while let Some((task, outcome)) = results.next().await {
            match outcome {
                Ok(path) => {
                    debug!(index = task.index, persona = %task.persona, done = artifacts.len() + 1, total, "audio ready");
                    artifacts.push(AudioArtifact {
                        persona: task.persona,
                        path,
                        index: task.index,
                    });
                }
                Err(source) => {
                    error!(index = task.index, persona = %task.persona, error = %source, "audio synthesis failed");
                    return Err(PipelineError::AudioDispatch {
                        persona: task.persona,
                        index: task.index,
                        source,
                    });
                }
            }
        }

        artifacts.sort_by_key(|a| a.index);
        Ok(artifacts)
    }

    async fn synthesize_task(&self, task: &AudioTask) -> std::result::Result<PathBuf, ServiceError> {
        let request = SynthesisRequest {
            voice_id: self.voices.voice_for(task.persona).to_string(),
            persona: task.persona,
            text: task.text.clone(),
            index: task.index,
            out_path: audio_path(&self.voice_dir, task.persona, task.index),
        };

        let attempts = self.settings.attempts.max(1);
        let mut attempt = 1;
        loop {
            match with_deadline(self.settings.task_timeout, self.synthesizer.synthesize(&request)).await {
                Ok(()) => return Ok(request.out_path),
                Err(err) if attempt < attempts => {
                    warn!(index = task.index, attempt, error = %err, "retrying synthesis");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sleeps a per-index latency, records completion order and voices.
    #[derive(Default)]
    struct FakeSynth {
        latency_ms: Vec<u64>,
        fail_index: Option<usize>,
        flaky_index: Option<usize>,
        flaky_seen: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        completed: Mutex<Vec<usize>>,
        voices: Mutex<HashMap<usize, String>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeSynth {
        async fn synthesize(&self, request: &SynthesisRequest) -> std::result::Result<(), ServiceError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = self.latency_ms.get(request.index).copied().unwrap_or(10);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_index == Some(request.index) {
                return Err(ServiceError::Http {
                    status: 429,
                    body: "rate limited".into(),
                });
            }
            if self.flaky_index == Some(request.index) && self.flaky_seen.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(ServiceError::Request("connection reset".into()));
            }

            self.completed.lock().unwrap().push(request.index);
            self.voices
                .lock()
                .unwrap()
                .insert(request.index, request.voice_id.clone());
            Ok(())
        }
    }

    fn dispatcher(synth: Arc<FakeSynth>, settings: DispatchSettings) -> AudioDispatcher {
        let mut voices = HashMap::new();
        voices.insert(Persona::JoeRogan, "rogan".to_string());
        AudioDispatcher::new(synth, VoiceTable::new(voices, "fallback"), "public/voice", settings)
    }

    fn lines(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("Line number {i}.")).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn reassembles_in_index_order_under_random_latency() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 23;
        let synth = Arc::new(FakeSynth {
            latency_ms: (0..n).map(|_| rng.gen_range(1..500)).collect(),
            ..Default::default()
        });
        let audio = dispatcher(synth.clone(), DispatchSettings::default());

        let artifacts = audio.dispatch_audio(&lines(n), Persona::JoeRogan).await.unwrap();

        assert_eq!(artifacts.len(), n);
        for (i, artifact) in artifacts.iter().enumerate() {
            assert_eq!(artifact.index, i);
            assert_eq!(artifact.persona, Persona::JoeRogan);
            assert_eq!(artifact.path, PathBuf::from(format!("public/voice/JOE_ROGAN-{i}.mp3")));
        }
        let completed = synth.completed.lock().unwrap().clone();
        assert_ne!(completed, (0..n).collect::<Vec<_>>(), "latency should scramble completion order");
    }

    #[tokio::test(start_paused = true)]
    async fn respects_concurrency_ceiling() {
        let synth = Arc::new(FakeSynth {
            latency_ms: vec![100; 20],
            ..Default::default()
        });
        let settings = DispatchSettings {
            concurrency: 3,
            ..Default::default()
        };
        let audio = dispatcher(synth.clone(), settings);

        audio.dispatch_audio(&lines(20), Persona::JoeRogan).await.unwrap();

        assert_eq!(synth.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_aborts_dispatch_with_index() {
        let synth = Arc::new(FakeSynth {
            fail_index: Some(2),
            ..Default::default()
        });
        let audio = dispatcher(synth, DispatchSettings::default());

        let err = audio
            .dispatch_audio(&lines(5), Persona::DonaldTrump)
            .await
            .unwrap_err();

        match err {
            PipelineError::AudioDispatch { persona, index, .. } => {
                assert_eq!(persona, Persona::DonaldTrump);
                assert_eq!(index, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried_per_task() {
        let synth = Arc::new(FakeSynth {
            flaky_index: Some(1),
            ..Default::default()
        });
        let audio = dispatcher(synth.clone(), DispatchSettings::default());

        let artifacts = audio.dispatch_audio(&lines(3), Persona::JoeRogan).await.unwrap();

        assert_eq!(artifacts.len(), 3);
        assert_eq!(synth.flaky_seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_overrun_counts_as_failure() {
        let synth = Arc::new(FakeSynth {
            latency_ms: vec![10, 60_000],
            ..Default::default()
        });
        let settings = DispatchSettings {
            concurrency: 2,
            attempts: 1,
            task_timeout: Some(Duration::from_secs(5)),
        };
        let audio = dispatcher(synth, settings);

        let err = audio.dispatch_audio(&lines(2), Persona::JoeRogan).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::AudioDispatch {
                index: 1,
                source: ServiceError::Timeout,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn dialogue_lines_use_each_speakers_voice() {
        let synth = Arc::new(FakeSynth::default());
        let audio = dispatcher(synth.clone(), DispatchSettings::default());
        let transcript = vec![
            DialogueLine {
                speaker: Persona::JoeRogan,
                text: "Pull that up, Jamie.".into(),
            },
            DialogueLine {
                speaker: Persona::BarackObama,
                text: "Let me be clear.".into(),
            },
        ];

        let artifacts = audio.dispatch(dialogue_tasks(&transcript)).await.unwrap();

        assert_eq!(artifacts[0].persona, Persona::JoeRogan);
        assert_eq!(artifacts[1].persona, Persona::BarackObama);
        assert_eq!(artifacts[1].path, PathBuf::from("public/voice/BARACK_OBAMA-1.mp3"));
        let voices = synth.voices.lock().unwrap();
        assert_eq!(voices[&0], "rogan");
        assert_eq!(voices[&1], "fallback");
    }
}
