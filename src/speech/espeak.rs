//! Production synthesizer: shells out to `espeak-ng`, one process per
//! segment, killed on cancel.
//!
//! Settings map onto espeak's own scales: rate multiplies the 175 wpm
//! default, pitch scales the 0-99 range around its default of 50, and
//! volume scales amplitude around 100 (0-200).

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::watch;

use super::{SpeakOutcome, SpeechError, Synthesizer, Utterance};

const BASE_WPM: f32 = 175.0;
const MIN_WPM: f32 = 80.0;
const MAX_WPM: f32 = 450.0;

fn words_per_minute(rate: f32) -> u32 {
    (BASE_WPM * rate).round().clamp(MIN_WPM, MAX_WPM) as u32
}

fn pitch_level(pitch: f32) -> u32 {
    (50.0 * pitch).round().clamp(0.0, 99.0) as u32
}

fn amplitude(volume: f32) -> u32 {
    (100.0 * volume).round().clamp(0.0, 200.0) as u32
}

/// `-v` argument: a voice name as-is, a `+variant` appended to the
/// segment language, or the bare language code.
fn voice_argument(voice: Option<&str>, language: &str) -> String {
    match voice {
        Some(variant) if variant.starts_with('+') => format!("{language}{variant}"),
        Some(voice) => voice.to_string(),
        None => language.to_string(),
    }
}

pub struct EspeakSynthesizer {
    program: String,
}

impl EspeakSynthesizer {
    /// The program is resolved per utterance, so installing espeak-ng
    /// while the app is running just works.
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

#[async_trait]
impl Synthesizer for EspeakSynthesizer {
    async fn speak(
        &self,
        utterance: &Utterance,
        cancel: &mut watch::Receiver<bool>,
    ) -> std::result::Result<SpeakOutcome, SpeechError> {
        let program = which::which(&self.program)
            .map_err(|_| SpeechError::NotFound(self.program.clone()))?;

        let mut child = Command::new(program)
            .arg("-v")
            .arg(voice_argument(utterance.voice.as_deref(), &utterance.language))
            .arg("-s")
            .arg(words_per_minute(utterance.rate).to_string())
            .arg("-p")
            .arg(pitch_level(utterance.pitch).to_string())
            .arg("-a")
            .arg(amplitude(utterance.volume).to_string())
            .arg("--")
            .arg(&utterance.text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(SpeechError::Spawn)?;

        let stderr = child.stderr.take();

        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(SpeechError::Spawn)?;
                if status.success() {
                    return Ok(SpeakOutcome::Completed);
                }
                let mut message = String::new();
                if let Some(mut stderr) = stderr {
                    let _ = stderr.read_to_string(&mut message).await;
                }
                Err(SpeechError::Synthesis(format!(
                    "'{}' exited with {status}: {}",
                    self.program,
                    message.trim()
                )))
            }
            // Fires when cancel flips true or its sender goes away.
            // The async block drops the non-Send watch::Ref before the
            // select arm runs, keeping the future Send.
            _ = async { let _ = cancel.wait_for(|stop| *stop).await; } => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                Ok(SpeakOutcome::Interrupted)
            }
        }
    }
}
