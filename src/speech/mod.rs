//! Read-aloud playback: segmented, strictly sequential speech through
//! a pluggable synthesizer.

mod espeak;
mod player;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

pub use espeak::EspeakSynthesizer;
pub use player::{PlaybackEvent, SpeechPlayer};

/// Playback text is cut into segments of at most this many characters;
/// each segment becomes one synthesizer call.
pub const SEGMENT_MAX_CHARS: usize = 200;

pub const RATE_RANGE: std::ops::RangeInclusive<f32> = 0.25..=4.0;
pub const PITCH_RANGE: std::ops::RangeInclusive<f32> = 0.5..=2.0;
pub const VOLUME_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;

/// Knobs applied per segment. A change made while playback is running
/// affects the next segment, not the one in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechSettings {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub voice: Option<String>,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            voice: None,
        }
    }
}

impl SpeechSettings {
    pub fn clamped(mut self) -> Self {
        self.rate = self.rate.clamp(*RATE_RANGE.start(), *RATE_RANGE.end());
        self.pitch = self.pitch.clamp(*PITCH_RANGE.start(), *PITCH_RANGE.end());
        self.volume = self.volume.clamp(*VOLUME_RANGE.start(), *VOLUME_RANGE.end());
        self
    }
}

/// One segment of playback, with the settings snapshotted for it.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    pub language: String,
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    Completed,
    Interrupted,
}

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech program '{0}' not found in PATH")]
    NotFound(String),

    #[error("failed to start speech program: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
}

/// Speaks one utterance to completion, or stops early when `cancel`
/// flips to true (or its sender goes away).
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn speak(
        &self,
        utterance: &Utterance,
        cancel: &mut watch::Receiver<bool>,
    ) -> std::result::Result<SpeakOutcome, SpeechError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_clamp_to_supported_ranges() {
        let settings = SpeechSettings {
            rate: 99.0,
            pitch: 0.0,
            volume: -1.0,
            voice: None,
        }
        .clamped();

        assert_eq!(settings.rate, 4.0);
        assert_eq!(settings.pitch, 0.5);
        assert_eq!(settings.volume, 0.0);
    }

    #[test]
    fn in_range_settings_are_untouched() {
        let settings = SpeechSettings {
            rate: 1.5,
            pitch: 0.8,
            volume: 2.0,
            voice: Some("+f3".to_string()),
        };
        assert_eq!(settings.clone().clamped(), settings);
    }
}
