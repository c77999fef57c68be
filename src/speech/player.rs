//! Sequential playback over a [`Synthesizer`].
//!
//! `play` cuts the text into segments and hands them to a background
//! task that speaks them one at a time, awaiting each segment before
//! starting the next; the caller is never suspended. Settings are
//! snapshotted per segment. The requested language applies to the
//! first segment only; later segments use the configured default.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};

use crate::text::chunk_text;

use super::{SpeakOutcome, SpeechSettings, Synthesizer, Utterance, SEGMENT_MAX_CHARS};

#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    Segment {
        generation: u64,
        index: usize,
        total: usize,
    },
    Finished {
        generation: u64,
    },
    Failed {
        generation: u64,
        message: String,
    },
}

impl PlaybackEvent {
    fn generation(&self) -> u64 {
        match self {
            PlaybackEvent::Segment { generation, .. }
            | PlaybackEvent::Finished { generation }
            | PlaybackEvent::Failed { generation, .. } => *generation,
        }
    }
}

pub struct SpeechPlayer {
    synthesizer: Arc<dyn Synthesizer>,
    settings: Arc<Mutex<SpeechSettings>>,
    default_language: String,
    generation: u64,
    playing: bool,
    current_segment: usize,
    segment_count: usize,
    cancel: Option<watch::Sender<bool>>,
    event_tx: mpsc::Sender<PlaybackEvent>,
    event_rx: mpsc::Receiver<PlaybackEvent>,
}

impl SpeechPlayer {
    pub fn new(
        synthesizer: Arc<dyn Synthesizer>,
        default_language: &str,
        settings: SpeechSettings,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(8);
        Self {
            synthesizer,
            settings: Arc::new(Mutex::new(settings.clamped())),
            default_language: default_language.to_string(),
            generation: 0,
            playing: false,
            current_segment: 0,
            segment_count: 0,
            cancel: None,
            event_tx,
            event_rx,
        }
    }

    /// Start reading `text`, replacing any playback already running.
    /// Returns immediately; progress arrives via [`poll`](Self::poll).
    /// Empty text never starts playback.
    pub fn play(&mut self, text: &str, language: &str) {
        self.stop();

        let segments = chunk_text(text, SEGMENT_MAX_CHARS);
        if segments.is_empty() {
            return;
        }

        self.generation += 1;
        let generation = self.generation;
        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.cancel = Some(cancel_tx);
        self.playing = true;
        self.current_segment = 0;
        self.segment_count = segments.len();

        let synthesizer = Arc::clone(&self.synthesizer);
        let settings = Arc::clone(&self.settings);
        let first_language = language.to_string();
        let default_language = self.default_language.clone();
        let events = self.event_tx.clone();

        tokio::spawn(async move {
            let mut cancel_rx = cancel_rx;
            let total = segments.len();

            for (index, segment) in segments.into_iter().enumerate() {
                if *cancel_rx.borrow() {
                    return;
                }

                let snapshot = {
                    let settings = settings
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    settings.clone()
                };
                // Only the opening segment keeps the caller's language.
                let language = if index == 0 {
                    first_language.clone()
                } else {
                    default_language.clone()
                };
                let utterance = Utterance {
                    text: segment,
                    language,
                    voice: snapshot.voice,
                    rate: snapshot.rate,
                    pitch: snapshot.pitch,
                    volume: snapshot.volume,
                };

                let _ = events
                    .send(PlaybackEvent::Segment {
                        generation,
                        index,
                        total,
                    })
                    .await;

                match synthesizer.speak(&utterance, &mut cancel_rx).await {
                    Ok(SpeakOutcome::Completed) => {}
                    Ok(SpeakOutcome::Interrupted) => return,
                    Err(e) => {
                        let _ = events
                            .send(PlaybackEvent::Failed {
                                generation,
                                message: e.to_string(),
                            })
                            .await;
                        return;
                    }
                }
            }

            let _ = events.send(PlaybackEvent::Finished { generation }).await;
        });
    }

    /// Stop playback and reset progress. Safe to call when idle.
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(true);
        }
        self.playing = false;
        self.current_segment = 0;
        self.segment_count = 0;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// 1-based segment progress while playing.
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.playing
            .then_some((self.current_segment + 1, self.segment_count))
    }

    /// Non-blocking poll driving playback state. Events from a stopped
    /// or superseded playback are dropped.
    pub fn poll(&mut self) -> Option<PlaybackEvent> {
        loop {
            let event = self.event_rx.try_recv().ok()?;
            if !self.playing || event.generation() != self.generation {
                continue;
            }

            match &event {
                PlaybackEvent::Segment { index, total, .. } => {
                    self.current_segment = *index;
                    self.segment_count = *total;
                }
                PlaybackEvent::Finished { .. } => {
                    self.playing = false;
                    self.current_segment = 0;
                    self.segment_count = 0;
                }
                PlaybackEvent::Failed { message, .. } => {
                    tracing::error!("Playback failed: {message}");
                    self.playing = false;
                    self.current_segment = 0;
                    self.segment_count = 0;
                }
            }
            return Some(event);
        }
    }

    pub fn settings(&self) -> SpeechSettings {
        self.settings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_rate(&self, rate: f32) {
        self.update_settings(|s| s.rate = rate);
    }

    pub fn set_pitch(&self, pitch: f32) {
        self.update_settings(|s| s.pitch = pitch);
    }

    pub fn set_volume(&self, volume: f32) {
        self.update_settings(|s| s.volume = volume);
    }

    pub fn set_voice(&self, voice: Option<String>) {
        self.update_settings(|s| s.voice = voice);
    }

    fn update_settings(&self, mutate: impl FnOnce(&mut SpeechSettings)) {
        let mut settings = self
            .settings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        mutate(&mut settings);
        *settings = settings.clone().clamped();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    use crate::speech::SpeechError;

    /// Records every utterance. With a gate, each segment additionally
    /// waits for one permit before completing, which lets tests hold a
    /// segment "in flight".
    struct ScriptedSynthesizer {
        spoken: Arc<Mutex<Vec<Utterance>>>,
        gate: Option<Arc<Semaphore>>,
        fail_at: Option<usize>,
    }

    #[async_trait]
    impl Synthesizer for ScriptedSynthesizer {
        async fn speak(
            &self,
            utterance: &Utterance,
            cancel: &mut watch::Receiver<bool>,
        ) -> std::result::Result<SpeakOutcome, SpeechError> {
            let index = {
                let mut spoken = self.spoken.lock().expect("spoken lock");
                spoken.push(utterance.clone());
                spoken.len() - 1
            };

            if self.fail_at == Some(index) {
                return Err(SpeechError::Synthesis("scripted failure".to_string()));
            }

            if let Some(gate) = &self.gate {
                tokio::select! {
                    _ = cancel.wait_for(|stop| *stop) => return Ok(SpeakOutcome::Interrupted),
                    permit = gate.acquire() => permit.expect("gate open").forget(),
                }
            }

            Ok(SpeakOutcome::Completed)
        }
    }

    struct Fixture {
        player: SpeechPlayer,
        spoken: Arc<Mutex<Vec<Utterance>>>,
        gate: Option<Arc<Semaphore>>,
    }

    fn fixture(gated: bool, fail_at: Option<usize>) -> Fixture {
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let gate = gated.then(|| Arc::new(Semaphore::new(0)));
        let synthesizer = Arc::new(ScriptedSynthesizer {
            spoken: Arc::clone(&spoken),
            gate: gate.clone(),
            fail_at,
        });
        let player = SpeechPlayer::new(synthesizer, "zh", SpeechSettings::default());
        Fixture {
            player,
            spoken,
            gate,
        }
    }

    fn numbered_text(chars: usize) -> String {
        (0..chars)
            .map(|i| char::from_digit((i % 10) as u32, 10).expect("digit"))
            .collect()
    }

    fn spoken_count(fixture: &Fixture) -> usize {
        fixture.spoken.lock().expect("spoken lock").len()
    }

    /// Pump the player until playback ends, collecting surfaced events.
    async fn pump_until_idle(fixture: &mut Fixture) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        for _ in 0..400 {
            while let Some(event) = fixture.player.poll() {
                events.push(event);
            }
            if !fixture.player.is_playing() {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("playback never went idle");
    }

    async fn wait_for_spoken(fixture: &Fixture, count: usize) {
        for _ in 0..400 {
            if spoken_count(fixture) >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("synthesizer never saw {count} utterances");
    }

    #[tokio::test]
    async fn plays_every_segment_in_order_then_goes_idle() {
        let mut fixture = fixture(false, None);
        let text = numbered_text(450);

        fixture.player.play(&text, "en");
        assert!(fixture.player.is_playing());

        let events = pump_until_idle(&mut fixture).await;

        let spoken = fixture.spoken.lock().expect("spoken lock");
        assert_eq!(spoken.len(), 3);
        let lengths: Vec<usize> = spoken.iter().map(|u| u.text.chars().count()).collect();
        assert_eq!(lengths, vec![200, 200, 50]);
        let replay: String = spoken.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(replay, text);

        assert!(events
            .iter()
            .any(|e| matches!(e, PlaybackEvent::Finished { .. })));
        assert!(fixture.player.progress().is_none());
    }

    #[tokio::test]
    async fn requested_language_applies_to_first_segment_only() {
        let mut fixture = fixture(false, None);

        fixture.player.play(&numbered_text(450), "en");
        pump_until_idle(&mut fixture).await;

        let spoken = fixture.spoken.lock().expect("spoken lock");
        assert_eq!(spoken[0].language, "en");
        assert!(spoken[1..].iter().all(|u| u.language == "zh"));
    }

    #[tokio::test]
    async fn empty_text_never_starts_playback() {
        let mut fixture = fixture(false, None);

        fixture.player.play("", "en");

        assert!(!fixture.player.is_playing());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(fixture.player.poll().is_none());
        assert_eq!(spoken_count(&fixture), 0);
    }

    #[tokio::test]
    async fn stop_interrupts_mid_segment_and_resets() {
        let mut fixture = fixture(true, None);

        fixture.player.play(&numbered_text(450), "en");
        wait_for_spoken(&fixture, 1).await;
        assert!(fixture.player.is_playing());

        fixture.player.stop();
        assert!(!fixture.player.is_playing());
        assert!(fixture.player.progress().is_none());

        // The cancelled task speaks nothing further and surfaces no
        // events.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(spoken_count(&fixture), 1);
        assert!(fixture.player.poll().is_none());
    }

    #[tokio::test]
    async fn stop_when_idle_is_a_noop() {
        let mut fixture = fixture(false, None);

        fixture.player.stop();
        fixture.player.stop();

        assert!(!fixture.player.is_playing());
        assert!(fixture.player.poll().is_none());
    }

    #[tokio::test]
    async fn settings_change_lands_on_the_next_segment() {
        let mut fixture = fixture(true, None);

        fixture.player.play(&numbered_text(450), "en");
        wait_for_spoken(&fixture, 1).await;
        assert_eq!(fixture.spoken.lock().expect("spoken lock")[0].rate, 1.0);

        fixture.player.set_rate(2.0);
        let gate = fixture.gate.clone().expect("gate");
        gate.add_permits(1);
        wait_for_spoken(&fixture, 2).await;
        assert_eq!(fixture.spoken.lock().expect("spoken lock")[1].rate, 2.0);

        gate.add_permits(8);
        pump_until_idle(&mut fixture).await;
    }

    #[tokio::test]
    async fn new_play_supersedes_the_previous_one() {
        let mut fixture = fixture(true, None);
        let first = numbered_text(450);

        fixture.player.play(&first, "en");
        wait_for_spoken(&fixture, 1).await;

        let second = "fresh text".to_string();
        fixture.player.play(&second, "fr");
        let gate = fixture.gate.clone().expect("gate");
        gate.add_permits(16);
        let events = pump_until_idle(&mut fixture).await;

        let spoken = fixture.spoken.lock().expect("spoken lock");
        let last = spoken.last().expect("something spoken");
        assert_eq!(last.text, second);
        assert_eq!(last.language, "fr");
        assert!(events
            .iter()
            .any(|e| matches!(e, PlaybackEvent::Finished { .. })));
    }

    #[tokio::test]
    async fn synthesis_failure_stops_playback_and_surfaces() {
        let mut fixture = fixture(false, Some(1));

        fixture.player.play(&numbered_text(450), "en");
        let events = pump_until_idle(&mut fixture).await;

        assert!(events
            .iter()
            .any(|e| matches!(e, PlaybackEvent::Failed { .. })));
        assert!(!fixture.player.is_playing());
        // Segment 0 plays, segment 1 fails, segment 2 never starts.
        assert_eq!(spoken_count(&fixture), 2);
    }

    #[tokio::test]
    async fn setters_clamp_out_of_range_values() {
        let fixture = fixture(false, None);

        fixture.player.set_rate(99.0);
        fixture.player.set_pitch(0.0);
        fixture.player.set_volume(-3.0);

        let settings = fixture.player.settings();
        assert_eq!(settings.rate, 4.0);
        assert_eq!(settings.pitch, 0.5);
        assert_eq!(settings.volume, 0.0);
    }
}
