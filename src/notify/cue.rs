use std::f32::consts::TAU;
use std::io::Write;
use std::time::Duration;

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};
use tracing::{debug, warn};

use crate::error::AudioError;

const SAMPLE_RATE: u32 = 48_000;

/// Short synthetic "ping": a sine tone whose gain ramps exponentially down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub duration: Duration,
    pub start_gain: f32,
    pub end_gain: f32,
}

impl Tone {
    /// A5, 150ms.
    pub fn completion() -> Self {
        Self {
            frequency_hz: 880.0,
            duration: Duration::from_millis(150),
            start_gain: 0.1,
            end_gain: 0.00001,
        }
    }

    /// Mono PCM samples in [-1, 1].
    pub fn render(&self, sample_rate: u32) -> Vec<f32> {
        let total = (self.duration.as_secs_f32() * sample_rate as f32).round() as usize;
        if total == 0 {
            return Vec::new();
        }
        let ratio = self.end_gain / self.start_gain;
        (0..total)
            .map(|n| {
                let t = n as f32 / sample_rate as f32;
                let progress = n as f32 / total as f32;
                let gain = self.start_gain * ratio.powf(progress);
                gain * (TAU * self.frequency_hz * t).sin()
            })
            .collect()
    }
}

/// Fired once after each successful analysis.
pub trait CompletionCue: Send + Sync {
    fn play(&self);
}

/// Somewhere mono PCM can be played. Must not block until playback ends.
pub trait ToneSink: Send + Sync {
    fn sample_rate(&self) -> u32;

    fn play_samples(&self, samples: Vec<f32>) -> Result<(), AudioError>;
}

/// Plays on the default output device from a short-lived thread, since the
/// output stream handle cannot leave the thread that opened it.
pub struct SpeakerSink {
    sample_rate: u32,
}

impl SpeakerSink {
    pub fn new() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
        }
    }

    fn play_blocking(samples: Vec<f32>, sample_rate: u32) -> Result<(), AudioError> {
        let (_stream, handle) =
            OutputStream::try_default().map_err(|e| AudioError(e.to_string()))?;
        let sink = Sink::try_new(&handle).map_err(|e| AudioError(e.to_string()))?;
        sink.append(SamplesBuffer::new(1, sample_rate, samples));
        sink.sleep_until_end();
        Ok(())
    }
}

impl Default for SpeakerSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ToneSink for SpeakerSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn play_samples(&self, samples: Vec<f32>) -> Result<(), AudioError> {
        let sample_rate = self.sample_rate;
        std::thread::Builder::new()
            .name("completion-cue".to_string())
            .spawn(move || {
                if let Err(e) = Self::play_blocking(samples, sample_rate) {
                    warn!("{}; ringing the terminal bell instead", e);
                    ring_terminal_bell();
                }
            })
            .map(|_| ())
            .map_err(|e| AudioError(e.to_string()))
    }
}

/// Renders a [`Tone`] and hands it to a sink, falling back to the terminal
/// bell when the sink refuses it.
pub struct ToneCue<S> {
    tone: Tone,
    sink: S,
}

impl<S: ToneSink> ToneCue<S> {
    pub fn new(sink: S) -> Self {
        Self {
            tone: Tone::completion(),
            sink,
        }
    }
}

impl<S: ToneSink> CompletionCue for ToneCue<S> {
    fn play(&self) {
        debug!(
            "Completion cue: {}Hz for {}ms",
            self.tone.frequency_hz,
            self.tone.duration.as_millis()
        );
        let samples = self.tone.render(self.sink.sample_rate());
        if let Err(e) = self.sink.play_samples(samples) {
            warn!("{}; ringing the terminal bell instead", e);
            ring_terminal_bell();
        }
    }
}

fn ring_terminal_bell() {
    let mut stderr = std::io::stderr();
    if let Err(e) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
        warn!("Terminal bell failed: {}", e);
    }
}

pub struct SilentCue;

impl CompletionCue for SilentCue {
    fn play(&self) {}
}
