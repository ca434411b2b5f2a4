//! Platform audio and speech interfaces
//!
//! The sequencer never talks to a sound device directly. It acquires an
//! [`AudioContext`] from an [`AudioHost`], starts tones through it, and
//! speaks through a [`SpeechSynthesizer`]. Backends live in submodules.

pub mod recording;
pub mod speech;

#[cfg(feature = "midi")]
pub mod midi;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by audio and speech backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The capability does not exist on this platform.
    #[error("platform capability unavailable: {0}")]
    Unavailable(String),

    /// A tone was stopped after it had already ended.
    #[error("tone already stopped")]
    AlreadyStopped,

    /// The context a call targeted has been closed.
    #[error("audio context closed")]
    Closed,

    #[error("backend error: {0}")]
    Backend(String),
}

/// Amplitude curve of a tone, in milliseconds from tone start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Envelope {
    /// Exponential rise to `peak` at `attack_ms`, then exponential decay to
    /// `floor` at `end_ms`.
    Ring {
        attack_ms: f64,
        peak: f64,
        floor: f64,
        end_ms: f64,
    },
    /// Constant gain until stopped.
    Hold { gain: f64 },
}

/// Exponential ramps cannot start from zero; the curve starts here instead.
const RAMP_EPSILON: f64 = 1e-4;

impl Envelope {
    /// Gain at `t_ms` after the tone started.
    pub fn gain_at(&self, t_ms: f64) -> f64 {
        match *self {
            Envelope::Hold { gain } => gain,
            Envelope::Ring {
                attack_ms,
                peak,
                floor,
                end_ms,
            } => {
                if t_ms <= 0.0 {
                    0.0
                } else if t_ms < attack_ms {
                    exp_ramp(RAMP_EPSILON, peak, t_ms / attack_ms)
                } else if t_ms < end_ms {
                    exp_ramp(peak, floor, (t_ms - attack_ms) / (end_ms - attack_ms))
                } else {
                    floor
                }
            }
        }
    }

    /// Highest gain the envelope reaches.
    pub fn peak(&self) -> f64 {
        match *self {
            Envelope::Hold { gain } => gain,
            Envelope::Ring { peak, .. } => peak,
        }
    }
}

fn exp_ramp(from: f64, to: f64, frac: f64) -> f64 {
    let frac = frac.clamp(0.0, 1.0);
    from * (to / from).powf(frac)
}

/// A sine tone to start on an [`AudioContext`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToneSpec {
    pub frequency_hz: f64,
    pub envelope: Envelope,
    /// Natural length. `None` sounds until stopped.
    pub length_ms: Option<u64>,
}

/// A running tone. Dropping a handle does not silence it.
pub trait ToneHandle {
    /// Ask the tone to stop now. Stopping a tone that already ended may
    /// return [`PlatformError::AlreadyStopped`].
    fn stop(&mut self) -> Result<(), PlatformError>;
}

/// A live audio output.
pub trait AudioContext {
    fn start_tone(&mut self, spec: &ToneSpec) -> Result<Box<dyn ToneHandle>, PlatformError>;

    /// Silence everything started on this context and release it.
    fn close(&mut self) -> Result<(), PlatformError>;
}

/// Source of audio contexts.
pub trait AudioHost {
    fn open(&self) -> Result<Box<dyn AudioContext>, PlatformError>;
}

impl<H: AudioHost + ?Sized> AudioHost for Box<H> {
    fn open(&self) -> Result<Box<dyn AudioContext>, PlatformError> {
        (**self).open()
    }
}

/// A speech voice offered by the platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    pub lang: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// One utterance for the speech synthesizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub volume: f64,
    pub rate: f64,
    pub pitch: f64,
    /// `None` leaves the choice to the platform.
    pub voice: Option<Voice>,
}

pub trait SpeechSynthesizer {
    fn voices(&self) -> Vec<Voice>;

    /// Queue an utterance. Returns once it is queued, not when it finishes.
    fn speak(&self, utterance: Utterance) -> Result<(), PlatformError>;
}

/// Pick the whisper voice: an English voice whose name mentions "Female",
/// else the first voice offered.
pub fn pick_whisper_voice(voices: &[Voice]) -> Option<Voice> {
    voices
        .iter()
        .find(|v| v.name.contains("Female") && v.lang.contains("en"))
        .or_else(|| voices.first())
        .cloned()
}

/// Host with no audio output at all; `open` always fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAudio;

impl AudioHost for NoAudio {
    fn open(&self) -> Result<Box<dyn AudioContext>, PlatformError> {
        Err(PlatformError::Unavailable("no audio output".into()))
    }
}
