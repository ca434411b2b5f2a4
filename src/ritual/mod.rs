//! Rituals: named, timed sequences of tones and whispers.

pub mod catalog;
pub mod sequencer;

pub use catalog::{CatalogError, RitualCatalog};
pub use sequencer::{RitualCompletion, RitualSequencer, SequencerConfig};

use serde::{Deserialize, Serialize};

/// What an event does when it fires.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventKind {
    /// A single decaying sine tone.
    Chime {
        frequency: f64,
        #[serde(rename = "duration")]
        duration_ms: u64,
    },
    /// Several chimes struck together.
    Chord {
        frequencies: Vec<f64>,
        #[serde(rename = "duration")]
        duration_ms: u64,
    },
    /// A held low-volume tone, stopped when its run ends.
    Ambient {
        frequency: f64,
        #[serde(default = "default_ambient_volume")]
        volume: f64,
        #[serde(default)]
        continuous: bool,
    },
    /// Quiet, slowed speech.
    Whisper { text: String },
    /// Reserves time; makes no sound.
    Silence {
        #[serde(rename = "duration")]
        duration_ms: u64,
    },
    /// Room ambience hint. Accepted for authoring compatibility; plays nothing.
    Reverb {
        #[serde(default)]
        wetness: f64,
        #[serde(default, rename = "roomSize", alias = "room_size")]
        room_size: f64,
    },
}

fn default_ambient_volume() -> f64 {
    0.1
}

impl EventKind {
    /// Declared length, for the kinds that have one.
    pub fn duration_ms(&self) -> Option<u64> {
        match self {
            EventKind::Chime { duration_ms, .. }
            | EventKind::Chord { duration_ms, .. }
            | EventKind::Silence { duration_ms } => Some(*duration_ms),
            EventKind::Ambient { .. } | EventKind::Whisper { .. } | EventKind::Reverb { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Chime { .. } => "chime",
            EventKind::Chord { .. } => "chord",
            EventKind::Ambient { .. } => "ambient",
            EventKind::Whisper { .. } => "whisper",
            EventKind::Silence { .. } => "silence",
            EventKind::Reverb { .. } => "reverb",
        }
    }
}

/// An event at a fixed offset from the start of its ritual.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RitualEvent {
    #[serde(rename = "delay", default)]
    pub delay_ms: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl RitualEvent {
    pub fn new(delay_ms: u64, kind: EventKind) -> Self {
        Self { delay_ms, kind }
    }

    pub fn chime(delay_ms: u64, frequency: f64, duration_ms: u64) -> Self {
        Self::new(delay_ms, EventKind::Chime { frequency, duration_ms })
    }

    pub fn chord(delay_ms: u64, frequencies: Vec<f64>, duration_ms: u64) -> Self {
        Self::new(delay_ms, EventKind::Chord { frequencies, duration_ms })
    }

    pub fn ambient(delay_ms: u64, frequency: f64, volume: f64, continuous: bool) -> Self {
        Self::new(
            delay_ms,
            EventKind::Ambient {
                frequency,
                volume,
                continuous,
            },
        )
    }

    pub fn whisper(delay_ms: u64, text: impl Into<String>) -> Self {
        Self::new(delay_ms, EventKind::Whisper { text: text.into() })
    }

    pub fn silence(delay_ms: u64, duration_ms: u64) -> Self {
        Self::new(delay_ms, EventKind::Silence { duration_ms })
    }

    /// Offset at which this event stops contributing to its run, using
    /// `default_ms` for kinds without a declared length.
    pub fn end_ms(&self, default_ms: u64) -> u64 {
        self.delay_ms
            .saturating_add(self.kind.duration_ms().unwrap_or(default_ms))
    }
}

/// A catalog entry: an optional fixed duration and the events to schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RitualSequence {
    /// Completion offset in ms. `None` completes when the run's lifetime ends.
    #[serde(default)]
    pub duration: Option<u64>,
    pub sequence: Vec<RitualEvent>,
}

impl RitualSequence {
    pub fn new(duration: Option<u64>, sequence: Vec<RitualEvent>) -> Self {
        Self { duration, sequence }
    }

    pub fn events(&self) -> &[RitualEvent] {
        &self.sequence
    }

    /// Offset at which a run's tones are stopped: the latest event end plus
    /// `grace_ms`. An empty sequence has no lifetime.
    pub fn lifetime_ms(&self, default_event_ms: u64, grace_ms: u64) -> u64 {
        self.sequence
            .iter()
            .map(|e| e.end_ms(default_event_ms))
            .max()
            .map_or(0, |end| end.saturating_add(grace_ms))
    }

    /// Offset at which a run signals completion.
    pub fn completion_ms(&self, default_event_ms: u64, grace_ms: u64) -> u64 {
        self.duration
            .unwrap_or_else(|| self.lifetime_ms(default_event_ms, grace_ms))
    }
}
