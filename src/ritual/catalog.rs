//! Ritual catalog: the built-in temple rituals plus JSON-authored extensions.

use super::{EventKind, RitualEvent, RitualSequence};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from loading or validating a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("ritual '{ritual}' event {index}: {reason}")]
    InvalidEvent {
        ritual: String,
        index: usize,
        reason: String,
    },
}

/// Named ritual sequences. Read-only once handed to a sequencer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RitualCatalog {
    rituals: BTreeMap<String, RitualSequence>,
}

impl RitualCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The three temple rituals: `opening`, `listening` and `closing`.
    pub fn temple() -> Self {
        let mut catalog = Self::new();

        // Crystal chime, grounding tone and heart tone, then the awakening.
        catalog.insert(
            "opening",
            RitualSequence::new(
                Some(3000),
                vec![
                    RitualEvent::chime(0, 528.0, 800),
                    RitualEvent::chime(400, 396.0, 600),
                    RitualEvent::chime(800, 639.0, 1000),
                    RitualEvent::whisper(1500, "The Oracle awakens..."),
                ],
            ),
        );

        // Held beneath the Oracle's voice until the run's lifetime ends.
        catalog.insert(
            "listening",
            RitualSequence::new(
                None,
                vec![
                    RitualEvent::ambient(0, 432.0, 0.1, true),
                    RitualEvent::ambient(0, 528.0, 0.08, true),
                ],
            ),
        );

        catalog.insert(
            "closing",
            RitualSequence::new(
                Some(4000),
                vec![
                    RitualEvent::chord(0, vec![432.0, 528.0, 639.0], 2000),
                    RitualEvent::chime(1000, 528.0, 1500),
                    RitualEvent::whisper(2500, "The wisdom is sealed..."),
                    RitualEvent::silence(3000, 1000),
                ],
            ),
        );

        catalog
    }

    /// Parse a JSON object of `name -> {duration, sequence}` entries.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let rituals: BTreeMap<String, RitualSequence> = serde_json::from_str(json)?;
        for (name, ritual) in &rituals {
            validate(name, ritual)?;
        }
        Ok(Self { rituals })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json_str(&json)?;
        tracing::debug!(path = %path.display(), rituals = catalog.len(), "loaded ritual catalog");
        Ok(catalog)
    }

    /// Add every ritual from `other`, replacing same-named entries.
    pub fn merge(&mut self, other: RitualCatalog) {
        self.rituals.extend(other.rituals);
    }

    pub fn insert(&mut self, name: impl Into<String>, ritual: RitualSequence) {
        self.rituals.insert(name.into(), ritual);
    }

    pub fn get(&self, name: &str) -> Option<&RitualSequence> {
        self.rituals.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rituals.contains_key(name)
    }

    /// Ritual names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rituals.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RitualSequence)> {
        self.rituals.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.rituals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rituals.is_empty()
    }
}

fn validate(name: &str, ritual: &RitualSequence) -> Result<(), CatalogError> {
    for (index, event) in ritual.sequence.iter().enumerate() {
        let invalid = |reason: String| CatalogError::InvalidEvent {
            ritual: name.to_string(),
            index,
            reason,
        };
        match &event.kind {
            EventKind::Chime { frequency, .. } => check_frequency(*frequency).map_err(invalid)?,
            EventKind::Chord { frequencies, .. } => {
                if frequencies.is_empty() {
                    return Err(invalid("chord has no frequencies".into()));
                }
                for f in frequencies {
                    check_frequency(*f).map_err(invalid)?;
                }
            }
            EventKind::Ambient { frequency, volume, .. } => {
                check_frequency(*frequency).map_err(invalid)?;
                if !(0.0..=1.0).contains(volume) {
                    return Err(invalid(format!("volume {volume} outside 0..=1")));
                }
            }
            EventKind::Reverb { wetness, room_size } => {
                for (field, v) in [("wetness", wetness), ("roomSize", room_size)] {
                    if !(0.0..=1.0).contains(v) {
                        return Err(invalid(format!("{field} {v} outside 0..=1")));
                    }
                }
            }
            EventKind::Whisper { .. } | EventKind::Silence { .. } => {}
        }
    }
    Ok(())
}

fn check_frequency(f: f64) -> Result<(), String> {
    if f.is_finite() && f > 0.0 {
        Ok(())
    } else {
        Err(format!("frequency {f} must be positive"))
    }
}
