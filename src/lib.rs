//! Oracle Temple
//!
//! Ritual audio sequencing on a deterministic logical-time engine:
//! - Fire-once timers on a shared clock, single-threaded cooperative tasks
//! - Dual execution modes: realtime (spin_sleep) and offline (stepping API)
//! - Named rituals of chimes, chords, ambient drones, whispers and silences
//! - Global stop that silences every run in flight
//!
//! Plus an accessibility self-check that inspects a read-only page model and
//! reports passed, failed and advisory findings.

pub mod pq;
pub mod executor;
pub mod scheduler;
pub mod timeline;
pub mod engine;
pub mod platform;
pub mod ritual;
pub mod a11y;


pub use engine::{ClockMode, Engine, EngineConfig};
pub use timeline::Timeline;
pub use platform::{AudioContext, AudioHost, PlatformError, SpeechSynthesizer, ToneHandle};
pub use ritual::{RitualCatalog, RitualCompletion, RitualSequencer, SequencerConfig};
pub use a11y::{validate_temple_accessibility, ComplianceReport, PageInspector};
