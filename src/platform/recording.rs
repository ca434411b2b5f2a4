//! In-memory audio and speech backends.
//!
//! Nothing is audible. Every call is timestamped on a [`Timeline`] and kept
//! in a shared log, which makes these backends the reference platform for
//! tests and for dry runs of the CLI.

use super::{AudioContext, AudioHost, PlatformError, SpeechSynthesizer, ToneHandle, ToneSpec, Utterance, Voice};
use crate::timeline::Timeline;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// One tone started on a recording context.
#[derive(Clone, Debug, PartialEq)]
pub struct ToneRecord {
    pub context: u64,
    pub spec: ToneSpec,
    pub started_ms: f64,
    /// Time of every `stop()` call, successful or not.
    pub stop_calls: Vec<f64>,
    /// When the tone was cut short by `stop()` or by closing its context.
    pub silenced_ms: Option<f64>,
}

impl ToneRecord {
    /// When the tone ends on its own, if it has a natural length.
    pub fn natural_end_ms(&self) -> Option<f64> {
        self.spec.length_ms.map(|len| self.started_ms + len as f64)
    }

    /// Whether the tone is audible at `t_ms`.
    pub fn is_sounding_at(&self, t_ms: f64) -> bool {
        if t_ms < self.started_ms {
            return false;
        }
        let cut = self.silenced_ms.unwrap_or(f64::INFINITY);
        let end = self.natural_end_ms().unwrap_or(f64::INFINITY);
        t_ms < cut.min(end)
    }
}

#[derive(Default)]
struct AudioLog {
    opened: u64,
    closed: u64,
    tones: Vec<ToneRecord>,
}

/// Audio host that records instead of playing.
#[derive(Clone)]
pub struct RecordingHost {
    timeline: Timeline,
    log: Rc<RefCell<AudioLog>>,
    available: Rc<Cell<bool>>,
}

impl RecordingHost {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            log: Rc::new(RefCell::new(AudioLog::default())),
            available: Rc::new(Cell::new(true)),
        }
    }

    /// Make later `open` calls fail (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.available.set(available);
    }

    pub fn tones(&self) -> Vec<ToneRecord> {
        self.log.borrow().tones.clone()
    }

    pub fn contexts_opened(&self) -> u64 {
        self.log.borrow().opened
    }

    pub fn contexts_closed(&self) -> u64 {
        self.log.borrow().closed
    }

    /// Tones audible at `t_ms`.
    pub fn sounding_at(&self, t_ms: f64) -> Vec<ToneRecord> {
        self.log
            .borrow()
            .tones
            .iter()
            .filter(|t| t.is_sounding_at(t_ms))
            .cloned()
            .collect()
    }
}

impl AudioHost for RecordingHost {
    fn open(&self) -> Result<Box<dyn AudioContext>, PlatformError> {
        if !self.available.get() {
            return Err(PlatformError::Unavailable("recording host disabled".into()));
        }
        let id = {
            let mut log = self.log.borrow_mut();
            log.opened += 1;
            log.opened
        };
        Ok(Box::new(RecordingContext {
            id,
            timeline: self.timeline.clone(),
            log: self.log.clone(),
            closed: Rc::new(Cell::new(false)),
        }))
    }
}

struct RecordingContext {
    id: u64,
    timeline: Timeline,
    log: Rc<RefCell<AudioLog>>,
    closed: Rc<Cell<bool>>,
}

impl AudioContext for RecordingContext {
    fn start_tone(&mut self, spec: &ToneSpec) -> Result<Box<dyn ToneHandle>, PlatformError> {
        if self.closed.get() {
            return Err(PlatformError::Closed);
        }
        let index = {
            let mut log = self.log.borrow_mut();
            log.tones.push(ToneRecord {
                context: self.id,
                spec: spec.clone(),
                started_ms: self.timeline.now_ms(),
                stop_calls: Vec::new(),
                silenced_ms: None,
            });
            log.tones.len() - 1
        };
        Ok(Box::new(RecordingTone {
            index,
            timeline: self.timeline.clone(),
            log: self.log.clone(),
            context_closed: self.closed.clone(),
        }))
    }

    fn close(&mut self) -> Result<(), PlatformError> {
        if self.closed.replace(true) {
            return Err(PlatformError::Closed);
        }
        let now = self.timeline.now_ms();
        let mut log = self.log.borrow_mut();
        log.closed += 1;
        for tone in log.tones.iter_mut().filter(|t| t.context == self.id) {
            if tone.is_sounding_at(now) {
                tone.silenced_ms = Some(now);
            }
        }
        Ok(())
    }
}

struct RecordingTone {
    index: usize,
    timeline: Timeline,
    log: Rc<RefCell<AudioLog>>,
    context_closed: Rc<Cell<bool>>,
}

impl ToneHandle for RecordingTone {
    fn stop(&mut self) -> Result<(), PlatformError> {
        let now = self.timeline.now_ms();
        let mut log = self.log.borrow_mut();
        let tone = &mut log.tones[self.index];
        let first_call = tone.stop_calls.is_empty();
        tone.stop_calls.push(now);

        if self.context_closed.get() {
            return Err(PlatformError::Closed);
        }
        if !first_call || !tone.is_sounding_at(now) {
            return Err(PlatformError::AlreadyStopped);
        }
        tone.silenced_ms = Some(now);
        Ok(())
    }
}

/// One utterance handed to [`RecordingSpeech`].
#[derive(Clone, Debug, PartialEq)]
pub struct SpeechRecord {
    pub at_ms: f64,
    pub utterance: Utterance,
}

/// Speech synthesizer that records utterances.
#[derive(Clone)]
pub struct RecordingSpeech {
    timeline: Timeline,
    voices: Vec<Voice>,
    spoken: Rc<RefCell<Vec<SpeechRecord>>>,
}

impl RecordingSpeech {
    pub fn new(timeline: Timeline, voices: Vec<Voice>) -> Self {
        Self {
            timeline,
            voices,
            spoken: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn spoken(&self) -> Vec<SpeechRecord> {
        self.spoken.borrow().clone()
    }
}

impl SpeechSynthesizer for RecordingSpeech {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&self, utterance: Utterance) -> Result<(), PlatformError> {
        self.spoken.borrow_mut().push(SpeechRecord {
            at_ms: self.timeline.now_ms(),
            utterance,
        });
        Ok(())
    }
}
