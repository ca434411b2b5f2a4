//! Ritual sequencer
//!
//! Plays catalog rituals against a [`Timeline`]. Every event of a run is an
//! independent task that sleeps until `start + delay` and then fires; two
//! more tasks end the run. One stops the run's tones when its lifetime is
//! over, and one resolves the run's [`RitualCompletion`].
//!
//! The audio context is shared by all runs and replaced wholesale by
//! [`RitualSequencer::stop_all_rituals`]. Runs remember the context
//! generation they started under, so their later events fall silent once
//! that context is gone.

use super::{EventKind, RitualCatalog, RitualEvent};
use crate::platform::{
    pick_whisper_voice, AudioContext, AudioHost, Envelope, SpeechSynthesizer, ToneHandle, ToneSpec, Utterance,
};
use crate::timeline::Timeline;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use tracing::{debug, info, trace, warn};

/// Envelope constants for chimes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChimeShape {
    pub attack_ms: f64,
    pub peak: f64,
    pub floor: f64,
}

impl Default for ChimeShape {
    fn default() -> Self {
        Self {
            attack_ms: 100.0,
            peak: 0.3,
            floor: 0.01,
        }
    }
}

/// Utterance settings for whispers, relative to normal speech (1.0).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhisperStyle {
    pub volume: f64,
    pub rate: f64,
    pub pitch: f64,
}

impl Default for WhisperStyle {
    fn default() -> Self {
        Self {
            volume: 0.3,
            rate: 0.6,
            pitch: 0.8,
        }
    }
}

/// Tunables for [`RitualSequencer`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Added after the last event ends before a run's tones are stopped.
    pub grace_ms: u64,
    /// Length assumed for events that declare none (ambient, whisper).
    pub default_event_ms: u64,
    pub chime: ChimeShape,
    pub whisper: WhisperStyle,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            grace_ms: 500,
            default_event_ms: 1000,
            chime: ChimeShape::default(),
            whisper: WhisperStyle::default(),
        }
    }
}

/// Resolves once when a ritual run completes. Clones share the same signal.
#[derive(Clone)]
pub struct RitualCompletion {
    state: Rc<RefCell<CompletionState>>,
}

struct CompletionState {
    done: bool,
    wakers: Vec<Waker>,
}

impl RitualCompletion {
    fn pending() -> Self {
        Self {
            state: Rc::new(RefCell::new(CompletionState {
                done: false,
                wakers: Vec::new(),
            })),
        }
    }

    fn resolved() -> Self {
        let c = Self::pending();
        c.state.borrow_mut().done = true;
        c
    }

    pub fn is_complete(&self) -> bool {
        self.state.borrow().done
    }

    /// Returns false if the completion had already resolved.
    fn resolve(&self) -> bool {
        let wakers = {
            let mut s = self.state.borrow_mut();
            if s.done {
                return false;
            }
            s.done = true;
            std::mem::take(&mut s.wakers)
        };
        for w in wakers {
            w.wake();
        }
        true
    }
}

impl Future for RitualCompletion {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut s = self.state.borrow_mut();
        if s.done {
            return Poll::Ready(());
        }
        if !s.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            s.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

struct AudioSlot {
    context: Option<Box<dyn AudioContext>>,
    generation: u64,
}

/// Schedules catalog rituals and drives their tones and whispers.
pub struct RitualSequencer {
    timeline: Timeline,
    catalog: Rc<RitualCatalog>,
    host: Rc<dyn AudioHost>,
    speech: Option<Rc<dyn SpeechSynthesizer>>,
    config: Rc<SequencerConfig>,
    audio: Rc<RefCell<AudioSlot>>,
    next_run: Cell<u64>,
}

impl RitualSequencer {
    /// A sequencer over the temple catalog. No audio is acquired until
    /// [`initialize`](Self::initialize).
    pub fn new(timeline: Timeline, host: impl AudioHost + 'static) -> Self {
        Self {
            timeline,
            catalog: Rc::new(RitualCatalog::temple()),
            host: Rc::new(host),
            speech: None,
            config: Rc::new(SequencerConfig::default()),
            audio: Rc::new(RefCell::new(AudioSlot {
                context: None,
                generation: 0,
            })),
            next_run: Cell::new(0),
        }
    }

    pub fn with_catalog(mut self, catalog: RitualCatalog) -> Self {
        self.catalog = Rc::new(catalog);
        self
    }

    pub fn with_speech(mut self, speech: impl SpeechSynthesizer + 'static) -> Self {
        let speech: Rc<dyn SpeechSynthesizer> = Rc::new(speech);
        self.speech = Some(speech);
        self
    }

    pub fn with_config(mut self, config: SequencerConfig) -> Self {
        self.config = Rc::new(config);
        self
    }

    pub fn catalog(&self) -> &RitualCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// Acquire an audio context if none is held. Failure leaves the
    /// sequencer silent and is only logged.
    pub fn initialize(&self) {
        let mut slot = self.audio.borrow_mut();
        if slot.context.is_some() {
            return;
        }
        match self.host.open() {
            Ok(ctx) => {
                slot.context = Some(ctx);
                slot.generation += 1;
                info!(generation = slot.generation, "ritual audio initialized");
            }
            Err(e) => {
                warn!(error = %e, "audio unavailable; rituals will play silently");
            }
        }
    }

    /// Close the audio context, if any. Rituals are silent until the next
    /// [`initialize`](Self::initialize).
    pub fn shutdown(&self) {
        let ctx = self.audio.borrow_mut().context.take();
        if let Some(mut ctx) = ctx {
            if let Err(e) = ctx.close() {
                debug!(error = %e, "audio context close reported an error");
            }
            info!("ritual audio closed");
        }
    }

    pub fn is_available(&self) -> bool {
        self.audio.borrow().context.is_some()
    }

    /// Silence every run by discarding the shared context, then acquire a
    /// fresh one for later rituals.
    pub fn stop_all_rituals(&self) {
        info!("stopping all rituals");
        self.shutdown();
        self.initialize();
    }

    /// Schedule the named ritual from now.
    ///
    /// Unknown names and a missing audio context are not errors: the warning
    /// is logged and the returned completion is already resolved.
    pub fn play_ritual(&self, name: &str) -> RitualCompletion {
        let Some(ritual) = self.catalog.get(name) else {
            warn!(ritual = name, "ritual not available");
            return RitualCompletion::resolved();
        };
        let generation = {
            let slot = self.audio.borrow();
            if slot.context.is_none() {
                warn!(ritual = name, "ritual not available without audio");
                return RitualCompletion::resolved();
            }
            slot.generation
        };

        let run_id = self.next_run.get();
        self.next_run.set(run_id + 1);
        let start = self.timeline.now_ms();
        let lifetime = ritual.lifetime_ms(self.config.default_event_ms, self.config.grace_ms);
        info!(
            ritual = name,
            run = run_id,
            events = ritual.sequence.len(),
            lifetime_ms = lifetime,
            "beginning ritual"
        );

        let run = Rc::new(RitualRun {
            ritual: name.to_string(),
            id: run_id,
            generation,
            audio: self.audio.clone(),
            speech: self.speech.clone(),
            config: self.config.clone(),
            tones: RefCell::new(Vec::new()),
        });
        let completion = RitualCompletion::pending();

        for event in ritual.events().iter().cloned() {
            let run = run.clone();
            let tl = self.timeline.clone();
            self.timeline.spawn(async move {
                tl.sleep_until_ms(start + event.delay_ms as f64).await;
                run.fire(&event);
            });
        }

        let resolve_at_end = ritual.duration.is_none();
        {
            let run = run.clone();
            let tl = self.timeline.clone();
            let done = completion.clone();
            self.timeline.spawn(async move {
                tl.sleep_until_ms(start + lifetime as f64).await;
                run.release_tones();
                if resolve_at_end && done.resolve() {
                    debug!(ritual = %run.ritual, run = run.id, "ritual complete");
                }
            });
        }

        if let Some(duration) = ritual.duration {
            let tl = self.timeline.clone();
            let done = completion.clone();
            let ritual = name.to_string();
            self.timeline.spawn(async move {
                tl.sleep_until_ms(start + duration as f64).await;
                if done.resolve() {
                    debug!(ritual = %ritual, run = run_id, "ritual complete");
                }
            });
        }

        completion
    }
}

/// State private to one `play_ritual` call.
struct RitualRun {
    ritual: String,
    id: u64,
    generation: u64,
    audio: Rc<RefCell<AudioSlot>>,
    speech: Option<Rc<dyn SpeechSynthesizer>>,
    config: Rc<SequencerConfig>,
    tones: RefCell<Vec<Box<dyn ToneHandle>>>,
}

impl RitualRun {
    fn fire(&self, event: &RitualEvent) {
        if !self.context_is_current() {
            debug!(
                ritual = %self.ritual,
                run = self.id,
                event = event.kind.name(),
                "audio context replaced; event skipped"
            );
            return;
        }
        trace!(ritual = %self.ritual, run = self.id, event = event.kind.name(), "event fired");

        match &event.kind {
            EventKind::Chime { frequency, duration_ms } => {
                self.start_tone(self.chime_spec(*frequency, *duration_ms));
            }
            EventKind::Chord {
                frequencies,
                duration_ms,
            } => {
                for f in frequencies {
                    self.start_tone(self.chime_spec(*f, *duration_ms));
                }
            }
            EventKind::Ambient {
                frequency,
                volume,
                continuous,
            } => {
                if *continuous {
                    self.start_tone(ToneSpec {
                        frequency_hz: *frequency,
                        envelope: Envelope::Hold { gain: *volume },
                        length_ms: None,
                    });
                } else {
                    debug!(ritual = %self.ritual, frequency, "non-continuous ambient is inert");
                }
            }
            EventKind::Whisper { text } => self.whisper(text),
            EventKind::Silence { .. } => {}
            EventKind::Reverb { wetness, room_size } => {
                debug!(ritual = %self.ritual, wetness = *wetness, room_size = *room_size, "reverb is not rendered");
            }
        }
    }

    fn context_is_current(&self) -> bool {
        let slot = self.audio.borrow();
        slot.context.is_some() && slot.generation == self.generation
    }

    fn chime_spec(&self, frequency: f64, duration_ms: u64) -> ToneSpec {
        let shape = &self.config.chime;
        ToneSpec {
            frequency_hz: frequency,
            envelope: Envelope::Ring {
                attack_ms: shape.attack_ms,
                peak: shape.peak,
                floor: shape.floor,
                end_ms: duration_ms as f64,
            },
            length_ms: Some(duration_ms),
        }
    }

    fn start_tone(&self, spec: ToneSpec) {
        let started = {
            let mut slot = self.audio.borrow_mut();
            match slot.context.as_mut() {
                Some(ctx) => ctx.start_tone(&spec),
                None => return,
            }
        };
        match started {
            Ok(handle) => self.tones.borrow_mut().push(handle),
            Err(e) => warn!(
                ritual = %self.ritual,
                frequency = spec.frequency_hz,
                error = %e,
                "tone could not start"
            ),
        }
    }

    fn whisper(&self, text: &str) {
        let Some(speech) = &self.speech else {
            debug!(ritual = %self.ritual, "speech synthesis unavailable; whisper skipped");
            return;
        };
        let style = &self.config.whisper;
        let utterance = Utterance {
            text: text.to_string(),
            volume: style.volume,
            rate: style.rate,
            pitch: style.pitch,
            voice: pick_whisper_voice(&speech.voices()),
        };
        if let Err(e) = speech.speak(utterance) {
            warn!(ritual = %self.ritual, error = %e, "whisper failed");
        }
    }

    /// Stop every tone this run started. Each handle is stopped once and
    /// then dropped; errors from tones that already ended are ignored.
    fn release_tones(&self) {
        let tones = std::mem::take(&mut *self.tones.borrow_mut());
        let count = tones.len();
        for mut tone in tones {
            if let Err(e) = tone.stop() {
                trace!(ritual = %self.ritual, run = self.id, error = %e, "tone already silent");
            }
        }
        debug!(ritual = %self.ritual, run = self.id, tones = count, "ritual tones released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::platform::recording::RecordingHost;
    use crate::platform::NoAudio;

    #[test]
    fn config_defaults_match_temple_constants() {
        let c = SequencerConfig::default();
        assert_eq!(c.grace_ms, 500);
        assert_eq!(c.default_event_ms, 1000);
        assert_eq!(c.chime.peak, 0.3);
        assert_eq!(c.whisper, WhisperStyle { volume: 0.3, rate: 0.6, pitch: 0.8 });
    }

    #[test]
    fn partial_config_json_keeps_defaults() {
        let c: SequencerConfig = serde_json::from_str(r#"{"grace_ms": 250, "whisper": {"rate": 0.5}}"#).unwrap();
        assert_eq!(c.grace_ms, 250);
        assert_eq!(c.default_event_ms, 1000);
        assert_eq!(c.whisper.rate, 0.5);
        assert_eq!(c.whisper.volume, 0.3);
    }

    #[test]
    fn completion_resolves_once() {
        let c = RitualCompletion::pending();
        let other = c.clone();
        assert!(!c.is_complete());
        assert!(c.resolve());
        assert!(!other.resolve());
        assert!(other.is_complete());
        assert!(RitualCompletion::resolved().is_complete());
    }

    #[test]
    fn initialize_is_idempotent() {
        let engine = Engine::offline();
        let host = RecordingHost::new(engine.timeline());
        let seq = RitualSequencer::new(engine.timeline(), host.clone());

        assert!(!seq.is_available());
        seq.initialize();
        seq.initialize();
        assert!(seq.is_available());
        assert_eq!(host.contexts_opened(), 1);

        seq.shutdown();
        assert!(!seq.is_available());
        assert_eq!(host.contexts_closed(), 1);
    }

    #[test]
    fn degraded_sequencer_resolves_immediately() {
        let engine = Engine::offline();
        let seq = RitualSequencer::new(engine.timeline(), NoAudio);
        seq.initialize();

        assert!(!seq.is_available());
        assert!(seq.play_ritual("opening").is_complete());
        assert!(engine.is_idle());
    }
}
