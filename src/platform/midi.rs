//! MIDI output backend (feature `midi`).
//!
//! Each tone becomes a note-on on channel 1 at the nearest equal-tempered
//! pitch; its peak gain sets the velocity. Notes with a natural length get a
//! note-off scheduled on the [`Timeline`]. Overlapping tones on the same
//! pitch share one sounding note until the last of them releases.

use super::{AudioContext, AudioHost, PlatformError, ToneHandle, ToneSpec};
use crate::timeline::Timeline;
use midir::{MidiOutput, MidiOutputConnection};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;
const CONTROL_CHANGE: u8 = 0xB0;
const ALL_NOTES_OFF: u8 = 123;

const CLIENT_NAME: &str = "oracle-temple";

/// Nearest MIDI note number for a frequency (A4 = 440 Hz = 69).
pub fn frequency_to_note(frequency_hz: f64) -> u8 {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return 0;
    }
    let n = 69.0 + 12.0 * (frequency_hz / 440.0).log2();
    n.round().clamp(0.0, 127.0) as u8
}

/// Map a linear gain (0..=1) to a MIDI velocity. The square root keeps quiet
/// ambient tones audible.
pub fn gain_to_velocity(gain: f64) -> u8 {
    let g = if gain.is_finite() { gain.clamp(0.0, 1.0) } else { 0.0 };
    ((g.sqrt() * 127.0).round() as u8).max(1)
}

/// Names of the available MIDI output ports, in index order.
pub fn list_ports() -> Result<Vec<String>, PlatformError> {
    let out = MidiOutput::new(CLIENT_NAME).map_err(|e| PlatformError::Unavailable(e.to_string()))?;
    Ok(out
        .ports()
        .iter()
        .map(|p| out.port_name(p).unwrap_or_else(|_| "Unknown".to_string()))
        .collect())
}

/// Opens a connection to the MIDI output port at `port_index`.
pub struct MidiHost {
    port_index: usize,
    timeline: Timeline,
}

impl MidiHost {
    pub fn new(port_index: usize, timeline: Timeline) -> Self {
        Self { port_index, timeline }
    }
}

impl AudioHost for MidiHost {
    fn open(&self) -> Result<Box<dyn AudioContext>, PlatformError> {
        let out = MidiOutput::new(CLIENT_NAME).map_err(|e| PlatformError::Unavailable(e.to_string()))?;
        let ports = out.ports();
        let Some(port) = ports.get(self.port_index) else {
            return Err(PlatformError::Unavailable(format!(
                "MIDI port {} out of range ({} available)",
                self.port_index,
                ports.len()
            )));
        };
        let name = out.port_name(port).unwrap_or_else(|_| "Unknown".to_string());
        let conn = out
            .connect(port, "oracle-temple-out")
            .map_err(|e| PlatformError::Backend(e.to_string()))?;
        tracing::info!(port = %name, "connected MIDI output");

        Ok(Box::new(MidiContext {
            out: Rc::new(RefCell::new(MidiOut {
                conn: Some(conn),
                held: HashMap::new(),
            })),
            timeline: self.timeline.clone(),
        }))
    }
}

struct MidiOut {
    conn: Option<MidiOutputConnection>,
    /// Tones currently holding each note.
    held: HashMap<u8, u32>,
}

impl MidiOut {
    fn send(&mut self, msg: &[u8]) -> Result<(), PlatformError> {
        let conn = self.conn.as_mut().ok_or(PlatformError::Closed)?;
        conn.send(msg).map_err(|e| PlatformError::Backend(e.to_string()))
    }

    fn press(&mut self, note: u8, velocity: u8) -> Result<(), PlatformError> {
        self.send(&[NOTE_ON, note, velocity])?;
        *self.held.entry(note).or_insert(0) += 1;
        Ok(())
    }

    fn release(&mut self, note: u8) -> Result<(), PlatformError> {
        let remaining = match self.held.get_mut(&note) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        };
        if remaining == 0 {
            self.held.remove(&note);
            self.send(&[NOTE_OFF, note, 0])?;
        }
        Ok(())
    }
}

struct MidiContext {
    out: Rc<RefCell<MidiOut>>,
    timeline: Timeline,
}

impl AudioContext for MidiContext {
    fn start_tone(&mut self, spec: &ToneSpec) -> Result<Box<dyn ToneHandle>, PlatformError> {
        let note = frequency_to_note(spec.frequency_hz);
        let velocity = gain_to_velocity(spec.envelope.peak());
        self.out.borrow_mut().press(note, velocity)?;
        tracing::trace!(note, velocity, "MIDI note on");

        let active = Rc::new(Cell::new(true));
        if let Some(len) = spec.length_ms {
            let out = self.out.clone();
            let active = active.clone();
            let tl = self.timeline.clone();
            self.timeline.spawn(async move {
                tl.sleep_ms(len as f64).await;
                if active.replace(false) {
                    if let Err(e) = out.borrow_mut().release(note) {
                        tracing::debug!(note, error = %e, "scheduled note off failed");
                    }
                }
            });
        }

        Ok(Box::new(MidiTone {
            note,
            active,
            out: self.out.clone(),
        }))
    }

    fn close(&mut self) -> Result<(), PlatformError> {
        let mut out = self.out.borrow_mut();
        out.send(&[CONTROL_CHANGE, ALL_NOTES_OFF, 0])?;
        out.held.clear();
        if let Some(conn) = out.conn.take() {
            conn.close();
        }
        Ok(())
    }
}

struct MidiTone {
    note: u8,
    active: Rc<Cell<bool>>,
    out: Rc<RefCell<MidiOut>>,
}

impl ToneHandle for MidiTone {
    fn stop(&mut self) -> Result<(), PlatformError> {
        if !self.active.replace(false) {
            return Err(PlatformError::AlreadyStopped);
        }
        self.out.borrow_mut().release(self.note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temple_frequencies_map_to_notes() {
        assert_eq!(frequency_to_note(440.0), 69);
        assert_eq!(frequency_to_note(432.0), 69);
        assert_eq!(frequency_to_note(528.0), 72);
        assert_eq!(frequency_to_note(396.0), 67);
        assert_eq!(frequency_to_note(639.0), 75);
        assert_eq!(frequency_to_note(-1.0), 0);
        assert_eq!(frequency_to_note(1e9), 127);
    }

    #[test]
    fn velocity_never_zero() {
        assert_eq!(gain_to_velocity(0.0), 1);
        assert_eq!(gain_to_velocity(1.0), 127);
        assert_eq!(gain_to_velocity(0.3), 70);
        assert_eq!(gain_to_velocity(f64::NAN), 1);
    }
}
