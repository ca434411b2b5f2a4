//! Timer Scheduler
//!
//! Owns the logical clock and the queue of pending timers. Timers that share
//! a deadline fire together in a single timeslice, ordered by the sequence
//! number they were registered with.

use crate::pq::MinPq;
use std::cell::RefCell;
use std::rc::Rc;
use std::task::Waker;
use std::time::Instant;

/// How the logical clock advances.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockMode {
    /// Follows the wall clock, scaled by the scheduler rate.
    Realtime,
    /// Only moves when the engine is stepped.
    Offline,
}

/// Completion flag shared between a sleeping future and its timer entry.
#[derive(Clone, Default)]
pub struct WaitState {
    inner: Rc<RefCell<WaitStateInner>>,
}

#[derive(Default)]
struct WaitStateInner {
    done: bool,
    waker: Option<Waker>,
}

impl WaitState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_waker(&self, w: &Waker) {
        self.inner.borrow_mut().waker = Some(w.clone());
    }

    /// Mark done and wake the parked task. Later calls are ignored.
    pub fn complete(&self) {
        let waker = {
            let mut s = self.inner.borrow_mut();
            if s.done {
                return;
            }
            s.done = true;
            s.waker.take()
        };
        if let Some(w) = waker {
            w.wake();
        }
    }

    pub fn is_done(&self) -> bool {
        self.inner.borrow().done
    }
}

/// The scheduler's clock and timer queue.
pub struct TimerScheduler {
    pub mode: ClockMode,
    seq: u64,

    rate: f64,
    wall_anchor: Instant,
    logical_anchor: f64,

    /// Offline clock, in milliseconds.
    pub offline_now: f64,

    timers: MinPq<WaitState>,
}

impl TimerScheduler {
    pub fn new(mode: ClockMode) -> Self {
        Self {
            mode,
            seq: 0,
            rate: 1.0,
            wall_anchor: Instant::now(),
            logical_anchor: 0.0,
            offline_now: 0.0,
            timers: MinPq::new(),
        }
    }

    /// Allocate the next registration sequence number.
    pub fn alloc_seq(&mut self) -> u64 {
        let s = self.seq;
        self.seq += 1;
        s
    }

    /// Current logical time in milliseconds.
    pub fn now_ms(&self) -> f64 {
        match self.mode {
            ClockMode::Offline => self.offline_now,
            ClockMode::Realtime => {
                let dt = self.wall_anchor.elapsed().as_secs_f64() * 1000.0;
                self.logical_anchor + dt * self.rate
            }
        }
    }

    /// Change the time dilation rate. Ignored offline; non-positive or
    /// non-finite rates reset to 1.
    pub fn set_rate(&mut self, rate: f64) {
        if self.mode == ClockMode::Offline {
            return;
        }
        let r = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
        self.logical_anchor = self.now_ms();
        self.wall_anchor = Instant::now();
        self.rate = r;
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Register a timer. Returns its id, usable with [`cancel_timer`](Self::cancel_timer).
    pub fn add_timer(&mut self, deadline_ms: f64, state: WaitState) -> u64 {
        let seq = self.alloc_seq();
        let deadline = if deadline_ms.is_nan() { 0.0 } else { deadline_ms.max(0.0) };
        self.timers.push(seq, deadline, seq, state);
        tracing::trace!(timer = seq, deadline_ms = deadline, "timer registered");
        seq
    }

    /// Drop a timer without firing it.
    pub fn cancel_timer(&mut self, id: u64) -> bool {
        self.timers.remove(id).is_some()
    }

    pub fn peek_next_deadline(&mut self) -> Option<f64> {
        self.timers.peek_deadline()
    }

    /// Fire every timer due at the earliest deadline. Returns the fired ids
    /// in firing order.
    pub fn fire_next_slice(&mut self) -> Vec<u64> {
        let Some(t) = self.timers.peek_deadline() else {
            return Vec::new();
        };
        let batch = self.timers.pop_all_at(t);
        let mut fired = Vec::with_capacity(batch.len());
        for (id, state) in batch {
            state.complete();
            fired.push(id);
        }
        tracing::trace!(at_ms = t, fired = fired.len(), "timeslice processed");
        fired
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn has_pending_timers(&self) -> bool {
        !self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_clock_starts_at_zero() {
        let sched = TimerScheduler::new(ClockMode::Offline);
        assert_eq!(sched.mode, ClockMode::Offline);
        assert_eq!(sched.now_ms(), 0.0);
    }

    #[test]
    fn rate_is_ignored_offline() {
        let mut sched = TimerScheduler::new(ClockMode::Offline);
        sched.set_rate(50.0);
        assert_eq!(sched.rate(), 1.0);

        let mut rt = TimerScheduler::new(ClockMode::Realtime);
        rt.set_rate(-3.0);
        assert_eq!(rt.rate(), 1.0);
        rt.set_rate(100.0);
        assert_eq!(rt.rate(), 100.0);
    }

    #[test]
    fn same_deadline_fires_in_one_slice() {
        let mut sched = TimerScheduler::new(ClockMode::Offline);
        let a = WaitState::new();
        let b = WaitState::new();
        let c = WaitState::new();

        let ia = sched.add_timer(500.0, a.clone());
        let ib = sched.add_timer(500.0, b.clone());
        sched.add_timer(900.0, c.clone());

        assert_eq!(sched.peek_next_deadline(), Some(500.0));
        assert_eq!(sched.fire_next_slice(), vec![ia, ib]);
        assert!(a.is_done() && b.is_done());
        assert!(!c.is_done());
        assert_eq!(sched.pending_timers(), 1);
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut sched = TimerScheduler::new(ClockMode::Offline);
        let st = WaitState::new();
        let id = sched.add_timer(10.0, st.clone());

        assert!(sched.cancel_timer(id));
        assert!(!sched.cancel_timer(id));
        assert!(sched.fire_next_slice().is_empty());
        assert!(!st.is_done());
        assert!(!sched.has_pending_timers());
    }

    #[test]
    fn negative_and_nan_deadlines_clamp_to_zero() {
        let mut sched = TimerScheduler::new(ClockMode::Offline);
        sched.add_timer(-25.0, WaitState::new());
        sched.add_timer(f64::NAN, WaitState::new());
        assert_eq!(sched.peek_next_deadline(), Some(0.0));
        assert_eq!(sched.fire_next_slice().len(), 2);
    }
}
