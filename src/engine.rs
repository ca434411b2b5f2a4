//! Engine - realtime and offline execution loops
//!
//! The engine ties together the executor and the timer scheduler.
//! - Realtime: sleeps between deadlines with spin_sleep
//! - Offline: steps virtual time, so tests advance the clock explicitly

use crate::executor::Executor;
use crate::scheduler::TimerScheduler;
use crate::timeline::Timeline;
use spin_sleep::SpinSleeper;
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

pub use crate::scheduler::ClockMode;

/// Upper bound on timeslices per `advance_to` call.
const MAX_TIMESLICES: usize = 200_000;

/// Configuration for launching the engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Logical milliseconds per wall millisecond (realtime only).
    pub rate: f64,
    /// Wall-clock nap while a realtime loop has nothing scheduled.
    pub idle_sleep_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rate: 1.0,
            idle_sleep_ms: 1,
        }
    }
}

/// Drives a [`Timeline`]'s timers and tasks.
pub struct Engine {
    executor: Rc<Executor>,
    scheduler: Rc<RefCell<TimerScheduler>>,
    timeline: Timeline,
    sleeper: SpinSleeper,
    idle_sleep: Duration,
}

impl Engine {
    pub fn new(mode: ClockMode, config: EngineConfig) -> Self {
        let scheduler = Rc::new(RefCell::new(TimerScheduler::new(mode)));
        if mode == ClockMode::Realtime {
            scheduler.borrow_mut().set_rate(config.rate);
        }
        let executor = Rc::new(Executor::new());
        let timeline = Timeline::new(scheduler.clone(), executor.clone());

        Self {
            executor,
            scheduler,
            timeline,
            sleeper: SpinSleeper::default(),
            idle_sleep: Duration::from_millis(config.idle_sleep_ms.max(1)),
        }
    }

    /// Offline engine with default config.
    pub fn offline() -> Self {
        Self::new(ClockMode::Offline, EngineConfig::default())
    }

    pub fn mode(&self) -> ClockMode {
        self.scheduler.borrow().mode
    }

    pub fn timeline(&self) -> Timeline {
        self.timeline.clone()
    }

    pub fn now_ms(&self) -> f64 {
        self.scheduler.borrow().now_ms()
    }

    pub fn spawn(&self, fut: impl Future<Output = ()> + 'static) {
        self.executor.spawn(fut);
    }

    /// True when no task is runnable and no timer is pending.
    pub fn is_idle(&self) -> bool {
        !self.executor.has_ready_tasks() && !self.scheduler.borrow().has_pending_timers()
    }

    /// Run in realtime until `is_done` returns true.
    pub fn run_until<F>(&mut self, is_done: F)
    where
        F: Fn() -> bool,
    {
        loop {
            self.executor.run_until_stalled();
            if is_done() {
                break;
            }

            let next = self.scheduler.borrow_mut().peek_next_deadline();
            let Some(next_t) = next else {
                // Nothing scheduled; the caller's condition may depend on
                // outside state, so nap instead of spinning.
                self.sleeper.sleep(self.idle_sleep);
                continue;
            };

            if !self.wait_for(next_t) {
                continue;
            }
            self.scheduler.borrow_mut().fire_next_slice();
        }
    }

    /// Run in realtime until every task has parked with no timer pending.
    pub fn run_until_idle(&mut self) {
        loop {
            self.executor.run_until_stalled();
            let next = self.scheduler.borrow_mut().peek_next_deadline();
            let Some(next_t) = next else {
                break;
            };
            if self.wait_for(next_t) {
                self.scheduler.borrow_mut().fire_next_slice();
            }
        }
    }

    /// Sleep toward `next_t`. Returns true once it is due.
    fn wait_for(&self, next_t: f64) -> bool {
        let (now, rate) = {
            let sched = self.scheduler.borrow();
            (sched.now_ms(), sched.rate())
        };
        if next_t <= now {
            return true;
        }
        let wall_ms = ((next_t - now) / rate).max(0.0);
        self.sleeper.sleep(Duration::from_secs_f64(wall_ms / 1000.0));
        false
    }

    /// Advance the offline clock to `target_ms`, processing each due
    /// timeslice and draining the executor between them.
    pub fn advance_to(&mut self, target_ms: f64) {
        let target = target_ms.max(self.now_ms());

        // Let freshly spawned tasks register their timers first.
        self.executor.run_until_stalled();

        let mut processed = 0;
        loop {
            let next = self.scheduler.borrow_mut().peek_next_deadline();
            let Some(next_t) = next.filter(|t| *t <= target) else {
                break;
            };

            {
                let mut sched = self.scheduler.borrow_mut();
                sched.offline_now = sched.offline_now.max(next_t);
                sched.fire_next_slice();
            }
            self.executor.run_until_stalled();

            processed += 1;
            if processed > MAX_TIMESLICES {
                panic!("advance_to({target_ms}) exceeded {MAX_TIMESLICES} timeslices; runaway scheduling");
            }
        }

        self.scheduler.borrow_mut().offline_now = target;
        self.executor.run_until_stalled();
    }

    /// Step the offline clock forward by `dt_ms`.
    pub fn step_ms(&mut self, dt_ms: f64) {
        let d = if dt_ms.is_finite() && dt_ms > 0.0 { dt_ms } else { 0.0 };
        let target = self.now_ms() + d;
        self.advance_to(target);
    }

    /// Offline: advance until no timers remain. Returns the final clock.
    pub fn run_offline_to_idle(&mut self) -> f64 {
        loop {
            self.executor.run_until_stalled();
            let next = self.scheduler.borrow_mut().peek_next_deadline();
            match next {
                Some(t) => self.advance_to(t),
                None => break,
            }
        }
        self.now_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn offline_steps_resume_sleepers() {
        let mut engine = Engine::offline();
        let counter = Rc::new(Cell::new(0));
        let c = counter.clone();
        let tl = engine.timeline();

        engine.spawn(async move {
            c.set(c.get() + 1);
            tl.sleep_ms(100.0).await;
            c.set(c.get() + 1);
            tl.sleep_ms(100.0).await;
            c.set(c.get() + 1);
        });

        assert_eq!(counter.get(), 0);

        engine.step_ms(0.0);
        assert_eq!(counter.get(), 1);

        engine.step_ms(99.0);
        assert_eq!(counter.get(), 1);

        engine.step_ms(1.0);
        assert_eq!(counter.get(), 2);

        engine.step_ms(100.0);
        assert_eq!(counter.get(), 3);
        assert!(engine.is_idle());
    }

    #[test]
    fn nested_sleeps_measure_from_slice_time() {
        let mut engine = Engine::offline();
        let stamps = Rc::new(RefCell::new(Vec::new()));
        let s = stamps.clone();
        let tl = engine.timeline();

        engine.spawn(async move {
            tl.sleep_ms(50.0).await;
            s.borrow_mut().push(tl.now_ms());
            tl.sleep_ms(100.0).await;
            s.borrow_mut().push(tl.now_ms());
        });

        // One large step still lands each wake on its own deadline.
        engine.step_ms(1000.0);
        assert_eq!(*stamps.borrow(), vec![50.0, 150.0]);
        assert_eq!(engine.now_ms(), 1000.0);
    }

    #[test]
    fn run_offline_to_idle_stops_at_last_timer() {
        let mut engine = Engine::offline();
        let tl = engine.timeline();
        engine.spawn(async move {
            tl.sleep_ms(300.0).await;
            tl.sleep_ms(200.0).await;
        });
        assert_eq!(engine.run_offline_to_idle(), 500.0);
    }

    #[test]
    fn realtime_run_until_idle_respects_rate() {
        let mut engine = Engine::new(
            ClockMode::Realtime,
            EngineConfig {
                rate: 100.0,
                ..Default::default()
            },
        );
        let hit = Rc::new(Cell::new(false));
        let h = hit.clone();
        let tl = engine.timeline();
        engine.spawn(async move {
            tl.sleep_ms(500.0).await;
            h.set(true);
        });

        let wall = std::time::Instant::now();
        engine.run_until_idle();
        assert!(hit.get());
        // 500 logical ms at 100x is ~5 wall ms.
        assert!(wall.elapsed() < Duration::from_millis(500));
    }
}
