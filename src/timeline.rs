//! Timeline
//!
//! The handle user code schedules against: read the logical clock, sleep
//! until an offset, and spawn independent tasks on the engine's executor.

use crate::executor::{Executor, TaskId};
use crate::scheduler::{TimerScheduler, WaitState};
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// Cloneable handle onto an engine's clock and executor.
#[derive(Clone)]
pub struct Timeline {
    scheduler: Rc<RefCell<TimerScheduler>>,
    executor: Rc<Executor>,
}

impl Timeline {
    pub fn new(scheduler: Rc<RefCell<TimerScheduler>>, executor: Rc<Executor>) -> Self {
        Self { scheduler, executor }
    }

    /// Current logical time in milliseconds.
    pub fn now_ms(&self) -> f64 {
        self.scheduler.borrow().now_ms()
    }

    /// Sleep for `ms` milliseconds from now. Negative or non-finite delays
    /// sleep for zero.
    pub fn sleep_ms(&self, ms: f64) -> Sleep {
        let d = if ms.is_finite() && ms > 0.0 { ms } else { 0.0 };
        self.sleep_until_ms(self.now_ms() + d)
    }

    /// Sleep until the absolute logical time `target_ms`.
    ///
    /// Timers registered against the same target fire in the same timeslice,
    /// in the order their futures were first polled.
    pub fn sleep_until_ms(&self, target_ms: f64) -> Sleep {
        Sleep {
            scheduler: self.scheduler.clone(),
            target_ms,
            state: WaitState::new(),
            timer: None,
        }
    }

    /// Run a future as an independent task.
    pub fn spawn(&self, fut: impl Future<Output = ()> + 'static) -> TaskId {
        self.executor.spawn(fut)
    }
}

/// Future returned by [`Timeline::sleep_ms`] and [`Timeline::sleep_until_ms`].
pub struct Sleep {
    scheduler: Rc<RefCell<TimerScheduler>>,
    target_ms: f64,
    state: WaitState,
    timer: Option<u64>,
}

impl Sleep {
    pub fn target_ms(&self) -> f64 {
        self.target_ms
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();

        if this.state.is_done() {
            return Poll::Ready(());
        }
        this.state.set_waker(cx.waker());

        if this.timer.is_none() {
            let id = this
                .scheduler
                .borrow_mut()
                .add_timer(this.target_ms, this.state.clone());
            this.timer = Some(id);
        }
        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if self.state.is_done() {
            return;
        }
        if let Some(id) = self.timer {
            if let Ok(mut sched) = self.scheduler.try_borrow_mut() {
                sched.cancel_timer(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ClockMode;

    fn offline() -> (Rc<RefCell<TimerScheduler>>, Rc<Executor>, Timeline) {
        let sched = Rc::new(RefCell::new(TimerScheduler::new(ClockMode::Offline)));
        let exec = Rc::new(Executor::new());
        let tl = Timeline::new(sched.clone(), exec.clone());
        (sched, exec, tl)
    }

    #[test]
    fn sleep_registers_on_first_poll() {
        let (sched, exec, tl) = offline();
        let t = tl.clone();
        tl.spawn(async move {
            t.sleep_ms(250.0).await;
        });

        assert!(!sched.borrow().has_pending_timers());
        exec.run_until_stalled();
        assert_eq!(sched.borrow_mut().peek_next_deadline(), Some(250.0));
    }

    #[test]
    fn invalid_delays_clamp_to_now() {
        let (sched, _exec, tl) = offline();
        sched.borrow_mut().offline_now = 40.0;
        assert_eq!(tl.sleep_ms(-5.0).target_ms(), 40.0);
        assert_eq!(tl.sleep_ms(f64::NAN).target_ms(), 40.0);
        assert_eq!(tl.sleep_ms(f64::INFINITY).target_ms(), 40.0);
        assert_eq!(tl.sleep_ms(10.0).target_ms(), 50.0);
    }

    #[test]
    fn dropped_sleep_releases_its_timer() {
        let (sched, exec, tl) = offline();
        let t = tl.clone();
        let parked = Rc::new(RefCell::new(None));
        let p = parked.clone();
        tl.spawn(async move {
            let mut sleep = Box::pin(t.sleep_ms(100.0));
            std::future::poll_fn(|cx| {
                let _ = sleep.as_mut().poll(cx);
                Poll::Ready(())
            })
            .await;
            *p.borrow_mut() = Some(sleep);
        });
        exec.run_until_stalled();
        assert_eq!(sched.borrow().pending_timers(), 1);

        parked.borrow_mut().take();
        assert_eq!(sched.borrow().pending_timers(), 0);
    }
}
