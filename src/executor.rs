//! Single-threaded deterministic executor
//!
//! Tasks are polled from a FIFO ready queue. A task woken several times
//! before it is polled is queued once, and a finished task is never polled
//! again, so polling order only depends on wake order.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    future::Future,
    pin::Pin,
    rc::{Rc, Weak},
    task::{Context, RawWaker, RawWakerVTable, Waker},
};

/// Identifier handed out by [`Executor::spawn`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

struct Task {
    id: TaskId,
    fut: RefCell<Option<Pin<Box<dyn Future<Output = ()>>>>>,
    queued: Cell<bool>,
    finished: Cell<bool>,
    ready_queue: Weak<RefCell<VecDeque<Rc<Task>>>>,
}

impl Task {
    fn schedule(self: &Rc<Self>) {
        // `fut` may be mutably borrowed here when a task wakes itself mid-poll.
        if self.finished.get() || self.queued.replace(true) {
            return;
        }
        if let Some(queue) = self.ready_queue.upgrade() {
            queue.borrow_mut().push_back(self.clone());
        }
    }
}

/// FIFO executor for `!Send` futures.
pub struct Executor {
    ready: Rc<RefCell<VecDeque<Rc<Task>>>>,
    next_id: Cell<u64>,
    live: Cell<usize>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self {
            ready: Rc::new(RefCell::new(VecDeque::new())),
            next_id: Cell::new(0),
            live: Cell::new(0),
        }
    }

    /// Queue a future for polling. It first runs on the next
    /// [`run_until_stalled`](Self::run_until_stalled).
    pub fn spawn(&self, fut: impl Future<Output = ()> + 'static) -> TaskId {
        let id = TaskId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let task = Rc::new(Task {
            id,
            fut: RefCell::new(Some(Box::pin(fut))),
            queued: Cell::new(false),
            finished: Cell::new(false),
            ready_queue: Rc::downgrade(&self.ready),
        });
        self.live.set(self.live.get() + 1);
        task.schedule();
        tracing::trace!(task = id.0, "spawned task");
        id
    }

    /// Poll ready tasks until the queue is empty. Returns the number of polls.
    pub fn run_until_stalled(&self) -> usize {
        let mut polls = 0;
        loop {
            // The borrow must end before polling: wakers push onto this queue.
            let next = self.ready.borrow_mut().pop_front();
            let Some(task) = next else {
                break;
            };
            task.queued.set(false);
            if task.finished.get() {
                continue;
            }

            let waker = task_waker(&task);
            let mut cx = Context::from_waker(&waker);
            let ready = match task.fut.borrow_mut().as_mut() {
                Some(fut) => fut.as_mut().poll(&mut cx).is_ready(),
                None => true,
            };
            polls += 1;

            if ready {
                task.finished.set(true);
                // Dropping the future here releases its timers and captures.
                let done = task.fut.borrow_mut().take();
                drop(done);
                self.live.set(self.live.get().saturating_sub(1));
                tracing::trace!(task = task.id.0, "task finished");
            }
        }
        polls
    }

    pub fn has_ready_tasks(&self) -> bool {
        !self.ready.borrow().is_empty()
    }

    /// Number of spawned tasks that have not finished yet.
    pub fn live_tasks(&self) -> usize {
        self.live.get()
    }
}

fn task_waker(task: &Rc<Task>) -> Waker {
    unsafe fn clone_fn(data: *const ()) -> RawWaker {
        let task = Rc::<Task>::from_raw(data as *const Task);
        let cloned = task.clone();
        std::mem::forget(task);
        RawWaker::new(Rc::into_raw(cloned) as *const (), &VTABLE)
    }

    unsafe fn wake_fn(data: *const ()) {
        let task = Rc::<Task>::from_raw(data as *const Task);
        task.schedule();
    }

    unsafe fn wake_by_ref_fn(data: *const ()) {
        let task = Rc::<Task>::from_raw(data as *const Task);
        task.schedule();
        std::mem::forget(task);
    }

    unsafe fn drop_fn(data: *const ()) {
        drop(Rc::<Task>::from_raw(data as *const Task));
    }

    static VTABLE: RawWakerVTable = RawWakerVTable::new(clone_fn, wake_fn, wake_by_ref_fn, drop_fn);

    // Wakers never leave the executor's thread: every future it runs is !Send
    // and driven from Engine.
    let raw = RawWaker::new(Rc::into_raw(task.clone()) as *const (), &VTABLE);
    unsafe { Waker::from_raw(raw) }
}
