//! Task scheduling for debounced methods
//!
//! The core never spins an event loop of its own. Deferred work is handed
//! to the thread's current [`Scheduler`], which the embedding application
//! installs with [`set_scheduler`]. Without one, a [`LocalScheduler`] is
//! created on first use; it only runs work when driven explicitly:
//!
//! - [`LocalScheduler::run_microtasks`] drains the microtask queue
//! - [`LocalScheduler::run_frame`] runs one animation frame
//! - [`LocalScheduler::advance`] moves the clock and fires due timeouts

use slotmap::{new_key_type, SlotMap};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::config::OrnateConfig;

/// Unit of deferred work
pub type Job = Box<dyn FnOnce()>;

new_key_type! {
    /// Handle to a pending timeout
    pub struct TimerId;
}

/// Source of deferred execution
pub trait Scheduler {
    /// Run `job` once the current synchronous work completes
    fn queue_microtask(&self, job: Job);

    /// Run `job` before the next frame is produced
    fn request_animation_frame(&self, job: Job);

    /// Run `job` after `delay`
    fn set_timeout(&self, delay: Duration, job: Job) -> TimerId;

    /// Cancel a pending timeout; returns false if it already ran
    fn clear_timeout(&self, id: TimerId) -> bool;
}

// ============================================================================
// Thread Scheduler State
// ============================================================================

thread_local! {
    static CURRENT: RefCell<Option<Rc<dyn Scheduler>>> = const { RefCell::new(None) };
}

/// Install the scheduler used by this thread
pub fn set_scheduler(scheduler: Rc<dyn Scheduler>) {
    CURRENT.with(|current| *current.borrow_mut() = Some(scheduler));
}

/// The scheduler of this thread, creating a [`LocalScheduler`] if none was set
pub fn scheduler() -> Rc<dyn Scheduler> {
    CURRENT.with(|current| {
        current
            .borrow_mut()
            .get_or_insert_with(|| {
                tracing::debug!("no scheduler installed, using a local scheduler");
                Rc::new(LocalScheduler::new())
            })
            .clone()
    })
}

// ============================================================================
// Local Scheduler
// ============================================================================

struct Timer {
    due: Duration,
    seq: u64,
    job: Job,
}

/// Deterministic single-threaded scheduler driven by hand
pub struct LocalScheduler {
    microtasks: RefCell<VecDeque<Job>>,
    frame_callbacks: RefCell<Vec<Job>>,
    timers: RefCell<SlotMap<TimerId, Timer>>,
    now: Cell<Duration>,
    next_seq: Cell<u64>,
    frame_interval: Duration,
}

impl Default for LocalScheduler {
    fn default() -> Self {
        Self::with_config(&OrnateConfig::default())
    }
}

impl LocalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &OrnateConfig) -> Self {
        Self {
            microtasks: RefCell::new(VecDeque::new()),
            frame_callbacks: RefCell::new(Vec::new()),
            timers: RefCell::new(SlotMap::with_key()),
            now: Cell::new(Duration::ZERO),
            next_seq: Cell::new(0),
            frame_interval: config.scheduler.frame_interval(),
        }
    }

    /// Simulated time since the scheduler was created
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Run microtasks until the queue is empty, including ones queued while
    /// draining; returns how many ran
    pub fn run_microtasks(&self) -> usize {
        let mut ran = 0;
        loop {
            let job = self.microtasks.borrow_mut().pop_front();
            match job {
                Some(job) => {
                    job();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Run the frame callbacks requested so far, then move the clock by one
    /// frame interval
    ///
    /// Callbacks requested during the frame wait for the next one.
    pub fn run_frame(&self) -> usize {
        let callbacks = std::mem::take(&mut *self.frame_callbacks.borrow_mut());
        let ran = callbacks.len();
        for callback in callbacks {
            callback();
            self.run_microtasks();
        }
        self.advance(self.frame_interval);
        ran
    }

    /// Move the clock forward, firing due timeouts in due order; returns how
    /// many fired
    pub fn advance(&self, delta: Duration) -> usize {
        let target = self.now.get() + delta;
        let mut fired = 0;
        self.run_microtasks();

        while let Some(id) = self.next_due(target) {
            let timer = self.timers.borrow_mut().remove(id);
            if let Some(timer) = timer {
                self.now.set(timer.due);
                (timer.job)();
                self.run_microtasks();
                fired += 1;
            }
        }

        self.now.set(target);
        fired
    }

    fn next_due(&self, target: Duration) -> Option<TimerId> {
        self.timers
            .borrow()
            .iter()
            .filter(|(_, timer)| timer.due <= target)
            .min_by_key(|(_, timer)| (timer.due, timer.seq))
            .map(|(id, _)| id)
    }

    pub fn pending_microtasks(&self) -> usize {
        self.microtasks.borrow().len()
    }

    pub fn pending_frame_callbacks(&self) -> usize {
        self.frame_callbacks.borrow().len()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// True when nothing is queued anywhere
    pub fn is_idle(&self) -> bool {
        self.pending_microtasks() == 0
            && self.pending_frame_callbacks() == 0
            && self.pending_timers() == 0
    }
}

impl Scheduler for LocalScheduler {
    fn queue_microtask(&self, job: Job) {
        self.microtasks.borrow_mut().push_back(job);
    }

    fn request_animation_frame(&self, job: Job) {
        self.frame_callbacks.borrow_mut().push(job);
    }

    fn set_timeout(&self, delay: Duration, job: Job) -> TimerId {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.timers.borrow_mut().insert(Timer {
            due: self.now.get() + delay,
            seq,
            job,
        })
    }

    fn clear_timeout(&self, id: TimerId) -> bool {
        self.timers.borrow_mut().remove(id).is_some()
    }
}
