//! Next-tick scheduling.
//!
//! The controller never runs reconciliation inside the call that reported an
//! external change. It defers work through a [`Scheduler`] instead, so several
//! changes reported on the same tick collapse into one pass.

use std::cell::RefCell;
use std::collections::VecDeque;
use tracing::warn;

pub type Task = Box<dyn FnOnce()>;

/// Runs a task on a later tick of the same single-threaded event loop.
pub trait Scheduler {
    fn defer(&self, task: Task);
}

/// Explicit tick queue. Tasks deferred while a tick runs land on the next tick.
#[derive(Default)]
pub struct TickQueue {
    tasks: RefCell<VecDeque<Task>>,
}

impl TickQueue {
    /// Upper bound for [`TickQueue::run_until_idle`].
    pub const MAX_TICKS: usize = 1000;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_idle(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Run every task queued before this call. Returns how many ran.
    pub fn run_tick(&self) -> usize {
        let batch: Vec<Task> = self.tasks.borrow_mut().drain(..).collect();
        let count = batch.len();
        for task in batch {
            task();
        }
        count
    }

    /// Run ticks until the queue is empty. Returns the number of ticks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ticks = 0;
        while !self.is_idle() {
            if ticks == Self::MAX_TICKS {
                warn!("Tick queue still busy after {} ticks", ticks);
                break;
            }
            self.run_tick();
            ticks += 1;
        }
        ticks
    }
}

impl Scheduler for TickQueue {
    fn defer(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }
}

/// Defers onto the current `tokio::task::LocalSet`.
///
/// Must be used from inside a `LocalSet`; `spawn_local` panics otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalTaskScheduler;

impl Scheduler for LocalTaskScheduler {
    fn defer(&self, task: Task) {
        tokio::task::spawn_local(async move {
            tokio::task::yield_now().await;
            task();
        });
    }
}
