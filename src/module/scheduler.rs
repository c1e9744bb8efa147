//! Scheduler implementations
//!
//! - [`TokioScheduler`]: background work on tokio's blocking pool, primary
//!   work queued to a single [`PrimaryLoop`] consumer that runs it in order.
//! - [`InlineScheduler`]: background work runs on the calling thread and
//!   primary work waits for an explicit [`InlineScheduler::drain_primary`].
//!   Deterministic, for tests and single-threaded hosts.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::module::traits::{Scheduler, Task};

/// Scheduler backed by a tokio runtime
pub struct TokioScheduler {
    handle: Handle,
    primary_tx: mpsc::UnboundedSender<Task>,
}

/// Consumer side of the primary context
///
/// Exactly one exists per [`TokioScheduler`]; whoever drives it *is* the
/// primary context.
pub struct PrimaryLoop {
    primary_rx: mpsc::UnboundedReceiver<Task>,
}

impl TokioScheduler {
    /// Create a scheduler spawning background work onto `handle`
    pub fn new(handle: Handle) -> (Self, PrimaryLoop) {
        let (primary_tx, primary_rx) = mpsc::unbounded_channel();
        (Self { handle, primary_tx }, PrimaryLoop { primary_rx })
    }

    /// Create a scheduler on the current runtime
    ///
    /// Panics outside a tokio runtime, like [`Handle::current`].
    pub fn current() -> (Self, PrimaryLoop) {
        Self::new(Handle::current())
    }
}

impl Scheduler for TokioScheduler {
    fn post_primary(&self, task: Task) {
        if self.primary_tx.send(task).is_err() {
            warn!("Primary loop is gone, dropping task");
        }
    }

    fn post_background(&self, name: &str, task: Task) {
        let name = name.to_string();
        self.handle.spawn_blocking(move || {
            debug!(task = %name, "Running background task");
            task();
        });
    }
}

impl PrimaryLoop {
    /// Run tasks in order until every scheduler handle is dropped
    pub async fn run(mut self) {
        while let Some(task) = self.primary_rx.recv().await {
            task();
        }
        debug!("Primary loop finished");
    }

    /// Blocking variant of [`PrimaryLoop::run`] for a dedicated thread
    ///
    /// Must not be called from within an async context.
    pub fn run_blocking(mut self) {
        while let Some(task) = self.primary_rx.blocking_recv() {
            task();
        }
        debug!("Primary loop finished");
    }

    /// Run every task queued right now; returns how many ran
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.primary_rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }
}

/// Deterministic scheduler
#[derive(Default)]
pub struct InlineScheduler {
    primary: Mutex<VecDeque<Task>>,
    background_runs: AtomicUsize,
}

impl InlineScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run queued primary tasks in order, including ones they enqueue
    pub fn drain_primary(&self) -> usize {
        let mut ran = 0;
        loop {
            // Lock released before running so tasks can enqueue more work
            let next = self.primary.lock().pop_front();
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    pub fn pending_primary(&self) -> usize {
        self.primary.lock().len()
    }

    /// Number of background tasks run so far
    pub fn background_runs(&self) -> usize {
        self.background_runs.load(Ordering::SeqCst)
    }
}

impl Scheduler for InlineScheduler {
    fn post_primary(&self, task: Task) {
        self.primary.lock().push_back(task);
    }

    fn post_background(&self, name: &str, task: Task) {
        debug!(task = %name, "Running background task inline");
        self.background_runs.fetch_add(1, Ordering::SeqCst);
        task();
    }
}
