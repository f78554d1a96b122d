//! Serialized execution context.
//!
//! A [`SerialContext`] owns a piece of state on a dedicated task and runs
//! submitted closures against it one at a time, in submission order. Any
//! thread may submit; only the context's task ever touches the state, so
//! the state needs no locking of its own.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

type Job<S> = Box<dyn FnOnce(&mut S, &SerialContext<S>) + Send>;

/// Handle for submitting work to a serialized state owner.
pub struct SerialContext<S> {
    tx: mpsc::UnboundedSender<Job<S>>,
    finished: Arc<AtomicBool>,
}

impl<S> Clone for SerialContext<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            finished: Arc::clone(&self.finished),
        }
    }
}

impl<S: Send + 'static> SerialContext<S> {
    /// Moves `state` onto a new task and returns a handle to it.
    ///
    /// The task exits after the job that calls [`finish`](Self::finish);
    /// the state is dropped there.
    pub fn spawn(state: S) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job<S>>();
        let ctx = Self {
            tx,
            finished: Arc::new(AtomicBool::new(false)),
        };
        let handle = ctx.clone();
        tokio::spawn(async move {
            let mut state = state;
            while let Some(job) = rx.recv().await {
                job(&mut state, &handle);
                if handle.is_finished() {
                    break;
                }
            }
            rx.close();
        });
        ctx
    }

    /// Queues `job` to run against the state.
    ///
    /// Returns false if the context has already finished; the job is
    /// dropped without running.
    pub fn run<F>(&self, job: F) -> bool
    where
        F: FnOnce(&mut S, &SerialContext<S>) + Send + 'static,
    {
        if self.is_finished() {
            return false;
        }
        self.tx.send(Box::new(job)).is_ok()
    }

    /// Marks the context finished. Jobs queued behind the current one are
    /// discarded. Only meaningful from inside a job.
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

impl<S> fmt::Debug for SerialContext<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialContext")
            .field("finished", &self.finished.load(Ordering::Relaxed))
            .finish()
    }
}
