//! Per-session serialized task queue.
//!
//! Every mutation of a session runs as a [`Job`] on that session's worker
//! task, in submission order. A job may return [`Step::AwaitThen`] to wait
//! on completion signals (e.g. children finishing their teardown) before its
//! continuation runs; the queue stays blocked meanwhile, so nothing submitted
//! later can interleave.
//!
//! ```text
//!  callers ──post──► [ job | job | job ] ──► worker ──► &mut owner
//!                                               │
//!                                               └──► owner.after_job()
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::error::{SessionError, SessionResult};

/// Unit of work run against the queue owner.
pub type Job<T> = Box<dyn FnOnce(&mut T) -> Step<T> + Send>;

/// What the worker does after a job returns.
pub enum Step<T> {
    Done,
    /// Wait for every receiver to resolve (or its sender to drop), then run
    /// `then` before taking the next job.
    AwaitThen {
        waits: Vec<oneshot::Receiver<()>>,
        then: Job<T>,
    },
}

impl<T> std::fmt::Debug for Step<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Done => f.write_str("Done"),
            Self::AwaitThen { waits, .. } => f
                .debug_struct("AwaitThen")
                .field("waits", &waits.len())
                .finish_non_exhaustive(),
        }
    }
}

/// Hook the worker calls after every job (including continuations).
pub trait QueueOwner: Send + 'static {
    fn after_job(&mut self);

    fn on_queue_closed(&mut self) {}
}

/// Sending half of a session queue.
pub struct TaskQueue<T> {
    tx: mpsc::UnboundedSender<Job<T>>,
    pending: Arc<AtomicUsize>,
}

impl<T> Clone for TaskQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<T> std::fmt::Debug for TaskQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.pending.load(Ordering::Acquire))
            .finish()
    }
}

impl<T: QueueOwner> TaskQueue<T> {
    /// Create a queue whose worker is spawned later by [`QueueWorker::spawn`].
    pub fn new() -> (Self, QueueWorker<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        (
            Self {
                tx,
                pending: Arc::clone(&pending),
            },
            QueueWorker { rx, pending },
        )
    }

    /// Enqueue `job`. Fails only when the worker is gone.
    pub fn post(&self, job: Job<T>) -> SessionResult<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(job).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(SessionError::DestroyedObject);
        }
        Ok(())
    }

    /// Enqueue `f` and wait for its result.
    pub async fn call<R, F>(&self, f: F) -> SessionResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut T) -> SessionResult<R> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.post(Box::new(move |owner: &mut T| {
            let result = f(owner);
            owner.after_job();
            let _ = reply_tx.send(result);
            Step::Done
        }))?;
        reply_rx.await.map_err(|_| SessionError::DestroyedObject)?
    }

    /// Post `f` and hand back a receiver that resolves once it has run.
    pub fn post_with_signal<F>(&self, f: F) -> SessionResult<oneshot::Receiver<()>>
    where
        F: FnOnce(&mut T) -> Step<T> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        self.post(Box::new(move |owner: &mut T| chain_signal(f(owner), done_tx)))?;
        Ok(done_rx)
    }

    /// Jobs submitted but not yet taken by the worker.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Wait until every job queued so far, and every follow-up those jobs
    /// queued, has run.
    pub async fn flush(&self) -> SessionResult<()> {
        loop {
            self.call(|_| Ok(())).await?;
            if self.pending() == 0 {
                return Ok(());
            }
        }
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakTaskQueue<T> {
        WeakTaskQueue {
            tx: self.tx.downgrade(),
            pending: Arc::clone(&self.pending),
        }
    }
}

/// Fire `done` once `step`, including any continuation, has finished.
fn chain_signal<T: 'static>(step: Step<T>, done: oneshot::Sender<()>) -> Step<T> {
    match step {
        Step::Done => {
            let _ = done.send(());
            Step::Done
        }
        Step::AwaitThen { waits, then } => Step::AwaitThen {
            waits,
            then: Box::new(move |owner: &mut T| chain_signal(then(owner), done)),
        },
    }
}

/// Non-owning sender; lets a queue owner post follow-up jobs to itself
/// without keeping its own worker alive.
pub struct WeakTaskQueue<T> {
    tx: mpsc::WeakUnboundedSender<Job<T>>,
    pending: Arc<AtomicUsize>,
}

impl<T> Clone for WeakTaskQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<T: QueueOwner> WeakTaskQueue<T> {
    #[must_use]
    pub fn upgrade(&self) -> Option<TaskQueue<T>> {
        self.tx.upgrade().map(|tx| TaskQueue {
            tx,
            pending: Arc::clone(&self.pending),
        })
    }

    pub fn post(&self, job: Job<T>) -> SessionResult<()> {
        self.upgrade()
            .ok_or(SessionError::DestroyedObject)?
            .post(job)
    }
}

/// Receiving half; owns nothing until spawned.
pub struct QueueWorker<T> {
    rx: mpsc::UnboundedReceiver<Job<T>>,
    pending: Arc<AtomicUsize>,
}

impl<T: QueueOwner> QueueWorker<T> {
    /// Spawn the worker loop onto the current tokio runtime.
    pub fn spawn(self, owner: T) -> JoinHandle<()> {
        tokio::spawn(self.run(owner))
    }

    /// Spawn the worker loop with every job running inside `span`.
    pub fn spawn_in(self, owner: T, span: tracing::Span) -> JoinHandle<()> {
        tokio::spawn(self.run(owner).instrument(span))
    }

    async fn run(mut self, mut owner: T) {
        while let Some(job) = self.rx.recv().await {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            let mut step = job(&mut owner);
            loop {
                match step {
                    Step::Done => break,
                    Step::AwaitThen { waits, then } => {
                        for wait in waits {
                            let _ = wait.await;
                        }
                        step = then(&mut owner);
                    }
                }
            }
            owner.after_job();
        }
        owner.on_queue_closed();
    }
}
