//! The UI-capable execution context.
//!
//! Consent prompts, main-queue materialization and completion callbacks all
//! run here. The queue is a single tokio task that executes submitted jobs
//! strictly one at a time; a job that itself submits work runs that work
//! inline instead of queueing behind itself.
//!
//! [`MainQueue::run`] ships an owned future to the worker.
//! [`MainQueue::run_here`] instead parks the worker and runs borrowed work on
//! the calling task for the duration of its turn.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::{mpsc, oneshot};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

tokio::task_local! {
    static ON_MAIN_QUEUE: ();
}

/// Handle to the main queue. Cheap to clone.
#[derive(Clone, Debug)]
pub struct MainQueue {
    jobs: mpsc::UnboundedSender<Job>,
}

impl MainQueue {
    /// Start the queue worker on the current tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn spawn() -> Self {
        let (jobs, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                // Each job gets its own task so a panicking job does not take
                // the worker down with it.
                let handle = tokio::spawn(ON_MAIN_QUEUE.scope((), job));
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "main queue job failed");
                }
            }
            tracing::debug!("main queue stopped");
        });
        Self { jobs }
    }

    /// Whether the calling task is a main queue job.
    pub fn is_current() -> bool {
        ON_MAIN_QUEUE.try_with(|_| ()).is_ok()
    }

    /// Run `work` on the main queue and wait for its output.
    ///
    /// Runs inline when already on the queue. If the worker is gone the work
    /// runs on the caller's task.
    ///
    /// # Panics
    /// Re-raises a panic from `work`.
    pub async fn run<F, T>(&self, work: F) -> T
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if Self::is_current() {
            return work.await;
        }

        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let _ = tx.send(work.await);
        });

        if let Err(mpsc::error::SendError(job)) = self.jobs.send(job) {
            tracing::warn!("main queue is not running, executing on the calling task");
            ON_MAIN_QUEUE.scope((), job).await;
        }

        match rx.await {
            Ok(output) => output,
            Err(_) => panic!("main queue job panicked"),
        }
    }

    /// Take a turn on the main queue and run `work` on the calling task.
    ///
    /// While `work` runs no other job executes and [`MainQueue::is_current`]
    /// holds, so `work` may borrow from the caller. Runs inline when already
    /// on the queue.
    pub async fn run_here<F>(&self, work: F) -> F::Output
    where
        F: Future,
    {
        if Self::is_current() {
            return work.await;
        }

        let (entered_tx, entered_rx) = oneshot::channel::<()>();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let turn: Job = Box::pin(async move {
            let _ = entered_tx.send(());
            // Resolves on release or when the caller drops its handle.
            let _ = release_rx.await;
        });

        if self.jobs.send(turn).is_err() || entered_rx.await.is_err() {
            tracing::warn!("main queue is not running, executing on the calling task");
        }

        let output = ON_MAIN_QUEUE.scope((), work).await;
        drop(release_tx);
        output
    }
}
