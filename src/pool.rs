//! Worker pool: a fixed set of workers draining a shared URL backlog.
//!
//! Each worker loops:
//! 1. Pops the next job from the [`Backlog`] (short lock, never held across a fetch)
//! 2. Runs the [`FetchUnit`] on it, catching panics
//! 3. Sends the [`FetchResult`] into the run's [`ResultSink`]
//!
//! The pool returns only after every worker has exited, so once
//! [`WorkerPool::run`] completes without cancellation every submitted URL has
//! produced exactly one result.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::fetch::FetchUnit;
use crate::types::{ErrorKind, FetchResult};

/// One URL waiting to be fetched
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    /// Position in the input list
    pub index: usize,
    /// URL to fetch
    pub url: String,
}

/// Shared FIFO of URLs not yet handed to a worker
pub struct Backlog {
    queue: Mutex<VecDeque<Job>>,
}

impl Backlog {
    /// Create a backlog holding `urls` in input order
    pub fn new(urls: Vec<String>) -> Self {
        let queue = urls
            .into_iter()
            .enumerate()
            .map(|(index, url)| Job { index, url })
            .collect();
        Self {
            queue: Mutex::new(queue),
        }
    }

    /// Take the next job; each job is handed out exactly once
    pub async fn pop(&self) -> Option<Job> {
        self.queue.lock().await.pop_front()
    }

    /// Number of jobs not yet taken
    pub async fn remaining(&self) -> usize {
        self.queue.lock().await.len()
    }
}

/// Sending side of the per-run result channel
#[derive(Clone, Debug)]
pub struct ResultSink {
    tx: mpsc::Sender<FetchResult>,
}

impl ResultSink {
    /// Deliver a result. Returns false if the receiving side is gone.
    pub async fn send(&self, result: FetchResult) -> bool {
        self.tx.send(result).await.is_ok()
    }
}

/// Create a bounded result channel for one run
pub fn result_channel(capacity: usize) -> (ResultSink, mpsc::Receiver<FetchResult>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ResultSink { tx }, rx)
}

/// Summary of one pool run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Workers actually started (after clamping)
    pub workers: usize,
    /// URLs submitted to the backlog
    pub submitted: usize,
    /// Results delivered to the sink
    pub completed: usize,
    /// Whether the run was cancelled
    pub cancelled: bool,
}

impl PoolReport {
    /// Every submitted URL produced a result
    pub fn drained(&self) -> bool {
        self.completed == self.submitted
    }
}

/// Fixed-size pool of fetch workers
pub struct WorkerPool {
    unit: Arc<FetchUnit>,
    max_workers: usize,
}

impl WorkerPool {
    /// Create a pool allowing at most `max_workers` concurrent fetches
    pub fn new(unit: Arc<FetchUnit>, max_workers: usize) -> Self {
        Self {
            unit,
            max_workers: max_workers.max(1),
        }
    }

    /// Workers used for `url_count` URLs: never more than there are URLs
    pub fn worker_count(&self, url_count: usize) -> usize {
        self.max_workers.min(url_count)
    }

    /// Fetch every URL, sending one result per URL into `sink`
    ///
    /// The sink is consumed; the receiver sees end-of-stream once the last
    /// worker exits. Cancelling `cancel` stops workers from taking new URLs
    /// and abandons fetches in flight.
    pub async fn run(
        &self,
        urls: Vec<String>,
        sink: ResultSink,
        cancel: CancellationToken,
    ) -> PoolReport {
        let submitted = urls.len();
        let workers = self.worker_count(submitted);
        let backlog = Arc::new(Backlog::new(urls));
        let completed = Arc::new(AtomicUsize::new(0));

        tracing::debug!(workers, submitted, "Starting worker pool");

        let mut tasks = JoinSet::new();
        for worker_id in 0..workers {
            tasks.spawn(run_worker(WorkerParams {
                worker_id,
                backlog: Arc::clone(&backlog),
                unit: Arc::clone(&self.unit),
                sink: sink.clone(),
                cancel: cancel.clone(),
                completed: Arc::clone(&completed),
            }));
        }
        drop(sink);

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Worker task terminated abnormally");
            }
        }

        let report = PoolReport {
            workers,
            submitted,
            completed: completed.load(Ordering::SeqCst),
            cancelled: cancel.is_cancelled(),
        };

        if report.cancelled {
            tracing::warn!(
                completed = report.completed,
                submitted,
                remaining = backlog.remaining().await,
                "Worker pool cancelled"
            );
        } else {
            tracing::debug!(
                completed = report.completed,
                submitted,
                "Worker pool drained"
            );
        }

        report
    }
}

/// Everything one worker needs
struct WorkerParams {
    worker_id: usize,
    backlog: Arc<Backlog>,
    unit: Arc<FetchUnit>,
    sink: ResultSink,
    cancel: CancellationToken,
    completed: Arc<AtomicUsize>,
}

async fn run_worker(params: WorkerParams) {
    let WorkerParams {
        worker_id,
        backlog,
        unit,
        sink,
        cancel,
        completed,
    } = params;

    loop {
        if cancel.is_cancelled() {
            break;
        }
        let Some(job) = backlog.pop().await else {
            break;
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(worker_id, url = %job.url, "Abandoning in-flight fetch");
                break;
            }
            result = fetch_isolated(&unit, &job) => result,
        };

        if !sink.send(result).await {
            tracing::warn!(worker_id, "Result receiver dropped, worker stopping");
            break;
        }
        completed.fetch_add(1, Ordering::SeqCst);
    }

    tracing::trace!(worker_id, "Worker exiting");
}

/// Run the fetch unit, turning a panic into a failure result for this job
async fn fetch_isolated(unit: &FetchUnit, job: &Job) -> FetchResult {
    match AssertUnwindSafe(unit.fetch(job.index, &job.url))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(url = %job.url, panic = %message, "Fetch panicked");
            FetchResult::failure(
                job.url.clone(),
                job.index,
                ErrorKind::Other,
                format!("worker panicked: {}", message),
            )
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
