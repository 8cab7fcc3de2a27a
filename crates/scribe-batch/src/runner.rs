//! Bounded-concurrency batch runner.
//!
//! A slot (semaphore permit) is acquired *before* a task is spawned, so at
//! most `concurrency` sessions exist at any time and the rest of the input
//! waits unspawned. Workers hand results to a single writer task over a
//! channel; the writer owns the sink and flushes after every record.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use metrics::{counter, gauge, histogram};
use scribe_stream::{ErrorKind, SessionError};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::metrics::{SESSION_DURATION_SECONDS, SESSIONS_ACTIVE, SESSIONS_TOTAL};
use crate::result::BatchResult;
use crate::sink::ResultSink;
use crate::task::{ParsedTasks, Task};

/// Runs one task to a transcript. Implementations must not panic, but a
/// panic is contained to the task that raised it.
#[async_trait]
pub trait TaskRunner: Send + Sync + 'static {
    /// Transcribe `task`. `cancel` fires on batch shutdown.
    async fn run(&self, task: &Task, cancel: CancellationToken) -> Result<String, SessionError>;
}

/// Batch-level failures. Per-task failures never show up here.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The output sink rejected a write.
    #[error("failed to write batch output: {0}")]
    Sink(#[from] std::io::Error),
    /// The writer task died.
    #[error("batch writer failed: {0}")]
    Writer(String),
}

/// Counts for a finished batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Tasks handed to the runner.
    pub total: usize,
    /// Records with a transcript.
    pub succeeded: usize,
    /// Records with an error.
    pub failed: usize,
    /// Input lines that never became tasks.
    pub skipped_lines: usize,
}

/// Fans tasks out over a bounded pool.
pub struct BatchRunner {
    runner: Arc<dyn TaskRunner>,
    concurrency: usize,
}

impl BatchRunner {
    /// Runner with at most `concurrency` sessions in flight (minimum 1).
    pub fn new(runner: Arc<dyn TaskRunner>, concurrency: usize) -> Self {
        Self {
            runner,
            concurrency: concurrency.max(1),
        }
    }

    /// Slot count.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run parsed input, carrying its skipped-line count into the summary.
    pub async fn run_parsed<S>(
        &self,
        parsed: ParsedTasks,
        sink: S,
        cancel: &CancellationToken,
    ) -> Result<(BatchSummary, S), BatchError>
    where
        S: ResultSink + 'static,
    {
        let skipped = parsed.skipped.len();
        let (mut summary, sink) = self.run(parsed.tasks, sink, cancel).await?;
        summary.skipped_lines = skipped;
        Ok((summary, sink))
    }

    /// Run every task and write exactly one record per task, in completion
    /// order. Returns once all records are written.
    ///
    /// After `cancel` fires no further task is started; running sessions see
    /// the same token and wind down, and every task not yet started is
    /// recorded as cancelled.
    #[instrument(skip_all, fields(total = tasks.len(), concurrency = self.concurrency))]
    pub async fn run<S>(
        &self,
        tasks: Vec<Task>,
        sink: S,
        cancel: &CancellationToken,
    ) -> Result<(BatchSummary, S), BatchError>
    where
        S: ResultSink + 'static,
    {
        let total = tasks.len();
        info!("batch started");
        let (tx, rx) = mpsc::channel::<BatchResult>(self.concurrency * 2);
        let writer = tokio::spawn(write_results(rx, sink));

        let slots = Arc::new(Semaphore::new(self.concurrency));
        let mut workers = JoinSet::new();
        let mut pending = tasks.into_iter();

        while let Some(task) = pending.next() {
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                permit = Arc::clone(&slots).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                let undispatched = 1 + pending.len();
                warn!(undispatched, "batch cancelled, recording remaining tasks as cancelled");
                for task in std::iter::once(task).chain(pending.by_ref()) {
                    let result = BatchResult::from_error(task.key, &SessionError::Cancelled);
                    if tx.send(result).await.is_err() {
                        break;
                    }
                }
                break;
            };

            let runner = Arc::clone(&self.runner);
            let results = tx.clone();
            let token = cancel.clone();
            let _ = workers.spawn(async move {
                let _permit = permit;
                let result = run_one(runner.as_ref(), &task, token).await;
                // A closed channel means the writer already failed; it reports that.
                let _ = results.send(result).await;
            });

            while let Some(joined) = workers.try_join_next() {
                log_join(joined);
            }
        }
        drop(tx);

        while let Some(joined) = workers.join_next().await {
            log_join(joined);
        }

        let (sink, tally, write_result) = writer.await.map_err(|e| BatchError::Writer(e.to_string()))?;
        write_result?;

        let summary = BatchSummary {
            total,
            succeeded: tally.succeeded,
            failed: tally.failed,
            skipped_lines: 0,
        };
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "batch finished"
        );
        Ok((summary, sink))
    }
}

/// Run one task with metrics, turning errors and panics into a record.
async fn run_one(runner: &dyn TaskRunner, task: &Task, cancel: CancellationToken) -> BatchResult {
    gauge!(SESSIONS_ACTIVE).increment(1.0);
    let started = Instant::now();
    debug!(key = %task.key, audio = %task.audio, "task started");

    let outcome = AssertUnwindSafe(runner.run(task, cancel)).catch_unwind().await;

    gauge!(SESSIONS_ACTIVE).decrement(1.0);
    let result = match outcome {
        Ok(Ok(text)) => BatchResult::success(task.key.clone(), text),
        Ok(Err(e)) => BatchResult::from_error(task.key.clone(), &e),
        Err(panic) => {
            let detail = panic_message(panic.as_ref());
            error!(key = %task.key, %detail, "task panicked");
            BatchResult::failure(task.key.clone(), ErrorKind::Internal, format!("worker panicked: {detail}"))
        }
    };

    let outcome = result.error.as_ref().map_or("success", |f| f.kind.as_str());
    counter!(SESSIONS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(SESSION_DURATION_SECONDS, "outcome" => outcome).record(started.elapsed().as_secs_f64());
    result
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "batch worker aborted");
    }
}

#[derive(Default)]
struct Tally {
    succeeded: usize,
    failed: usize,
}

/// Single writer: drains the channel into the sink.
///
/// After a write error the channel is still drained so workers never block,
/// and the first error is returned.
async fn write_results<S>(
    mut rx: mpsc::Receiver<BatchResult>,
    mut sink: S,
) -> (S, Tally, std::io::Result<()>)
where
    S: ResultSink,
{
    let mut tally = Tally::default();
    let mut failure: Option<std::io::Error> = None;
    while let Some(result) = rx.recv().await {
        if result.is_success() {
            tally.succeeded += 1;
        } else {
            tally.failed += 1;
        }
        if failure.is_some() {
            continue;
        }
        match sink.write(&result).await {
            Ok(()) => debug!(key = %result.key, success = result.is_success(), "result written"),
            Err(e) => {
                error!(error = %e, key = %result.key, "output write failed");
                failure = Some(e);
            }
        }
    }
    (sink, tally, failure.map_or(Ok(()), Err))
}
