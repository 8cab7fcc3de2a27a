//! # scribe-batch
//!
//! Runs a list of transcription tasks with bounded concurrency.
//!
//! ```text
//! input lines ──parse_tasks──▶ Vec<Task>
//!                                 │
//!                       BatchRunner (k slots)
//!                      ┌──────────┼──────────┐
//!                   worker     worker     worker   TaskRunner::run
//!                      └──────────┼──────────┘
//!                           mpsc channel
//!                                 │
//!                          writer ──▶ ResultSink
//! ```
//!
//! Every task yields exactly one record, success or failure, so a finished
//! batch can be reconciled against its input by key.

#![deny(unsafe_code)]

pub mod metrics;
pub mod result;
pub mod runner;
pub mod runners;
pub mod sink;
pub mod task;

pub use result::{BatchResult, TaskFailure};
pub use runner::{BatchError, BatchRunner, BatchSummary, TaskRunner};
pub use runners::{OfflineRunner, StreamingRunner, runner_for};
pub use sink::{ResultSink, TsvSink};
pub use task::{ParsedTasks, Task, TaskInputError, parse_task_line, parse_tasks};
