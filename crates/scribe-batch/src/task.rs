//! Batch input: one task per line.
//!
//! A line is either `<key><whitespace><audio>` or a bare `<audio>`, in which
//! case a fresh key is generated. Blank lines are ignored. A line that cannot
//! become a task is skipped and reported, never fatal to the batch.

use scribe_stream::{AudioRef, AudioRefError};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

/// One unit of work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    /// Output key. Unique per batch by convention, not enforced.
    pub key: String,
    /// Audio to transcribe.
    pub audio: AudioRef,
    /// Per-task start message overrides, merged over the run's. `Null` for
    /// tasks parsed from input lines. Offline jobs use the run's job fields
    /// only.
    pub request_params: Value,
}

impl Task {
    /// Task with an explicit key.
    pub fn new(key: impl Into<String>, audio: AudioRef) -> Self {
        Self {
            key: key.into(),
            audio,
            request_params: Value::Null,
        }
    }

    /// Attach per-task start message overrides.
    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.request_params = params;
        self
    }
}

/// Why an input line was skipped.
#[derive(Debug, thiserror::Error)]
pub enum TaskInputError {
    /// Not valid UTF-8.
    #[error("line {line}: not valid UTF-8")]
    Encoding {
        /// 1-based line number.
        line: usize,
    },
    /// The audio reference is unusable.
    #[error("line {line}: {source}")]
    Audio {
        /// 1-based line number.
        line: usize,
        /// Parse failure.
        #[source]
        source: AudioRefError,
    },
}

/// Result of parsing a whole input list.
#[derive(Debug, Default)]
pub struct ParsedTasks {
    /// Tasks in input order.
    pub tasks: Vec<Task>,
    /// Lines that were skipped.
    pub skipped: Vec<TaskInputError>,
}

/// Parse one line. `Ok(None)` for blank lines.
pub fn parse_task_line(line_no: usize, raw: &[u8]) -> Result<Option<Task>, TaskInputError> {
    let text = std::str::from_utf8(raw).map_err(|_| TaskInputError::Encoding { line: line_no })?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let (key, audio) = match text.split_once(char::is_whitespace) {
        Some((key, rest)) => (key.to_owned(), rest.trim_start()),
        None => (Uuid::now_v7().to_string(), text),
    };
    let audio = AudioRef::parse(audio).map_err(|source| TaskInputError::Audio { line: line_no, source })?;
    Ok(Some(Task::new(key, audio)))
}

/// Parse a whole input list, skipping bad lines with a warning.
pub fn parse_tasks(input: &[u8]) -> ParsedTasks {
    let mut parsed = ParsedTasks::default();
    for (idx, raw) in input.split(|b| *b == b'\n').enumerate() {
        match parse_task_line(idx + 1, raw) {
            Ok(Some(task)) => parsed.tasks.push(task),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "skipping batch input line");
                parsed.skipped.push(e);
            }
        }
    }
    parsed
}
