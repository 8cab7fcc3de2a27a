//! Per-task outcome and its output line.
//!
//! Success: `key<TAB>transcript`.
//! Failure: `key<TAB><TAB>error_kind: detail`, so the transcript column is
//! empty and the record still names the task.

use std::fmt;

use scribe_stream::{ErrorKind, SessionError};
use serde::Serialize;

/// Why a task produced no transcript.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TaskFailure {
    /// Classification.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub detail: String,
}

/// Outcome of one task. Exactly one is written per dispatched task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    /// Task key.
    pub key: String,
    /// Transcript on success.
    pub transcript: Option<String>,
    /// Failure otherwise.
    pub error: Option<TaskFailure>,
}

impl BatchResult {
    /// Successful result.
    pub fn success(key: impl Into<String>, transcript: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            transcript: Some(transcript.into()),
            error: None,
        }
    }

    /// Failed result.
    pub fn failure(key: impl Into<String>, kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            transcript: None,
            error: Some(TaskFailure {
                kind,
                detail: detail.into(),
            }),
        }
    }

    /// Failed result from a session error.
    pub fn from_error(key: impl Into<String>, err: &SessionError) -> Self {
        Self::failure(key, err.kind(), err.to_string())
    }

    /// Whether a transcript was produced.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The output line, without the trailing newline.
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = one_line(&self.key);
        match &self.error {
            None => write!(f, "{key}\t{}", one_line(self.transcript.as_deref().unwrap_or_default())),
            Some(failure) => write!(f, "{key}\t\t{}: {}", failure.kind, one_line(&failure.detail)),
        }
    }
}

/// Tabs and line breaks would split a record; replace them with spaces.
fn one_line(s: &str) -> String {
    s.chars()
        .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
        .collect()
}
