//! Session error types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors that terminate a single transcription session.
///
/// None of these escape the owning session: the batch runner turns each one
/// into an error record for that task.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The transport could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The transport failed mid-session (abrupt close, I/O error).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service rejected, or never acknowledged, the start message.
    #[error("handshake rejected: {0}")]
    Handshake(String),

    /// An inbound event was malformed or flagged as a data-format error.
    #[error("protocol format error: {0}")]
    ProtocolFormat(String),

    /// The service reported an operational failure. `payload` is the raw message.
    #[error("service exception: {payload}")]
    ServiceException {
        /// Raw server payload, kept for diagnostics.
        payload: String,
    },

    /// A bounded wait expired.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The session was cancelled by the caller (shutdown).
    #[error("session cancelled")]
    Cancelled,

    /// The audio source could not be opened or read.
    #[error("audio source error: {0}")]
    AudioSource(String),
}

impl SessionError {
    /// Coarse classification used in batch output and metrics.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection(_) => ErrorKind::Connection,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Handshake(_) => ErrorKind::Handshake,
            Self::ProtocolFormat(_) => ErrorKind::ProtocolFormat,
            Self::ServiceException { .. } => ErrorKind::ServiceException,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::AudioSource(_) => ErrorKind::AudioSource,
        }
    }
}

/// Serializable error classification attached to a failed task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`SessionError::Connection`].
    Connection,
    /// See [`SessionError::Transport`].
    Transport,
    /// See [`SessionError::Handshake`].
    Handshake,
    /// See [`SessionError::ProtocolFormat`].
    ProtocolFormat,
    /// See [`SessionError::ServiceException`].
    ServiceException,
    /// See [`SessionError::Timeout`].
    Timeout,
    /// See [`SessionError::Cancelled`].
    Cancelled,
    /// See [`SessionError::AudioSource`].
    AudioSource,
    /// A batch input line could not be turned into a task.
    TaskInput,
    /// The worker running the task panicked.
    Internal,
}

impl ErrorKind {
    /// Stable `snake_case` label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Transport => "transport",
            Self::Handshake => "handshake",
            Self::ProtocolFormat => "protocol_format",
            Self::ServiceException => "service_exception",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::AudioSource => "audio_source",
            Self::TaskInput => "task_input",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extension trait to reduce `.map_err()` boilerplate when wrapping errors into `SessionError`.
pub trait ResultExt<T> {
    /// Wrap the error as [`SessionError::Connection`] with `context` prefix.
    fn connection(self, context: &str) -> Result<T, SessionError>;
    /// Wrap the error as [`SessionError::Transport`] with `context` prefix.
    fn transport(self, context: &str) -> Result<T, SessionError>;
    /// Wrap the error as [`SessionError::ProtocolFormat`] with `context` prefix.
    fn protocol_format(self, context: &str) -> Result<T, SessionError>;
    /// Wrap the error as [`SessionError::AudioSource`] with `context` prefix.
    fn audio_source(self, context: &str) -> Result<T, SessionError>;
}

impl<T, E: fmt::Display> ResultExt<T> for Result<T, E> {
    fn connection(self, context: &str) -> Result<T, SessionError> {
        self.map_err(|e| SessionError::Connection(format!("{context}: {e}")))
    }
    fn transport(self, context: &str) -> Result<T, SessionError> {
        self.map_err(|e| SessionError::Transport(format!("{context}: {e}")))
    }
    fn protocol_format(self, context: &str) -> Result<T, SessionError> {
        self.map_err(|e| SessionError::ProtocolFormat(format!("{context}: {e}")))
    }
    fn audio_source(self, context: &str) -> Result<T, SessionError> {
        self.map_err(|e| SessionError::AudioSource(format!("{context}: {e}")))
    }
}
