//! Metric names recorded by the batch runner.
//!
//! Recording is a no-op until a recorder is installed by the embedding
//! binary.

/// Sessions currently running (gauge).
pub const SESSIONS_ACTIVE: &str = "scribe_sessions_active";
/// Finished sessions (counter, labels: outcome).
pub const SESSIONS_TOTAL: &str = "scribe_sessions_total";
/// Session wall time in seconds (histogram, labels: outcome).
pub const SESSION_DURATION_SECONDS: &str = "scribe_session_duration_seconds";
