//! Settings error types.

use thiserror::Error;

/// Errors that can occur when loading settings or credentials.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read a settings or credentials file from disk.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse JSON in the settings file.
    #[error("failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A settings value was invalid (e.g., unknown dialect name).
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
    /// Neither the environment nor the credentials file provided an account.
    #[error("no credentials found (set SCRIBE_PRODUCT_ID/SCRIBE_API_KEY or create {path})")]
    MissingCredentials {
        /// Credentials file that was consulted.
        path: String,
    },
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
