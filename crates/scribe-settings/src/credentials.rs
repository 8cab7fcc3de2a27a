//! Account credentials: product id and api key.
//!
//! Resolution order:
//! 1. `SCRIBE_PRODUCT_ID` + `SCRIBE_API_KEY` environment variables
//! 2. A two-line credentials file (product id, then api key)

use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::errors::{Result, SettingsError};

/// Account id and secret for the speech service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Customer product id.
    pub product_id: String,
    /// Secret api key.
    pub api_key: String,
}

impl Credentials {
    /// Build from owned parts.
    pub fn new(product_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            api_key: api_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("product_id", &self.product_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Parse the credentials file format.
///
/// Returns `None` when either line is missing or blank.
pub fn parse_credentials(content: &str) -> Option<Credentials> {
    let mut lines = content.lines().map(str::trim);
    let product_id = lines.next().filter(|l| !l.is_empty())?;
    let api_key = lines.next().filter(|l| !l.is_empty())?;
    Some(Credentials::new(product_id, api_key))
}

/// Read credentials from `path`. A missing or empty file yields `Ok(None)`.
pub fn load_credentials_file(path: &Path) -> Result<Option<Credentials>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(parse_credentials(&content))
}

/// Persist credentials in the two-line format.
pub fn store_credentials(path: &Path, creds: &Credentials) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("{}\n{}\n", creds.product_id, creds.api_key))?;
    Ok(())
}

/// Credentials from the environment, if both variables are set.
pub fn credentials_from_env() -> Option<Credentials> {
    let product_id = std::env::var("SCRIBE_PRODUCT_ID").ok().filter(|v| !v.is_empty())?;
    let api_key = std::env::var("SCRIBE_API_KEY").ok().filter(|v| !v.is_empty())?;
    Some(Credentials::new(product_id, api_key))
}

/// Resolve credentials from env, then from `path`.
pub fn resolve_credentials(path: &Path) -> Result<Credentials> {
    if let Some(creds) = credentials_from_env() {
        debug!("using credentials from environment");
        return Ok(creds);
    }
    if let Some(creds) = load_credentials_file(path)? {
        debug!(path = %path.display(), product_id = %creds.product_id, "using stored credentials");
        return Ok(creds);
    }
    Err(SettingsError::MissingCredentials {
        path: path.display().to_string(),
    })
}
