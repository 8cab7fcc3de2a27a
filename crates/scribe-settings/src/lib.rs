//! # scribe-settings
//!
//! Configuration for scribe runs.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** : [`ScribeSettings::default()`]
//! 2. **Settings file** : a JSON file passed with `-c` (deep-merged over defaults)
//! 3. **Environment variables** : `SCRIBE_*` overrides (highest priority)
//!
//! There is no global settings cache: the loaded value is turned into an
//! immutable session configuration once per run and passed down explicitly.
//!
//! ## Crate Position
//!
//! Standalone (no scribe crate dependencies).
//! Depended on by: scribe-stream, scribe-offline, scribe-batch, scribe-cli.

#![deny(unsafe_code)]

pub mod credentials;
pub mod dialect;
pub mod errors;
pub mod loader;
pub mod types;

pub use credentials::{Credentials, resolve_credentials, store_credentials};
pub use dialect::Dialect;
pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_default_settings, load_settings_from_path, read_settings_file};
pub use types::*;
