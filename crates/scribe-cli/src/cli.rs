//! Command-line arguments and how they layer over loaded settings.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use scribe_settings::{Dialect, ScribeSettings, deep_merge, load_default_settings, load_settings_from_path};
use serde_json::{Value, json};

#[derive(Debug, Parser)]
#[command(name = "scribe", version, about = "Batch speech transcription against streaming and offline ASR services")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Transcribe every task listed in IN, writing one record per task to OUT.
    Batch {
        /// Task list: `<key> <audio>` or `<audio>` per line.
        input: PathBuf,
        /// Result file, truncated first.
        output: PathBuf,
        #[command(flatten)]
        options: SessionArgs,
    },
    /// Transcribe one audio file or URL and print the transcript.
    Once {
        /// Local path or http(s) URL.
        audio: String,
        #[command(flatten)]
        options: SessionArgs,
    },
}

impl Command {
    /// Options shared by every subcommand.
    pub fn options(&self) -> &SessionArgs {
        match self {
            Self::Batch { options, .. } | Self::Once { options, .. } => options,
        }
    }
}

/// Overrides applied on top of the settings file and environment.
#[derive(Debug, Default, Args)]
pub struct SessionArgs {
    /// Settings file (JSON).
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Service dialect: lasrLive, duiRealtime or lasrFile.
    #[arg(long)]
    pub dialect: Option<Dialect>,

    /// Concurrent sessions.
    #[arg(long)]
    pub nproc: Option<usize>,

    /// Recognition language.
    #[arg(long)]
    pub lang: Option<String>,

    /// Recognition resource.
    #[arg(long)]
    pub res: Option<String>,

    /// JSON merged over the start message (or the job fields for lasrFile).
    #[arg(long)]
    pub params: Option<String>,

    /// Credentials file.
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset.
    #[arg(long)]
    pub log_level: Option<String>,
}

impl SessionArgs {
    /// Load the settings file (or defaults), then apply these overrides.
    pub fn load_settings(&self) -> Result<ScribeSettings> {
        let mut settings = match &self.config {
            Some(path) => load_settings_from_path(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?,
            None => load_default_settings(),
        };
        self.apply(&mut settings)?;
        settings.validate();
        Ok(settings)
    }

    /// Layer the command-line overrides onto `settings`.
    pub fn apply(&self, settings: &mut ScribeSettings) -> Result<()> {
        if let Some(dialect) = self.dialect {
            settings.dialect = dialect;
        }
        if let Some(n) = self.nproc {
            settings.batch.concurrency = n;
        }
        if let Some(path) = &self.credentials {
            settings.credentials_path = path.display().to_string();
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }

        let offline = settings.dialect == Dialect::LasrFile;
        if let Some(lang) = &self.lang {
            if offline {
                settings.offline.task = deep_merge(settings.offline.task.take(), json!({ "lang": lang }));
            } else {
                let _ = settings.query.insert("lang".into(), lang.clone());
            }
        }
        if let Some(res) = &self.res {
            if offline {
                tracing::warn!(%res, "--res has no effect for lasrFile");
            } else {
                let _ = settings.query.insert("res".into(), res.clone());
            }
        }
        if let Some(raw) = &self.params {
            let params: Value = serde_json::from_str(raw).context("--params is not valid JSON")?;
            anyhow::ensure!(params.is_object(), "--params must be a JSON object");
            if offline {
                settings.offline.task = deep_merge(settings.offline.task.take(), params);
            } else {
                settings.start_message = deep_merge(settings.start_message.take(), params);
            }
        }
        Ok(())
    }
}
