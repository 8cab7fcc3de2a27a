//! `scribe`: batch and one-shot speech transcription.
//!
//! Startup problems (settings, credentials, input and output files) exit
//! non-zero. Per-task failures are written as error records and do not.

#![deny(unsafe_code)]

mod cli;
mod logging;

use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use scribe_batch::{BatchResult, BatchRunner, Task, TaskRunner, TsvSink, parse_tasks, runner_for};
use scribe_settings::{Credentials, ScribeSettings, SettingsError, resolve_credentials, store_credentials};
use scribe_stream::AudioRef;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.command.options().load_settings()?;
    logging::init_subscriber(&settings.logging.level);

    let credentials = load_credentials(Path::new(&settings.credentials_path))?;
    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let runner = runner_for(&settings, credentials, http).context("invalid session configuration")?;

    let cancel = CancellationToken::new();
    let _signal = tokio::spawn(cancel_on_interrupt(cancel.clone()));

    match cli.command {
        Command::Batch { input, output, .. } => run_batch(&settings, runner, &input, &output, &cancel).await,
        Command::Once { audio, .. } => run_once(runner.as_ref(), &audio, &cancel).await,
    }
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupt received, cancelling");
        cancel.cancel();
    }
}

async fn run_batch(
    settings: &ScribeSettings,
    runner: Arc<dyn TaskRunner>,
    input: &Path,
    output: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    let raw = tokio::fs::read(input)
        .await
        .with_context(|| format!("failed to read task list {}", input.display()))?;
    let parsed = parse_tasks(&raw);
    let file = tokio::fs::File::create(output)
        .await
        .with_context(|| format!("failed to create {}", output.display()))?;

    info!(
        dialect = %settings.dialect,
        tasks = parsed.tasks.len(),
        skipped = parsed.skipped.len(),
        concurrency = settings.batch.concurrency,
        "starting batch"
    );
    let batch = BatchRunner::new(runner, settings.batch.concurrency);
    let (summary, _sink) = batch
        .run_parsed(parsed, TsvSink::new(file), cancel)
        .await
        .with_context(|| format!("failed writing results to {}", output.display()))?;

    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        skipped_lines = summary.skipped_lines,
        "batch complete"
    );
    Ok(())
}

async fn run_once(runner: &dyn TaskRunner, audio: &str, cancel: &CancellationToken) -> Result<()> {
    let audio = AudioRef::parse(audio).with_context(|| format!("unusable audio reference '{audio}'"))?;
    let task = Task::new(Uuid::now_v7().to_string(), audio);
    match runner.run(&task, cancel.clone()).await {
        Ok(text) => println!("{text}"),
        Err(e) => {
            warn!(error = %e, "transcription failed");
            println!("{}", BatchResult::from_error(task.key, &e));
        }
    }
    Ok(())
}

/// Environment or file first; on a terminal, ask and remember the answer.
fn load_credentials(path: &Path) -> Result<Credentials> {
    match resolve_credentials(path) {
        Ok(credentials) => Ok(credentials),
        Err(SettingsError::MissingCredentials { .. }) if std::io::stdin().is_terminal() => {
            let credentials = prompt_credentials()?;
            store_credentials(path, &credentials)
                .with_context(|| format!("failed to store credentials in {}", path.display()))?;
            info!(path = %path.display(), "credentials saved");
            Ok(credentials)
        }
        Err(e) => Err(e).context("failed to resolve credentials"),
    }
}

fn prompt_credentials() -> Result<Credentials> {
    let product_id = prompt("product id: ")?;
    let api_key = prompt("api key: ")?;
    anyhow::ensure!(
        !product_id.is_empty() && !api_key.is_empty(),
        "product id and api key are both required"
    );
    Ok(Credentials::new(product_id, api_key))
}

fn prompt(label: &str) -> Result<String> {
    let mut stderr = std::io::stderr();
    stderr.write_all(label.as_bytes())?;
    stderr.flush()?;
    let mut line = String::new();
    let _ = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from terminal")?;
    Ok(line.trim().to_owned())
}
