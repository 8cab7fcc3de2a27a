//! Concrete [`TaskRunner`]s: one per session flavour.

use std::sync::Arc;

use async_trait::async_trait;
use scribe_offline::OfflineClient;
use scribe_settings::{Credentials, ScribeSettings, SettingsError};
use scribe_stream::{Connector, Session, SessionConfig, SessionError, WsConnector, open_audio, read_audio_bytes};
use tokio_util::sync::CancellationToken;

use crate::runner::TaskRunner;
use crate::task::Task;

/// Streams each task's audio over its own websocket session.
pub struct StreamingRunner {
    config: Arc<SessionConfig>,
    connector: Arc<dyn Connector>,
    http: reqwest::Client,
}

impl StreamingRunner {
    /// Runner sharing one resolved configuration across sessions.
    pub fn new(config: Arc<SessionConfig>, connector: Arc<dyn Connector>, http: reqwest::Client) -> Self {
        Self {
            config,
            connector,
            http,
        }
    }
}

#[async_trait]
impl TaskRunner for StreamingRunner {
    async fn run(&self, task: &Task, cancel: CancellationToken) -> Result<String, SessionError> {
        let mut source = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SessionError::Cancelled),
            source = open_audio(&task.audio, &self.http) => source?,
        };
        let config = if task.request_params.is_null() {
            Arc::clone(&self.config)
        } else {
            Arc::new(self.config.with_start_overrides(&task.request_params))
        };
        let mut session =
            Session::new(task.key.clone(), config, Arc::clone(&self.connector)).with_cancellation(cancel);
        session.run(&mut source).await
    }
}

/// Uploads each task's audio as an offline job and polls for the result.
pub struct OfflineRunner {
    client: Arc<OfflineClient>,
    http: reqwest::Client,
}

impl OfflineRunner {
    /// Runner over a shared client.
    pub fn new(client: Arc<OfflineClient>, http: reqwest::Client) -> Self {
        Self { client, http }
    }
}

#[async_trait]
impl TaskRunner for OfflineRunner {
    async fn run(&self, task: &Task, cancel: CancellationToken) -> Result<String, SessionError> {
        let audio = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SessionError::Cancelled),
            audio = read_audio_bytes(&task.audio, &self.http) => audio?,
        };
        self.client
            .transcribe(&task.key, &audio, &task.audio.extension(), &cancel)
            .await
    }
}

/// Pick the runner matching the configured dialect.
pub fn runner_for(
    settings: &ScribeSettings,
    credentials: Credentials,
    http: reqwest::Client,
) -> Result<Arc<dyn TaskRunner>, SettingsError> {
    if settings.dialect.is_streaming() {
        let config = SessionConfig::resolve(settings, &credentials)?;
        let connector = WsConnector::default();
        Ok(Arc::new(StreamingRunner::new(Arc::new(config), Arc::new(connector), http)))
    } else {
        let client = OfflineClient::new(settings, credentials, http.clone())?;
        Ok(Arc::new(OfflineRunner::new(Arc::new(client), http)))
    }
}
