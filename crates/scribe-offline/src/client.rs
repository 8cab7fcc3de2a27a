//! HTTP client for the offline transcription service.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use scribe_settings::{Credentials, Dialect, ScribeSettings, SettingsError};
use scribe_stream::{ResultExt, SessionError};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use url::Url;
use uuid::Uuid;

use crate::response::{parse_data, progress_field, string_field, transcript_field};

/// Immutable client for one run. Cheap to share behind an `Arc`.
#[derive(Clone, Debug)]
pub struct OfflineClient {
    http: reqwest::Client,
    base: String,
    credentials: Credentials,
    slice_len: usize,
    poll_interval: Duration,
    max_poll: Duration,
    task_fields: Vec<(String, String)>,
}

impl OfflineClient {
    /// Build from run settings. The endpoint is the service base URL.
    pub fn new(
        settings: &ScribeSettings,
        credentials: Credentials,
        http: reqwest::Client,
    ) -> Result<Self, SettingsError> {
        if settings.dialect != Dialect::LasrFile {
            return Err(SettingsError::InvalidValue(format!(
                "dialect {} is not the offline dialect",
                settings.dialect
            )));
        }
        let base = settings.effective_endpoint().trim_end_matches('/').to_owned();
        let _ = Url::parse(&base)
            .map_err(|e| SettingsError::InvalidValue(format!("endpoint '{base}': {e}")))?;
        let offline = &settings.offline;
        Ok(Self {
            http,
            base,
            credentials,
            slice_len: offline.slice_len.max(1),
            poll_interval: Duration::from_millis(offline.poll_interval_ms),
            max_poll: Duration::from_millis(offline.max_poll_ms),
            task_fields: form_fields(&offline.task)?,
        })
    }

    /// Upload `audio`, run a job for it, and return the transcript.
    #[instrument(skip_all, fields(key = %key, audio_type = %audio_type, len = audio.len()))]
    pub async fn transcribe(
        &self,
        key: &str,
        audio: &[u8],
        audio_type: &str,
        cancel: &CancellationToken,
    ) -> Result<String, SessionError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SessionError::Cancelled),
            result = self.run_job(audio, audio_type) => result,
        }
    }

    async fn run_job(&self, audio: &[u8], audio_type: &str) -> Result<String, SessionError> {
        let session_id = Uuid::now_v7().simple().to_string();
        let slices: Vec<&[u8]> = audio.chunks(self.slice_len).collect();

        let audio_id = self.create_audio(&session_id, audio_type, slices.len()).await?;
        for (index, slice) in slices.iter().enumerate() {
            self.upload_slice(&session_id, &audio_id, index, slice).await?;
        }
        info!(audio_id = %audio_id, slices = slices.len(), "audio uploaded");

        let task_id = self.create_task(audio_type, &audio_id).await?;
        self.wait_for_completion(&task_id).await?;
        let text = self.fetch_result(&task_id).await?;
        info!(task_id = %task_id, chars = text.chars().count(), "offline job completed");
        Ok(text)
    }

    async fn create_audio(&self, session_id: &str, audio_type: &str, slice_num: usize) -> Result<String, SessionError> {
        let slice_num = slice_num.to_string();
        let request = self
            .http
            .post(format!("{}/audio", self.base))
            .query(&self.auth_query())
            .header("x-sessionId", session_id)
            .form(&[("audio_type", audio_type), ("slice_num", slice_num.as_str())]);
        let data = self.call("create audio", request).await?;
        string_field("create audio", &data, "audio_id")
    }

    async fn upload_slice(
        &self,
        session_id: &str,
        audio_id: &str,
        index: usize,
        bytes: &[u8],
    ) -> Result<(), SessionError> {
        let part = Part::bytes(bytes.to_vec()).file_name(format!("{audio_id}.{index}"));
        let request = self
            .http
            .post(format!("{}/audio/{audio_id}/slice/{index}", self.base))
            .query(&self.auth_query())
            .header("x-sessionId", session_id)
            .multipart(Form::new().part("file", part));
        let _ = self.call("upload slice", request).await?;
        debug!(audio_id, index, len = bytes.len(), "slice uploaded");
        Ok(())
    }

    async fn create_task(&self, audio_type: &str, audio_id: &str) -> Result<String, SessionError> {
        let mut fields = self.task_fields.clone();
        fields.push(("audio_type".into(), audio_type.into()));
        fields.push(("audio_id".into(), audio_id.into()));
        let request = self
            .http
            .post(format!("{}/task", self.base))
            .query(&self.auth_query())
            .form(&fields);
        let data = self.call("create task", request).await?;
        string_field("create task", &data, "task_id")
    }

    async fn wait_for_completion(&self, task_id: &str) -> Result<(), SessionError> {
        let started = Instant::now();
        loop {
            let request = self
                .http
                .get(format!("{}/task/{task_id}/progress", self.base))
                .query(&self.auth_query());
            let data = self.call("query progress", request).await?;
            let progress = progress_field(&data)?;
            debug!(task_id, progress, "job progress");
            if progress >= 100.0 {
                return Ok(());
            }
            if started.elapsed() + self.poll_interval > self.max_poll {
                return Err(SessionError::Timeout(format!(
                    "job {task_id} still at {progress}% after {}ms",
                    self.max_poll.as_millis()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn fetch_result(&self, task_id: &str) -> Result<String, SessionError> {
        let request = self
            .http
            .get(format!("{}/task/{task_id}/result", self.base))
            .query(&self.auth_query());
        let data = self.call("fetch result", request).await?;
        transcript_field(&data)
    }

    /// Send, require HTTP 200, and unwrap the envelope.
    async fn call(&self, step: &str, request: reqwest::RequestBuilder) -> Result<Value, SessionError> {
        let response = request.send().await.connection(step)?;
        let status = response.status();
        let body = response.text().await.transport(step)?;
        if !status.is_success() {
            return Err(SessionError::Transport(format!("{step}: HTTP {status}: {body}")));
        }
        parse_data(step, &body)
    }

    fn auth_query(&self) -> [(&'static str, &str); 2] {
        let (id_key, secret_key) = Dialect::LasrFile.credential_keys();
        [
            (id_key, self.credentials.product_id.as_str()),
            (secret_key, self.credentials.api_key.as_str()),
        ]
    }
}

/// Flatten the configured task object into form fields.
fn form_fields(task: &Value) -> Result<Vec<(String, String)>, SettingsError> {
    let Some(obj) = task.as_object() else {
        return Err(SettingsError::InvalidValue("offline task must be a JSON object".into()));
    };
    obj.iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                Value::Number(_) | Value::Bool(_) => v.to_string(),
                Value::Null => String::new(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(SettingsError::InvalidValue(format!(
                        "offline task field '{k}' must be a scalar"
                    )));
                }
            };
            Ok((k.clone(), value))
        })
        .collect()
}
