//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so a settings file may contain any subset of fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::dialect::Dialect;

/// Root settings type.
///
/// `query` and `start_message` hold *overrides* only. They are layered over
/// the selected dialect's presets when the session configuration is resolved,
/// so switching dialect via env var still picks up the right base values.
///
/// # JSON Format
///
/// ```json
/// {
///   "dialect": "lasrLive",
///   "query": { "lang": "en" },
///   "stream": { "chunkSize": 3200 },
///   "batch": { "concurrency": 4 }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScribeSettings {
    /// Vendor dialect.
    pub dialect: Dialect,
    /// Endpoint override; the dialect default is used when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Query parameter overrides.
    pub query: BTreeMap<String, String>,
    /// Start message overrides, deep-merged over the dialect default.
    pub start_message: Value,
    /// Path to the two-line credentials file.
    pub credentials_path: String,
    /// Streaming session timing.
    pub stream: StreamSettings,
    /// Batch runner settings.
    pub batch: BatchSettings,
    /// Offline (polling upload) session settings.
    pub offline: OfflineSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for ScribeSettings {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            endpoint: None,
            query: BTreeMap::new(),
            start_message: Value::Null,
            credentials_path: "secret".to_string(),
            stream: StreamSettings::default(),
            batch: BatchSettings::default(),
            offline: OfflineSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl ScribeSettings {
    /// Correct invalid values in place.
    ///
    /// Called automatically during loading. Zero sizes are bumped to the
    /// smallest usable value with a warning rather than rejected.
    pub fn validate(&mut self) {
        if self.batch.concurrency == 0 {
            tracing::warn!("batch concurrency 0 is invalid, using 1");
            self.batch.concurrency = 1;
        }
        if self.stream.chunk_size == 0 {
            let fallback = StreamSettings::default().chunk_size;
            tracing::warn!(fallback, "stream chunk size 0 is invalid, using default");
            self.stream.chunk_size = fallback;
        }
        if self.offline.slice_len == 0 {
            let fallback = OfflineSettings::default().slice_len;
            tracing::warn!(fallback, "offline slice length 0 is invalid, using default");
            self.offline.slice_len = fallback;
        }
        if self.offline.poll_interval_ms == 0 {
            tracing::warn!("offline poll interval 0 would spin, using 1000ms");
            self.offline.poll_interval_ms = 1000;
        }
    }

    /// Effective endpoint: the override, or the dialect default.
    pub fn effective_endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.dialect.default_endpoint())
    }
}

/// Timing and framing of a streaming session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamSettings {
    /// Bytes per audio frame.
    pub chunk_size: usize,
    /// Pause after each audio frame, approximating real-time capture.
    pub interval_ms: u64,
    /// How long to wait for the handshake acknowledgment.
    pub handshake_timeout_ms: u64,
    /// How long to wait for the final result once all audio is sent.
    pub result_timeout_ms: u64,
    /// How long a surviving sub-operation may drain after its sibling failed.
    pub drain_timeout_ms: u64,
    /// Optional hard ceiling on a whole session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_timeout_ms: Option<u64>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1280,
            interval_ms: 40,
            handshake_timeout_ms: 10_000,
            result_timeout_ms: 60_000,
            drain_timeout_ms: 5_000,
            session_timeout_ms: None,
        }
    }
}

/// Batch runner settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchSettings {
    /// Maximum concurrently open sessions.
    pub concurrency: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { concurrency: 10 }
    }
}

/// Offline polling-upload settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfflineSettings {
    /// Upload slice size in bytes.
    pub slice_len: usize,
    /// Delay between progress polls.
    pub poll_interval_ms: u64,
    /// Give up on a job after this long.
    pub max_poll_ms: u64,
    /// Form fields sent when creating the transcription job.
    pub task: Value,
}

impl Default for OfflineSettings {
    fn default() -> Self {
        Self {
            slice_len: 2 * 1024 * 1024,
            poll_interval_ms: 1000,
            max_poll_ms: 3_600_000,
            task: json!({
                "lang": "cn",
                "sample_rate": 16000,
                "speaker_number": 0,
                "use_txt_smooth": 0,
                "use_inverse_txt": 0,
                "use_segment": 0,
                "use_aux": 0,
                "enableConfidence": true,
                "lmid": ""
            }),
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_recommendations() {
        let s = ScribeSettings::default();
        assert_eq!(s.dialect, Dialect::LasrLive);
        assert_eq!(s.stream.chunk_size, 1280);
        assert_eq!(s.stream.interval_ms, 40);
        assert_eq!(s.batch.concurrency, 10);
        assert_eq!(s.offline.slice_len, 2 * 1024 * 1024);
        assert_eq!(s.credentials_path, "secret");
        assert!(s.start_message.is_null());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: ScribeSettings =
            serde_json::from_str(r#"{"stream": {"chunkSize": 3200}}"#).unwrap();
        assert_eq!(s.stream.chunk_size, 3200);
        assert_eq!(s.stream.interval_ms, 40);
        assert_eq!(s.batch.concurrency, 10);
    }

    #[test]
    fn json_field_names_are_camel_case() {
        let json = serde_json::to_value(ScribeSettings::default()).unwrap();
        assert!(json.get("startMessage").is_some());
        assert!(json.get("credentialsPath").is_some());
        assert!(json["stream"].get("handshakeTimeoutMs").is_some());
        assert!(json["offline"].get("pollIntervalMs").is_some());
        assert!(json.get("endpoint").is_none());
    }

    #[test]
    fn validate_corrects_zeroes() {
        let mut s = ScribeSettings::default();
        s.batch.concurrency = 0;
        s.stream.chunk_size = 0;
        s.offline.slice_len = 0;
        s.offline.poll_interval_ms = 0;
        s.validate();
        assert_eq!(s.batch.concurrency, 1);
        assert_eq!(s.stream.chunk_size, 1280);
        assert_eq!(s.offline.slice_len, 2 * 1024 * 1024);
        assert_eq!(s.offline.poll_interval_ms, 1000);
    }

    #[test]
    fn effective_endpoint_prefers_override() {
        let mut s = ScribeSettings::default();
        assert_eq!(s.effective_endpoint(), "wss://lasr.duiopen.com/live/ws2");
        s.endpoint = Some("ws://127.0.0.1:9000/ws".into());
        assert_eq!(s.effective_endpoint(), "ws://127.0.0.1:9000/ws");
    }
}
