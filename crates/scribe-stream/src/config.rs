//! Immutable per-run session configuration.
//!
//! Built once from [`ScribeSettings`] and [`Credentials`], then shared by
//! every session of a run through an `Arc`. Nothing here is mutated after
//! construction.

use std::collections::BTreeMap;
use std::time::Duration;

use scribe_settings::{Credentials, Dialect, ScribeSettings, SettingsError, deep_merge};
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::protocol::DialectProfile;

/// Everything a streaming session needs besides its audio.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Vendor dialect.
    pub dialect: Dialect,
    /// Endpoint with query parameters and credentials applied.
    pub url: Url,
    /// Start message template (dialect defaults plus overrides).
    pub start_message: Value,
    /// Wire mapping for inbound events.
    pub profile: &'static DialectProfile,
    /// Account id, placed into start messages that carry it.
    pub product_id: String,
    /// Bytes per audio frame.
    pub chunk_size: usize,
    /// Pause after each audio frame.
    pub interval: Duration,
    /// Bound on the wait for the handshake reply.
    pub handshake_timeout: Duration,
    /// Bound on the wait for the final result once all audio is sent.
    pub result_timeout: Duration,
    /// Bound on draining the surviving sub-operation after a failure.
    pub drain_timeout: Duration,
    /// Optional ceiling on the whole session.
    pub session_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Resolve settings for a streaming dialect.
    pub fn resolve(settings: &ScribeSettings, credentials: &Credentials) -> Result<Self, SettingsError> {
        let dialect = settings.dialect;
        let profile = DialectProfile::for_dialect(dialect).ok_or_else(|| {
            SettingsError::InvalidValue(format!("dialect {dialect} is not a streaming dialect"))
        })?;

        let url = build_url(
            settings.effective_endpoint(),
            dialect,
            &settings.query,
            credentials,
        )?;

        let start_message = merge_start_message(
            dialect,
            dialect.default_start_message(),
            settings.start_message.clone(),
        );

        let stream = &settings.stream;
        Ok(Self {
            dialect,
            url,
            start_message,
            profile,
            product_id: credentials.product_id.clone(),
            chunk_size: stream.chunk_size.max(1),
            interval: Duration::from_millis(stream.interval_ms),
            handshake_timeout: Duration::from_millis(stream.handshake_timeout_ms),
            result_timeout: Duration::from_millis(stream.result_timeout_ms),
            drain_timeout: Duration::from_millis(stream.drain_timeout_ms),
            session_timeout: stream.session_timeout_ms.map(Duration::from_millis),
        })
    }

    /// Copy with `params` deep-merged over the start message. `Null` leaves
    /// it untouched.
    #[must_use]
    pub fn with_start_overrides(&self, params: &Value) -> Self {
        let mut config = self.clone();
        if !params.is_null() {
            config.start_message = merge_start_message(self.dialect, self.start_message.clone(), params.clone());
        }
        config
    }

    /// Start message for one session, with per-session ids filled in.
    pub fn render_start_message(&self, request_id: &str) -> Value {
        let mut message = self.start_message.clone();
        if let Some(ptr) = self.profile.product_id_pointer
            && let Some(slot) = message.pointer_mut(ptr)
            && slot.as_str().is_none_or(str::is_empty)
        {
            *slot = Value::from(self.product_id.as_str());
        }
        if let Some(ptr) = self.profile.request_id_pointer
            && let Some(slot) = message.pointer_mut(ptr)
            && slot.as_str().is_none_or(str::is_empty)
        {
            *slot = Value::from(request_id);
        }
        message
    }
}

/// Merge `overrides` over `base`. A live start message always says `start`.
fn merge_start_message(dialect: Dialect, base: Value, overrides: Value) -> Value {
    let mut message = deep_merge(base, overrides);
    if dialect == Dialect::LasrLive
        && let Some(obj) = message.as_object_mut()
    {
        let _ = obj.insert("command".into(), Value::from("start"));
    }
    message
}

/// Endpoint URL with dialect defaults, overrides and credentials as query
/// parameters. Empty values are left out.
pub fn build_url(
    endpoint: &str,
    dialect: Dialect,
    overrides: &BTreeMap<String, String>,
    credentials: &Credentials,
) -> Result<Url, SettingsError> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| SettingsError::InvalidValue(format!("endpoint '{endpoint}': {e}")))?;

    let mut params = dialect.default_query();
    for (key, value) in overrides {
        if !params.contains_key(key) {
            warn!(key = %key, dialect = %dialect, "query parameter not documented for dialect, forwarding anyway");
        }
        let _ = params.insert(key.clone(), value.clone());
    }
    let (id_key, secret_key) = dialect.credential_keys();
    let _ = params.insert(id_key.to_owned(), credentials.product_id.clone());
    let _ = params.insert(secret_key.to_owned(), credentials.api_key.clone());

    {
        let mut query = url.query_pairs_mut();
        for (key, value) in params.iter().filter(|(_, v)| !v.is_empty()) {
            let _ = query.append_pair(key, value);
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn creds() -> Credentials {
        Credentials::new("pid-9", "key-9")
    }

    fn query_of(url: &Url) -> BTreeMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn live_url_carries_defaults_and_credentials() {
        let cfg = SessionConfig::resolve(&ScribeSettings::default(), &creds()).unwrap();
        let q = query_of(&cfg.url);
        assert_eq!(cfg.url.host_str(), Some("lasr.duiopen.com"));
        assert_eq!(q["res"], "aitranson");
        assert_eq!(q["lang"], "cn");
        assert_eq!(q["productId"], "pid-9");
        assert_eq!(q["apikey"], "key-9");
        // Empty defaults are not sent.
        assert!(!q.contains_key("deviceId"));
    }

    #[test]
    fn overrides_replace_and_extend_query() {
        let mut settings = ScribeSettings::default();
        let _ = settings.query.insert("lang".into(), "en".into());
        let _ = settings.query.insert("custom".into(), "1".into());
        let cfg = SessionConfig::resolve(&settings, &creds()).unwrap();
        let q = query_of(&cfg.url);
        assert_eq!(q["lang"], "en");
        assert_eq!(q["custom"], "1");
    }

    #[test]
    fn start_message_overrides_deep_merge() {
        let mut settings = ScribeSettings::default();
        settings.start_message = json!({"params": {"audio": {"sampleRate": 8000}}, "command": "stop"});
        let cfg = SessionConfig::resolve(&settings, &creds()).unwrap();
        assert_eq!(cfg.start_message["params"]["audio"]["sampleRate"], 8000);
        assert_eq!(cfg.start_message["params"]["audio"]["channel"], 1);
        assert_eq!(cfg.start_message["command"], "start");
    }

    #[test]
    fn per_task_overrides_layer_over_run_config() {
        let mut settings = ScribeSettings::default();
        settings.start_message = json!({"params": {"audio": {"sampleRate": 8000}}});
        let cfg = SessionConfig::resolve(&settings, &creds()).unwrap();

        let task_cfg = cfg.with_start_overrides(&json!({"params": {"audio": {"channel": 2}}, "command": "stop"}));
        assert_eq!(task_cfg.start_message["params"]["audio"]["sampleRate"], 8000);
        assert_eq!(task_cfg.start_message["params"]["audio"]["channel"], 2);
        assert_eq!(task_cfg.start_message["command"], "start");
        assert_eq!(task_cfg.url, cfg.url);

        assert_eq!(cfg.with_start_overrides(&Value::Null).start_message, cfg.start_message);
        assert_eq!(cfg.start_message["params"]["audio"]["channel"], 1);
    }

    #[test]
    fn realtime_start_message_gets_ids() {
        let settings = ScribeSettings {
            dialect: Dialect::DuiRealtime,
            ..ScribeSettings::default()
        };
        let cfg = SessionConfig::resolve(&settings, &creds()).unwrap();
        let msg = cfg.render_start_message("req-1");
        assert_eq!(msg["context"]["productId"], "pid-9");
        assert_eq!(msg["request"]["requestId"], "req-1");
        // Template stays untouched.
        assert_eq!(cfg.start_message["request"]["requestId"], "");
    }

    #[test]
    fn explicit_request_id_is_kept() {
        let settings = ScribeSettings {
            dialect: Dialect::DuiRealtime,
            start_message: json!({"request": {"requestId": "fixed"}}),
            ..ScribeSettings::default()
        };
        let cfg = SessionConfig::resolve(&settings, &creds()).unwrap();
        assert_eq!(cfg.render_start_message("ignored")["request"]["requestId"], "fixed");
    }

    #[test]
    fn live_start_message_has_no_ids() {
        let cfg = SessionConfig::resolve(&ScribeSettings::default(), &creds()).unwrap();
        assert_eq!(cfg.render_start_message("r"), cfg.start_message);
    }

    #[test]
    fn file_dialect_is_rejected() {
        let settings = ScribeSettings {
            dialect: Dialect::LasrFile,
            ..ScribeSettings::default()
        };
        assert_matches!(
            SessionConfig::resolve(&settings, &creds()),
            Err(SettingsError::InvalidValue(m)) if m.contains("lasrFile")
        );
    }

    #[test]
    fn bad_endpoint_is_invalid_value() {
        let settings = ScribeSettings {
            endpoint: Some("not a url".into()),
            ..ScribeSettings::default()
        };
        assert_matches!(
            SessionConfig::resolve(&settings, &creds()),
            Err(SettingsError::InvalidValue(_))
        );
    }

    #[test]
    fn timings_come_from_settings() {
        let mut settings = ScribeSettings::default();
        settings.stream.session_timeout_ms = Some(30_000);
        let cfg = SessionConfig::resolve(&settings, &creds()).unwrap();
        assert_eq!(cfg.chunk_size, 1280);
        assert_eq!(cfg.interval, Duration::from_millis(40));
        assert_eq!(cfg.session_timeout, Some(Duration::from_secs(30)));
    }
}
