//! Vendor dialects and their compiled-in request presets.
//!
//! Each dialect is a different service behind the same account. They share
//! credentials but differ in endpoint, query parameters, and the JSON start
//! message sent as the first frame of a streaming session.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::errors::SettingsError;

/// Which vendor service a run talks to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dialect {
    /// Long-audio realtime transcription over a websocket (`errno` status codes).
    #[default]
    LasrLive,
    /// Short-utterance realtime recognition over a websocket (`eof` status codes).
    DuiRealtime,
    /// Offline long-audio transcription: upload, create a job, poll, fetch.
    LasrFile,
}

impl Dialect {
    /// All dialects, in declaration order.
    pub const ALL: [Dialect; 3] = [Dialect::LasrLive, Dialect::DuiRealtime, Dialect::LasrFile];

    /// Canonical (camelCase) name used in settings files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LasrLive => "lasrLive",
            Self::DuiRealtime => "duiRealtime",
            Self::LasrFile => "lasrFile",
        }
    }

    /// Whether sessions of this dialect run over a duplex websocket.
    pub fn is_streaming(self) -> bool {
        !matches!(self, Self::LasrFile)
    }

    /// Default service endpoint.
    pub fn default_endpoint(self) -> &'static str {
        match self {
            Self::LasrLive => "wss://lasr.duiopen.com/live/ws2",
            Self::DuiRealtime => "wss://asr.dui.ai/runtime/v2/recognize",
            Self::LasrFile => "http://lasr.duiopen.com/lasr-file-api/v2",
        }
    }

    /// Query parameter names carrying the account id and secret.
    pub fn credential_keys(self) -> (&'static str, &'static str) {
        match self {
            Self::LasrLive | Self::DuiRealtime => ("productId", "apikey"),
            Self::LasrFile => ("productId", "apiKey"),
        }
    }

    /// Default connection-level query parameters (credentials excluded).
    ///
    /// Keys listed here are the ones the service documents; overrides for
    /// other keys are still forwarded but logged.
    pub fn default_query(self) -> BTreeMap<String, String> {
        let pairs: &[(&str, &str)] = match self {
            Self::LasrLive => &[
                ("deviceId", ""),
                ("forward_addresses", ""),
                ("res", "aitranson"),
                ("lang", "cn"),
                ("product_source", "dui"),
            ],
            Self::DuiRealtime => &[("res", "aiuniversal"), ("lang", "zh-CN")],
            Self::LasrFile => &[],
        };
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    /// Default JSON start message. `Value::Null` for non-streaming dialects.
    pub fn default_start_message(self) -> Value {
        match self {
            Self::LasrLive => json!({
                "command": "start",
                "params": {
                    "env": {
                        "use_txt_smooth": 1,
                        "use_tprocess": 1,
                        "use_sensitive_wds_norm": 0,
                        "use_stream_sp": 0,
                        "use_alignment": 0,
                        "use_nn_emotion": 1,
                        "use_confidence": 0,
                        "use_word_confi": 0,
                        "use_volume_detection": 1
                    },
                    "audio": {
                        "audioType": "wav",
                        "sampleRate": 16000,
                        "sampleBytes": 2,
                        "channel": 1
                    }
                },
                "lmId": "default"
            }),
            Self::DuiRealtime => json!({
                "context": {
                    "productId": ""
                },
                "request": {
                    "requestId": "",
                    "audio": {
                        "audioType": "wav",
                        "sampleRate": 16000,
                        "channel": 1,
                        "sampleBytes": 2
                    },
                    "asr": {
                        "enableRealTimeFeedback": true,
                        "enableVAD": true,
                        "enableTone": false,
                        "enablePunctuation": true,
                        "enableNumberConvert": true,
                        "enableConfidence": true,
                        "enableSNTime": true
                    }
                }
            }),
            Self::LasrFile => Value::Null,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = SettingsError;

    /// Accepts the camelCase name as well as kebab/snake spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().to_lowercase() == folded)
            .ok_or_else(|| SettingsError::InvalidValue(format!("unknown dialect: {s}")))
    }
}
