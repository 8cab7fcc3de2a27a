//! Audio references and byte sources.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use tokio::io::AsyncRead;
use tracing::debug;
use url::Url;

use crate::errors::{ResultExt, SessionError};

/// Async byte source handed to the feeder.
pub type AudioSource = Box<dyn AsyncRead + Send + Unpin>;

/// Where a task's audio lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AudioRef {
    /// Local file.
    Path(PathBuf),
    /// Remote `http(s)` resource, downloaded before streaming.
    Url(Url),
}

/// Reference that cannot name an audio source.
#[derive(Debug, thiserror::Error)]
pub enum AudioRefError {
    /// Empty reference.
    #[error("empty audio reference")]
    Empty,
    /// URL with a scheme other than `http`, `https` or `file`.
    #[error("unsupported audio scheme '{0}'")]
    UnsupportedScheme(String),
    /// URL that does not parse.
    #[error("invalid audio url '{url}': {reason}")]
    InvalidUrl {
        /// The reference as given.
        url: String,
        /// Parser message.
        reason: String,
    },
}

impl AudioRef {
    /// Parse a batch-line reference. Anything without a `scheme://` prefix is a path.
    pub fn parse(raw: &str) -> Result<Self, AudioRefError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AudioRefError::Empty);
        }
        if !raw.contains("://") {
            return Ok(Self::Path(PathBuf::from(raw)));
        }
        let url = Url::parse(raw).map_err(|e| AudioRefError::InvalidUrl {
            url: raw.to_owned(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => Ok(Self::Url(url)),
            "file" => url
                .to_file_path()
                .map(Self::Path)
                .map_err(|()| AudioRefError::InvalidUrl {
                    url: raw.to_owned(),
                    reason: "not a local file path".into(),
                }),
            other => Err(AudioRefError::UnsupportedScheme(other.to_owned())),
        }
    }

    /// Lowercased file extension, used as the declared audio type. Defaults to `wav`.
    pub fn extension(&self) -> String {
        let ext = match self {
            Self::Path(p) => p.extension().and_then(|e| e.to_str()).map(str::to_owned),
            Self::Url(u) => u
                .path_segments()
                .and_then(|mut s| s.next_back())
                .and_then(|last| Path::new(last).extension())
                .and_then(|e| e.to_str())
                .map(str::to_owned),
        };
        ext.filter(|e| !e.is_empty())
            .map_or_else(|| "wav".to_owned(), |e| e.to_ascii_lowercase())
    }
}

impl fmt::Display for AudioRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => write!(f, "{}", p.display()),
            Self::Url(u) => f.write_str(u.as_str()),
        }
    }
}

/// Open `audio` for streaming. Remote audio is downloaded fully first.
pub async fn open_audio(audio: &AudioRef, http: &reqwest::Client) -> Result<AudioSource, SessionError> {
    match audio {
        AudioRef::Path(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .audio_source(&format!("open {}", path.display()))?;
            Ok(Box::new(file))
        }
        AudioRef::Url(_) => {
            let bytes = read_audio_bytes(audio, http).await?;
            Ok(Box::new(Cursor::new(bytes)))
        }
    }
}

/// Read the whole of `audio` into memory.
pub async fn read_audio_bytes(audio: &AudioRef, http: &reqwest::Client) -> Result<Vec<u8>, SessionError> {
    match audio {
        AudioRef::Path(path) => tokio::fs::read(path)
            .await
            .audio_source(&format!("read {}", path.display())),
        AudioRef::Url(url) => {
            let response = http
                .get(url.clone())
                .send()
                .await
                .audio_source(&format!("fetch {url}"))?
                .error_for_status()
                .audio_source(&format!("fetch {url}"))?;
            let bytes = response.bytes().await.audio_source(&format!("download {url}"))?;
            debug!(%url, len = bytes.len(), "downloaded remote audio");
            Ok(bytes.to_vec())
        }
    }
}
