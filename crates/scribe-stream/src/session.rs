//! Session orchestrator.
//!
//! ```text
//! Idle -> Handshaking -> Streaming -> Finalizing -> Completed
//!              |             |
//!              +-------------+----------> Failed
//! ```
//!
//! A session connects, sends the start message, waits for the handshake
//! reply (when the dialect has one), then runs the feeder and the collector
//! concurrently on the same transport. Both must finish cleanly for the
//! session to complete. Every exit path that opened a transport closes it.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::collector::collect;
use crate::config::SessionConfig;
use crate::errors::SessionError;
use crate::feeder::feed;
use crate::transport::{Connector, Frame, Transport};

/// Lifecycle of one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet connected.
    Idle,
    /// Connecting and waiting for the start message to be accepted.
    Handshaking,
    /// Audio going out, events coming in.
    Streaming,
    /// Both sub-operations finished cleanly.
    Finalizing,
    /// Transcript produced.
    Completed,
    /// Terminated with an error.
    Failed,
}

impl SessionState {
    /// Whether the session has ended.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Lowercase label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Handshaking => "handshaking",
            Self::Streaming => "streaming",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One streaming transcription attempt for one task.
pub struct Session {
    key: String,
    config: Arc<SessionConfig>,
    connector: Arc<dyn Connector>,
    cancel: CancellationToken,
    state: SessionState,
    history: Vec<SessionState>,
}

impl Session {
    /// New idle session for task `key`.
    pub fn new(key: impl Into<String>, config: Arc<SessionConfig>, connector: Arc<dyn Connector>) -> Self {
        Self {
            key: key.into(),
            config,
            connector,
            cancel: CancellationToken::new(),
            state: SessionState::Idle,
            history: vec![SessionState::Idle],
        }
    }

    /// Cancel the session when `token` fires.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Task key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    /// Run the session to a terminal state and return the transcript.
    ///
    /// Cancellation and the optional session timeout apply to connecting
    /// and streaming alike.
    #[instrument(skip_all, fields(key = %self.key, dialect = %self.config.dialect))]
    pub async fn run<R>(&mut self, source: &mut R) -> Result<String, SessionError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        if self.state != SessionState::Idle {
            return Err(SessionError::Transport(format!(
                "session already ran (state {})",
                self.state
            )));
        }
        let started = Instant::now();
        let deadline = self.config.session_timeout.map(|t| started + t);
        let cancel = self.cancel.clone();

        self.transition(SessionState::Handshaking);
        let connector = Arc::clone(&self.connector);
        let connected = guard(&cancel, deadline, connector.connect(&self.config.url)).await;
        let transport = match connected {
            Ok(transport) => transport,
            Err(e) => {
                self.transition(SessionState::Failed);
                warn!(error = %e, "session failed before connecting");
                return Err(e);
            }
        };

        let result = guard(&cancel, deadline, self.drive(transport.as_ref(), source)).await;
        transport.close().await;

        match &result {
            Ok(text) => {
                self.transition(SessionState::Completed);
                info!(
                    chars = text.chars().count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "session completed"
                );
            }
            Err(e) => {
                self.transition(SessionState::Failed);
                warn!(error = %e, kind = %e.kind(), "session failed");
            }
        }
        result
    }

    async fn drive<R>(&mut self, transport: &dyn Transport, source: &mut R) -> Result<String, SessionError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let request_id = Uuid::now_v7().to_string();
        let start = self.config.render_start_message(&request_id);
        transport.send(Frame::Text(start.to_string())).await?;
        debug!(request_id = %request_id, "start message sent");

        self.await_handshake(transport).await?;
        self.transition(SessionState::Streaming);

        let text = self.stream_both(transport, source).await?;
        self.transition(SessionState::Finalizing);
        Ok(text)
    }

    async fn await_handshake(&self, transport: &dyn Transport) -> Result<(), SessionError> {
        let profile = self.config.profile;
        if profile.handshake_ack.is_none() {
            return Ok(());
        }
        let limit = self.config.handshake_timeout;
        let reply = tokio::time::timeout(limit, transport.receive())
            .await
            .map_err(|_| {
                SessionError::Handshake(format!("no acknowledgment within {}ms", limit.as_millis()))
            })?
            .map_err(|e| SessionError::Handshake(format!("connection lost awaiting acknowledgment: {e}")))?;
        match reply {
            Frame::Text(raw) => {
                profile.check_handshake(&raw)?;
                debug!("handshake acknowledged");
                Ok(())
            }
            other => Err(SessionError::Handshake(format!("unexpected reply {other:?}"))),
        }
    }

    /// Feed and collect concurrently; both have to finish cleanly.
    ///
    /// Whichever finishes first, the other is still awaited, for at most
    /// `result_timeout`. When one fails the transport is closed while the
    /// other is polled, so a send or receive parked on the socket sees the
    /// close; the survivor gets at most `drain_timeout` to wind down.
    async fn stream_both<R>(&self, transport: &dyn Transport, source: &mut R) -> Result<String, SessionError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let cfg = &self.config;
        let feeding = feed(transport, source, cfg.chunk_size, cfg.interval);
        let collecting = collect(transport, cfg.profile);
        tokio::pin!(feeding, collecting);

        tokio::select! {
            fed = &mut feeding => match fed {
                Ok(stats) => {
                    debug!(frames = stats.frames, bytes = stats.bytes, "audio fully sent, awaiting final result");
                    tokio::time::timeout(cfg.result_timeout, &mut collecting)
                        .await
                        .unwrap_or_else(|_| {
                            Err(SessionError::Timeout(format!(
                                "no final result within {}ms after end of audio",
                                cfg.result_timeout.as_millis()
                            )))
                        })
                }
                Err(e) => {
                    let ((), ()) = tokio::join!(
                        transport.close(),
                        drain("collector", cfg.drain_timeout, &mut collecting),
                    );
                    Err(e)
                }
            },
            collected = &mut collecting => match collected {
                Ok(text) => {
                    debug!("final result received before end of audio");
                    let stats = tokio::time::timeout(cfg.result_timeout, &mut feeding)
                        .await
                        .map_err(|_| {
                            SessionError::Timeout(format!(
                                "audio not fully sent within {}ms after the final result",
                                cfg.result_timeout.as_millis()
                            ))
                        })??;
                    debug!(frames = stats.frames, bytes = stats.bytes, "audio fully sent");
                    Ok(text)
                }
                Err(e) => {
                    let ((), ()) = tokio::join!(
                        transport.close(),
                        drain("feeder", cfg.drain_timeout, &mut feeding),
                    );
                    Err(e)
                }
            },
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "session state");
        self.state = next;
        self.history.push(next);
    }
}

/// Run `op` unless cancellation or the deadline comes first.
async fn guard<T, F>(cancel: &CancellationToken, deadline: Option<Instant>, op: F) -> Result<T, SessionError>
where
    F: Future<Output = Result<T, SessionError>>,
{
    let expiry = async move {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(SessionError::Cancelled),
        () = expiry => Err(SessionError::Timeout("session deadline exceeded".into())),
        result = op => result,
    }
}

/// Give a sub-operation whose sibling failed a bounded time to stop.
async fn drain<T, F>(what: &'static str, limit: Duration, op: F)
where
    F: Future<Output = Result<T, SessionError>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(Ok(_)) => debug!(op = what, "finished after sibling failure"),
        Ok(Err(e)) => debug!(op = what, error = %e, "stopped after sibling failure"),
        Err(_) => warn!(op = what, limit_ms = limit.as_millis() as u64, "did not stop in time, abandoning"),
    }
}
