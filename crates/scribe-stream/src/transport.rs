//! Session transport: one persistent duplex connection per session.
//!
//! [`Transport`] takes `&self` for every operation so the audio feeder and
//! the result collector can drive the same connection concurrently: the
//! outbound and inbound halves sit behind separate locks.
//!
//! Closing is idempotent. It trips a cancellation token first, so a sender
//! or receiver parked on the socket wakes up with [`SessionError::Transport`]
//! instead of hanging.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::errors::{ResultExt, SessionError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `close` waits for the close handshake to flush.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// A single message on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// Structured control/event message (JSON).
    Text(String),
    /// Raw audio bytes.
    Binary(Vec<u8>),
    /// The peer closed the connection, with its reason if one was given.
    Close(Option<String>),
}

impl Frame {
    /// The empty binary frame that marks end of audio.
    pub fn terminator() -> Self {
        Self::Binary(Vec::new())
    }

    /// Whether this is the end-of-audio marker.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Self::Binary(b) if b.is_empty())
    }
}

/// Ordered, reliable message transport for one session.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one frame. Fails once the transport is closed.
    async fn send(&self, frame: Frame) -> Result<(), SessionError>;

    /// Receive the next frame. Fails on abrupt close or local `close`.
    async fn receive(&self) -> Result<Frame, SessionError>;

    /// Close the connection. Idempotent and safe after errors.
    async fn close(&self);

    /// Resolves once `close` has been called.
    async fn closed(&self);

    /// Whether `close` has been called.
    fn is_closed(&self) -> bool;
}

/// Opens transports. Injected into sessions so tests can script the peer.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to `url`.
    async fn connect(&self, url: &Url) -> Result<Arc<dyn Transport>, SessionError>;
}

/// Websocket connector backed by `tokio-tungstenite`.
#[derive(Clone, Debug)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    /// Connector with the given connect timeout.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Arc<dyn Transport>, SessionError> {
        let (ws, response) = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| {
                SessionError::Connection(format!(
                    "no connection within {}ms",
                    self.connect_timeout.as_millis()
                ))
            })?
            .connection("websocket connect")?;
        debug!(host = url.host_str().unwrap_or_default(), status = %response.status(), "websocket connected");
        Ok(Arc::new(WsTransport::new(ws)))
    }
}

/// Websocket transport. Sink and stream halves are locked independently.
pub struct WsTransport {
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    shutdown: CancellationToken,
    closed: AtomicBool,
}

impl WsTransport {
    fn new(ws: WsStream) -> Self {
        let (sink, stream) = ws.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, frame: Frame) -> Result<(), SessionError> {
        let msg = match frame {
            Frame::Text(text) => Message::text(text),
            Frame::Binary(bytes) => Message::binary(bytes),
            Frame::Close(_) => Message::Close(None),
        };
        if self.is_closed() {
            return Err(SessionError::Transport("send on closed transport".into()));
        }
        let mut sink = self.sink.lock().await;
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => {
                Err(SessionError::Transport("transport closed while sending".into()))
            }
            sent = sink.send(msg) => sent.transport("websocket send"),
        }
    }

    async fn receive(&self) -> Result<Frame, SessionError> {
        let mut stream = self.stream.lock().await;
        loop {
            let next = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    return Err(SessionError::Transport("transport closed while receiving".into()));
                }
                next = stream.next() => next,
            };
            match next {
                None => {
                    return Err(SessionError::Transport("connection closed by peer".into()));
                }
                Some(Err(e)) => return Err(SessionError::Transport(format!("websocket receive: {e}"))),
                Some(Ok(Message::Text(text))) => return Ok(Frame::Text(text.as_str().to_owned())),
                Some(Ok(Message::Binary(bytes))) => return Ok(Frame::Binary(bytes.to_vec())),
                Some(Ok(Message::Close(frame))) => {
                    return Ok(Frame::Close(frame.map(|f| f.reason.as_str().to_owned())));
                }
                // Control frames are answered by tungstenite itself.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
            }
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.cancel();
        // A sender parked on a full socket holds the sink until it observes
        // the cancellation, so the lock wait shares the grace period.
        let closing = async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        };
        match tokio::time::timeout(CLOSE_GRACE, closing).await {
            Ok(Ok(())) => debug!("websocket closed"),
            Ok(Err(e)) => debug!(error = %e, "websocket close after failure"),
            Err(_) => warn!("websocket close handshake timed out"),
        }
    }

    async fn closed(&self) {
        self.shutdown.cancelled().await;
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
