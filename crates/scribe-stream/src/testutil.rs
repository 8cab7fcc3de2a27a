//! Scripted transport and connector for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::errors::SessionError;
use crate::transport::{Connector, Frame, Transport};

/// In-memory transport. Inbound frames come from the paired [`Peer`];
/// outbound frames are recorded.
///
/// Like the websocket transport, a send holds the outbound lock for its whole
/// duration and `close` takes it after tripping the shutdown token. With
/// [`ScriptedTransport::stall_sends_after`] a send parks, lock held, until
/// released or closed, which models a peer that stopped reading.
pub(crate) struct ScriptedTransport {
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Frame>>,
    outbound: tokio::sync::Mutex<()>,
    stall_after: AtomicUsize,
    released: CancellationToken,
    sent: Mutex<Vec<Frame>>,
    shutdown: CancellationToken,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    effective_closes: AtomicUsize,
}

/// Remote end of a [`ScriptedTransport`]. Dropping it is an abrupt hangup
/// once the queued frames are consumed.
pub(crate) struct Peer {
    tx: mpsc::UnboundedSender<Frame>,
}

impl Peer {
    pub(crate) fn push(&self, frame: Frame) {
        let _ = self.tx.send(frame);
    }

    pub(crate) fn push_json(&self, value: &Value) {
        self.push(Frame::Text(value.to_string()));
    }
}

impl ScriptedTransport {
    pub(crate) fn new() -> (Self, Peer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            inbound: tokio::sync::Mutex::new(rx),
            outbound: tokio::sync::Mutex::new(()),
            stall_after: AtomicUsize::new(usize::MAX),
            released: CancellationToken::new(),
            sent: Mutex::new(Vec::new()),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            effective_closes: AtomicUsize::new(0),
        };
        (transport, Peer { tx })
    }

    /// Transport whose peer sends `events` and then stays silent.
    pub(crate) fn scripted(events: &[Value]) -> (Arc<Self>, Peer) {
        let (transport, peer) = Self::new();
        for event in events {
            peer.push_json(event);
        }
        (Arc::new(transport), peer)
    }

    /// Park every send once `frames` frames have gone out.
    pub(crate) fn stall_sends_after(&self, frames: usize) {
        self.stall_after.store(frames, Ordering::SeqCst);
    }

    /// Let parked and future sends through.
    pub(crate) fn release_sends(&self) {
        self.released.cancel();
    }

    pub(crate) fn sent(&self) -> Vec<Frame> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn audio_frames(&self) -> usize {
        self.sent()
            .iter()
            .filter(|f| matches!(f, Frame::Binary(b) if !b.is_empty()))
            .count()
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn effective_closes(&self) -> usize {
        self.effective_closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, frame: Frame) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Transport("send on closed transport".into()));
        }
        let _outbound = self.outbound.lock().await;
        let stalled = self.sent.lock().unwrap().len() >= self.stall_after.load(Ordering::SeqCst);
        if stalled {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    return Err(SessionError::Transport("transport closed while sending".into()));
                }
                () = self.released.cancelled() => {}
            }
        }
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn receive(&self) -> Result<Frame, SessionError> {
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => {
                Err(SessionError::Transport("transport closed while receiving".into()))
            }
            next = inbound.recv() => {
                next.ok_or_else(|| SessionError::Transport("connection closed by peer".into()))
            }
        }
    }

    async fn close(&self) {
        let _ = self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.effective_closes.fetch_add(1, Ordering::SeqCst);
        self.shutdown.cancel();
        let _outbound = self.outbound.lock().await;
    }

    async fn closed(&self) {
        self.shutdown.cancelled().await;
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Connector that hands out one prepared transport, or refuses.
pub(crate) struct MockConnector {
    transport: Option<Arc<ScriptedTransport>>,
    urls: Mutex<Vec<Url>>,
}

impl MockConnector {
    pub(crate) fn new(transport: Arc<ScriptedTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport: Some(transport),
            urls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn refusing() -> Arc<Self> {
        Arc::new(Self {
            transport: None,
            urls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn urls(&self) -> Vec<Url> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &Url) -> Result<Arc<dyn Transport>, SessionError> {
        self.urls.lock().unwrap().push(url.clone());
        match &self.transport {
            Some(t) => Ok(t.clone()),
            None => Err(SessionError::Connection("connection refused".into())),
        }
    }
}
