//! Streaming transcription sessions over a duplex websocket.
//!
//! One [`Session`] transcribes one audio source:
//!
//! ```text
//! connect → start message → handshake ack
//!         → feeder (binary chunks, paced)  ┐ same transport,
//!         → collector (JSON events)        ┘ run concurrently
//!         → final result → close
//! ```
//!
//! Vendor status codes are decoded once per dialect by [`DialectProfile`]
//! into [`ProtocolEvent`]. The transport sits behind the [`Transport`] and
//! [`Connector`] traits so sessions can be driven by a scripted peer.
//!
//! ## Crate Position
//!
//! Depends on: scribe-settings.
//! Depended on by: scribe-offline, scribe-batch, scribe-cli.

#![deny(unsafe_code)]

pub mod audio;
pub mod collector;
pub mod config;
pub mod errors;
pub mod feeder;
pub mod protocol;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

pub use audio::{AudioRef, AudioRefError, AudioSource, open_audio, read_audio_bytes};
pub use collector::collect;
pub use config::SessionConfig;
pub use errors::{ErrorKind, ResultExt, SessionError};
pub use feeder::{FeedStats, feed};
pub use protocol::{DialectProfile, EventClass, ProtocolEvent};
pub use session::{Session, SessionState};
pub use transport::{Connector, Frame, Transport, WsConnector, WsTransport};
