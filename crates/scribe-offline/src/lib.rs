//! Offline (polling upload) transcription.
//!
//! ```text
//! POST /audio            → audio_id
//! POST /audio/{id}/slice/{i}   (multipart, one per slice)
//! POST /task             → task_id
//! GET  /task/{id}/progress     (poll until 100)
//! GET  /task/{id}/result → onebest segments
//! ```
//!
//! Failures map onto the same [`scribe_stream::SessionError`] kinds as
//! streaming sessions so batch output stays uniform.
//!
//! ## Crate Position
//!
//! Depends on: scribe-settings, scribe-stream.
//! Depended on by: scribe-batch.

#![deny(unsafe_code)]

pub mod client;
mod response;

pub use client::OfflineClient;
