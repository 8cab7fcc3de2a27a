//! Audio feeder: fixed-size binary frames at a real-time pace.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

use crate::errors::{ResultExt, SessionError};
use crate::transport::{Frame, Transport};

/// What a completed feed sent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Non-empty data frames sent.
    pub frames: u64,
    /// Audio bytes sent across data frames.
    pub bytes: u64,
}

/// Stream `source` over `transport`.
///
/// Each data frame holds exactly `chunk_size` bytes except possibly the
/// last. After every data frame the feeder sleeps for `interval`; a
/// transport close during that sleep ends feeding with a transport error.
/// End of source sends one empty terminator frame. The transport is never
/// closed here.
pub async fn feed<R>(
    transport: &dyn Transport,
    source: &mut R,
    chunk_size: usize,
    interval: Duration,
) -> Result<FeedStats, SessionError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let chunk_size = chunk_size.max(1);
    let mut stats = FeedStats::default();
    let mut buf = vec![0u8; chunk_size];

    loop {
        let n = read_chunk(source, &mut buf).await?;
        if n == 0 {
            break;
        }
        transport.send(Frame::Binary(buf[..n].to_vec())).await?;
        stats.frames += 1;
        stats.bytes += n as u64;
        trace!(frame = stats.frames, len = n, "audio frame sent");

        if !interval.is_zero() {
            tokio::select! {
                biased;
                () = transport.closed() => {
                    return Err(SessionError::Transport("transport closed while pacing audio".into()));
                }
                () = tokio::time::sleep(interval) => {}
            }
        }
    }

    transport.send(Frame::terminator()).await?;
    debug!(frames = stats.frames, bytes = stats.bytes, "audio terminator sent");
    Ok(stats)
}

/// Fill `buf` unless the source ends first. Returns bytes read.
async fn read_chunk<R>(source: &mut R, buf: &mut [u8]) -> Result<usize, SessionError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..]).await.audio_source("read audio")?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
