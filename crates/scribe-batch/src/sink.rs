//! Output sink. Owned by a single writer task, so records never interleave.

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::result::BatchResult;

/// Destination for completed results.
#[async_trait]
pub trait ResultSink: Send {
    /// Durably append one record.
    async fn write(&mut self, result: &BatchResult) -> std::io::Result<()>;
}

/// Line-oriented sink. Flushes after every record.
pub struct TsvSink<W> {
    inner: W,
    written: u64,
}

impl<W> TsvSink<W> {
    /// Wrap a writer.
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Records written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[async_trait]
impl<W> ResultSink for TsvSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, result: &BatchResult) -> std::io::Result<()> {
        let mut line = result.to_line();
        line.push('\n');
        self.inner.write_all(line.as_bytes()).await?;
        self.inner.flush().await?;
        self.written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_stream::ErrorKind;

    #[tokio::test]
    async fn writes_one_line_per_record() {
        let mut sink = TsvSink::new(Vec::new());
        sink.write(&BatchResult::success("a", "hi")).await.unwrap();
        sink.write(&BatchResult::failure("b", ErrorKind::Timeout, "slow")).await.unwrap();
        assert_eq!(sink.written(), 2);
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "a\thi\nb\t\ttimeout: slow\n");
    }

    #[tokio::test]
    async fn file_sink_is_flushed_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let file = tokio::fs::File::create(&path).await.unwrap();
        let mut sink = TsvSink::new(file);

        sink.write(&BatchResult::success("a", "x")).await.unwrap();
        // Visible without dropping the sink.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\tx\n");
    }
}
