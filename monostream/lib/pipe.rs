//! An in-process byte pipe that bridges push-style writers and pull-style readers.
//!
//! The pipe is a bounded channel of byte segments. Each call to [`PipeWriter::write`] copies
//! the caller's buffer into one segment, so the memory held by a pipe is bounded by
//! `capacity` times the largest write. Callers that need a tighter bound cut their buffers into
//! smaller writes. A writer blocks while `capacity` segments are waiting to be read, which lets
//! a slow reader throttle the writer.

use std::{
    cmp, io,
    pin::Pin,
    task::{ready, Context, Poll},
};

use bytes::{Buf, Bytes};
use tokio::{
    io::{AsyncRead, ReadBuf},
    sync::mpsc,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The write half of a [`pipe`].
///
/// Dropping the writer, or calling [`PipeWriter::close`], signals end-of-stream to the reader.
#[derive(Debug)]
pub struct PipeWriter {
    tx: mpsc::Sender<Bytes>,
}

/// The read half of a [`pipe`].
#[derive(Debug)]
pub struct PipeReader {
    rx: mpsc::Receiver<Bytes>,
    pending: Bytes,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates a pipe that buffers at most `capacity` written segments.
///
/// A `capacity` of zero is treated as one.
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(cmp::max(capacity, 1));
    (
        PipeWriter { tx },
        PipeReader {
            rx,
            pending: Bytes::new(),
        },
    )
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PipeWriter {
    /// Writes all of `buf` into the pipe, waiting for room if the pipe is full.
    ///
    /// Fails with [`io::ErrorKind::BrokenPipe`] once the reader has been dropped.
    pub async fn write(&self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        self.tx
            .send(Bytes::copy_from_slice(buf))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader closed"))?;

        Ok(buf.len())
    }

    /// Returns `true` if the reader has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Closes the pipe, signalling end-of-stream to the reader.
    pub fn close(self) {}
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl AsyncRead for PipeReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        while this.pending.is_empty() {
            match ready!(this.rx.poll_recv(cx)) {
                Some(segment) => this.pending = segment,
                // Every writer is gone: end-of-stream.
                None => return Poll::Ready(Ok(())),
            }
        }

        let n = cmp::min(this.pending.len(), buf.remaining());
        buf.put_slice(&this.pending[..n]);
        this.pending.advance(n);

        Poll::Ready(Ok(()))
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncReadExt;

    use super::*;

    #[test_log::test(tokio::test)]
    async fn test_pipe_reads_what_was_written() -> anyhow::Result<()> {
        let (writer, mut reader) = pipe(4);

        let handle = tokio::spawn(async move {
            writer.write(b"hello ").await?;
            writer.write(b"").await?;
            writer.write(b"world").await?;
            writer.close();
            Ok::<_, io::Error>(())
        });

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await?;
        handle.await??;

        assert_eq!(out, b"hello world");
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_pipe_partial_reads_keep_remainder() -> anyhow::Result<()> {
        let (writer, mut reader) = pipe(1);
        writer.write(b"ABCDEFG").await?;
        drop(writer);

        let mut buf = [0u8; 3];
        let n = reader.read(&mut buf).await?;
        assert_eq!(&buf[..n], b"ABC");

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await?;
        assert_eq!(rest, b"DEFG");
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_pipe_write_blocks_when_full() -> anyhow::Result<()> {
        let (writer, mut reader) = pipe(1);
        writer.write(b"first").await?;

        let blocked = tokio::time::timeout(Duration::from_millis(50), writer.write(b"second")).await;
        assert!(blocked.is_err(), "second write should wait for the reader");

        let mut buf = [0u8; 5];
        reader.read_exact(&mut buf).await?;
        assert_eq!(&buf, b"first");

        writer.write(b"second").await?;
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_pipe_write_fails_after_reader_dropped() {
        let (writer, reader) = pipe(2);
        drop(reader);

        assert!(writer.is_closed());
        let err = writer.write(b"data").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
