//! Chunked, backpressured processing of arbitrarily large byte streams.
//!
//! A [`ChunkedProcessor`] splits a reader into fixed-size [`Chunk`]s on a background task and
//! hands them, one at a time and in order, to a caller-supplied callback running on the
//! calling task. The two tasks are connected by a bounded queue, so a slow callback (typically
//! a network call) throttles how far ahead the reader may run.

use std::{cmp, future::Future, time::Instant};

use bytes::Bytes;
use getset::CopyGetters;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    sync::mpsc,
};
use tokio_util::{sync::CancellationToken, task::AbortOnDropHandle};

use crate::{Chunk, StreamError, StreamResult, FIRST_PART};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Splits a byte stream into chunks and drives a callback over them sequentially.
///
/// ## Guarantees
///
/// - The callback is invoked exactly once per chunk, in increasing part order, and never
///   concurrently with itself.
/// - At most `queue_size` chunks are read ahead of the callback. The reader reserves a queue
///   slot before it reads the next chunk, so the bound holds for chunks in memory, not only for
///   chunks in the queue.
/// - The first error wins. A read error or a callback error ends the transfer, no further
///   chunks are delivered and that error is returned.
/// - When [`process`](ChunkedProcessor::process) returns, the reading task has stopped and every
///   chunk it produced has been released. If the `process` future is dropped instead, the
///   reading task is aborted.
#[derive(Debug, Clone, CopyGetters)]
pub struct ChunkedProcessor {
    /// The maximum number of bytes in a chunk. Every chunk except the last is exactly this size.
    #[getset(get_copy = "pub")]
    chunk_size: usize,

    /// The maximum number of chunks read ahead of the callback.
    #[getset(get_copy = "pub")]
    queue_size: usize,

    /// Cancels the transfer from outside.
    cancel: CancellationToken,
}

/// The outcome of a successful transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct TransferSummary {
    /// The total number of bytes handed to the callback.
    bytes: u64,

    /// The number of chunks handed to the callback.
    parts: u64,
}

/// The state shared by the consuming side of one transfer.
struct Session {
    rx: mpsc::Receiver<Chunk>,
    producer: AbortOnDropHandle<StreamResult<()>>,
    producer_done: bool,
    cancel: CancellationToken,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ChunkedProcessor {
    /// Creates a processor that reads chunks of `chunk_size` bytes and buffers at most
    /// `queue_size` of them ahead of the callback.
    ///
    /// A `queue_size` of zero is treated as one: each chunk is handed over before the next one is
    /// read.
    pub fn new(chunk_size: usize, queue_size: usize) -> StreamResult<Self> {
        if chunk_size == 0 {
            return Err(StreamError::InvalidChunkSize);
        }

        Ok(Self {
            chunk_size,
            queue_size: cmp::max(queue_size, 1),
            cancel: CancellationToken::new(),
        })
    }

    /// Ties the processor to a caller's cancellation token.
    ///
    /// Cancelling `token` stops the reader, abandons an in-flight callback and makes
    /// [`process`](ChunkedProcessor::process) return [`StreamError::Cancelled`].
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Reads `reader` to the end in chunks and invokes `callback` on each of them.
    ///
    /// Errors returned by `callback` are passed through unchanged. Errors raised by the
    /// processor itself are converted from [`StreamError`].
    pub async fn process<R, F, Fut, E>(
        &self,
        reader: R,
        mut callback: F,
    ) -> Result<TransferSummary, E>
    where
        R: AsyncRead + Unpin + Send + 'static,
        F: FnMut(Chunk) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: From<StreamError>,
    {
        // A child token lets this transfer stop its reader without cancelling the caller.
        let cancel = self.cancel.child_token();
        let (tx, rx) = mpsc::channel(self.queue_size);
        let producer = tokio::spawn(read_into_chunks(
            reader,
            self.chunk_size,
            tx,
            cancel.clone(),
        ));

        let mut session = Session {
            rx,
            producer: AbortOnDropHandle::new(producer),
            producer_done: false,
            cancel,
        };

        let result = session.process_chunks(&mut callback).await;
        session.shutdown().await;

        result
    }
}

impl TransferSummary {
    /// The inclusive offset of the last byte transferred, or `None` if nothing was transferred.
    pub fn last_byte(&self) -> Option<u64> {
        self.bytes.checked_sub(1)
    }

    fn record(&mut self, chunk_len: usize) {
        self.bytes += chunk_len as u64;
        self.parts += 1;
    }
}

impl Session {
    /// Hands queued chunks to `callback` until the stream ends or something fails.
    async fn process_chunks<F, Fut, E>(&mut self, callback: &mut F) -> Result<TransferSummary, E>
    where
        F: FnMut(Chunk) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: From<StreamError>,
    {
        let mut summary = TransferSummary::default();

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    return Err(StreamError::Cancelled.into());
                }
                result = &mut self.producer, if !self.producer_done => {
                    self.producer_done = true;
                    result.map_err(StreamError::from)??;
                }
                chunk = self.rx.recv() => {
                    let Some(chunk) = chunk else {
                        break;
                    };

                    let len = chunk.len();
                    tracing::trace!(
                        part = chunk.part(),
                        begin = chunk.byte_range_begin(),
                        end = chunk.byte_range_end(),
                        "processing chunk"
                    );

                    tokio::select! {
                        biased;

                        result = callback(chunk) => result?,
                        _ = self.cancel.cancelled() => {
                            return Err(StreamError::Cancelled.into());
                        }
                    }

                    summary.record(len);
                }
            }
        }

        // The queue closes as the reader returns, but its result may not have been collected yet.
        if !self.producer_done {
            self.producer_done = true;
            (&mut self.producer).await.map_err(StreamError::from)??;
        }

        Ok(summary)
    }

    /// Stops the reader and releases every chunk it produced.
    ///
    /// Runs on every exit path of a transfer. Once it returns the reading task has finished.
    async fn shutdown(mut self) {
        self.cancel.cancel();
        self.rx.close();

        let mut discarded = 0usize;
        while self.rx.recv().await.is_some() {
            discarded += 1;
        }

        if discarded > 0 {
            tracing::debug!(discarded, "discarded unprocessed chunks");
        }

        if !self.producer_done {
            let _ = (&mut self.producer).await;
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Reads `reader` in chunks of `chunk_size` bytes and invokes `callback` on each of them, with
/// at most `queue_size` chunks read ahead.
///
/// This is a shorthand for [`ChunkedProcessor::new`] followed by
/// [`ChunkedProcessor::process`].
///
/// ## Example
///
/// ```rust
/// use monostream::{chunked_processor, StreamError};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), StreamError> {
/// let mut parts = Vec::new();
/// let summary = chunked_processor(&b"ABCDEFG"[..], 3, 2, |chunk| {
///     parts.push(chunk.bytes().clone());
///     async { Ok::<_, StreamError>(()) }
/// })
/// .await?;
///
/// assert_eq!(parts, ["ABC", "DEF", "G"]);
/// assert_eq!(summary.bytes(), 7);
/// assert_eq!(summary.last_byte(), Some(6));
/// # Ok(())
/// # }
/// ```
pub async fn chunked_processor<R, F, Fut, E>(
    reader: R,
    chunk_size: usize,
    queue_size: usize,
    callback: F,
) -> Result<TransferSummary, E>
where
    R: AsyncRead + Unpin + Send + 'static,
    F: FnMut(Chunk) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: From<StreamError>,
{
    ChunkedProcessor::new(chunk_size, queue_size)?
        .process(reader, callback)
        .await
}

/// The reading side of a transfer.
///
/// Each iteration first reserves a queue slot, then reads the chunk that will fill it. Returns
/// when the stream is exhausted, the queue is closed, a read fails or `cancel` fires.
async fn read_into_chunks<R>(
    mut reader: R,
    chunk_size: usize,
    tx: mpsc::Sender<Chunk>,
    cancel: CancellationToken,
) -> StreamResult<()>
where
    R: AsyncRead + Unpin,
{
    let mut begin = 0u64;
    let mut part = FIRST_PART;

    loop {
        let permit = tokio::select! {
            _ = cancel.cancelled() => return Err(StreamError::Cancelled),
            permit = tx.reserve() => match permit {
                Ok(permit) => permit,
                // The consumer has stopped listening.
                Err(_) => return Ok(()),
            },
        };

        let chunk = tokio::select! {
            _ = cancel.cancelled() => return Err(StreamError::Cancelled),
            chunk = read_chunk(&mut reader, chunk_size, begin, part) => chunk?,
        };

        let Some(chunk) = chunk else {
            return Ok(());
        };

        let short = chunk.len() < chunk_size;
        begin = chunk.byte_range_end() + 1;
        part += 1;
        permit.send(chunk);

        if short {
            return Ok(());
        }
    }
}

/// Reads up to `chunk_size` bytes into a fresh buffer.
///
/// Returns `None` at end-of-stream. A chunk shorter than `chunk_size` means the stream ended
/// while it was being read.
async fn read_chunk<R>(
    reader: &mut R,
    chunk_size: usize,
    begin: u64,
    part: u64,
) -> StreamResult<Option<Chunk>>
where
    R: AsyncRead + Unpin,
{
    let started = Instant::now();
    let mut buf = Vec::with_capacity(chunk_size);
    reader
        .take(chunk_size as u64)
        .read_to_end(&mut buf)
        .await?;

    Ok(Chunk::new(part, begin, Bytes::from(buf), started.elapsed()))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
