//! `monostream` is a library for moving arbitrarily large byte streams through bounded,
//! backpressured chunk pipelines.
//!
//! # Overview
//!
//! - [`Chunk`] is one fixed-size part of a stream, tagged with its part number and byte range.
//! - [`ChunkedProcessor`] reads a stream into chunks on a background task and drives a
//!   sequential callback over them on the calling task, with a bounded number of chunks read
//!   ahead.
//! - [`pipe`] bridges code that pushes bytes (`write`) into code that pulls them
//!   ([`AsyncRead`](tokio::io::AsyncRead)).
//!
//! # Usage Example
//!
//! ```rust
//! use monostream::{pipe, ChunkedProcessor, StreamError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), StreamError> {
//!     let (writer, reader) = pipe(8);
//!
//!     let upload = tokio::spawn(async move {
//!         ChunkedProcessor::new(4, 2)?
//!             .process(reader, |chunk| async move {
//!                 println!("part {} covers bytes {}-{}", chunk.part(), chunk.byte_range_begin(), chunk.byte_range_end());
//!                 Ok::<_, StreamError>(())
//!             })
//!             .await
//!     });
//!
//!     writer.write(b"hello, chunked world").await?;
//!     writer.close();
//!
//!     let summary = upload.await??;
//!     assert_eq!(summary.bytes(), 20);
//!     assert_eq!(summary.parts(), 5);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod chunk;
mod error;
mod pipe;
mod processor;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use chunk::*;
pub use error::*;
pub use pipe::*;
pub use processor::*;
