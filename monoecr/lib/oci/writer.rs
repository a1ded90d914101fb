use async_trait::async_trait;
use oci_spec::image::Digest;

use crate::{status::Status, EcrError, EcrResult, WriterOperation};

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A streaming sink for one piece of content being pushed to a registry.
///
/// Callers write the content in buffers of any size and then [`commit`](ContentWriter::commit)
/// it. Nothing is visible on the remote until the commit succeeds.
#[async_trait]
pub trait ContentWriter: Send {
    /// Writes all of `buf`, returning the number of bytes accepted.
    async fn write(&mut self, buf: &[u8]) -> EcrResult<usize>;

    /// Finishes the content and verifies it against `expected`.
    ///
    /// A `size` of zero skips the size check.
    async fn commit(&mut self, size: u64, expected: &Digest) -> EcrResult<()>;

    /// A snapshot of the transfer's progress.
    fn status(&self) -> EcrResult<Status>;

    /// The digest of the content being written.
    fn digest(&self) -> &Digest;

    /// Closes the writer without committing.
    async fn close(&mut self) -> EcrResult<()> {
        Err(EcrError::Unimplemented(WriterOperation::Close))
    }

    /// Discards everything written after `size` bytes.
    async fn truncate(&mut self, _size: u64) -> EcrResult<()> {
        Err(EcrError::Unimplemented(WriterOperation::Truncate))
    }
}
