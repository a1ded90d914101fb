//! Streams a layer into a registry as a multi-part upload.
//!
//! Bytes written to a [`LayerWriter`] travel through a bounded [`pipe`] into a
//! [`ChunkedProcessor`] running on a background task. Every chunk becomes one `UploadLayerPart`
//! call sized to the part size the registry asked for, so a slow registry throttles the caller's
//! writes instead of the layer piling up in memory. Writes are cut into part-sized segments
//! before they enter the pipe, so the pipe holds at most `pipe_capacity` parts whatever the size
//! of the caller's buffers.
//!
//! The status record of an upload is only there to be displayed. Every update re-creates it if a
//! reader removed it, so it never decides the outcome of the upload.

use std::{io, sync::Arc};

use async_trait::async_trait;
use monostream::{pipe, Chunk, ChunkedProcessor, PipeReader, PipeWriter, TransferSummary};
use oci_spec::image::{Descriptor, Digest};
use tokio_util::{sync::CancellationToken, task::AbortOnDropHandle};

use crate::{
    client::{
        ApiError, CompleteLayerUploadInput, EcrApi, InitiateLayerUploadInput, UploadLayerPartInput,
    },
    config::{LayerWriterConfig, DEFAULT_DIGEST_ALGORITHM_VERIFIED_BY_STORE},
    reference::{make_ref_key, EcrSpec},
    status::{Status, StatusTracker, TransferState},
    EcrError, EcrResult,
};

use super::{ContentWriter, EcrBase};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A [`ContentWriter`] that uploads a layer in parts while it is being written.
///
/// The upload is initiated when the writer is created, before any byte is written. Dropping the
/// writer without committing it cancels the background upload.
#[derive(Debug)]
pub struct LayerWriter {
    base: EcrBase,
    desc: Descriptor,
    ref_key: String,
    upload_id: String,
    part_size: u64,
    pipe: Option<PipeWriter>,
    transfer: Option<AbortOnDropHandle<EcrResult<TransferSummary>>>,
    cancel: CancellationToken,
}

/// What the background upload needs to send one part.
#[derive(Clone)]
struct PartUploader {
    client: Arc<dyn EcrApi>,
    spec: EcrSpec,
    tracker: Arc<StatusTracker>,
    ref_key: String,
    upload_id: String,
    total: u64,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LayerWriter {
    /// Initiates the upload of the layer described by `desc` and starts the background transfer.
    pub(crate) async fn new(
        base: EcrBase,
        desc: Descriptor,
        config: LayerWriterConfig,
    ) -> EcrResult<Self> {
        let output = base
            .client
            .initiate_layer_upload(InitiateLayerUploadInput {
                registry_id: base.spec.registry().to_string(),
                repository_name: base.spec.repository().to_string(),
            })
            .await?;

        let upload_id = output.upload_id;
        let part_size = output.part_size;
        tracing::debug!(digest = %desc.digest(), %upload_id, part_size, "initiated layer upload");

        let chunk_size = usize::try_from(part_size).map_err(EcrError::custom)?;
        let cancel = base.cancel.child_token();
        let processor =
            ChunkedProcessor::new(chunk_size, config.queue_size())?.with_cancellation(cancel.clone());

        let ref_key = make_ref_key(&desc);
        base.tracker.upsert(
            &ref_key,
            || seed_status(&ref_key, desc.size(), &upload_id),
            |status| status.set_upload_id(Some(upload_id.clone())),
        );

        let uploader = PartUploader {
            client: Arc::clone(&base.client),
            spec: base.spec.clone(),
            tracker: Arc::clone(&base.tracker),
            ref_key: ref_key.clone(),
            upload_id: upload_id.clone(),
            total: desc.size(),
        };

        let (pipe, reader) = pipe(config.pipe_capacity());
        let transfer = tokio::spawn(upload_parts(processor, reader, uploader));

        Ok(Self {
            base,
            desc,
            ref_key,
            upload_id,
            part_size,
            pipe: Some(pipe),
            transfer: Some(AbortOnDropHandle::new(transfer)),
            cancel,
        })
    }

    /// The id the registry assigned to this upload.
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// The part size the registry asked for.
    pub fn part_size(&self) -> u64 {
        self.part_size
    }

    /// The key this upload is tracked under.
    pub fn ref_key(&self) -> &str {
        &self.ref_key
    }

    /// Cancels the background upload. Later writes and commits fail.
    pub fn abort(&mut self) {
        tracing::debug!(upload_id = %self.upload_id, "aborting layer upload");
        self.cancel.cancel();
        self.pipe = None;
        if let Some(transfer) = self.transfer.take() {
            transfer.abort();
        }
    }

    /// Applies `f` to this upload's status record, re-creating the record if it is gone.
    fn track(&self, f: impl FnOnce(&mut Status)) {
        self.base.tracker.upsert(
            &self.ref_key,
            || seed_status(&self.ref_key, self.desc.size(), &self.upload_id),
            f,
        );
    }

    /// Returns the background upload's error if it has already stopped.
    ///
    /// Never waits. A stopped upload can only be a failed one, since the upload cannot finish
    /// successfully while the pipe is still open.
    async fn check_transfer(&mut self) -> EcrResult<()> {
        if self.cancel.is_cancelled() {
            return Err(EcrError::Cancelled);
        }

        let finished = match &self.transfer {
            Some(transfer) => transfer.is_finished(),
            None => return Err(EcrError::UploadAborted(self.upload_id.clone())),
        };

        if finished {
            self.join_transfer().await?;
        }

        Ok(())
    }

    /// Waits for the background upload to stop and returns its outcome.
    async fn join_transfer(&mut self) -> EcrResult<TransferSummary> {
        if self.cancel.is_cancelled() {
            return Err(EcrError::Cancelled);
        }

        let Some(transfer) = self.transfer.take() else {
            return Err(EcrError::UploadAborted(self.upload_id.clone()));
        };

        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => Err(EcrError::Cancelled),
            result = transfer => result?,
        }
    }

    /// Finalizes the upload after every part has been sent.
    async fn complete(&self, expected: &Digest) -> EcrResult<TransferState> {
        let expected = expected.to_string();
        let result = self
            .base
            .client
            .complete_layer_upload(CompleteLayerUploadInput {
                registry_id: self.base.spec.registry().to_string(),
                repository_name: self.base.spec.repository().to_string(),
                upload_id: self.upload_id.clone(),
                layer_digests: vec![expected.clone()],
            })
            .await;

        match result {
            Ok(output) if output.layer_digest == expected => Ok(TransferState::Done),
            Ok(output) => Err(EcrError::DigestMismatch {
                expected,
                actual: output.layer_digest,
            }),
            // The registry only reports an existing layer after checking our digest against its
            // own, which it computes with a single algorithm.
            Err(ApiError::LayerAlreadyExists(_)) if verified_by_store(&expected) => {
                tracing::info!(digest = %expected, "layer already exists");
                Ok(TransferState::Exists)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl PartUploader {
    async fn upload(self, chunk: Chunk) -> EcrResult<()> {
        let begin = chunk.byte_range_begin();
        let end = chunk.byte_range_end();
        tracing::trace!(upload_id = %self.upload_id, part = chunk.part(), begin, end, "uploading layer part");

        self.client
            .upload_layer_part(UploadLayerPartInput {
                registry_id: self.spec.registry().to_string(),
                repository_name: self.spec.repository().to_string(),
                upload_id: self.upload_id.clone(),
                part_first_byte: begin,
                part_last_byte: end,
                layer_part_blob: chunk.into_bytes(),
            })
            .await?;

        self.tracker.upsert(
            &self.ref_key,
            || seed_status(&self.ref_key, self.total, &self.upload_id),
            |status| status.advance(end + 1),
        );

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// The background half of a layer upload.
async fn upload_parts(
    processor: ChunkedProcessor,
    reader: PipeReader,
    uploader: PartUploader,
) -> EcrResult<TransferSummary> {
    let upload_id = uploader.upload_id.clone();
    let result = processor
        .process(reader, |chunk| uploader.clone().upload(chunk))
        .await;

    match &result {
        Ok(summary) => tracing::debug!(
            %upload_id,
            bytes = summary.bytes(),
            parts = summary.parts(),
            "layer parts uploaded"
        ),
        Err(e) => tracing::debug!(%upload_id, error = %e, "layer upload stopped"),
    }

    result
}

fn seed_status(ref_key: &str, total: u64, upload_id: &str) -> Status {
    Status::new(ref_key, TransferState::Uploading, total).with_upload_id(upload_id)
}

fn verified_by_store(digest: &str) -> bool {
    digest
        .split_once(':')
        .is_some_and(|(algorithm, _)| algorithm == DEFAULT_DIGEST_ALGORITHM_VERIFIED_BY_STORE)
}

fn closed() -> EcrError {
    io::Error::new(io::ErrorKind::BrokenPipe, "layer writer is closed").into()
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl ContentWriter for LayerWriter {
    async fn write(&mut self, buf: &[u8]) -> EcrResult<usize> {
        self.check_transfer().await?;
        let Some(pipe) = &self.pipe else {
            return Err(closed());
        };

        let segment_size = usize::try_from(self.part_size).unwrap_or(usize::MAX);
        let mut written = Ok(());
        for segment in buf.chunks(segment_size) {
            let result = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return Err(EcrError::Cancelled),
                result = pipe.write(segment) => result,
            };

            if let Err(e) = result {
                written = Err(e);
                break;
            }
        }

        match written {
            Ok(()) => Ok(buf.len()),
            // The upload stopped reading: report why it stopped.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                self.pipe = None;
                match self.join_transfer().await {
                    Err(err) => Err(err),
                    Ok(_) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn commit(&mut self, size: u64, expected: &Digest) -> EcrResult<()> {
        tracing::debug!(upload_id = %self.upload_id, size, %expected, "committing layer");
        self.pipe = None;
        if self.cancel.is_cancelled() {
            return Err(EcrError::Cancelled);
        }

        self.track(|status| status.set_state(TransferState::Committing));

        let summary = self.join_transfer().await?;
        if size > 0 && summary.bytes() != size {
            return Err(EcrError::SizeMismatch {
                expected: size,
                actual: summary.bytes(),
            });
        }

        let state = self.complete(expected).await?;
        self.track(|status| {
            status.advance(summary.bytes());
            status.set_state(state);
            status.set_upload_id(None);
        });

        tracing::debug!(upload_id = %self.upload_id, %expected, %state, "layer committed");
        Ok(())
    }

    fn status(&self) -> EcrResult<Status> {
        self.base.tracker.get_status(&self.ref_key)
    }

    fn digest(&self) -> &Digest {
        self.desc.digest()
    }
}

impl Drop for LayerWriter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
