use async_trait::async_trait;
use oci_spec::image::{Descriptor, Digest};

use crate::{
    client::PutImageInput,
    reference::make_ref_key,
    status::{Status, TransferState},
    EcrError, EcrResult,
};

use super::{ContentWriter, EcrBase};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A [`ContentWriter`] that buffers a manifest and stores it with a single `PutImage` call.
#[derive(Debug)]
pub struct ManifestWriter {
    base: EcrBase,
    desc: Descriptor,
    ref_key: String,
    buf: Vec<u8>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ManifestWriter {
    pub(crate) fn new(base: EcrBase, desc: Descriptor) -> Self {
        let ref_key = make_ref_key(&desc);
        if base.tracker.get_status(&ref_key).is_err() {
            base.tracker
                .set_status(Status::new(&ref_key, TransferState::Uploading, desc.size()));
        }

        Self {
            base,
            desc,
            ref_key,
            buf: Vec::new(),
        }
    }

    /// Applies `f` to this manifest's status record, re-creating the record if it is gone.
    fn track(&self, f: impl FnOnce(&mut Status)) {
        self.base.tracker.upsert(
            &self.ref_key,
            || Status::new(&self.ref_key, TransferState::Uploading, self.desc.size()),
            f,
        );
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl ContentWriter for ManifestWriter {
    async fn write(&mut self, buf: &[u8]) -> EcrResult<usize> {
        self.buf.extend_from_slice(buf);
        let written = self.buf.len() as u64;
        self.track(|status| status.advance(written));

        Ok(buf.len())
    }

    async fn commit(&mut self, size: u64, expected: &Digest) -> EcrResult<()> {
        let spec = &self.base.spec;
        tracing::debug!(reference = %spec, size, %expected, "putting manifest");

        if size > 0 && self.buf.len() as u64 != size {
            return Err(EcrError::SizeMismatch {
                expected: size,
                actual: self.buf.len() as u64,
            });
        }

        let len = self.buf.len() as u64;
        let manifest = String::from_utf8(std::mem::take(&mut self.buf)).map_err(EcrError::custom)?;
        let (tag, _) = spec.tag_digest();
        let output = self
            .base
            .client
            .put_image(PutImageInput {
                registry_id: spec.registry().to_string(),
                repository_name: spec.repository().to_string(),
                image_tag: tag.map(str::to_string),
                image_manifest: manifest,
                image_manifest_media_type: Some(self.desc.media_type().to_string()),
            })
            .await
            .map_err(|source| EcrError::PutManifest {
                reference: spec.canonical(),
                source,
            })?;

        let expected = expected.to_string();
        let actual = output.image.image_id.image_digest.unwrap_or_default();
        if actual != expected {
            return Err(EcrError::DigestMismatch { expected, actual });
        }

        self.track(|status| {
            status.advance(len);
            status.set_state(TransferState::Done);
            status.set_upload_id(None);
        });

        tracing::info!(reference = %spec, digest = %expected, "manifest stored");
        Ok(())
    }

    fn status(&self) -> EcrResult<Status> {
        self.base.tracker.get_status(&self.ref_key)
    }

    fn digest(&self) -> &Digest {
        self.desc.digest()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use crate::{
        client::{ApiError, Image, ImageIdentifier, PutImageOutput},
        testing::{self, FakeEcrClient, REGISTRY, REPOSITORY},
        WriterOperation,
    };

    use super::*;

    const MANIFEST: &[u8] = br#"{"schemaVersion":2,"mediaType":"application/vnd.oci.image.manifest.v1+json"}"#;

    fn manifest_writer(client: FakeEcrClient, reference: &str) -> ManifestWriter {
        let base = testing::base_for(client, reference);
        ManifestWriter::new(base, testing::manifest_descriptor(MANIFEST))
    }

    fn stored(digest: String) -> Result<PutImageOutput, ApiError> {
        Ok(PutImageOutput {
            image: Image {
                image_id: ImageIdentifier {
                    image_tag: None,
                    image_digest: Some(digest),
                },
                ..Default::default()
            },
        })
    }

    #[test_log::test(tokio::test)]
    async fn test_manifest_writer_puts_buffered_manifest_with_tag() -> anyhow::Result<()> {
        let expected = testing::sha256_digest(MANIFEST);
        let calls = Arc::new(AtomicUsize::new(0));

        let client = FakeEcrClient::default().on_put_image({
            let calls = Arc::clone(&calls);
            let expected = expected.to_string();
            move |input| {
                calls.fetch_add(1, Ordering::SeqCst);
                assert_eq!(input.registry_id, REGISTRY);
                assert_eq!(input.repository_name, REPOSITORY);
                assert_eq!(input.image_tag.as_deref(), Some("latest"));
                assert_eq!(input.image_manifest.as_bytes(), MANIFEST);
                assert_eq!(
                    input.image_manifest_media_type.as_deref(),
                    Some("application/vnd.oci.image.manifest.v1+json")
                );
                stored(expected.clone())
            }
        });

        let mut writer = manifest_writer(client, &testing::reference(":latest"));
        for piece in MANIFEST.chunks(10) {
            writer.write(piece).await?;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        writer.commit(MANIFEST.len() as u64, &expected).await?;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let status = writer.status()?;
        assert_eq!(status.state(), TransferState::Done);
        assert_eq!(status.offset(), MANIFEST.len() as u64);
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_manifest_writer_survives_removed_status() -> anyhow::Result<()> {
        let expected = testing::sha256_digest(MANIFEST);
        let client = FakeEcrClient::default().on_put_image({
            let expected = expected.to_string();
            move |_| stored(expected.clone())
        });

        let base = testing::base_for(client, &testing::reference(":latest"));
        let tracker = Arc::clone(&base.tracker);
        let mut writer = ManifestWriter::new(base, testing::manifest_descriptor(MANIFEST));

        tracker.remove(&writer.ref_key);
        writer.write(MANIFEST).await?;
        tracker.remove(&writer.ref_key);
        writer.commit(0, &expected).await?;

        let status = writer.status()?;
        assert_eq!(status.state(), TransferState::Done);
        assert_eq!(status.offset(), MANIFEST.len() as u64);
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_manifest_writer_detects_digest_mismatch() -> anyhow::Result<()> {
        let expected = testing::sha256_digest(MANIFEST);
        let client = FakeEcrClient::default()
            .on_put_image(|_| stored(testing::sha256_digest(b"other").to_string()));

        let mut writer = manifest_writer(client, &testing::reference(":latest"));
        writer.write(MANIFEST).await?;
        let err = writer.commit(0, &expected).await.unwrap_err();

        assert!(matches!(err, EcrError::DigestMismatch { .. }), "{err}");
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_manifest_writer_wraps_put_image_errors() -> anyhow::Result<()> {
        let expected = testing::sha256_digest(MANIFEST);
        let client = FakeEcrClient::default()
            .on_put_image(|_| Err(ApiError::ImageAlreadyExists("tag in use".into())));

        let reference = testing::reference(":latest");
        let mut writer = manifest_writer(client, &reference);
        writer.write(MANIFEST).await?;
        let err = writer.commit(0, &expected).await.unwrap_err();

        match err {
            EcrError::PutManifest { reference: r, source } => {
                assert_eq!(r, reference);
                assert_eq!(source, ApiError::ImageAlreadyExists("tag in use".into()));
            }
            other => panic!("unexpected error: {other}"),
        }
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_manifest_writer_close_and_truncate_are_unimplemented() {
        let mut writer = manifest_writer(FakeEcrClient::default(), &testing::reference(""));

        assert!(matches!(
            writer.close().await.unwrap_err(),
            EcrError::Unimplemented(WriterOperation::Close)
        ));
        assert!(matches!(
            writer.truncate(0).await.unwrap_err(),
            EcrError::Unimplemented(WriterOperation::Truncate)
        ));
    }
}
