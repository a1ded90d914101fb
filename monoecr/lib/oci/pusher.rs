use std::sync::Arc;

use oci_spec::image::{Descriptor, MediaType};
use tokio_util::sync::CancellationToken;

use crate::{
    client::{EcrApi, ImageIdentifier},
    config::{DOCKER_MANIFEST_MEDIA_TYPE, DOCKER_MANIFEST_V1_MEDIA_TYPE, LayerWriterConfig},
    reference::{make_ref_key, EcrSpec},
    status::{Status, StatusTracker, TransferState},
    EcrError, EcrResult,
};

use super::{ContentWriter, EcrBase, LayerWriter, ManifestWriter};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Pushes image content to one ECR repository.
///
/// Each call to [`push`](EcrPusher::push) hands back a [`ContentWriter`] for a single descriptor:
/// manifests are buffered and stored with `PutImage`, everything else is streamed as a layer.
#[derive(Debug, Clone)]
pub struct EcrPusher {
    base: EcrBase,
    config: LayerWriterConfig,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl EcrPusher {
    /// Creates a pusher for the repository named by `spec`, reporting progress to `tracker`.
    pub fn new(client: Arc<dyn EcrApi>, spec: EcrSpec, tracker: Arc<StatusTracker>) -> Self {
        Self {
            base: EcrBase {
                client,
                spec,
                tracker,
                cancel: CancellationToken::new(),
            },
            config: LayerWriterConfig::from_env(),
        }
    }

    /// Replaces the layer upload tuning.
    pub fn with_config(mut self, config: LayerWriterConfig) -> Self {
        self.config = config;
        self
    }

    /// Ties every upload started by this pusher to `token`.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.base.cancel = token;
        self
    }

    /// The repository this pusher writes to.
    pub fn spec(&self) -> &EcrSpec {
        &self.base.spec
    }

    /// The tracker this pusher reports progress to.
    pub fn tracker(&self) -> &Arc<StatusTracker> {
        &self.base.tracker
    }

    /// Starts pushing the content described by `desc`.
    ///
    /// Fails with [`EcrError::AlreadyExists`] if the repository already holds the content, in
    /// which case nothing needs to be written. On any other failure the content's status is
    /// dropped from the tracker.
    pub async fn push(&self, desc: &Descriptor) -> EcrResult<Box<dyn ContentWriter>> {
        let ref_key = make_ref_key(desc);
        tracing::debug!(%ref_key, media_type = %desc.media_type(), size = desc.size(), "push");

        self.base
            .tracker
            .set_status(Status::new(&ref_key, TransferState::Uploading, desc.size()));

        let result = if is_manifest(desc.media_type()) {
            self.push_manifest(desc).await
        } else {
            self.push_blob(desc).await
        };

        match &result {
            Ok(_) => {}
            Err(EcrError::AlreadyExists(_)) => self.base.tracker.upsert(
                &ref_key,
                || Status::new(&ref_key, TransferState::Exists, desc.size()),
                |status| {
                    status.set_state(TransferState::Exists);
                    status.advance(desc.size());
                },
            ),
            Err(e) => {
                tracing::debug!(%ref_key, error = %e, "push failed");
                self.base.tracker.remove(&ref_key);
            }
        }

        result
    }

    async fn push_manifest(&self, desc: &Descriptor) -> EcrResult<Box<dyn ContentWriter>> {
        if self.manifest_exists(desc).await? {
            tracing::info!(digest = %desc.digest(), "manifest already exists");
            return Err(EcrError::AlreadyExists(desc.digest().to_string()));
        }

        Ok(Box::new(ManifestWriter::new(self.base.clone(), desc.clone())))
    }

    async fn push_blob(&self, desc: &Descriptor) -> EcrResult<Box<dyn ContentWriter>> {
        let digest = desc.digest().to_string();
        if self.base.layer_exists(&digest).await? {
            tracing::info!(%digest, "layer already exists");
            return Err(EcrError::AlreadyExists(digest));
        }

        let writer = LayerWriter::new(self.base.clone(), desc.clone(), self.config).await?;
        Ok(Box::new(writer))
    }

    async fn manifest_exists(&self, desc: &Descriptor) -> EcrResult<bool> {
        let digest = desc.digest().to_string();
        let mut image_id = self.base.spec.image_id();
        if image_id == ImageIdentifier::default() {
            image_id.image_digest = Some(digest.clone());
        }

        let image = self.base.get_manifest(image_id).await?;
        Ok(image.is_some_and(|image| image.image_id.image_digest.as_deref() == Some(&digest)))
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn is_manifest(media_type: &MediaType) -> bool {
    match media_type {
        MediaType::ImageManifest => true,
        other => matches!(
            other.to_string().as_str(),
            DOCKER_MANIFEST_MEDIA_TYPE | DOCKER_MANIFEST_V1_MEDIA_TYPE
        ),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
