use std::{fmt, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::{
    client::{
        BatchCheckLayerAvailabilityInput, BatchGetImageInput, EcrApi, Image, ImageFailureCode,
        ImageIdentifier, LayerAvailability,
    },
    config::ACCEPTED_MANIFEST_MEDIA_TYPES,
    reference::EcrSpec,
    status::StatusTracker,
    EcrError, EcrResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The handles shared by everything that talks to one repository.
#[derive(Clone)]
pub(crate) struct EcrBase {
    pub(crate) client: Arc<dyn EcrApi>,
    pub(crate) spec: EcrSpec,
    pub(crate) tracker: Arc<StatusTracker>,
    pub(crate) cancel: CancellationToken,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl EcrBase {
    /// Fetches the manifest named by `image_id`, or `None` if the repository has no such image.
    pub(crate) async fn get_manifest(&self, image_id: ImageIdentifier) -> EcrResult<Option<Image>> {
        tracing::debug!(?image_id, repository = %self.spec.repository(), "getting manifest");
        let output = self
            .client
            .batch_get_image(BatchGetImageInput {
                registry_id: self.spec.registry().to_string(),
                repository_name: self.spec.repository().to_string(),
                image_ids: vec![image_id],
                accepted_media_types: ACCEPTED_MANIFEST_MEDIA_TYPES
                    .iter()
                    .map(|mt| mt.to_string())
                    .collect(),
            })
            .await?;

        let mut images = output.images;
        if images.len() == 1 {
            return Ok(images.pop());
        }

        match output.failures.first() {
            Some(failure) if failure.failure_code == ImageFailureCode::ImageNotFound => Ok(None),
            Some(failure) => Err(EcrError::InvalidReference(format!(
                "{}: {:?}: {}",
                self.spec, failure.failure_code, failure.failure_reason
            ))),
            None => Err(EcrError::InvalidReference(format!(
                "{}: expected one image, got {}",
                self.spec,
                images.len()
            ))),
        }
    }

    /// Returns `true` if the layer with `digest` is available in the repository.
    pub(crate) async fn layer_exists(&self, digest: &str) -> EcrResult<bool> {
        let output = self
            .client
            .batch_check_layer_availability(BatchCheckLayerAvailabilityInput {
                registry_id: self.spec.registry().to_string(),
                repository_name: self.spec.repository().to_string(),
                layer_digests: vec![digest.to_string()],
            })
            .await?;

        if let [layer] = &output.layers[..] {
            return Ok(layer.layer_digest == digest
                && layer.layer_availability == LayerAvailability::Available);
        }

        if let Some(failure) = output.failures.first() {
            tracing::debug!(
                digest,
                code = %failure.failure_code,
                reason = %failure.failure_reason,
                "layer not found"
            );
            return Ok(false);
        }

        Err(EcrError::InvalidReference(format!(
            "{}: expected one layer, got {}",
            self.spec,
            output.layers.len()
        )))
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Debug for EcrBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcrBase")
            .field("spec", &self.spec)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
