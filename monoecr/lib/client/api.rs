use async_trait::async_trait;
use thiserror::Error;

use super::{
    BatchCheckLayerAvailabilityInput, BatchCheckLayerAvailabilityOutput, BatchGetImageInput,
    BatchGetImageOutput, CompleteLayerUploadInput, CompleteLayerUploadOutput,
    InitiateLayerUploadInput, InitiateLayerUploadOutput, PutImageInput, PutImageOutput,
    UploadLayerPartInput, UploadLayerPartOutput,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a call to the registry's control-plane API.
pub type ApiResult<T> = Result<T, ApiError>;

/// An error reported by the registry's control-plane API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The layer being completed is already stored in the repository.
    #[error("LayerAlreadyExistsException: {0}")]
    LayerAlreadyExists(String),

    /// The manifest being put is already stored in the repository under the same tag.
    #[error("ImageAlreadyExistsException: {0}")]
    ImageAlreadyExists(String),

    /// A part other than the last one was smaller than the registry accepts.
    #[error("LayerPartTooSmallException: {0}")]
    LayerPartTooSmall(String),

    /// The upload id is not known to the registry.
    #[error("UploadNotFoundException: {0}")]
    UploadNotFound(String),

    /// The repository does not exist.
    #[error("RepositoryNotFoundException: {0}")]
    RepositoryNotFound(String),

    /// Any other service or transport failure.
    #[error("{code}: {message}")]
    Service {
        /// The exception name reported by the service.
        code: String,

        /// Human readable reason.
        message: String,
    },
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// The subset of the Amazon ECR control-plane API used to push images.
///
/// Implementations wrap an authenticated client. Credentials, sessions, retries and request
/// signing are the implementation's concern.
#[async_trait]
pub trait EcrApi: Send + Sync {
    /// Starts a multi-part layer upload and returns its id and the part size to use.
    async fn initiate_layer_upload(
        &self,
        input: InitiateLayerUploadInput,
    ) -> ApiResult<InitiateLayerUploadOutput>;

    /// Uploads one part of a layer.
    async fn upload_layer_part(&self, input: UploadLayerPartInput)
        -> ApiResult<UploadLayerPartOutput>;

    /// Finishes a layer upload. The registry verifies the uploaded bytes against the given
    /// digests and fails with [`ApiError::LayerAlreadyExists`] if the layer is already stored.
    async fn complete_layer_upload(
        &self,
        input: CompleteLayerUploadInput,
    ) -> ApiResult<CompleteLayerUploadOutput>;

    /// Reports which of the given layers exist in a repository.
    async fn batch_check_layer_availability(
        &self,
        input: BatchCheckLayerAvailabilityInput,
    ) -> ApiResult<BatchCheckLayerAvailabilityOutput>;

    /// Fetches image manifests.
    async fn batch_get_image(&self, input: BatchGetImageInput) -> ApiResult<BatchGetImageOutput>;

    /// Stores an image manifest.
    async fn put_image(&self, input: PutImageInput) -> ApiResult<PutImageOutput>;
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ApiError {
    /// The exception name the service uses for this error.
    pub fn code(&self) -> &str {
        match self {
            ApiError::LayerAlreadyExists(_) => "LayerAlreadyExistsException",
            ApiError::ImageAlreadyExists(_) => "ImageAlreadyExistsException",
            ApiError::LayerPartTooSmall(_) => "LayerPartTooSmallException",
            ApiError::UploadNotFound(_) => "UploadNotFoundException",
            ApiError::RepositoryNotFound(_) => "RepositoryNotFoundException",
            ApiError::Service { code, .. } => code,
        }
    }

    /// Builds an error from a service exception name, mapping the names the push path cares
    /// about to their own variants.
    pub fn from_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let message = message.into();
        match code.as_str() {
            "LayerAlreadyExistsException" => ApiError::LayerAlreadyExists(message),
            "ImageAlreadyExistsException" => ApiError::ImageAlreadyExists(message),
            "LayerPartTooSmallException" => ApiError::LayerPartTooSmall(message),
            "UploadNotFoundException" => ApiError::UploadNotFound(message),
            "RepositoryNotFoundException" => ApiError::RepositoryNotFound(message),
            _ => ApiError::Service { code, message },
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_code_round_trip() {
        let err = ApiError::from_code("LayerAlreadyExistsException", "layer exists");
        assert_eq!(err, ApiError::LayerAlreadyExists("layer exists".into()));
        assert_eq!(err.code(), "LayerAlreadyExistsException");
        assert_eq!(err.to_string(), "LayerAlreadyExistsException: layer exists");

        let err = ApiError::from_code("ThrottlingException", "slow down");
        assert_eq!(err.code(), "ThrottlingException");
        assert_eq!(err.to_string(), "ThrottlingException: slow down");
    }
}
