//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The number of layer parts read ahead of the part currently being uploaded.
pub const DEFAULT_LAYER_QUEUE_SIZE: usize = 5;

/// The number of writes buffered between a layer writer and its upload task.
pub const DEFAULT_PIPE_CAPACITY: usize = 16;

/// The digest algorithm the registry verifies when it completes a layer upload.
///
/// A "layer already exists" answer can only be trusted for digests of this algorithm.
pub const DEFAULT_DIGEST_ALGORITHM_VERIFIED_BY_STORE: &str = "sha256";

/// The prefix of every ECR reference.
pub const ECR_REFERENCE_PREFIX: &str = "ecr.aws/";

/// The environment variable that overrides [`DEFAULT_LAYER_QUEUE_SIZE`].
pub const LAYER_QUEUE_SIZE_ENV_VAR: &str = "MONOECR_LAYER_QUEUE_SIZE";

/// The environment variable that overrides [`DEFAULT_PIPE_CAPACITY`].
pub const PIPE_CAPACITY_ENV_VAR: &str = "MONOECR_PIPE_CAPACITY";

/// The manifest media types the registry is asked to return.
pub const ACCEPTED_MANIFEST_MEDIA_TYPES: &[&str] = &[
    OCI_MANIFEST_MEDIA_TYPE,
    DOCKER_MANIFEST_MEDIA_TYPE,
];

/// The OCI image manifest media type.
pub const OCI_MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";

/// The Docker image manifest media type.
pub const DOCKER_MANIFEST_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// The Docker schema 1 signed manifest media type.
pub const DOCKER_MANIFEST_V1_MEDIA_TYPE: &str =
    "application/vnd.docker.distribution.manifest.v1+prettyjws";

/// The Docker manifest list media type.
pub const DOCKER_MANIFEST_LIST_MEDIA_TYPE: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";

/// The Docker image config media type.
pub const DOCKER_CONFIG_MEDIA_TYPE: &str = "application/vnd.docker.container.image.v1+json";
