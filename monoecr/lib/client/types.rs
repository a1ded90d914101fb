use bytes::Bytes;
use serde::{Deserialize, Serialize};

//--------------------------------------------------------------------------------------------------
// Types: Layer Uploads
//--------------------------------------------------------------------------------------------------

/// Request to start a multi-part layer upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateLayerUploadInput {
    /// The account id of the registry.
    pub registry_id: String,

    /// The repository the layer is uploaded to.
    pub repository_name: String,
}

/// Response to [`InitiateLayerUploadInput`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateLayerUploadOutput {
    /// Identifies the upload in subsequent part and completion calls.
    pub upload_id: String,

    /// The part size the registry asks the client to use, in bytes.
    pub part_size: u64,
}

/// One part of a layer upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadLayerPartInput {
    /// The account id of the registry.
    pub registry_id: String,

    /// The repository the layer is uploaded to.
    pub repository_name: String,

    /// The upload this part belongs to.
    pub upload_id: String,

    /// Offset of the first byte of the part within the layer.
    pub part_first_byte: u64,

    /// Offset of the last byte of the part within the layer (inclusive).
    pub part_last_byte: u64,

    /// The content of the part.
    #[serde(skip)]
    pub layer_part_blob: Bytes,
}

/// Response to [`UploadLayerPartInput`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadLayerPartOutput {
    /// The upload the part was added to.
    pub upload_id: String,

    /// The offset of the last byte the registry has received so far.
    pub last_byte_received: u64,
}

/// Request to finish a layer upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteLayerUploadInput {
    /// The account id of the registry.
    pub registry_id: String,

    /// The repository the layer is uploaded to.
    pub repository_name: String,

    /// The upload being completed.
    pub upload_id: String,

    /// The digests the client expects the layer to have.
    pub layer_digests: Vec<String>,
}

/// Response to [`CompleteLayerUploadInput`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteLayerUploadOutput {
    /// The digest the registry computed for the uploaded layer.
    pub layer_digest: String,
}

//--------------------------------------------------------------------------------------------------
// Types: Layer Availability
//--------------------------------------------------------------------------------------------------

/// Request to check which layers already exist in a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCheckLayerAvailabilityInput {
    /// The account id of the registry.
    pub registry_id: String,

    /// The repository to look in.
    pub repository_name: String,

    /// The digests to look for.
    pub layer_digests: Vec<String>,
}

/// Response to [`BatchCheckLayerAvailabilityInput`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCheckLayerAvailabilityOutput {
    /// Layers the registry knows about.
    pub layers: Vec<Layer>,

    /// Digests the registry could not report on.
    pub failures: Vec<LayerFailure>,
}

/// A layer known to the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    /// The digest of the layer.
    pub layer_digest: String,

    /// Whether the layer can be pulled.
    pub layer_availability: LayerAvailability,

    /// The size of the layer in bytes.
    pub layer_size: u64,
}

/// Availability of a layer in a repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayerAvailability {
    /// The layer has been fully uploaded.
    Available,

    /// The layer is not available.
    #[default]
    Unavailable,
}

/// A digest the registry could not report on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerFailure {
    /// The digest that was asked about.
    pub layer_digest: String,

    /// Why the lookup failed, e.g. `MissingLayerDigest`.
    pub failure_code: String,

    /// Human readable reason.
    pub failure_reason: String,
}

//--------------------------------------------------------------------------------------------------
// Types: Images
//--------------------------------------------------------------------------------------------------

/// Identifies an image in a repository by tag, digest or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIdentifier {
    /// The tag of the image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,

    /// The manifest digest of the image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_digest: Option<String>,
}

/// Request to fetch image manifests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetImageInput {
    /// The account id of the registry.
    pub registry_id: String,

    /// The repository to look in.
    pub repository_name: String,

    /// The images to fetch.
    pub image_ids: Vec<ImageIdentifier>,

    /// Manifest media types the caller understands.
    pub accepted_media_types: Vec<String>,
}

/// Response to [`BatchGetImageInput`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetImageOutput {
    /// Images that were found.
    pub images: Vec<Image>,

    /// Images that could not be fetched.
    pub failures: Vec<ImageFailure>,
}

/// An image stored in a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// The identity of the image.
    pub image_id: ImageIdentifier,

    /// The raw manifest.
    pub image_manifest: String,

    /// The media type of the manifest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_manifest_media_type: Option<String>,
}

/// An image that could not be fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFailure {
    /// The image that was asked for.
    pub image_id: ImageIdentifier,

    /// Why the lookup failed.
    pub failure_code: ImageFailureCode,

    /// Human readable reason.
    pub failure_reason: String,
}

/// Failure codes returned for images.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFailureCode {
    /// No image matches the identifier.
    ImageNotFound,

    /// The tag does not exist.
    ImageTagDoesNotMatchDigest,

    /// The digest is malformed.
    InvalidImageDigest,

    /// Any other failure.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Request to store an image manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutImageInput {
    /// The account id of the registry.
    pub registry_id: String,

    /// The repository to store the manifest in.
    pub repository_name: String,

    /// The tag to give the image, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,

    /// The raw manifest.
    pub image_manifest: String,

    /// The media type of the manifest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_manifest_media_type: Option<String>,
}

/// Response to [`PutImageInput`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutImageOutput {
    /// The stored image.
    pub image: Image,
}
