//! `monoecr` pushes OCI and Docker images to Amazon ECR through its native layer upload API.
//!
//! # Overview
//!
//! Instead of the registry's HTTP blob protocol, layers are sent with ECR's
//! `InitiateLayerUpload` / `UploadLayerPart` / `CompleteLayerUpload` calls. Layers are streamed:
//! the bytes a caller writes are cut into parts of the size ECR asks for and uploaded while the
//! caller is still writing, with a bounded number of parts held in memory.
//!
//! - [`client::EcrApi`] is the slice of the ECR API this crate needs. Bring your own
//!   authenticated implementation.
//! - [`reference::EcrSpec`] parses `ecr.aws/arn:...` references.
//! - [`oci::EcrPusher`] hands out a [`oci::ContentWriter`] per descriptor: an
//!   [`oci::LayerWriter`] for blobs and an [`oci::ManifestWriter`] for manifests.
//! - [`status::StatusTracker`] records the progress of every transfer for display.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use monoecr::{client::EcrApi, oci::EcrPusher, status::StatusTracker};
//! use oci_spec::image::Descriptor;
//!
//! async fn push_layer(
//!     client: Arc<dyn EcrApi>,
//!     desc: &Descriptor,
//!     layer: &[u8],
//! ) -> anyhow::Result<()> {
//!     let spec = "ecr.aws/arn:aws:ecr:us-west-2:123456789012:repository/foo/bar:latest".parse()?;
//!     let pusher = EcrPusher::new(client, spec, Arc::new(StatusTracker::new()));
//!
//!     let mut writer = match pusher.push(desc).await {
//!         Ok(writer) => writer,
//!         Err(e) if e.is_already_exists() => return Ok(()),
//!         Err(e) => return Err(e.into()),
//!     };
//!
//!     for piece in layer.chunks(32 * 1024) {
//!         writer.write(piece).await?;
//!     }
//!     writer.commit(desc.size(), desc.digest()).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod error;
#[cfg(test)]
mod testing;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod client;
pub mod config;
pub mod oci;
pub mod reference;
pub mod status;
pub mod utils;

pub use error::*;
