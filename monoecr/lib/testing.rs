//! Test doubles shared by the unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use oci_spec::image::{Descriptor, DescriptorBuilder, Digest, MediaType};
use sha2::{Digest as _, Sha256, Sha512};
use tokio_util::sync::CancellationToken;

use crate::{
    client::{
        ApiError, ApiResult, BatchCheckLayerAvailabilityInput, BatchCheckLayerAvailabilityOutput,
        BatchGetImageInput, BatchGetImageOutput, CompleteLayerUploadInput,
        CompleteLayerUploadOutput, EcrApi, InitiateLayerUploadInput, InitiateLayerUploadOutput,
        PutImageInput, PutImageOutput, UploadLayerPartInput, UploadLayerPartOutput,
    },
    oci::EcrBase,
    status::StatusTracker,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

pub(crate) const REGISTRY: &str = "123456789012";

pub(crate) const REPOSITORY: &str = "foo/bar";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

type Handler<I, O> = Box<dyn Fn(I) -> ApiResult<O> + Send + Sync>;

/// An [`EcrApi`] whose calls are answered by closures. Calls without a closure fail.
#[derive(Default)]
pub(crate) struct FakeEcrClient {
    stall_upload_layer_part: bool,
    initiate_layer_upload: Option<Handler<InitiateLayerUploadInput, InitiateLayerUploadOutput>>,
    upload_layer_part: Option<Handler<UploadLayerPartInput, UploadLayerPartOutput>>,
    complete_layer_upload: Option<Handler<CompleteLayerUploadInput, CompleteLayerUploadOutput>>,
    batch_check_layer_availability:
        Option<Handler<BatchCheckLayerAvailabilityInput, BatchCheckLayerAvailabilityOutput>>,
    batch_get_image: Option<Handler<BatchGetImageInput, BatchGetImageOutput>>,
    put_image: Option<Handler<PutImageInput, PutImageOutput>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl FakeEcrClient {
    pub(crate) fn on_initiate_layer_upload(
        mut self,
        f: impl Fn(InitiateLayerUploadInput) -> ApiResult<InitiateLayerUploadOutput>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.initiate_layer_upload = Some(Box::new(f));
        self
    }

    pub(crate) fn on_upload_layer_part(
        mut self,
        f: impl Fn(UploadLayerPartInput) -> ApiResult<UploadLayerPartOutput> + Send + Sync + 'static,
    ) -> Self {
        self.upload_layer_part = Some(Box::new(f));
        self
    }

    /// Makes every `UploadLayerPart` call hang, like a request the registry never answers.
    pub(crate) fn stall_upload_layer_part(mut self) -> Self {
        self.stall_upload_layer_part = true;
        self
    }

    pub(crate) fn on_complete_layer_upload(
        mut self,
        f: impl Fn(CompleteLayerUploadInput) -> ApiResult<CompleteLayerUploadOutput>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.complete_layer_upload = Some(Box::new(f));
        self
    }

    pub(crate) fn on_batch_check_layer_availability(
        mut self,
        f: impl Fn(BatchCheckLayerAvailabilityInput) -> ApiResult<BatchCheckLayerAvailabilityOutput>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.batch_check_layer_availability = Some(Box::new(f));
        self
    }

    pub(crate) fn on_batch_get_image(
        mut self,
        f: impl Fn(BatchGetImageInput) -> ApiResult<BatchGetImageOutput> + Send + Sync + 'static,
    ) -> Self {
        self.batch_get_image = Some(Box::new(f));
        self
    }

    pub(crate) fn on_put_image(
        mut self,
        f: impl Fn(PutImageInput) -> ApiResult<PutImageOutput> + Send + Sync + 'static,
    ) -> Self {
        self.put_image = Some(Box::new(f));
        self
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// A reference to the test repository followed by `object`, e.g. `":latest"`.
pub(crate) fn reference(object: &str) -> String {
    format!("ecr.aws/arn:aws:ecr:us-west-2:{REGISTRY}:repository/{REPOSITORY}{object}")
}

pub(crate) fn base(client: FakeEcrClient) -> EcrBase {
    base_for(client, &reference(":latest"))
}

pub(crate) fn base_for(client: FakeEcrClient, reference: &str) -> EcrBase {
    EcrBase {
        client: Arc::new(client),
        spec: reference.parse().unwrap(),
        tracker: Arc::new(StatusTracker::new()),
        cancel: CancellationToken::new(),
    }
}

pub(crate) fn sha256_digest(data: &[u8]) -> Digest {
    format!("sha256:{}", hex::encode(Sha256::digest(data)))
        .parse()
        .unwrap()
}

pub(crate) fn sha512_digest(data: &[u8]) -> Digest {
    format!("sha512:{}", hex::encode(Sha512::digest(data)))
        .parse()
        .unwrap()
}

pub(crate) fn layer_descriptor(data: &[u8]) -> Descriptor {
    descriptor(MediaType::ImageLayerGzip, data)
}

pub(crate) fn manifest_descriptor(data: &[u8]) -> Descriptor {
    descriptor(MediaType::ImageManifest, data)
}

fn descriptor(media_type: MediaType, data: &[u8]) -> Descriptor {
    DescriptorBuilder::default()
        .media_type(media_type)
        .digest(sha256_digest(data))
        .size(data.len() as u64)
        .build()
        .unwrap()
}

fn unhandled<T>(operation: &str) -> ApiResult<T> {
    Err(ApiError::from_code(
        "UnexpectedCall",
        format!("{operation} has no handler"),
    ))
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl EcrApi for FakeEcrClient {
    async fn initiate_layer_upload(
        &self,
        input: InitiateLayerUploadInput,
    ) -> ApiResult<InitiateLayerUploadOutput> {
        match &self.initiate_layer_upload {
            Some(f) => f(input),
            None => unhandled("InitiateLayerUpload"),
        }
    }

    async fn upload_layer_part(
        &self,
        input: UploadLayerPartInput,
    ) -> ApiResult<UploadLayerPartOutput> {
        if self.stall_upload_layer_part {
            return std::future::pending().await;
        }

        match &self.upload_layer_part {
            Some(f) => f(input),
            None => unhandled("UploadLayerPart"),
        }
    }

    async fn complete_layer_upload(
        &self,
        input: CompleteLayerUploadInput,
    ) -> ApiResult<CompleteLayerUploadOutput> {
        match &self.complete_layer_upload {
            Some(f) => f(input),
            None => unhandled("CompleteLayerUpload"),
        }
    }

    async fn batch_check_layer_availability(
        &self,
        input: BatchCheckLayerAvailabilityInput,
    ) -> ApiResult<BatchCheckLayerAvailabilityOutput> {
        match &self.batch_check_layer_availability {
            Some(f) => f(input),
            None => unhandled("BatchCheckLayerAvailability"),
        }
    }

    async fn batch_get_image(&self, input: BatchGetImageInput) -> ApiResult<BatchGetImageOutput> {
        match &self.batch_get_image {
            Some(f) => f(input),
            None => unhandled("BatchGetImage"),
        }
    }

    async fn put_image(&self, input: PutImageInput) -> ApiResult<PutImageOutput> {
        match &self.put_image {
            Some(f) => f(input),
            None => unhandled("PutImage"),
        }
    }
}
