use std::{fmt, str::FromStr};

use getset::Getters;
use oci_spec::image::{Descriptor, MediaType};

use crate::{
    client::ImageIdentifier,
    config::{
        DOCKER_CONFIG_MEDIA_TYPE, DOCKER_MANIFEST_LIST_MEDIA_TYPE, DOCKER_MANIFEST_MEDIA_TYPE,
        ECR_REFERENCE_PREFIX,
    },
    EcrError, EcrResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const ARN_PREFIX: &str = "arn:";

const ARN_DELIMITER: char = ':';

const ARN_SECTIONS: usize = 6;

const REPOSITORY_RESOURCE_PREFIX: &str = "repository/";

/// The annotation holding the name a descriptor is referenced by.
const ANNOTATION_REF_NAME: &str = "org.opencontainers.image.ref.name";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A parsed ECR reference.
///
/// ECR references embed the repository ARN, optionally followed by a tag, a digest or both:
///
/// ```text
/// ecr.aws/arn:aws:ecr:us-west-2:123456789012:repository/foo/bar:latest@sha256:...
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct EcrSpec {
    /// The AWS partition, e.g. `aws`.
    partition: String,

    /// The region hosting the registry.
    region: String,

    /// The account id that owns the registry.
    account_id: String,

    /// The repository name, which may contain slashes.
    repository: String,

    /// The tag and/or digest part of the reference. A digest keeps its leading `@`.
    object: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl EcrSpec {
    /// Parses a repository ARN such as `arn:aws:ecr:us-west-2:123456789012:repository/foo/bar`.
    ///
    /// The resource part is taken verbatim, so any tag or digest is left in the repository name.
    pub fn parse_arn(arn: &str) -> EcrResult<Self> {
        let Some(rest) = arn.strip_prefix(ARN_PREFIX) else {
            return Err(invalid(arn, "missing arn prefix"));
        };

        let sections: Vec<&str> = rest.splitn(ARN_SECTIONS - 1, ARN_DELIMITER).collect();
        let [partition, service, region, account_id, resource] = sections[..] else {
            return Err(invalid(arn, "not enough sections"));
        };

        if service != "ecr" {
            return Err(invalid(arn, "not an ecr arn"));
        }

        let Some(repository) = resource.strip_prefix(REPOSITORY_RESOURCE_PREFIX) else {
            return Err(invalid(arn, "resource is not a repository"));
        };

        if repository.is_empty() {
            return Err(invalid(arn, "empty repository"));
        }

        Ok(Self {
            partition: partition.to_string(),
            region: region.to_string(),
            account_id: account_id.to_string(),
            repository: repository.to_string(),
            object: String::new(),
        })
    }

    /// The registry id used in API calls, i.e. the owning account.
    pub fn registry(&self) -> &str {
        &self.account_id
    }

    /// The repository ARN.
    pub fn arn(&self) -> String {
        format!(
            "{ARN_PREFIX}{}:ecr:{}:{}:{REPOSITORY_RESOURCE_PREFIX}{}",
            self.partition, self.region, self.account_id, self.repository
        )
    }

    /// The canonical string form of the reference. Parsing it yields an equal spec.
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Splits the object into its tag and digest.
    pub fn tag_digest(&self) -> (Option<&str>, Option<&str>) {
        let (tag, digest) = match self.object.split_once('@') {
            Some((tag, digest)) => (tag, Some(digest)),
            None => (self.object.as_str(), None),
        };

        ((!tag.is_empty()).then_some(tag), digest.filter(|d| !d.is_empty()))
    }

    /// The image identifier naming this reference in API calls.
    pub fn image_id(&self) -> ImageIdentifier {
        let (tag, digest) = self.tag_digest();
        ImageIdentifier {
            image_tag: tag.map(str::to_string),
            image_digest: digest.map(str::to_string),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Derives the key a transfer of `desc` is tracked under.
///
/// The key is the digest, prefixed with the kind of content and with the descriptor's ref name
/// when it carries one.
pub fn make_ref_key(desc: &Descriptor) -> String {
    let mut key = desc.digest().to_string();
    if let Some(name) = desc
        .annotations()
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_REF_NAME))
    {
        key = format!("{name}@{key}");
    }

    let kind = match desc.media_type() {
        MediaType::ImageManifest => "manifest",
        MediaType::ImageIndex => "index",
        MediaType::ImageConfig => "config",
        MediaType::ImageLayer | MediaType::ImageLayerGzip | MediaType::ImageLayerZstd => "layer",
        other => match other.to_string().as_str() {
            DOCKER_MANIFEST_MEDIA_TYPE => "manifest",
            DOCKER_MANIFEST_LIST_MEDIA_TYPE => "index",
            DOCKER_CONFIG_MEDIA_TYPE => "config",
            mt if mt.starts_with("application/vnd.oci.image.layer.")
                || mt.starts_with("application/vnd.docker.image.rootfs.") =>
            {
                "layer"
            }
            _ => "unknown",
        },
    };

    format!("{kind}-{key}")
}

fn invalid(reference: &str, reason: &str) -> EcrError {
    EcrError::InvalidReference(format!("{reference}: {reason}"))
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl FromStr for EcrSpec {
    type Err = EcrError;

    /// Parses `ecr.aws/<arn>[:tag][@digest]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(arn) = s.strip_prefix(ECR_REFERENCE_PREFIX) else {
            return Err(invalid(s, "missing ecr.aws/ prefix"));
        };

        let mut spec = Self::parse_arn(arn)?;
        if let Some(idx) = spec.repository.find([':', '@']) {
            let object = spec.repository.split_off(idx);
            spec.object = match object.strip_prefix(':') {
                Some(tagged) => tagged.to_string(),
                None => object,
            };
        }

        if spec.repository.is_empty() {
            return Err(invalid(s, "empty repository"));
        }

        Ok(spec)
    }
}

impl fmt::Display for EcrSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ECR_REFERENCE_PREFIX}{}", self.arn())?;
        if !self.object.is_empty() {
            if !self.object.starts_with('@') {
                write!(f, ":")?;
            }
            write!(f, "{}", self.object)?;
        }

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
