use std::{
    error::Error,
    fmt::{self, Display},
};

use monostream::StreamError;
use thiserror::Error;

use crate::client::ApiError;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a monoecr-related operation.
pub type EcrResult<T> = Result<T, EcrError>;

/// An error that occurred while pushing content to a registry.
#[derive(pretty_error_debug::Debug, Error)]
pub enum EcrError {
    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error raised by the chunked transfer engine.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// An error returned by the registry's API.
    #[error("registry api error: {0}")]
    Api(#[from] ApiError),

    /// The registry computed a different digest than the one the caller expected.
    #[error("failed to validate uploaded digest: expected {expected}, got {actual}")]
    DigestMismatch {
        /// The digest the caller asserted.
        expected: String,

        /// The digest the registry reported.
        actual: String,
    },

    /// The number of bytes transferred differs from the size the caller committed.
    #[error("size mismatch: expected {expected} bytes, transferred {actual}")]
    SizeMismatch {
        /// The size the caller asserted.
        expected: u64,

        /// The number of bytes that reached the registry.
        actual: u64,
    },

    /// The content is already present in the repository.
    #[error("content {0} already exists on remote")]
    AlreadyExists(String),

    /// No status is tracked for the given reference key.
    #[error("status not found: {0}")]
    NotFound(String),

    /// A reference could not be parsed.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// The operation is not supported by the writer.
    #[error("{0}: not implemented")]
    Unimplemented(WriterOperation),

    /// An earlier failure aborted the upload this writer was feeding.
    #[error("upload {0} was aborted")]
    UploadAborted(String),

    /// The upload was cancelled by the caller.
    #[error("upload cancelled")]
    Cancelled,

    /// A background task could not be joined.
    #[error("join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    /// The registry rejected a manifest.
    #[error("failed to put manifest {reference}: {source}")]
    PutManifest {
        /// The canonical reference of the manifest.
        reference: String,

        /// The underlying API failure.
        source: ApiError,
    },

    /// Custom error.
    #[error("Custom error: {0}")]
    Custom(#[from] AnyError),
}

/// A content writer operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterOperation {
    /// Closing a writer without committing it.
    Close,

    /// Truncating the content written so far.
    Truncate,
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl EcrError {
    /// Creates a new `Err` result.
    pub fn custom(error: impl Into<anyhow::Error>) -> EcrError {
        EcrError::Custom(AnyError {
            error: error.into(),
        })
    }

    /// Returns `true` if the error reports content that is already on the remote.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, EcrError::AlreadyExists(_))
    }
}

impl AnyError {
    /// Downcasts the error to a `T`.
    pub fn downcast<T>(&self) -> Option<&T>
    where
        T: Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<T>()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates an `Ok` `EcrResult`.
#[allow(non_snake_case)]
pub fn Ok<T>(value: T) -> EcrResult<T> {
    Result::Ok(value)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for WriterOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriterOperation::Close => write!(f, "close"),
            WriterOperation::Truncate => write!(f, "truncate"),
        }
    }
}

impl PartialEq for AnyError {
    fn eq(&self, other: &Self) -> bool {
        self.error.to_string() == other.error.to_string()
    }
}

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}
