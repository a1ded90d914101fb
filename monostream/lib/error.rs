//! `monostream::error` is a module containing error utilities for the monostream crate.

use std::{
    error::Error,
    fmt::{self, Display},
};

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a monostream-related operation.
pub type StreamResult<T> = Result<T, StreamError>;

/// An error that occurred while moving a byte stream through a chunk pipeline.
#[derive(pretty_error_debug::Debug, Error)]
pub enum StreamError {
    /// An error that occurred while reading from the source stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured chunk size was zero.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    /// The transfer was cancelled before the source stream was exhausted.
    #[error("transfer cancelled")]
    Cancelled,

    /// The task reading the source stream panicked or was aborted.
    #[error("chunk producer terminated abnormally: {0}")]
    ProducerPanicked(#[from] tokio::task::JoinError),

    /// Custom error.
    #[error("Custom error: {0}")]
    Custom(#[from] AnyError),
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl StreamError {
    /// Creates a new `Err` result.
    pub fn custom(error: impl Into<anyhow::Error>) -> StreamError {
        StreamError::Custom(AnyError {
            error: error.into(),
        })
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

/// Creates an `Ok` `StreamResult`.
#[allow(non_snake_case)]
pub fn Ok<T>(value: T) -> StreamResult<T> {
    Result::Ok(value)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

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
