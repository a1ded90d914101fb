use getset::CopyGetters;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::utils;

use super::{
    DEFAULT_LAYER_QUEUE_SIZE, DEFAULT_PIPE_CAPACITY, LAYER_QUEUE_SIZE_ENV_VAR,
    PIPE_CAPACITY_ENV_VAR,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Tuning for [`LayerWriter`](crate::oci::LayerWriter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TypedBuilder, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct LayerWriterConfig {
    /// The number of parts read ahead of the part being uploaded.
    #[serde(default = "LayerWriterConfig::default_queue_size")]
    #[builder(default = LayerWriterConfig::default_queue_size())]
    queue_size: usize,

    /// The number of part-sized segments buffered between the caller and the upload task.
    ///
    /// Writes are cut into segments of at most one part, so together with `queue_size` this bounds
    /// the memory a layer upload holds at roughly `(pipe_capacity + queue_size + 1)` parts.
    #[serde(default = "LayerWriterConfig::default_pipe_capacity")]
    #[builder(default = LayerWriterConfig::default_pipe_capacity())]
    pipe_capacity: usize,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LayerWriterConfig {
    /// Loads the configuration from `MONOECR_LAYER_QUEUE_SIZE` and `MONOECR_PIPE_CAPACITY`,
    /// using the defaults for variables that are unset or invalid.
    pub fn from_env() -> Self {
        Self {
            queue_size: utils::env_or(LAYER_QUEUE_SIZE_ENV_VAR, DEFAULT_LAYER_QUEUE_SIZE),
            pipe_capacity: utils::env_or(PIPE_CAPACITY_ENV_VAR, DEFAULT_PIPE_CAPACITY),
        }
    }

    fn default_queue_size() -> usize {
        DEFAULT_LAYER_QUEUE_SIZE
    }

    fn default_pipe_capacity() -> usize {
        DEFAULT_PIPE_CAPACITY
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for LayerWriterConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_writer_config_defaults() {
        let config = LayerWriterConfig::default();
        assert_eq!(config.queue_size(), DEFAULT_LAYER_QUEUE_SIZE);
        assert_eq!(config.pipe_capacity(), DEFAULT_PIPE_CAPACITY);

        let config = LayerWriterConfig::builder().queue_size(1).build();
        assert_eq!(config.queue_size(), 1);
        assert_eq!(config.pipe_capacity(), DEFAULT_PIPE_CAPACITY);
    }

    #[test]
    fn test_layer_writer_config_deserializes_partial_json() -> anyhow::Result<()> {
        let config: LayerWriterConfig = serde_json::from_str(r#"{"queue_size": 2}"#)?;
        assert_eq!(config.queue_size(), 2);
        assert_eq!(config.pipe_capacity(), DEFAULT_PIPE_CAPACITY);
        Ok(())
    }
}
