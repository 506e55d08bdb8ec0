//! Reader configuration.
//!
//! ```rust
//! use propbag::{JsonValidationType, SerializedObjectReaderConfig};
//!
//! let config = SerializedObjectReaderConfig::new()
//!     .with_block_size(4096)
//!     .with_validation_type(JsonValidationType::Simple);
//! assert!(config.validate().is_ok());
//!
//! let broken = SerializedObjectReaderConfig::new().with_token_buffer_size(2);
//! assert!(broken.validate().is_err());
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

pub const MIN_BLOCK_SIZE: usize = 16;
pub const MIN_TOKEN_BUFFER_SIZE: usize = 16;
pub const MIN_OUTPUT_BUFFER_SIZE: usize = 16;
pub const MIN_NODE_BUFFER_SIZE: usize = 1;

/// How strictly the tokenizer checks its input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JsonValidationType {
    /// Only structural checks: brackets must balance, separators are optional.
    None,
    /// Strict JSON.
    #[default]
    Standard,
    /// Relaxed JSON: unquoted keys and values, `=` as key separator,
    /// optional and trailing commas.
    Simple,
}

impl JsonValidationType {
    #[inline]
    pub(crate) fn is_relaxed(self) -> bool {
        !matches!(self, JsonValidationType::Standard)
    }
}

/// Buffer sizes and validation mode of a
/// [`SerializedObjectReader`](crate::SerializedObjectReader).
///
/// Sizes below their minimum are rejected when the reader is constructed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializedObjectReaderConfig {
    /// Bytes read from the source per block.
    pub block_size: usize,
    /// Live tokens the tokenizer may hold; bounds the nesting depth.
    pub token_buffer_size: usize,
    /// Initial capacity of the packed token data buffer.
    pub output_buffer_size: usize,
    /// Initial capacity of the node stack and of batch reads.
    pub node_buffer_size: usize,
    pub validation_type: JsonValidationType,
    /// Prefetch blocks on a background thread (owned readers only).
    pub use_read_async: bool,
}

impl Default for SerializedObjectReaderConfig {
    fn default() -> Self {
        SerializedObjectReaderConfig {
            block_size: 64 * 1024,
            token_buffer_size: 1024,
            output_buffer_size: 64 * 1024,
            node_buffer_size: 128,
            validation_type: JsonValidationType::default(),
            use_read_async: false,
        }
    }
}

impl SerializedObjectReaderConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    #[must_use]
    pub fn with_token_buffer_size(mut self, token_buffer_size: usize) -> Self {
        self.token_buffer_size = token_buffer_size;
        self
    }

    #[must_use]
    pub fn with_output_buffer_size(mut self, output_buffer_size: usize) -> Self {
        self.output_buffer_size = output_buffer_size;
        self
    }

    #[must_use]
    pub fn with_node_buffer_size(mut self, node_buffer_size: usize) -> Self {
        self.node_buffer_size = node_buffer_size;
        self
    }

    #[must_use]
    pub fn with_validation_type(mut self, validation_type: JsonValidationType) -> Self {
        self.validation_type = validation_type;
        self
    }

    #[must_use]
    pub fn with_read_async(mut self, use_read_async: bool) -> Self {
        self.use_read_async = use_read_async;
        self
    }

    /// Checks every buffer against its minimum viable size.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("block_size", self.block_size, MIN_BLOCK_SIZE),
            ("token_buffer_size", self.token_buffer_size, MIN_TOKEN_BUFFER_SIZE),
            ("output_buffer_size", self.output_buffer_size, MIN_OUTPUT_BUFFER_SIZE),
            ("node_buffer_size", self.node_buffer_size, MIN_NODE_BUFFER_SIZE),
        ];
        for (name, value, min) in checks {
            if value < min {
                return Err(Error::invalid_configuration(&format!(
                    "{name} is {value}, minimum is {min}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SerializedObjectReaderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_minimums() {
        let config = SerializedObjectReaderConfig::new()
            .with_block_size(MIN_BLOCK_SIZE)
            .with_token_buffer_size(MIN_TOKEN_BUFFER_SIZE)
            .with_output_buffer_size(MIN_OUTPUT_BUFFER_SIZE)
            .with_node_buffer_size(MIN_NODE_BUFFER_SIZE);
        assert!(config.validate().is_ok());

        let err = config.with_block_size(MIN_BLOCK_SIZE - 1).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(ref m) if m.contains("block_size")));
    }

    #[test]
    fn test_partial_config_from_json() {
        let config: SerializedObjectReaderConfig =
            serde_json::from_str(r#"{"block_size": 32, "validation_type": "Simple"}"#).unwrap();
        assert_eq!(config.block_size, 32);
        assert_eq!(config.validation_type, JsonValidationType::Simple);
        assert_eq!(config.token_buffer_size, 1024);
    }
}
