//! 配置错误

use thiserror::Error;

/// Configuration loading error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Content could not be parsed or serialized
    #[error("config parse error: {message}")]
    Parse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Parsed but not acceptable
    #[error("config validation error at '{field}': {message}")]
    Validation { field: String, message: String },

    /// File could not be read
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Create parse error without a source
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            source: None,
        }
    }

    /// Create validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}
