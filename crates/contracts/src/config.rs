//! FanoutConfig - Config Loader output
//!
//! Describes the forwarder: listener tuning, input framing, output routes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default number of buffered payloads per subscriber
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Complete forwarder configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct FanoutConfig {
    /// Listening sink tuning
    #[serde(default)]
    #[validate(nested)]
    pub listen: ListenConfig,

    /// Input framing
    #[serde(default)]
    #[validate(nested)]
    pub input: InputConfig,

    /// Output routes
    #[serde(default)]
    pub outputs: Vec<OutputConfig>,
}

/// Tuning shared by all listening sinks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ListenConfig {
    /// Payloads buffered per subscriber before it is dropped
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1, max = 65536))]
    pub queue_capacity: usize,

    /// How long `close` waits for sender tasks before aborting them
    #[serde(default = "default_shutdown_timeout_ms")]
    #[validate(range(min = 1))]
    pub shutdown_timeout_ms: u64,

    /// Disable Nagle on accepted TCP connections
    #[serde(default = "default_tcp_nodelay")]
    pub tcp_nodelay: bool,
}

impl ListenConfig {
    /// Shutdown timeout as a `Duration`
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            tcp_nodelay: default_tcp_nodelay(),
        }
    }
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_shutdown_timeout_ms() -> u64 {
    2000
}

fn default_tcp_nodelay() -> bool {
    true
}

/// How the forwarder cuts its input into writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// One write per line (newline included)
    #[default]
    Line,
    /// One write per raw read
    Chunk,
}

/// Input configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct InputConfig {
    /// Framing mode
    #[serde(default)]
    pub framing: Framing,

    /// Read buffer size for chunk framing
    #[serde(default = "default_chunk_size")]
    #[validate(range(min = 1, max = 16777216))]
    pub chunk_size: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            framing: Framing::default(),
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    8192
}

/// One output route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Resolution string, `scheme://argument`
    pub uri: String,
}

impl OutputConfig {
    /// Create from a resolution string
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_defaults() {
        let config = ListenConfig::default();
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(2));
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_missing_sections_take_defaults() {
        let config: FanoutConfig =
            serde_json::from_str(r#"{"outputs":[{"uri":"stdout"}]}"#).unwrap();
        assert_eq!(config.listen, ListenConfig::default());
        assert_eq!(config.input.framing, Framing::Line);
        assert_eq!(config.outputs[0].uri, "stdout");
    }

    #[test]
    fn test_zero_queue_capacity_is_invalid() {
        let mut config = FanoutConfig::default();
        config.listen.queue_capacity = 0;
        assert!(config.validate().is_err());
    }
}
