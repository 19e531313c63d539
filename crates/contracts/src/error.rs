//! Layered error definitions
//!
//! Categorized by phase: resolution / construction / runtime

use thiserror::Error;

/// Unified sink error type
#[derive(Debug, Error)]
pub enum SinkError {
    // ===== Resolution Errors =====
    /// No built-in or registered scheme matches
    #[error("unknown output protocol: {scheme}")]
    UnknownScheme { scheme: String },

    /// Scheme requires a non-empty argument
    #[error("{scheme}: no address supplied")]
    MissingArgument { scheme: String },

    /// Argument present but unusable (bad address, bad URL)
    #[error("{scheme}: invalid argument '{argument}': {message}")]
    InvalidArgument {
        scheme: String,
        argument: String,
        message: String,
    },

    // ===== Construction Errors =====
    /// Listening transport could not be bound
    #[error("{scheme}: failed to bind {address}: {source}")]
    Bind {
        scheme: String,
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Outbound connection could not be established
    #[error("{scheme}: failed to connect to {address}: {message}")]
    Dial {
        scheme: String,
        address: String,
        message: String,
    },

    // ===== Runtime Errors =====
    /// Operation attempted on a closed sink
    #[error("sink '{sink_name}' is closed")]
    Closed { sink_name: String },

    /// Listener died and took the broadcaster down with it
    #[error("sink '{sink_name}' listener failed: {cause}")]
    ListenerFailed { sink_name: String, cause: String },

    /// A downstream subscriber was dropped (never surfaced to producers)
    #[error("subscriber {subscriber_id} lost: {reason}")]
    SubscriberLost { subscriber_id: u64, reason: String },

    /// Transport write or close failure
    #[error("sink '{sink_name}' write error: {message}")]
    Write { sink_name: String, message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SinkError {
    /// Create unknown scheme error
    pub fn unknown_scheme(scheme: impl Into<String>) -> Self {
        Self::UnknownScheme {
            scheme: scheme.into(),
        }
    }

    /// Create missing argument error
    pub fn missing_argument(scheme: impl Into<String>) -> Self {
        Self::MissingArgument {
            scheme: scheme.into(),
        }
    }

    /// Create invalid argument error
    pub fn invalid_argument(
        scheme: impl Into<String>,
        argument: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            scheme: scheme.into(),
            argument: argument.into(),
            message: message.into(),
        }
    }

    /// Create bind failure
    pub fn bind(scheme: impl Into<String>, address: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            scheme: scheme.into(),
            address: address.into(),
            source,
        }
    }

    /// Create dial failure
    pub fn dial(
        scheme: impl Into<String>,
        address: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Dial {
            scheme: scheme.into(),
            address: address.into(),
            message: message.into(),
        }
    }

    /// Create closed error
    pub fn closed(sink_name: impl Into<String>) -> Self {
        Self::Closed {
            sink_name: sink_name.into(),
        }
    }

    /// Create sink write error
    pub fn write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the sink can no longer accept writes
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. } | Self::ListenerFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_argument_names_scheme() {
        let err = SinkError::missing_argument("tcp-listen");
        assert_eq!(err.to_string(), "tcp-listen: no address supplied");
    }

    #[test]
    fn test_closed_variants() {
        assert!(SinkError::closed("tcp-listen").is_closed());
        let failed = SinkError::ListenerFailed {
            sink_name: "tcp-listen".into(),
            cause: "socket gone".into(),
        };
        assert!(failed.is_closed());
        assert!(!SinkError::unknown_scheme("gopher").is_closed());
    }
}
