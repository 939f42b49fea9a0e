//! Error types for the hopchain ecosystem

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::Endpoint;

/// Top-level error type for chain construction and startup
#[derive(Error, Debug)]
pub enum TunnelError {
    /// The chain was constructed with no hops
    #[error("no hops provided in chain specification")]
    EmptyChain,

    /// A start was attempted while the chain already holds live hops
    #[error("chain is already started")]
    AlreadyStarted,

    /// The secure-channel provider could not establish a hop
    #[error("unable to start hop to '{target}': {source}")]
    HopStart {
        /// The resolved forward target of the failing hop
        target: Endpoint,
        #[source]
        source: ProviderError,
    },

    /// Hop address resolution failed
    #[error("resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Hop address resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Index does not name a hop in the chain
    #[error("hop index {index} out of range for chain of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A non-first hop was resolved before its predecessor reported a
    /// local bind port
    #[error("hop {index} cannot be resolved before hop {predecessor} has a local bind port")]
    PredecessorUnbound { index: usize, predecessor: usize },
}

/// Secure-channel provider failures
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Private key file not found
    #[error("private key not found at {path}")]
    KeyNotFound { path: String },

    /// Authentication was rejected by the hop
    #[error("authentication rejected by '{host}'")]
    AuthRejected { host: String },

    /// Host key verification failed
    #[error("host key verification failed for '{host}'")]
    HostKeyRejected { host: String },

    /// Connection attempt timed out
    #[error("connection to '{host}' timed out after {timeout:?}")]
    ConnectTimeout { host: String, timeout: Duration },

    /// The local forwarding listener could not be bound
    #[error("unable to bind local forwarding listener: {0}")]
    Bind(#[source] std::io::Error),

    /// Other provider error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Non-fatal failure while stopping one hop during teardown.
///
/// Teardown is best-effort; these are collected and reported in aggregate
/// rather than aborting the teardown loop.
#[derive(Error, Debug)]
#[error("failed to stop hop {index} ('{host}'): {source}")]
pub struct HopStopError {
    /// Index of the hop in start order
    pub index: usize,
    /// Host the hop was connected through
    pub host: String,
    #[source]
    pub source: ProviderError,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_start_error_carries_target_and_detail() {
        let err = TunnelError::HopStart {
            target: Endpoint::new("bastion2", 22),
            source: ProviderError::AuthRejected {
                host: "bastion1".to_string(),
            },
        };
        let rendered = format!("{}", err);
        assert!(rendered.contains("bastion2:22"));
        assert!(rendered.contains("authentication rejected"));
    }

    #[test]
    fn test_hop_stop_error_display() {
        let err = HopStopError {
            index: 1,
            host: "bastion2".to_string(),
            source: ProviderError::Other(anyhow::anyhow!("connection reset")),
        };
        let rendered = format!("{}", err);
        assert!(rendered.contains("hop 1"));
        assert!(rendered.contains("bastion2"));
        assert!(rendered.contains("connection reset"));
    }
}
