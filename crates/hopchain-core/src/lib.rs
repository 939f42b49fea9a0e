//! hopchain-core: Core abstractions for multi-hop tunnelling
//!
//! This crate provides the shared types, error taxonomy, hop address
//! resolution, configuration structures, and the secure-channel provider
//! seam used by the tunnel orchestration crate.

pub mod config;
pub mod error;
pub mod resolve;
pub mod traits;
pub mod types;

pub use error::{ConfigError, HopStopError, ProviderError, ResolveError, TunnelError};
pub use resolve::ChainResolver;
pub use traits::{ChannelHandle, ChannelProvider};
pub use types::{Endpoint, HopAuth, HopSpec, ResolvedHop, DEFAULT_SSH_PORT};
