//! Secure-channel provider seam
//!
//! The single external collaborator the orchestration core depends on.
//! A provider turns a resolved `(bastion, forward)` pair plus hop
//! credentials into a running forwarding channel; the returned handle
//! exposes the locally bound port and live status.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{Endpoint, HopSpec};

/// Establishes secured forwarding channels for individual hops
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    /// The handle type for channels opened by this provider
    type Handle: ChannelHandle;

    /// Open a forwarding channel through `bastion` to `forward`,
    /// authenticating with the credentials in `spec`.
    ///
    /// On success the returned handle is live and accepting connections
    /// on its local bind port.
    async fn open(
        &self,
        bastion: &Endpoint,
        forward: &Endpoint,
        spec: &HopSpec,
    ) -> Result<Self::Handle, ProviderError>;
}

/// A running forwarding channel
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Local port the channel listens on
    fn local_bind_port(&self) -> u16;

    /// Whether the underlying channel is still live.
    ///
    /// Reflects current provider state, not merely "was started".
    fn is_active(&self) -> bool;

    /// Close the channel. Must be safe to call more than once.
    async fn close(&mut self) -> Result<(), ProviderError>;
}
