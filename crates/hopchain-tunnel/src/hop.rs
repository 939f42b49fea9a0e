//! Hop lifecycle management
//!
//! A [`Hop`] owns one running forwarding channel. It is created by a
//! successful start and holds the provider handle for its lifetime; the
//! local bind port is observable only while the underlying channel is
//! live.

use hopchain_core::{
    ChannelHandle, ChannelProvider, Endpoint, HopSpec, ProviderError, ResolvedHop, TunnelError,
};

/// One running hop in a tunnel chain
#[derive(Debug)]
pub struct Hop<H: ChannelHandle> {
    spec: HopSpec,
    forward: Endpoint,
    handle: Option<H>,
}

impl<H: ChannelHandle> Hop<H> {
    /// Start a hop by opening a secured channel through
    /// `resolved.bastion` to `resolved.forward` with `spec`'s
    /// credentials.
    ///
    /// On provider failure the error carries the resolved forward target
    /// and the provider's failure detail.
    pub async fn start<P>(
        provider: &P,
        resolved: ResolvedHop,
        spec: HopSpec,
    ) -> Result<Self, TunnelError>
    where
        P: ChannelProvider<Handle = H>,
    {
        tracing::debug!(
            host = %spec.host,
            bastion = %resolved.bastion,
            forward = %resolved.forward,
            "opening secured channel"
        );

        let handle = provider
            .open(&resolved.bastion, &resolved.forward, &spec)
            .await
            .map_err(|source| {
                tracing::error!(target = %resolved.forward, error = %source, "unable to start hop");
                TunnelError::HopStart {
                    target: resolved.forward.clone(),
                    source,
                }
            })?;

        tracing::debug!(
            host = %spec.host,
            port = handle.local_bind_port(),
            "hop established"
        );

        Ok(Self {
            spec,
            forward: resolved.forward,
            handle: Some(handle),
        })
    }

    /// The spec this hop was started from
    pub fn spec(&self) -> &HopSpec {
        &self.spec
    }

    /// The address this hop forwards to
    pub fn forward(&self) -> &Endpoint {
        &self.forward
    }

    /// Whether the underlying channel is still live.
    ///
    /// Reflects current provider state, not merely "was started".
    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .map(ChannelHandle::is_active)
            .unwrap_or(false)
    }

    /// Local bind port of this hop; `Some` iff the hop is active
    pub fn local_bind_port(&self) -> Option<u16> {
        self.handle
            .as_ref()
            .filter(|h| h.is_active())
            .map(|h| h.local_bind_port())
    }

    /// Stop the hop. Safe to call on an already-stopped hop.
    pub async fn stop(&mut self) -> Result<(), ProviderError> {
        match self.handle.take() {
            Some(mut handle) => {
                tracing::debug!(host = %self.spec.host, "closing secured channel");
                handle.close().await
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use hopchain_core::HopAuth;

    #[derive(Debug)]
    struct TestHandle {
        port: u16,
        active: Arc<AtomicBool>,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ChannelHandle for TestHandle {
        fn local_bind_port(&self) -> u16 {
            self.port
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }

        async fn close(&mut self) -> Result<(), ProviderError> {
            self.active.store(false, Ordering::SeqCst);
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct TestProvider {
        fail: bool,
        active: Arc<AtomicBool>,
        closes: Arc<AtomicUsize>,
    }

    impl TestProvider {
        fn new() -> Self {
            Self {
                fail: false,
                active: Arc::new(AtomicBool::new(true)),
                closes: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl ChannelProvider for TestProvider {
        type Handle = TestHandle;

        async fn open(
            &self,
            bastion: &Endpoint,
            _forward: &Endpoint,
            _spec: &HopSpec,
        ) -> Result<TestHandle, ProviderError> {
            if self.fail {
                return Err(ProviderError::AuthRejected {
                    host: bastion.host.clone(),
                });
            }
            Ok(TestHandle {
                port: 42000,
                active: Arc::clone(&self.active),
                closes: Arc::clone(&self.closes),
            })
        }
    }

    fn resolved() -> ResolvedHop {
        ResolvedHop {
            bastion: Endpoint::new("bastion1", 22),
            forward: Endpoint::new("127.0.0.1", 8080),
        }
    }

    fn spec() -> HopSpec {
        HopSpec::new(
            "bastion1",
            HopAuth::Password {
                password: "test".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_port_observable_only_while_active() {
        let provider = TestProvider::new();
        let hop = Hop::start(&provider, resolved(), spec()).await.unwrap();

        assert!(hop.is_active());
        assert_eq!(hop.local_bind_port(), Some(42000));

        // provider-side death makes the port unobservable
        provider.active.store(false, Ordering::SeqCst);
        assert!(!hop.is_active());
        assert_eq!(hop.local_bind_port(), None);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let provider = TestProvider::new();
        let mut hop = Hop::start(&provider, resolved(), spec()).await.unwrap();

        hop.stop().await.unwrap();
        hop.stop().await.unwrap();

        assert_eq!(provider.closes.load(Ordering::SeqCst), 1);
        assert!(!hop.is_active());
        assert_eq!(hop.local_bind_port(), None);
    }

    #[tokio::test]
    async fn test_start_failure_carries_target() {
        let provider = TestProvider::failing();
        let err = Hop::start(&provider, resolved(), spec()).await.unwrap_err();

        match err {
            TunnelError::HopStart { target, source } => {
                assert_eq!(target, Endpoint::new("127.0.0.1", 8080));
                assert!(matches!(source, ProviderError::AuthRejected { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
