//! Tunnel network orchestration
//!
//! The [`TunnelNetwork`] owns the ordered hop list and drives the chain
//! state machine: sequential startup in dependency order, rollback of
//! partially started chains, reverse-order best-effort teardown, and the
//! locally reachable entry point of the finished chain.
//!
//! Startup is inherently sequential: each hop after the first connects
//! through the local port bound by its predecessor, so that port must be
//! known before the next hop can be resolved.

use std::future::Future;

use tokio::sync::mpsc;

use hopchain_core::{
    config::ChainConfig, ChainResolver, ChannelProvider, Endpoint, HopSpec, HopStopError,
    ProviderError, TunnelError, DEFAULT_SSH_PORT,
};

use crate::hop::Hop;

/// Lifecycle notifications emitted by a [`TunnelNetwork`].
///
/// Delivered best-effort to the injected event sink; the network never
/// blocks on, or fails because of, its observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A hop was started and bound a local port
    HopStarted { index: usize, local_bind_port: u16 },
    /// A hop could not be started; the chain is being rolled back
    HopStartFailed { index: usize, target: Endpoint },
    /// A hop was stopped during teardown or rollback
    HopStopped { index: usize },
    /// Every hop started; the chain is usable at `entry_port`
    ChainActive { entry_port: u16 },
    /// The chain returned to the fully stopped state
    ChainStopped,
}

/// An ordered chain of forwarding hops ending at a final target.
///
/// The chain is observably in one of two steady states: fully stopped
/// (no hops) or fully started. A failed start attempt rolls back every
/// hop it started before reporting the failure, so callers never see a
/// half-initialized chain.
pub struct TunnelNetwork<P: ChannelProvider> {
    provider: P,
    specs: Vec<HopSpec>,
    final_target: Endpoint,
    ssh_port: u16,
    hops: Vec<Hop<P::Handle>>,
    events: Option<mpsc::UnboundedSender<NetworkEvent>>,
}

impl<P: ChannelProvider> TunnelNetwork<P> {
    /// Create a network over the given hop specs and final target.
    ///
    /// Fails with [`TunnelError::EmptyChain`] if `specs` is empty.
    pub fn new(provider: P, specs: Vec<HopSpec>, final_target: Endpoint) -> Result<Self, TunnelError> {
        if specs.is_empty() {
            return Err(TunnelError::EmptyChain);
        }

        Ok(Self {
            provider,
            specs,
            final_target,
            ssh_port: DEFAULT_SSH_PORT,
            hops: Vec::new(),
            events: None,
        })
    }

    /// Create a network from a chain configuration
    pub fn from_config(provider: P, config: ChainConfig) -> Result<Self, TunnelError> {
        Ok(Self::new(provider, config.hops, config.target)?.with_ssh_port(config.ssh_port))
    }

    /// Override the chain-wide SSH port (default 22).
    ///
    /// Consulted only for hops whose successor does not declare its own
    /// listen port; never for the final hop's forward target.
    pub fn with_ssh_port(mut self, ssh_port: u16) -> Self {
        self.ssh_port = ssh_port;
        self
    }

    /// Attach an event sink observing chain lifecycle transitions
    pub fn with_event_sink(mut self, events: mpsc::UnboundedSender<NetworkEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// The final destination the chain forwards to
    pub fn final_target(&self) -> &Endpoint {
        &self.final_target
    }

    /// Number of live hops
    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    /// Start every hop in order, first to last.
    ///
    /// Blocks (asynchronously) for the cumulative latency of every hop:
    /// hop `i+1` cannot be resolved until hop `i` has bound its local
    /// port. On success the chain is active and the returned port is the
    /// local entry point to the whole chain.
    ///
    /// On any hop failure, every hop started in this attempt is stopped
    /// again in reverse order and the typed failure is returned; the
    /// chain is left fully stopped and may be restarted.
    pub async fn start_all(&mut self) -> Result<u16, TunnelError> {
        if !self.hops.is_empty() {
            return Err(TunnelError::AlreadyStarted);
        }

        tracing::debug!(
            hops = self.specs.len(),
            target = %self.final_target,
            "starting tunnel chain"
        );

        for index in 0..self.specs.len() {
            let bound: Vec<u16> = self.hops.iter().filter_map(Hop::local_bind_port).collect();

            let resolved = ChainResolver::new(&self.specs, &self.final_target, self.ssh_port)
                .resolve(index, &bound);
            let resolved = match resolved {
                Ok(resolved) => resolved,
                Err(err) => {
                    tracing::error!(index, error = %err, "failed to resolve hop addresses");
                    self.rollback().await;
                    return Err(err.into());
                }
            };

            let spec = self.specs[index].clone();
            let started = Hop::start(&self.provider, resolved, spec).await;
            match started {
                Ok(hop) => {
                    if let Some(port) = hop.local_bind_port() {
                        tracing::info!(index, port, host = %hop.spec().host, "hop started");
                        self.emit(NetworkEvent::HopStarted {
                            index,
                            local_bind_port: port,
                        });
                    }
                    self.hops.push(hop);
                }
                Err(err) => {
                    if let TunnelError::HopStart { target, .. } = &err {
                        self.emit(NetworkEvent::HopStartFailed {
                            index,
                            target: target.clone(),
                        });
                    }
                    self.rollback().await;
                    return Err(err);
                }
            }
        }

        match self.entry_point() {
            Some(entry_port) => {
                tracing::info!(entry_port, "tunnel chain active");
                self.emit(NetworkEvent::ChainActive { entry_port });
                Ok(entry_port)
            }
            None => {
                // a hop died between its start and chain completion
                tracing::error!("chain lost a hop during startup");
                self.rollback().await;
                Err(TunnelError::HopStart {
                    target: self.final_target.clone(),
                    source: ProviderError::Other(anyhow::anyhow!(
                        "hop became inactive during startup"
                    )),
                })
            }
        }
    }

    /// Stop every hop, last to first.
    ///
    /// Best-effort: a failing stop is logged and collected, never fatal,
    /// and never prevents the remaining hops from being attempted. The
    /// hop list is empty afterwards.
    pub async fn stop_all(&mut self) -> Vec<HopStopError> {
        if self.hops.is_empty() {
            return Vec::new();
        }

        tracing::debug!(hops = self.hops.len(), "stopping tunnel chain");

        let mut failures = Vec::new();
        while let Some(mut hop) = self.hops.pop() {
            let index = self.hops.len();
            if let Err(source) = hop.stop().await {
                tracing::warn!(index, host = %hop.spec().host, error = %source, "failed to stop hop");
                failures.push(HopStopError {
                    index,
                    host: hop.spec().host.clone(),
                    source,
                });
            }
            self.emit(NetworkEvent::HopStopped { index });
        }

        self.emit(NetworkEvent::ChainStopped);
        failures
    }

    /// Whether the chain is fully started and every hop is live.
    ///
    /// An empty chain reports `false`.
    pub fn is_active(&self) -> bool {
        !self.hops.is_empty() && self.hops.iter().all(Hop::is_active)
    }

    /// Local port reaching the whole chain, if any.
    ///
    /// This is the last hop's local bind port; `None` when the chain is
    /// stopped.
    pub fn entry_point(&self) -> Option<u16> {
        self.hops.last().and_then(Hop::local_bind_port)
    }

    /// Scoped use of the chain: start it, run `body` with the entry
    /// port, and stop it again on every path out of the body.
    ///
    /// A failed acquisition has already rolled itself back; no separate
    /// teardown call is required in either case.
    pub async fn scoped<T, F, Fut>(&mut self, body: F) -> Result<T, TunnelError>
    where
        F: FnOnce(u16) -> Fut,
        Fut: Future<Output = T>,
    {
        let entry_port = self.start_all().await?;
        let output = body(entry_port).await;

        let failures = self.stop_all().await;
        for failure in &failures {
            tracing::warn!(error = %failure, "teardown failure after scoped use");
        }

        Ok(output)
    }

    /// Undo a partially started chain, reverse order, best-effort.
    async fn rollback(&mut self) {
        if self.hops.is_empty() {
            return;
        }

        tracing::warn!(started = self.hops.len(), "rolling back partially started chain");
        let failures = self.stop_all().await;
        for failure in &failures {
            tracing::warn!(error = %failure, "stop failure during rollback");
        }
    }

    fn emit(&self, event: NetworkEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
