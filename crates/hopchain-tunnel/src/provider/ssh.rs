//! SSH-backed secure-channel provider
//!
//! Opens one SSH session per hop, binds an ephemeral loopback listener,
//! and forwards each accepted connection through a `direct-tcpip` channel
//! to the hop's forward target.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use russh::client::{self, Config, Handle};
use russh::Disconnect;
use russh_keys::key::PublicKey;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use hopchain_core::{ChannelHandle, ChannelProvider, Endpoint, HopAuth, HopSpec, ProviderError};

/// How long `close` waits for the accept loop to wind down.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Secure-channel provider backed by an SSH client.
///
/// One instance serves a whole chain; each `open` call produces an
/// independent session and listener.
pub struct SshProvider {
    config: Arc<Config>,
}

impl SshProvider {
    /// Create a provider with default SSH client settings
    pub fn new() -> Self {
        Self {
            config: Arc::new(Config::default()),
        }
    }
}

impl Default for SshProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelProvider for SshProvider {
    type Handle = SshTunnel;

    async fn open(
        &self,
        bastion: &Endpoint,
        forward: &Endpoint,
        spec: &HopSpec,
    ) -> Result<SshTunnel, ProviderError> {
        let handler = ClientHandler {
            host: bastion.host.clone(),
            expected_host_key: spec.host_key.clone(),
        };

        tracing::debug!(bastion = %bastion, "connecting");
        let mut session = tokio::time::timeout(
            spec.connect_timeout,
            client::connect(
                Arc::clone(&self.config),
                (bastion.host.as_str(), bastion.port),
                handler,
            ),
        )
        .await
        .map_err(|_| ProviderError::ConnectTimeout {
            host: bastion.host.clone(),
            timeout: spec.connect_timeout,
        })?
        .map_err(|e| {
            // russh reports a key rejected by the handler as an
            // "unknown server key" error
            if e.to_string().contains("server key") {
                ProviderError::HostKeyRejected {
                    host: bastion.host.clone(),
                }
            } else {
                ProviderError::Other(anyhow!("failed to connect to {}: {}", bastion, e))
            }
        })?;

        tracing::debug!(user = %spec.username, bastion = %bastion, "authenticating");
        let authenticated = match &spec.auth {
            HopAuth::Key { path, passphrase } => {
                if !path.exists() {
                    return Err(ProviderError::KeyNotFound {
                        path: path.display().to_string(),
                    });
                }
                let key = russh_keys::load_secret_key(path, passphrase.as_deref()).map_err(|e| {
                    ProviderError::Other(anyhow!(
                        "failed to load key {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                session
                    .authenticate_publickey(&spec.username, Arc::new(key))
                    .await
                    .map_err(|e| ProviderError::Other(anyhow!("authentication error: {}", e)))?
            }
            HopAuth::Password { password } => session
                .authenticate_password(&spec.username, password)
                .await
                .map_err(|e| ProviderError::Other(anyhow!("authentication error: {}", e)))?,
        };

        if !authenticated {
            return Err(ProviderError::AuthRejected {
                host: bastion.host.clone(),
            });
        }

        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(ProviderError::Bind)?;
        let local_port = listener.local_addr().map_err(ProviderError::Bind)?.port();

        tracing::debug!(port = local_port, forward = %forward, "local listener bound");

        let session = Arc::new(session);
        let shutdown = CancellationToken::new();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&session),
            forward.clone(),
            shutdown.clone(),
        ));

        Ok(SshTunnel {
            local_port,
            session,
            shutdown,
            accept_task: Some(accept_task),
        })
    }
}

/// A live SSH forwarding channel for one hop
pub struct SshTunnel {
    local_port: u16,
    session: Arc<Handle<ClientHandler>>,
    shutdown: CancellationToken,
    accept_task: Option<JoinHandle<()>>,
}

#[async_trait]
impl ChannelHandle for SshTunnel {
    fn local_bind_port(&self) -> u16 {
        self.local_port
    }

    fn is_active(&self) -> bool {
        !self.shutdown.is_cancelled() && !self.session.is_closed()
    }

    async fn close(&mut self) -> Result<(), ProviderError> {
        if self.shutdown.is_cancelled() {
            return Ok(());
        }
        self.shutdown.cancel();

        if let Some(task) = self.accept_task.take() {
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, task).await;
        }

        if !self.session.is_closed() {
            self.session
                .disconnect(Disconnect::ByApplication, "tunnel closed", "en")
                .await
                .map_err(|e| ProviderError::Other(anyhow!("disconnect failed: {}", e)))?;
        }

        Ok(())
    }
}

/// Accept local connections and forward each through its own channel
async fn accept_loop(
    listener: TcpListener,
    session: Arc<Handle<ClientHandler>>,
    forward: Endpoint,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!(forward = %forward, "forwarding listener shutting down");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed, stopping listener");
                        break;
                    }
                };

                let session = Arc::clone(&session);
                let forward = forward.clone();
                tokio::spawn(async move {
                    if let Err(e) = forward_connection(stream, peer, session, forward).await {
                        tracing::debug!(error = ?e, "forwarded connection ended");
                    }
                });
            }
        }
    }
}

/// Pump one accepted connection through a `direct-tcpip` channel
async fn forward_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    session: Arc<Handle<ClientHandler>>,
    forward: Endpoint,
) -> anyhow::Result<()> {
    let channel = session
        .channel_open_direct_tcpip(
            forward.host.clone(),
            u32::from(forward.port),
            peer.ip().to_string(),
            u32::from(peer.port()),
        )
        .await
        .with_context(|| format!("failed to open channel to {}", forward))?;

    let mut remote = channel.into_stream();
    tokio::io::copy_bidirectional(&mut stream, &mut remote)
        .await
        .context("forwarding stream closed")?;

    Ok(())
}

/// SSH client handler verifying the hop's host key
struct ClientHandler {
    host: String,
    expected_host_key: Option<String>,
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = anyhow::Error;

    /// Verify the server's host key against the hop's pinned
    /// fingerprint, accepting any key when none is pinned.
    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();
        match &self.expected_host_key {
            Some(expected) if *expected != fingerprint => {
                tracing::warn!(
                    host = %self.host,
                    %fingerprint,
                    %expected,
                    "host key differs from pinned fingerprint"
                );
                Ok(false)
            }
            Some(_) => {
                tracing::debug!(host = %self.host, "host key verified against pinned fingerprint");
                Ok(true)
            }
            None => {
                tracing::debug!(host = %self.host, %fingerprint, "no pinned host key, accepting");
                Ok(true)
            }
        }
    }
}
