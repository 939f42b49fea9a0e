//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::serde_utils::duration_secs;

/// Default SSH port used to reach intermediate hops unless a hop
/// declares its own listen port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// A host/port pair identifying one end of a forwarding link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Hostname or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl Endpoint {
    /// Create a new endpoint
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl From<(&str, u16)> for Endpoint {
    fn from((host, port): (&str, u16)) -> Self {
        Self::new(host, port)
    }
}

/// Credentials used to authenticate against one hop.
///
/// Treated as opaque pass-through data by the orchestration core; only the
/// secure-channel provider interprets it. Secrets are redacted from the
/// `Debug` representation.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HopAuth {
    /// Private key file on the machine driving the chain
    Key {
        path: PathBuf,
        #[serde(default)]
        passphrase: Option<String>,
    },
    /// Password authentication
    Password { password: String },
}

impl fmt::Debug for HopAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HopAuth::Key { path, passphrase } => f
                .debug_struct("Key")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
            HopAuth::Password { .. } => f
                .debug_struct("Password")
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Connection parameters for one hop in the chain.
///
/// All fields are explicit; nothing is forwarded to the provider that is
/// not named here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HopSpec {
    /// Bastion host address for this hop
    pub host: String,

    /// SSH listen port on this host; the chain-wide default applies
    /// when absent
    #[serde(default)]
    pub port: Option<u16>,

    /// Username for authentication
    #[serde(default = "default_username")]
    pub username: String,

    /// Credentials for this hop
    pub auth: HopAuth,

    /// Expected host key fingerprint; any key is accepted when unset
    #[serde(default)]
    pub host_key: Option<String>,

    /// Connection timeout, passed through to the provider
    #[serde(default = "default_connect_timeout", with = "duration_secs")]
    pub connect_timeout: Duration,
}

fn default_username() -> String {
    whoami::username()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

impl HopSpec {
    /// Create a spec for `host` with the given credentials and defaults
    /// for everything else
    pub fn new(host: impl Into<String>, auth: HopAuth) -> Self {
        Self {
            host: host.into(),
            port: None,
            username: default_username(),
            auth,
            host_key: None,
            connect_timeout: default_connect_timeout(),
        }
    }

    /// Override the hop's own SSH listen port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Override the username
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Pin the expected host key fingerprint
    pub fn with_host_key(mut self, fingerprint: impl Into<String>) -> Self {
        self.host_key = Some(fingerprint.into());
        self
    }

    /// Override the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// The addresses a hop must connect through and forward to.
///
/// Computed per hop by the chain resolver, consumed immediately by the
/// hop start path, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHop {
    /// Address the hop's secured channel is established through
    pub bastion: Endpoint,
    /// Address the hop forwards accepted connections to
    pub forward: Endpoint,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display() {
        assert_eq!(format!("{}", Endpoint::new("bastion1", 22)), "bastion1:22");
        assert_eq!(
            format!("{}", Endpoint::new("127.0.0.1", 8080)),
            "127.0.0.1:8080"
        );
    }

    #[test]
    fn test_hop_spec_builder() {
        let spec = HopSpec::new(
            "bastion1",
            HopAuth::Password {
                password: "secret".to_string(),
            },
        )
        .with_port(2222)
        .with_username("sshuser");

        assert_eq!(spec.host, "bastion1");
        assert_eq!(spec.port, Some(2222));
        assert_eq!(spec.username, "sshuser");
        assert!(spec.host_key.is_none());
    }

    #[test]
    fn test_auth_debug_redacts_secrets() {
        let auth = HopAuth::Password {
            password: "hunter2".to_string(),
        };
        let rendered = format!("{:?}", auth);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));

        let auth = HopAuth::Key {
            path: PathBuf::from("/home/user/.ssh/id_ed25519"),
            passphrase: Some("hunter2".to_string()),
        };
        let rendered = format!("{:?}", auth);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("id_ed25519"));
    }
}
