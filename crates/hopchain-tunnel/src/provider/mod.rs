//! Secure-channel provider implementations

pub mod ssh;

pub use ssh::{SshProvider, SshTunnel};
