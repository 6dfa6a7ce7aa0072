//! SSH connection configuration.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys. Connection fails if the host
    /// is not already in known_hosts.
    #[default]
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    AcceptNew,

    /// Accept all keys without checking.
    Disabled,
}

impl HostKeyVerification {
    /// Policy for the `trust unknown hosts` switch.
    pub fn from_trust_hosts(trust_hosts: bool) -> Self {
        if trust_hosts { Self::Disabled } else { Self::Strict }
    }
}

/// Login credentials, tried in order agent, private key, password.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Remote user name.
    pub username: String,

    /// Password, also used as the private key passphrase.
    pub password: Option<SecretString>,

    /// Private key file.
    pub private_key: Option<PathBuf>,

    /// Only try SSH agent authentication.
    pub agent_only: bool,
}

impl Credentials {
    /// Credentials for a user with no secrets configured yet.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }
}

/// SSH connection configuration.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// SSH port (default: 22).
    pub port: u16,

    /// Authentication material.
    pub credentials: Credentials,

    /// Timeout for the TCP connect/handshake and for each authentication attempt.
    pub connect_timeout: Duration,

    /// Terminal width for PTY.
    pub terminal_width: u32,

    /// Terminal height for PTY.
    pub terminal_height: u32,

    /// Host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file (default: ~/.ssh/known_hosts).
    pub known_hosts_path: Option<PathBuf>,
}

impl SshConfig {
    /// Create a configuration for a host with defaults for everything else.
    pub fn new(host: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            host: host.into(),
            port: 22,
            credentials,
            connect_timeout: Duration::from_secs(10),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::Strict,
            known_hosts_path: None,
        }
    }

    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
