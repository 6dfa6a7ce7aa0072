//! SSH transport implementation using russh.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::{ChannelStream, Disconnect};

use super::config::{HostKeyVerification, SshConfig};
use super::{AuthOutcome, Connector};
use crate::error::TransportError;

/// SSH transport wrapping a russh client session.
pub struct SshTransport {
    /// The russh session handle (None until connected).
    session: Option<Handle<SshHandler>>,

    /// Configuration used for this connection.
    config: SshConfig,
}

impl SshTransport {
    /// Create an unconnected transport.
    pub fn new(config: SshConfig) -> Self {
        Self {
            session: None,
            config,
        }
    }

    fn handle(&mut self) -> Result<&mut Handle<SshHandler>, TransportError> {
        self.session.as_mut().ok_or(TransportError::NotConnected)
    }
}

impl Connector for SshTransport {
    type Stream = ChannelStream<Msg>;

    fn host(&self) -> &str {
        &self.config.host
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        let ssh_config = Arc::new(client::Config {
            keepalive_interval: Some(Duration::from_secs(30)),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: self.config.host.clone(),
            port: self.config.port,
            host_key_verification: self.config.host_key_verification.clone(),
            known_hosts_path: self.config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        let timeout = self.config.connect_timeout;
        let session = tokio::time::timeout(
            timeout,
            client::connect(
                ssh_config,
                (self.config.host.as_str(), self.config.port),
                handler,
            ),
        )
        .await
        .map_err(|_| TransportError::Timeout(timeout))?
        .map_err(|e| {
            // check_server_key leaves a detailed error behind; prefer it over
            // the generic russh::Error::UnknownKey
            let stored = host_key_error.lock().ok().and_then(|mut slot| slot.take());
            match (stored, e) {
                (Some(hk_err), _) => hk_err,
                (None, russh::Error::IO(source)) => TransportError::ConnectionFailed {
                    host: self.config.host.clone(),
                    port: self.config.port,
                    source,
                },
                (None, e) => TransportError::Ssh(e),
            }
        })?;

        debug!("SSH handshake complete with {}", self.config.socket_addr());
        self.session = Some(session);
        Ok(())
    }

    async fn authenticate_agent(&mut self, username: &str) -> Result<AuthOutcome, TransportError> {
        #[cfg(unix)]
        {
            let mut agent = match russh::keys::agent::client::AgentClient::connect_env().await {
                Ok(agent) => agent,
                Err(e) => {
                    debug!("Failed to connect to SSH agent: {}", e);
                    return Ok(AuthOutcome::Unavailable);
                }
            };

            let identities = match agent.request_identities().await {
                Ok(identities) if !identities.is_empty() => identities,
                Ok(_) => {
                    debug!("SSH agent holds no identities");
                    return Ok(AuthOutcome::Unavailable);
                }
                Err(e) => {
                    debug!("Failed to get identities from SSH agent: {}", e);
                    return Ok(AuthOutcome::Unavailable);
                }
            };

            let session = self.handle()?;
            let rsa_hash = session
                .best_supported_rsa_hash()
                .await
                .map_err(TransportError::Ssh)?
                .flatten();

            for identity in identities {
                let hash_alg = if identity.algorithm().is_rsa() {
                    rsa_hash
                } else {
                    None
                };

                match session
                    .authenticate_publickey_with(username, identity, hash_alg, &mut agent)
                    .await
                {
                    Ok(result) if result.success() => return Ok(AuthOutcome::Accepted),
                    Ok(_) => debug!("SSH agent key rejected, trying next"),
                    Err(e) => debug!("SSH agent key failed: {}", e),
                }
            }

            Ok(AuthOutcome::Rejected)
        }

        #[cfg(not(unix))]
        {
            let _ = username;
            Ok(AuthOutcome::Unavailable)
        }
    }

    async fn authenticate_key(
        &mut self,
        username: &str,
        path: &Path,
        passphrase: Option<&str>,
    ) -> Result<AuthOutcome, TransportError> {
        debug!("Decrypting private key...");
        let key = load_secret_key(path, passphrase).map_err(|e| TransportError::Key(e.to_string()))?;

        let session = self.handle()?;

        // Get the best RSA hash algorithm supported by the server
        let hash_alg = session
            .best_supported_rsa_hash()
            .await
            .map_err(TransportError::Ssh)?
            .flatten();

        let accepted = session
            .authenticate_publickey(username, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
            .await
            .map_err(TransportError::Ssh)?
            .success();

        Ok(if accepted {
            AuthOutcome::Accepted
        } else {
            AuthOutcome::Rejected
        })
    }

    async fn authenticate_password(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<AuthOutcome, TransportError> {
        let accepted = self
            .handle()?
            .authenticate_password(username, password)
            .await
            .map_err(TransportError::Ssh)?
            .success();

        Ok(if accepted {
            AuthOutcome::Accepted
        } else {
            AuthOutcome::Rejected
        })
    }

    async fn open_shell(&mut self) -> Result<ChannelStream<Msg>, TransportError> {
        let (width, height) = (self.config.terminal_width, self.config.terminal_height);
        let session = self.handle()?;

        let channel = session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(true, "vt100", width, height, 0, 0, &[])
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        Ok(channel.into_stream())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(session) = self.session.take() {
            session
                .disconnect(Disconnect::ByApplication, "", "en")
                .await
                .map_err(TransportError::Ssh)?;
            debug!("Connection to {} closed", self.config.host);
        }
        Ok(())
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so connect() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found,
    /// `Err(TransportError::HostKeyChanged)` if key changed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, err: TransportError) -> bool {
        debug!("Rejecting host key for {}:{}: {}", self.host, self.port, err);
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(err);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        match self.host_key_verification {
            HostKeyVerification::Disabled => Ok(true),

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key: {}", e);
                    }
                    Ok(true)
                }
                Err(e) => Ok(self.reject(e)),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => Ok(self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                })),
                Err(e) => Ok(self.reject(e)),
            },
        }
    }
}
