//! Builder for creating host sessions.

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;

use super::session::Session;
use crate::cipher::Cipher;
use crate::config::{SessionConfig, SessionOptions};
use crate::error::{ConfigError, Result};
use crate::results::{NullResultsLog, ResultsLog};
use crate::transport::{Credentials, HostKeyVerification, SshConfig, SshTransport};

/// Builder for constructing SSH sessions.
///
/// # Example
///
/// ```rust,no_run
/// use reachsh::driver::{DialogueSpec, HostSession, SessionBuilder};
///
/// # async fn example() -> Result<(), reachsh::Error> {
/// let mut session = SessionBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .trust_hosts(true)
///     .build()?;
///
/// if session.connect().await.is_connected() {
///     let result = session.run_dialogue(&DialogueSpec::new("uname -a")).await?;
///     println!("{}", result.result);
/// }
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<SecretString>,
    private_key: Option<PathBuf>,
    agent_only: bool,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    terminal_width: u32,
    terminal_height: u32,
    options: SessionOptions,
    cipher: Option<Arc<Cipher>>,
    results: Option<Arc<dyn ResultsLog>>,
}

impl SessionBuilder {
    /// Create a new session builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: None,
            password: None,
            private_key: None,
            agent_only: false,
            host_key_verification: HostKeyVerification::Strict,
            known_hosts_path: None,
            terminal_width: 511,
            terminal_height: 24,
            options: SessionOptions::default(),
            cipher: None,
            results: None,
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password. It doubles as the private key passphrase.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Set the private key file.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.private_key = Some(key_path.into());
        self
    }

    /// Only try SSH agent authentication.
    pub fn agent_only(mut self, agent_only: bool) -> Self {
        self.agent_only = agent_only;
        self
    }

    /// Accept any host key when `true`.
    pub fn trust_hosts(mut self, trust_hosts: bool) -> Self {
        self.host_key_verification = HostKeyVerification::from_trust_hosts(trust_hosts);
        self
    }

    /// Set the host key verification mode.
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Set a custom known_hosts file path.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Set terminal dimensions.
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Set behaviour options (timeouts, prompts, command patterns).
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the cipher used to decrypt `$CT=` responses.
    pub fn cipher(mut self, cipher: Arc<Cipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Set the results log (default: discard).
    pub fn results_log(mut self, results: Arc<dyn ResultsLog>) -> Self {
        self.results = Some(results);
        self
    }

    /// Validate the settings into a shareable configuration.
    pub fn build_config(self) -> std::result::Result<SessionConfig, ConfigError> {
        self.into_parts().map(|(config, _, _)| config)
    }

    /// Build the session.
    ///
    /// This validates the configuration but does not connect. Call
    /// `connect()` on the returned session to log in.
    pub fn build(self) -> Result<Session<SshTransport>> {
        let (config, cipher, results) = self.into_parts()?;
        Ok(Session::new(Arc::new(config), cipher, results))
    }

    fn into_parts(
        self,
    ) -> std::result::Result<(SessionConfig, Arc<Cipher>, Arc<dyn ResultsLog>), ConfigError> {
        let username = self.username.ok_or(ConfigError::Missing("username"))?;

        let credentials = Credentials {
            username,
            password: self.password,
            private_key: self.private_key,
            agent_only: self.agent_only,
        };

        let mut ssh = SshConfig::new(self.host, credentials);
        ssh.port = self.port;
        ssh.terminal_width = self.terminal_width;
        ssh.terminal_height = self.terminal_height;
        ssh.host_key_verification = self.host_key_verification;
        ssh.known_hosts_path = self.known_hosts_path;

        let config = SessionConfig::new(ssh, self.options)?;
        let cipher = self.cipher.unwrap_or_default();
        let results = self
            .results
            .unwrap_or_else(|| Arc::new(NullResultsLog) as Arc<dyn ResultsLog>);
        Ok((config, cipher, results))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_username_is_required() {
        let err = SessionBuilder::new("web01").build_config().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("username")));
    }

    #[test]
    fn test_settings_reach_config() {
        let mut options = SessionOptions::default();
        options.timeouts.connect = Duration::from_secs(4);

        let config = SessionBuilder::new("web01")
            .port(2222)
            .username("ops")
            .password("secret")
            .private_key("/home/ops/.ssh/id_ed25519")
            .trust_hosts(true)
            .options(options)
            .build_config()
            .unwrap();

        let ssh = config.ssh();
        assert_eq!(ssh.socket_addr(), "web01:2222");
        assert_eq!(ssh.credentials.username, "ops");
        assert!(ssh.credentials.password.is_some());
        assert!(!ssh.credentials.agent_only);
        assert_eq!(ssh.host_key_verification, HostKeyVerification::Disabled);
        assert_eq!(ssh.connect_timeout, Duration::from_secs(4));
    }

    #[test]
    fn test_build_leaves_session_closed() {
        use crate::driver::HostSession;

        let session = SessionBuilder::new("web01").username("ops").build().unwrap();
        assert!(!session.is_open());
        assert_eq!(session.status(), None);
    }
}
