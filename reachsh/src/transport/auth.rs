//! Authentication fallback chain and connection status taxonomy.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use log::debug;
use secrecy::ExposeSecret;

use super::Connector;
use super::config::Credentials;
use crate::error::TransportError;

/// Result of a single authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Server accepted the credentials.
    Accepted,

    /// Server rejected the credentials.
    Rejected,

    /// Method could not be attempted (e.g. no agent running).
    Unavailable,
}

/// Authentication method that produced a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    Agent,
    PrivateKey,
    Password,
}

/// Outcome of connecting to a host, as reported to operators.
///
/// Failures are values, not errors: the caller logs the status and moves on
/// to the next host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    /// Authenticated, shell open and prompt detected.
    Connected,

    /// Credentials rejected.
    NoAccess,

    /// Host missing from known_hosts.
    UnknownHost,

    /// Host key differs from known_hosts.
    HostKeyChanged,

    /// Configured private key file does not exist.
    KeyFileMissing,

    /// DNS failure, refused connection or timeout.
    Unreachable,

    /// Any other SSH fault.
    ProtocolError,

    /// Logged in but no shell prompt appeared.
    PromptNotDetected,
}

impl ConnectStatus {
    /// Operator-facing description of the status.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Connected => "Connected",
            Self::NoAccess => "Authentication failed. Check user/pass or key/passphrase.",
            Self::UnknownHost => {
                "Not in known_hosts. Connect manually first, or enable trusting unknown hosts."
            }
            Self::HostKeyChanged => {
                "Host key changed. Connect manually first, or enable trusting unknown hosts."
            }
            Self::KeyFileMissing => "Missing private key file.",
            Self::Unreachable => "Unable to reach server. Check IP/Hostname or the logs.",
            Self::ProtocolError => "Unknown SSH error occurred. Check the logs.",
            Self::PromptNotDetected => "Unable to detect initial prompt",
        }
    }

    /// Whether the session is usable.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl From<&TransportError> for ConnectStatus {
    fn from(err: &TransportError) -> Self {
        match err {
            TransportError::ConnectionFailed { .. }
            | TransportError::Timeout(_)
            | TransportError::Io(_) => Self::Unreachable,
            TransportError::Ssh(russh::Error::IO(_)) => Self::Unreachable,
            TransportError::Ssh(russh::Error::UnknownKey) => Self::UnknownHost,
            TransportError::HostKeyUnknown { .. } | TransportError::KnownHosts(_) => {
                Self::UnknownHost
            }
            TransportError::HostKeyChanged { .. } => Self::HostKeyChanged,
            TransportError::Key(_) => Self::NoAccess,
            TransportError::Ssh(_) | TransportError::NotConnected => Self::ProtocolError,
        }
    }
}

/// Run the fixed fallback chain: agent, then private key, then password.
///
/// Each method is tried once, under its own `timeout`. With
/// `credentials.agent_only` the chain stops after the agent. When every
/// method fails, the status of the last method attempted is returned.
pub async fn authenticate<C: Connector>(
    connector: &mut C,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<AuthKind, ConnectStatus> {
    let username = credentials.username.as_str();
    let mut status = ConnectStatus::NoAccess;

    debug!("Trying agent authentication");
    match attempt(timeout, connector.authenticate_agent(username)).await {
        Ok(AuthOutcome::Accepted) => return Ok(AuthKind::Agent),
        Ok(AuthOutcome::Rejected) => status = ConnectStatus::NoAccess,
        Ok(AuthOutcome::Unavailable) => debug!("SSH agent unavailable, skipping"),
        Err(e) => {
            debug!("Agent authentication error: {}", e);
            status = ConnectStatus::from(&e);
        }
    }

    if credentials.agent_only {
        return Err(status);
    }

    let password = credentials.password.as_ref().map(|p| p.expose_secret());

    if let Some(path) = &credentials.private_key {
        debug!("Trying private key file: {}", path.display());
        if !path.is_file() {
            debug!("{}", ConnectStatus::KeyFileMissing);
            status = ConnectStatus::KeyFileMissing;
        } else {
            match attempt(timeout, connector.authenticate_key(username, path, password)).await {
                Ok(AuthOutcome::Accepted) => return Ok(AuthKind::PrivateKey),
                Ok(_) => status = ConnectStatus::NoAccess,
                Err(e) => {
                    debug!("Private key authentication error: {}", e);
                    status = ConnectStatus::from(&e);
                }
            }
        }
    }

    if let Some(password) = password {
        debug!("Trying user('{}')/password(********)", username);
        match attempt(timeout, connector.authenticate_password(username, password)).await {
            Ok(AuthOutcome::Accepted) => return Ok(AuthKind::Password),
            Ok(_) => status = ConnectStatus::NoAccess,
            Err(e) => {
                debug!("Password authentication error: {}", e);
                status = ConnectStatus::from(&e);
            }
        }
    }

    Err(status)
}

async fn attempt<F>(timeout: Duration, fut: F) -> Result<AuthOutcome, TransportError>
where
    F: Future<Output = Result<AuthOutcome, TransportError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| TransportError::Timeout(timeout))?
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::{Path, PathBuf};

    use secrecy::SecretString;
    use tokio_test::io::Mock;

    use super::*;

    /// Connector whose authentication results are scripted per method.
    pub(crate) struct FakeConnector {
        pub calls: Vec<AuthKind>,
        pub agent: Result<AuthOutcome, fn() -> TransportError>,
        pub key: Result<AuthOutcome, fn() -> TransportError>,
        pub password: Result<AuthOutcome, fn() -> TransportError>,
        pub connect_error: Option<fn() -> TransportError>,
        pub shell: Option<Mock>,
        pub disconnects: usize,
    }

    impl FakeConnector {
        pub(crate) fn new() -> Self {
            Self {
                calls: Vec::new(),
                agent: Ok(AuthOutcome::Unavailable),
                key: Ok(AuthOutcome::Rejected),
                password: Ok(AuthOutcome::Rejected),
                connect_error: None,
                shell: None,
                disconnects: 0,
            }
        }

        fn result(r: &Result<AuthOutcome, fn() -> TransportError>) -> Result<AuthOutcome, TransportError> {
            match r {
                Ok(outcome) => Ok(*outcome),
                Err(make) => Err(make()),
            }
        }
    }

    impl Connector for FakeConnector {
        type Stream = Mock;

        fn host(&self) -> &str {
            "fake-host"
        }

        async fn connect(&mut self) -> Result<(), TransportError> {
            match self.connect_error {
                Some(make) => Err(make()),
                None => Ok(()),
            }
        }

        async fn authenticate_agent(&mut self, _username: &str) -> Result<AuthOutcome, TransportError> {
            self.calls.push(AuthKind::Agent);
            Self::result(&self.agent)
        }

        async fn authenticate_key(
            &mut self,
            _username: &str,
            _path: &Path,
            _passphrase: Option<&str>,
        ) -> Result<AuthOutcome, TransportError> {
            self.calls.push(AuthKind::PrivateKey);
            Self::result(&self.key)
        }

        async fn authenticate_password(
            &mut self,
            _username: &str,
            _password: &str,
        ) -> Result<AuthOutcome, TransportError> {
            self.calls.push(AuthKind::Password);
            Self::result(&self.password)
        }

        async fn open_shell(&mut self) -> Result<Mock, TransportError> {
            self.shell.take().ok_or(TransportError::NotConnected)
        }

        async fn disconnect(&mut self) -> Result<(), TransportError> {
            self.disconnects += 1;
            Ok(())
        }
    }

    /// A path that exists for the key-file checks.
    pub(crate) fn existing_key_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml")
    }

    fn full_credentials() -> Credentials {
        Credentials {
            username: "ops".to_string(),
            password: Some(SecretString::from("secret".to_string())),
            private_key: Some(existing_key_path()),
            agent_only: false,
        }
    }

    #[tokio::test]
    async fn test_fallback_reaches_password() {
        let mut fake = FakeConnector::new();
        fake.agent = Ok(AuthOutcome::Rejected);
        fake.key = Err(|| TransportError::Key("bad passphrase".into()));
        fake.password = Ok(AuthOutcome::Accepted);

        let used = authenticate(&mut fake, &full_credentials(), Duration::from_secs(1)).await;

        assert_eq!(used, Ok(AuthKind::Password));
        assert_eq!(
            fake.calls,
            vec![AuthKind::Agent, AuthKind::PrivateKey, AuthKind::Password]
        );
    }

    #[tokio::test]
    async fn test_agent_success_stops_chain() {
        let mut fake = FakeConnector::new();
        fake.agent = Ok(AuthOutcome::Accepted);

        let used = authenticate(&mut fake, &full_credentials(), Duration::from_secs(1)).await;

        assert_eq!(used, Ok(AuthKind::Agent));
        assert_eq!(fake.calls, vec![AuthKind::Agent]);
    }

    #[tokio::test]
    async fn test_agent_only_is_terminal() {
        let mut fake = FakeConnector::new();
        fake.agent = Ok(AuthOutcome::Rejected);
        fake.password = Ok(AuthOutcome::Accepted);
        let mut creds = full_credentials();
        creds.agent_only = true;

        let used = authenticate(&mut fake, &creds, Duration::from_secs(1)).await;

        assert_eq!(used, Err(ConnectStatus::NoAccess));
        assert_eq!(fake.calls, vec![AuthKind::Agent]);
    }

    #[tokio::test]
    async fn test_missing_key_file_is_reported() {
        let mut fake = FakeConnector::new();
        let creds = Credentials {
            username: "ops".to_string(),
            password: None,
            private_key: Some(PathBuf::from("/nonexistent/reachsh/id_rsa")),
            agent_only: false,
        };

        let used = authenticate(&mut fake, &creds, Duration::from_secs(1)).await;

        assert_eq!(used, Err(ConnectStatus::KeyFileMissing));
        // The key is never offered to the server.
        assert_eq!(fake.calls, vec![AuthKind::Agent]);
    }

    #[tokio::test]
    async fn test_last_attempt_status_wins() {
        let mut fake = FakeConnector::new();
        let mut creds = full_credentials();
        creds.private_key = Some(PathBuf::from("/nonexistent/reachsh/id_rsa"));

        let used = authenticate(&mut fake, &creds, Duration::from_secs(1)).await;

        assert_eq!(used, Err(ConnectStatus::NoAccess));
        assert_eq!(fake.calls, vec![AuthKind::Agent, AuthKind::Password]);
    }

    #[test]
    fn test_status_classification() {
        let timeout = TransportError::Timeout(Duration::from_secs(1));
        assert_eq!(ConnectStatus::from(&timeout), ConnectStatus::Unreachable);

        let changed = TransportError::HostKeyChanged {
            host: "h".into(),
            port: 22,
            line: 3,
        };
        assert_eq!(ConnectStatus::from(&changed), ConnectStatus::HostKeyChanged);

        let unknown = TransportError::HostKeyUnknown {
            host: "h".into(),
            port: 22,
        };
        assert_eq!(ConnectStatus::from(&unknown), ConnectStatus::UnknownHost);

        let key = TransportError::Key("encrypted".into());
        assert_eq!(ConnectStatus::from(&key), ConnectStatus::NoAccess);

        assert_eq!(
            ConnectStatus::from(&TransportError::NotConnected),
            ConnectStatus::ProtocolError
        );
    }

    #[test]
    fn test_status_messages_are_distinct() {
        let all = [
            ConnectStatus::Connected,
            ConnectStatus::NoAccess,
            ConnectStatus::UnknownHost,
            ConnectStatus::HostKeyChanged,
            ConnectStatus::KeyFileMissing,
            ConnectStatus::Unreachable,
            ConnectStatus::ProtocolError,
            ConnectStatus::PromptNotDetected,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.message(), b.message());
            }
        }
        assert!(ConnectStatus::Connected.is_connected());
        assert!(!ConnectStatus::NoAccess.is_connected());
    }
}
