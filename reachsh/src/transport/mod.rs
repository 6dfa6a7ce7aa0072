//! SSH transport layer wrapping russh.
//!
//! This module provides connection setup, the authentication fallback chain
//! and the interactive shell stream used by the channel layer.

pub(crate) mod auth;
pub mod config;
mod ssh;

use std::future::Future;
use std::path::Path;

use tokio::io::{AsyncRead, AsyncWrite};

pub use auth::{AuthKind, AuthOutcome, ConnectStatus, authenticate};
pub use config::{Credentials, HostKeyVerification, SshConfig};
pub use ssh::SshTransport;

use crate::error::TransportError;

/// A connection that can authenticate and hand out one interactive shell.
///
/// Each authentication method is attempted at most once per connection; the
/// ordering and timeouts are driven by [`authenticate`].
pub trait Connector: Send {
    /// Byte stream of the interactive shell.
    type Stream: AsyncRead + AsyncWrite + Send + 'static;

    /// Host this connector talks to (for logging).
    fn host(&self) -> &str;

    /// Establish the network connection and verify the host key.
    fn connect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Try every identity offered by the SSH agent.
    fn authenticate_agent(
        &mut self,
        username: &str,
    ) -> impl Future<Output = Result<AuthOutcome, TransportError>> + Send;

    /// Load a private key file and offer it.
    fn authenticate_key(
        &mut self,
        username: &str,
        path: &Path,
        passphrase: Option<&str>,
    ) -> impl Future<Output = Result<AuthOutcome, TransportError>> + Send;

    /// Password authentication.
    fn authenticate_password(
        &mut self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<AuthOutcome, TransportError>> + Send;

    /// Request a PTY and invoke the login shell.
    fn open_shell(&mut self) -> impl Future<Output = Result<Self::Stream, TransportError>> + Send;

    /// Close the connection. Calling this on a closed connector is a no-op.
    fn disconnect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
