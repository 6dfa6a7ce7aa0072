//! Error types for reachsh.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for reachsh operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Dialogue-level errors
    #[error("Dialogue error: {0}")]
    Dialogue(#[from] DialogueError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Cipher text errors
    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host is not present in known_hosts
    #[error("Host {host}:{port} not found in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key does not match the known_hosts entry
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Operation on a transport that is not connected
    #[error("Transport not connected")]
    NotConnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (interactive shell stream).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// No data arrived within the read timeout
    #[error("No data received within {0:?}")]
    Timeout(Duration),

    /// Remote side closed the channel
    #[error("Channel closed")]
    Closed,

    /// I/O error on the channel stream
    #[error("Channel I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Dialogue layer errors (command exchange).
#[derive(Error, Debug)]
pub enum DialogueError {
    /// Session has no open channel
    #[error("Session not connected - call connect() first")]
    NotConnected,

    /// Malformed dialogue request, rejected before any I/O
    #[error("Invalid dialogue: {message}")]
    Invalid { message: String },
}

/// Configuration errors raised while building a session.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required setting missing
    #[error("Missing setting: {0}")]
    Missing(&'static str),

    /// A configured regex does not compile
    #[error("Invalid regex for {name}: {source}")]
    InvalidPattern {
        name: &'static str,
        #[source]
        source: regex::Error,
    },

    /// Setting present but unusable
    #[error("Invalid setting {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Errors from decrypting `$CT=` values or loading cipher keys.
#[derive(Error, Debug)]
pub enum CipherError {
    /// Cipher text is not valid base64
    #[error("Cipher text is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// Cipher text too short or padding check failed
    #[error("Cipher text could not be decrypted with this key")]
    Decrypt,

    /// Decrypted bytes are not UTF-8
    #[error("Decrypted text is not UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Key file could not be read
    #[error("Cannot read cipher key file: {0}")]
    KeyFile(#[from] io::Error),

    /// Key file holds no usable line
    #[error("Cipher key file is empty")]
    EmptyKeyFile,
}

/// Result type alias using reachsh's Error.
pub type Result<T> = std::result::Result<T, Error>;
