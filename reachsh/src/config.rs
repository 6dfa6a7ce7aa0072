//! Session configuration.
//!
//! [`SessionOptions`] is the part users write in configuration files; it
//! deserializes with serde and every field has a default. [`SessionConfig`]
//! joins it with the connection settings and the compiled patterns. It is
//! validated once on construction and never changes afterwards, so sessions
//! share it behind an `Arc`.

use std::time::Duration;

use serde::Deserialize;

use crate::channel::{DEFAULT_CHUNK_SIZE, PromptSpec, Prompts};
use crate::driver::{CommandPatterns, CommandRules};
use crate::error::ConfigError;
use crate::transport::SshConfig;

/// Timeouts, written as whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// TCP connect plus handshake, and each authentication attempt.
    #[serde(with = "seconds")]
    pub connect: Duration,

    /// Longest silence tolerated while a command runs.
    #[serde(with = "seconds")]
    pub command: Duration,

    /// Overall wait for the first prompt after login.
    #[serde(with = "seconds")]
    pub prompt_detection: Duration,

    /// Overall wait for the injected prompt marker.
    #[serde(with = "seconds")]
    pub prompt_set: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            command: Duration::from_secs(20),
            prompt_detection: Duration::from_secs(10),
            prompt_set: Duration::from_secs(5),
        }
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Behaviour settings shared by every host of a run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub prompt: PromptSpec,
    pub commands: CommandPatterns,
    pub timeouts: Timeouts,

    /// Inject the custom prompt marker after login.
    pub set_custom_prompt: bool,

    /// Bytes requested per channel read.
    pub read_chunk_size: usize,

    /// Bytes at the end of the output searched for the completion prompt.
    pub search_depth: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            prompt: PromptSpec::default(),
            commands: CommandPatterns::default(),
            timeouts: Timeouts::default(),
            set_custom_prompt: true,
            read_chunk_size: DEFAULT_CHUNK_SIZE,
            search_depth: 4 * DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Validated, immutable configuration for one host session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    ssh: SshConfig,
    options: SessionOptions,
    prompts: Prompts,
    rules: CommandRules,
}

impl SessionConfig {
    /// Validate `options` and compile its patterns.
    ///
    /// The connect timeout of `ssh` is replaced by `options.timeouts.connect`.
    pub fn new(mut ssh: SshConfig, options: SessionOptions) -> Result<Self, ConfigError> {
        if ssh.host.is_empty() {
            return Err(ConfigError::Missing("host"));
        }
        if ssh.credentials.username.is_empty() {
            return Err(ConfigError::Missing("username"));
        }
        if options.read_chunk_size == 0 {
            return Err(ConfigError::Invalid {
                name: "read_chunk_size",
                message: "must be greater than zero".to_string(),
            });
        }
        if options.search_depth < 2 * options.read_chunk_size {
            return Err(ConfigError::Invalid {
                name: "search_depth",
                message: format!(
                    "must be at least twice read_chunk_size ({})",
                    options.read_chunk_size
                ),
            });
        }

        let timeouts = [
            ("timeouts.connect", options.timeouts.connect),
            ("timeouts.command", options.timeouts.command),
            ("timeouts.prompt_detection", options.timeouts.prompt_detection),
            ("timeouts.prompt_set", options.timeouts.prompt_set),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, t)| t.is_zero()) {
            return Err(ConfigError::Invalid {
                name: *name,
                message: "must be non-zero".to_string(),
            });
        }

        let prompts = options.prompt.compile()?;
        let rules = options.commands.compile()?;
        ssh.connect_timeout = options.timeouts.connect;

        Ok(Self {
            ssh,
            options,
            prompts,
            rules,
        })
    }

    pub fn ssh(&self) -> &SshConfig {
        &self.ssh
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.options.timeouts
    }

    /// Compiled prompt patterns.
    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    /// Compiled command classification rules.
    pub fn rules(&self) -> &CommandRules {
        &self.rules
    }
}
