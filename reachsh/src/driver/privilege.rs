//! Command classification for sub-shells and privilege escalation.
//!
//! The injected prompt marker lives in `PS1` of the login shell. Commands
//! that enter a configuration sub-shell or switch user start a prompt that
//! does not carry it, so those exchanges complete on the native prompt
//! regex instead.

use regex::Regex;
use serde::Deserialize;

use crate::error::ConfigError;

/// Default patterns for commands entering a configuration sub-shell.
pub const DEFAULT_SUB_SHELL_PATTERNS: &[&str] = &[r"^conf(igure)?(\s+t(erminal)?)?$"];

/// Default patterns for commands that switch to another user.
pub const DEFAULT_ESCALATION_PATTERNS: &[&str] = &[r"^sudo\s+(su|root|-i|-s)\b", r"^su(\s|$)"];

/// What kind of prompt a command leaves behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Returns to the same shell.
    Ordinary,

    /// Enters a nested configuration shell.
    SubShell,

    /// Starts a shell as another user.
    Escalation,
}

impl CommandKind {
    /// Whether the injected prompt marker can be expected after this command.
    pub fn keeps_custom_prompt(&self) -> bool {
        matches!(self, Self::Ordinary)
    }
}

/// Command patterns as written by users.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CommandPatterns {
    /// Regexes for commands that enter a configuration sub-shell.
    pub sub_shell: Vec<String>,

    /// Regexes for commands that start a shell as another user.
    pub escalation: Vec<String>,
}

impl Default for CommandPatterns {
    fn default() -> Self {
        Self {
            sub_shell: DEFAULT_SUB_SHELL_PATTERNS.iter().map(|p| p.to_string()).collect(),
            escalation: DEFAULT_ESCALATION_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl CommandPatterns {
    /// Compile the pattern lists.
    pub fn compile(&self) -> Result<CommandRules, ConfigError> {
        Ok(CommandRules {
            sub_shell: compile_all("sub_shell", &self.sub_shell)?,
            escalation: compile_all("escalation", &self.escalation)?,
        })
    }
}

fn compile_all(name: &'static str, patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|source| ConfigError::InvalidPattern { name, source }))
        .collect()
}

/// Compiled command classification rules.
#[derive(Debug, Clone)]
pub struct CommandRules {
    sub_shell: Vec<Regex>,
    escalation: Vec<Regex>,
}

impl CommandRules {
    /// Classify a command. Escalation wins when both lists match.
    pub fn classify(&self, command: &str) -> CommandKind {
        let command = command.trim();
        if self.escalation.iter().any(|re| re.is_match(command)) {
            CommandKind::Escalation
        } else if self.sub_shell.iter().any(|re| re.is_match(command)) {
            CommandKind::SubShell
        } else {
            CommandKind::Ordinary
        }
    }
}
