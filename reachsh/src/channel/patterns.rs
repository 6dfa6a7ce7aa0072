//! Prompt patterns used for completion detection.

use regex::bytes::Regex;
use serde::Deserialize;

use crate::error::ConfigError;

/// Default regex for a host's native prompt.
pub const DEFAULT_PROMPT_REGEX: &str = r"[$#>]( )?$";

/// Default regex for the injected prompt marker.
pub const DEFAULT_CUSTOM_PROMPT_REGEX: &str = r"\[REACH\]# $";

/// Default injected prompt marker.
pub const DEFAULT_CUSTOM_PROMPT: &str = "[REACH]# ";

/// Prompt configuration as written by users.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PromptSpec {
    /// Matches the host's native prompt.
    pub detection_regex: String,

    /// Matches the prompt once the marker has been appended.
    pub custom_regex: String,

    /// Literal appended to `PS1`.
    pub custom_literal: String,
}

impl Default for PromptSpec {
    fn default() -> Self {
        Self {
            detection_regex: DEFAULT_PROMPT_REGEX.to_string(),
            custom_regex: DEFAULT_CUSTOM_PROMPT_REGEX.to_string(),
            custom_literal: DEFAULT_CUSTOM_PROMPT.to_string(),
        }
    }
}

impl PromptSpec {
    /// Compile every pattern, failing on the first invalid one.
    pub fn compile(&self) -> Result<Prompts, ConfigError> {
        let detection = compile("detection_regex", &self.detection_regex)?;
        let custom = compile("custom_regex", &self.custom_regex)?;
        let custom_unanchored =
            compile("custom_regex", strip_trailing_anchor(&self.custom_regex))?;

        if self.custom_literal.contains('\'') || self.custom_literal.contains('\n') {
            return Err(ConfigError::Invalid {
                name: "custom_literal",
                message: "must not contain single quotes or newlines".to_string(),
            });
        }

        Ok(Prompts {
            detection,
            custom,
            custom_unanchored,
            custom_literal: self.custom_literal.clone(),
        })
    }
}

/// Compiled prompt patterns, shared read-only by a session.
#[derive(Debug, Clone)]
pub struct Prompts {
    /// Native prompt.
    pub detection: Regex,

    /// Injected marker, anchored at end of output.
    pub custom: Regex,

    /// Injected marker without the trailing anchor, used to count
    /// occurrences while the marker is being set.
    pub custom_unanchored: Regex,

    /// Literal appended to `PS1`.
    pub custom_literal: String,
}

fn compile(name: &'static str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern { name, source })
}

/// Drop a trailing end-of-text `$` anchor, leaving an escaped `\$` alone.
pub fn strip_trailing_anchor(pattern: &str) -> &str {
    let Some(stripped) = pattern.strip_suffix('$') else {
        return pattern;
    };
    let backslashes = stripped.bytes().rev().take_while(|&b| b == b'\\').count();
    if backslashes % 2 == 1 {
        pattern
    } else {
        stripped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_detection_regex() {
        let prompts = PromptSpec::default().compile().unwrap();
        assert!(prompts.detection.is_match(b"user@host:~$ "));
        assert!(prompts.detection.is_match(b"root@host:~#"));
        assert!(prompts.detection.is_match(b"router>"));
        assert!(!prompts.detection.is_match(b"Password: "));
        assert!(!prompts.detection.is_match(b"total 5$ more"));
    }

    #[test]
    fn test_custom_regex_pair() {
        let prompts = PromptSpec::default().compile().unwrap();
        assert!(prompts.custom.is_match(b"user@host:~$ [REACH]# "));
        assert!(!prompts.custom.is_match(b"echo [REACH]# done"));
        assert_eq!(
            prompts
                .custom_unanchored
                .find_iter(b"PS1=$PS1'[REACH]# '\r\nuser@host:~$ [REACH]# ")
                .count(),
            2
        );
    }

    #[test]
    fn test_strip_trailing_anchor() {
        assert_eq!(strip_trailing_anchor(r"\[REACH\]# $"), r"\[REACH\]# ");
        assert_eq!(strip_trailing_anchor(r"[$#>]( )?$"), r"[$#>]( )?");
        assert_eq!(strip_trailing_anchor(r"cost \$"), r"cost \$");
        assert_eq!(strip_trailing_anchor(r"odd \\$"), r"odd \\");
        assert_eq!(strip_trailing_anchor("plain"), "plain");
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        let spec = PromptSpec {
            detection_regex: "([".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            spec.compile(),
            Err(ConfigError::InvalidPattern {
                name: "detection_regex",
                ..
            })
        ));

        let spec = PromptSpec {
            custom_literal: "it's> ".to_string(),
            ..Default::default()
        };
        assert!(matches!(spec.compile(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_deserialize_partial() {
        let spec: PromptSpec = serde_json::from_str(r#"{"detection_regex": "%\\s*$"}"#).unwrap();
        assert_eq!(spec.detection_regex, r"%\s*$");
        assert_eq!(spec.custom_literal, DEFAULT_CUSTOM_PROMPT);
    }
}
