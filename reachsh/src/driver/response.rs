//! Result type for a command dialogue.

use std::fmt;
use std::time::Duration;

/// Token in a search list meaning "no other search string matched" is
/// itself an expected outcome.
pub const NOT_FOUND_SENTINEL: &str = "$NF";

/// Message attached to a dialogue that hit the command timeout.
pub const TIMEOUT_MESSAGE: &str = "Command timeout. No more commands will be sent to this host.";

/// How a dialogue ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogueOutcome {
    /// The completion prompt was seen.
    Completed,

    /// No output arrived within the command timeout.
    TimedOut,
}

/// Classification of the output against the requested search strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchMatch {
    /// The first search string (in declaration order) present in the output.
    Found(String),

    /// Nothing matched and the not-found sentinel was requested.
    NotFound,

    /// Nothing matched, or no search was requested.
    NoMatch,
}

impl SearchMatch {
    /// Name of the matched entry as it appears in the search list.
    ///
    /// `NotFound` is reported as the sentinel token, `NoMatch` as `None`.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Found(s) => Some(s),
            Self::NotFound => Some(NOT_FOUND_SENTINEL),
            Self::NoMatch => None,
        }
    }

    /// Whether a search string or the sentinel matched.
    pub fn is_match(&self) -> bool {
        !matches!(self, Self::NoMatch)
    }
}

/// Result of one command dialogue.
#[derive(Debug, Clone)]
pub struct DialogueResult {
    /// The command that was sent.
    pub command: String,

    /// Output after the echoed command, wrap artifacts and the injected
    /// prompt marker removed.
    pub result: String,

    /// Whole buffer with wrap artifacts removed.
    pub raw_result: String,

    /// Prompt text that completed the dialogue (empty on timeout).
    pub prompt: String,

    /// Search classification.
    pub search: SearchMatch,

    /// Report string mapped to the matched search entry, if any.
    pub report: Option<String>,

    /// How the dialogue ended.
    pub outcome: DialogueOutcome,

    /// Wait strings present in the output whose response was never sent
    /// because the prompt returned first.
    pub unanswered_waits: Vec<String>,

    /// Wait strings that never appeared.
    pub missing_waits: Vec<String>,

    /// Time taken by the exchange.
    pub elapsed: Duration,
}

impl DialogueResult {
    /// Whether the completion prompt was seen.
    pub fn is_completed(&self) -> bool {
        self.outcome == DialogueOutcome::Completed
    }

    /// Whether no further commands should be sent to this host.
    pub fn halts_host(&self) -> bool {
        self.outcome == DialogueOutcome::TimedOut
    }

    /// Operator-facing error message, if the dialogue failed.
    pub fn error_message(&self) -> Option<&'static str> {
        match self.outcome {
            DialogueOutcome::Completed => None,
            DialogueOutcome::TimedOut => Some(TIMEOUT_MESSAGE),
        }
    }

    /// Get the result lines as an iterator.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.result.lines()
    }
}

impl fmt::Display for DialogueResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(outcome: DialogueOutcome) -> DialogueResult {
        DialogueResult {
            command: "true".into(),
            result: "line one\r\nline two".into(),
            raw_result: String::new(),
            prompt: "$ ".into(),
            search: SearchMatch::NoMatch,
            report: None,
            outcome,
            unanswered_waits: Vec::new(),
            missing_waits: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_timeout_halts_host() {
        let timed_out = result(DialogueOutcome::TimedOut);
        assert!(timed_out.halts_host());
        assert_eq!(timed_out.error_message(), Some(TIMEOUT_MESSAGE));

        let done = result(DialogueOutcome::Completed);
        assert!(!done.halts_host());
        assert!(done.error_message().is_none());
        assert_eq!(done.lines().count(), 2);
    }

    #[test]
    fn test_search_keys() {
        assert_eq!(SearchMatch::Found("ok".into()).as_key(), Some("ok"));
        assert_eq!(SearchMatch::NotFound.as_key(), Some(NOT_FOUND_SENTINEL));
        assert_eq!(SearchMatch::NoMatch.as_key(), None);
        assert!(SearchMatch::NotFound.is_match());
        assert!(!SearchMatch::NoMatch.is_match());
    }
}
