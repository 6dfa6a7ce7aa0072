//! Dialogue requests: a command, its search strings and wait/response pairs.
//!
//! Commands such as `passwd` or `sudo` ask for input before they finish.
//! Each wait string is a literal that triggers its response once it shows
//! up in the output; pairs are served in the order the host prints them,
//! not the order they were declared.

use secrecy::{ExposeSecret, SecretString};

use super::response::{NOT_FOUND_SENTINEL, SearchMatch};
use crate::cipher::{CIPHER_TEXT_MARKER, Cipher, MASK};
use crate::error::{CipherError, DialogueError};

/// Separator for lists given as a single string.
pub const STRINGS_DELIMITER: char = '|';

/// Key-stroke markers: marker, bytes sent, display form.
const KEY_STROKES: [(&str, &str, &str); 4] = [
    ("$ENTER_KEY", "\n", "<ENTER KEY>"),
    ("$RETURN_KEY", "\r", "<RETURN KEY>"),
    ("$TAB_KEY", "\t", "<TAB KEY>"),
    ("$SPACE_KEY", " ", "<SPACE KEY>"),
];

/// A trigger string and the response to send when it appears.
///
/// # Example
///
/// ```rust
/// use reachsh::driver::WaitResponse;
///
/// // Confirm a prompt with a bare carriage return
/// let pair = WaitResponse::new("Press RETURN", "$RETURN_KEY");
/// assert_eq!(pair.wait, "Press RETURN");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitResponse {
    /// Literal looked for in live output.
    pub wait: String,

    /// Response text, possibly holding key-stroke markers or a `$CT=` value.
    pub response: String,
}

impl WaitResponse {
    /// Create a new wait/response pair.
    pub fn new(wait: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            wait: wait.into(),
            response: response.into(),
        }
    }

    /// Expand markers and decrypt any cipher text.
    ///
    /// A response that used a key-stroke marker is sent exactly as
    /// expanded; any other response is trimmed and followed by a newline.
    pub fn prepare(&self, cipher: &Cipher) -> Result<PreparedResponse, CipherError> {
        let mut keystroke = false;

        let (payload, display) = match self.response.find(CIPHER_TEXT_MARKER) {
            Some(pos) => {
                let head = &self.response[..pos];
                let rest = &self.response[pos + CIPHER_TEXT_MARKER.len()..];
                let end = rest
                    .find(|c: char| !is_base64_char(c))
                    .unwrap_or(rest.len());
                let plaintext = cipher.decrypt(&rest[..end])?;

                let (head_payload, head_display) = expand_keystrokes(head, &mut keystroke);
                let (tail_payload, tail_display) = expand_keystrokes(&rest[end..], &mut keystroke);
                (
                    format!("{head_payload}{plaintext}{tail_payload}"),
                    format!("{head_display}{MASK}{tail_display}"),
                )
            }
            None => expand_keystrokes(&self.response, &mut keystroke),
        };

        let payload = if keystroke {
            payload
        } else {
            format!("{}\n", payload.trim())
        };

        Ok(PreparedResponse {
            wait: self.wait.clone(),
            payload: SecretString::from(payload),
            display,
        })
    }
}

fn is_base64_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')
}

fn expand_keystrokes(text: &str, used: &mut bool) -> (String, String) {
    let mut payload = text.to_string();
    let mut display = text.to_string();
    for (marker, bytes, shown) in KEY_STROKES {
        if payload.contains(marker) {
            *used = true;
            payload = payload.replace(marker, bytes);
            display = display.replace(marker, shown);
        }
    }
    (payload, display)
}

/// A response ready to be written to the channel.
#[derive(Debug, Clone)]
pub struct PreparedResponse {
    /// Literal looked for in live output.
    pub wait: String,

    payload: SecretString,

    /// Masked form safe for logs and screens.
    pub display: String,
}

impl PreparedResponse {
    /// Bytes to write, secrets included.
    pub fn payload(&self) -> &[u8] {
        self.payload.expose_secret().as_bytes()
    }
}

/// One command exchange.
///
/// # Example
///
/// ```rust
/// use reachsh::driver::DialogueSpec;
///
/// let spec = DialogueSpec::new("passwd testuser")
///     .wait("New", "mypass3")
///     .wait("Retype", "mypass3")
///     .search("successfully");
/// assert!(spec.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialogueSpec {
    /// Command line sent to the shell.
    pub command: String,

    /// Alternatives looked for in the finished output, in priority order.
    /// May contain the `$NF` sentinel.
    pub search: Vec<String>,

    /// Report strings, one per search entry, written to the results log
    /// instead of the bare match.
    pub report: Vec<String>,

    /// Wait/response pairs.
    pub waits: Vec<WaitResponse>,
}

impl DialogueSpec {
    /// A dialogue that just runs `command`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Add a search string.
    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search.push(search.into());
        self
    }

    /// Add a report string for the search entry at the same position.
    pub fn report(mut self, report: impl Into<String>) -> Self {
        self.report.push(report.into());
        self
    }

    /// Add a wait/response pair.
    pub fn wait(mut self, wait: impl Into<String>, response: impl Into<String>) -> Self {
        self.waits.push(WaitResponse::new(wait, response));
        self
    }

    /// Build a dialogue from `|`-delimited lists.
    ///
    /// Empty strings mean empty lists. Fails when the wait and response
    /// lists, or the search and report lists, have different lengths.
    pub fn from_delimited(
        command: &str,
        search: &str,
        report: &str,
        wait: &str,
        response: &str,
    ) -> Result<Self, DialogueError> {
        let waits = split_list(wait);
        let responses = split_list(response);
        if waits.len() != responses.len() {
            return Err(DialogueError::Invalid {
                message: format!(
                    "{} wait string(s) but {} response string(s)",
                    waits.len(),
                    responses.len()
                ),
            });
        }

        let spec = Self {
            command: command.to_string(),
            search: split_list(search),
            report: split_list(report),
            waits: waits
                .into_iter()
                .zip(responses)
                .map(|(wait, response)| WaitResponse { wait, response })
                .collect(),
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Check the request before anything is sent.
    pub fn validate(&self) -> Result<(), DialogueError> {
        let invalid = |message: &str| {
            Err(DialogueError::Invalid {
                message: message.to_string(),
            })
        };

        if self.command.trim().is_empty() {
            return invalid("command is empty");
        }
        if self.command.contains(['\n', '\r']) {
            return invalid("command must be a single line");
        }
        if self.search.iter().any(String::is_empty) {
            return invalid("search strings must not be empty");
        }
        if !self.report.is_empty() && self.report.len() != self.search.len() {
            return Err(DialogueError::Invalid {
                message: format!(
                    "{} search string(s) but {} report string(s)",
                    self.search.len(),
                    self.report.len()
                ),
            });
        }
        if self.waits.iter().any(|w| w.wait.is_empty()) {
            return invalid("wait strings must not be empty");
        }
        Ok(())
    }

    /// Whether the not-found sentinel was requested.
    pub fn wants_not_found(&self) -> bool {
        self.search.iter().any(|s| s == NOT_FOUND_SENTINEL)
    }

    /// Search strings other than the sentinel, in declaration order.
    pub fn search_terms(&self) -> impl Iterator<Item = &str> {
        self.search
            .iter()
            .map(String::as_str)
            .filter(|s| *s != NOT_FOUND_SENTINEL)
    }

    /// Search strings formatted as `'a' or 'b'`.
    pub fn search_display(&self) -> String {
        let quoted: Vec<String> = self.search_terms().map(|s| format!("'{s}'")).collect();
        quoted.join(" or ")
    }

    /// Report string mapped to a search classification.
    pub fn report_for(&self, search: &SearchMatch) -> Option<&str> {
        let key = search.as_key()?;
        let index = self.search.iter().position(|s| s == key)?;
        self.report.get(index).map(String::as_str)
    }
}

fn split_list(s: &str) -> Vec<String> {
    if s.is_empty() {
        Vec::new()
    } else {
        s.split(STRINGS_DELIMITER).map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(pair: &WaitResponse) -> String {
        let prepared = pair.prepare(&Cipher::default()).unwrap();
        String::from_utf8(prepared.payload().to_vec()).unwrap()
    }

    #[test]
    fn test_plain_response_is_trimmed_and_terminated() {
        assert_eq!(payload(&WaitResponse::new("Password", "  hunter2 ")), "hunter2\n");
    }

    #[test]
    fn test_keystroke_response_sent_verbatim() {
        assert_eq!(payload(&WaitResponse::new("More", "$SPACE_KEY")), " ");
        assert_eq!(payload(&WaitResponse::new("Continue", "y$ENTER_KEY")), "y\n");
        assert_eq!(payload(&WaitResponse::new("Press", "$RETURN_KEY")), "\r");

        let prepared = WaitResponse::new("Menu", "$TAB_KEY")
            .prepare(&Cipher::default())
            .unwrap();
        assert_eq!(prepared.payload(), b"\t");
        assert_eq!(prepared.display, "<TAB KEY>");
    }

    #[test]
    fn test_cipher_response_is_decrypted_and_masked() {
        let cipher = Cipher::new("fleet key");
        let secret = "s3cr3t-Pa55";
        let response = format!("{CIPHER_TEXT_MARKER}{}", cipher.encrypt(secret));

        let prepared = WaitResponse::new("[sudo] password", response).prepare(&cipher).unwrap();

        assert_eq!(prepared.payload(), format!("{secret}\n").as_bytes());
        assert_eq!(prepared.display, MASK);
        assert!(!prepared.display.contains(secret));
        assert!(!format!("{prepared:?}").contains(secret));
    }

    #[test]
    fn test_cipher_response_with_keystroke_suffix() {
        let cipher = Cipher::default();
        let response = format!("{CIPHER_TEXT_MARKER}{}$RETURN_KEY", cipher.encrypt("enablepw"));

        let prepared = WaitResponse::new("Password:", response).prepare(&cipher).unwrap();

        assert_eq!(prepared.payload(), b"enablepw\r");
        assert_eq!(prepared.display, format!("{MASK}<RETURN KEY>"));
    }

    #[test]
    fn test_cipher_response_wrong_key_fails() {
        let response = format!("{CIPHER_TEXT_MARKER}{}", Cipher::new("a").encrypt("pw"));
        let err = WaitResponse::new("Password", response)
            .prepare(&Cipher::new("b"))
            .unwrap_err();
        assert!(matches!(err, CipherError::Decrypt | CipherError::Utf8(_)));
    }

    #[test]
    fn test_from_delimited() {
        let spec = DialogueSpec::from_delimited(
            "passwd testuser",
            "successfully|$NF",
            "Changed|Unchanged",
            "New|Retype",
            "mypass3|mypass3",
        )
        .unwrap();

        assert_eq!(spec.search, vec!["successfully", "$NF"]);
        assert_eq!(spec.waits.len(), 2);
        assert_eq!(spec.waits[1], WaitResponse::new("Retype", "mypass3"));
        assert!(spec.wants_not_found());
        assert_eq!(spec.search_terms().collect::<Vec<_>>(), vec!["successfully"]);
        assert_eq!(spec.report_for(&SearchMatch::NotFound), Some("Unchanged"));
        assert_eq!(
            spec.report_for(&SearchMatch::Found("successfully".into())),
            Some("Changed")
        );
        assert_eq!(spec.report_for(&SearchMatch::NoMatch), None);
    }

    #[test]
    fn test_from_delimited_empty_lists() {
        let spec = DialogueSpec::from_delimited("uptime", "", "", "", "").unwrap();
        assert!(spec.search.is_empty());
        assert!(spec.waits.is_empty());
        assert!(!spec.wants_not_found());
    }

    #[test]
    fn test_wait_response_count_mismatch() {
        let err = DialogueSpec::from_delimited("passwd", "", "", "New|Retype", "pw").unwrap_err();
        assert!(matches!(err, DialogueError::Invalid { .. }));

        let err = DialogueSpec::from_delimited("passwd", "", "", "New", "").unwrap_err();
        assert!(matches!(err, DialogueError::Invalid { .. }));
    }

    #[test]
    fn test_search_report_count_mismatch() {
        let err = DialogueSpec::from_delimited("uptime", "load|users", "High", "", "").unwrap_err();
        assert!(matches!(err, DialogueError::Invalid { .. }));
    }

    #[test]
    fn test_invalid_specs() {
        assert!(DialogueSpec::new("").validate().is_err());
        assert!(DialogueSpec::new("ls\nrm -rf /").validate().is_err());
        assert!(DialogueSpec::new("ls").search("").validate().is_err());
        assert!(DialogueSpec::new("ls").wait("", "y").validate().is_err());
        assert!(DialogueSpec::new("ls").search("a").validate().is_ok());
    }

    #[test]
    fn test_search_display() {
        let spec = DialogueSpec::new("x").search("Complete").search("Nothing").search("$NF");
        assert_eq!(spec.search_display(), "'Complete' or 'Nothing'");
    }
}
