//! High-level session API for running command dialogues on a host.
//!
//! The driver layer composes the transport, the channel and the prompt
//! negotiator into a [`Session`], and runs dialogues against it.

mod builder;
mod dialogue;
mod interactive;
mod privilege;
mod prompt;
pub(crate) mod response;
mod session;

pub use builder::SessionBuilder;
pub use interactive::{DialogueSpec, PreparedResponse, STRINGS_DELIMITER, WaitResponse};
pub use privilege::{
    CommandKind, CommandPatterns, CommandRules, DEFAULT_ESCALATION_PATTERNS,
    DEFAULT_SUB_SHELL_PATTERNS,
};
pub use prompt::{PromptState, detect_initial_prompt, set_custom_prompt};
pub use response::{
    DialogueOutcome, DialogueResult, NOT_FOUND_SENTINEL, SearchMatch, TIMEOUT_MESSAGE,
};
pub use session::Session;

use std::future::Future;

use crate::error::Result;
use crate::transport::ConnectStatus;

/// Trait for host sessions.
///
/// A session runs one dialogue at a time; callers must not start a second
/// dialogue while one is outstanding.
pub trait HostSession: Send {
    /// Connect, authenticate, open the shell and negotiate the prompt.
    ///
    /// Failures are reported through the returned status, never as errors.
    fn connect(&mut self) -> impl Future<Output = ConnectStatus> + Send;

    /// Run one dialogue.
    ///
    /// A command timeout is reported in the result; see
    /// [`DialogueResult::halts_host`].
    fn run_dialogue(
        &mut self,
        spec: &DialogueSpec,
    ) -> impl Future<Output = Result<DialogueResult>> + Send;

    /// Run dialogues in order, stopping after the first one that times out.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use reachsh::driver::{DialogueSpec, HostSession};
    ///
    /// # async fn example(session: &mut impl HostSession) -> Result<(), reachsh::Error> {
    /// let results = session
    ///     .run_batch(&[
    ///         DialogueSpec::new("uptime"),
    ///         DialogueSpec::new("df -h").search("100%"),
    ///     ])
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    fn run_batch(
        &mut self,
        specs: &[DialogueSpec],
    ) -> impl Future<Output = Result<Vec<DialogueResult>>> + Send {
        async move {
            for spec in specs {
                spec.validate()?;
            }
            let mut results = Vec::with_capacity(specs.len());
            for spec in specs {
                let result = self.run_dialogue(spec).await?;
                let halt = result.halts_host();
                results.push(result);
                if halt {
                    log::warn!(
                        "Skipping {} remaining command(s) for this host",
                        specs.len() - results.len()
                    );
                    break;
                }
            }
            Ok(results)
        }
    }

    /// Release the shell and the connection. Safe to call more than once.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Check if the session has an open shell.
    fn is_open(&self) -> bool;
}
