//! Initial prompt detection and custom prompt injection.

use std::time::Duration;

use log::{debug, trace};
use regex::bytes::Regex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

use super::privilege::CommandKind;
use crate::channel::{Prompts, PtyChannel};
use crate::error::ChannelError;

/// Which completion regex is in force for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromptState {
    custom_active: bool,
}

impl PromptState {
    /// Whether the injected marker is the completion signal.
    pub fn is_custom_active(&self) -> bool {
        self.custom_active
    }

    /// Record the outcome of the last attempt to set the marker.
    pub fn set_custom_active(&mut self, active: bool) {
        self.custom_active = active;
    }

    /// Completion regex for a command of the given kind.
    ///
    /// Sub-shell and escalation commands fall back to the native prompt
    /// regex for that exchange only.
    pub fn completion_regex<'a>(&self, prompts: &'a Prompts, kind: CommandKind) -> &'a Regex {
        if self.custom_active && kind.keeps_custom_prompt() {
            &prompts.custom
        } else {
            &prompts.detection
        }
    }
}

/// Read until the accumulated output matches `regex`.
///
/// Returns `false` when `timeout` elapses first or the channel fails; the
/// two are not told apart here.
pub async fn detect_initial_prompt<S>(
    channel: &mut PtyChannel<S>,
    regex: &Regex,
    timeout: Duration,
) -> bool
where
    S: AsyncRead + AsyncWrite + Send,
{
    debug!("Detect initial prompt start");
    let found = read_until(channel, timeout, |output| regex.is_match(output))
        .await
        .is_some();
    if found {
        debug!("Detect initial prompt success");
    }
    found
}

/// Append `literal` to `PS1` and wait for the marker to show up twice.
///
/// The first occurrence is the echoed assignment, the second the new live
/// prompt. Returns whether the marker was set and the output captured while
/// waiting. On `false` the caller keeps using the native prompt regex.
pub async fn set_custom_prompt<S>(
    channel: &mut PtyChannel<S>,
    prompts: &Prompts,
    timeout: Duration,
) -> (bool, String)
where
    S: AsyncRead + AsyncWrite + Send,
{
    debug!("Set prompt start");
    let command = format!("PS1=$PS1'{}'", prompts.custom_literal);
    if let Err(e) = channel.send_line(&command).await {
        debug!("Unable to send prompt assignment: {}", e);
        return (false, String::new());
    }

    let marker = &prompts.custom_unanchored;
    let mut output = Vec::new();
    let set = read_until_into(channel, timeout, &mut output, |out| {
        marker.find_iter(out).count() >= 2
    })
    .await;

    let output = String::from_utf8_lossy(&output).into_owned();
    if set {
        debug!("Set prompt success");
    } else {
        debug!("Set prompt failed, keeping native prompt regex");
    }
    (set, output)
}

async fn read_until<S, F>(channel: &mut PtyChannel<S>, timeout: Duration, done: F) -> Option<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Send,
    F: Fn(&[u8]) -> bool,
{
    let mut output = Vec::new();
    read_until_into(channel, timeout, &mut output, done)
        .await
        .then_some(output)
}

/// Accumulate reads into `output` until `done` holds, under one overall
/// deadline.
async fn read_until_into<S, F>(
    channel: &mut PtyChannel<S>,
    timeout: Duration,
    output: &mut Vec<u8>,
    done: F,
) -> bool
where
    S: AsyncRead + AsyncWrite + Send,
    F: Fn(&[u8]) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return false;
        }
        match channel.recv_chunk(remaining).await {
            Ok(chunk) => {
                output.extend_from_slice(&chunk);
                if done(output.as_slice()) {
                    return true;
                }
            }
            Err(ChannelError::Timeout(_)) => {
                trace!("Prompt wait timed out, output: {:?}", String::from_utf8_lossy(output));
                return false;
            }
            Err(e) => {
                debug!("Channel failed while waiting for prompt: {}", e);
                return false;
            }
        }
    }
}
