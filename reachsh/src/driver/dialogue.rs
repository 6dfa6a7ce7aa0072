//! Command dialogue engine.
//!
//! One exchange runs through these states:
//!
//! ```text
//! Sent -> Streaming -> (WaitMatched)* -> Completed | TimedOut
//! ```
//!
//! After every read the live region (output after the echoed command, or
//! after the last answered wait string) is tested against the completion
//! regex first and against the pending wait strings second. A timeout is a
//! value in the result, not an error: the session stays usable but the
//! caller should skip the rest of this host's commands.

use std::time::Instant;

use log::{debug, error, info, warn};
use memchr::memmem;
use tokio::io::{AsyncRead, AsyncWrite};

use super::interactive::{DialogueSpec, PreparedResponse};
use super::privilege::CommandKind;
use super::prompt::{PromptState, set_custom_prompt};
use super::response::{DialogueOutcome, DialogueResult, SearchMatch, TIMEOUT_MESSAGE};
use crate::channel::{OutputBuffer, PtyChannel};
use crate::cipher::Cipher;
use crate::config::SessionConfig;
use crate::error::{ChannelError, Result};
use crate::results::ResultsLog;

/// Shared, read-only collaborators of a dialogue.
pub(crate) struct DialogueContext<'a> {
    pub config: &'a SessionConfig,
    pub cipher: &'a Cipher,
    pub results: &'a dyn ResultsLog,
}

/// Run one dialogue on an open channel.
///
/// The request is validated and every response prepared before the command
/// is written. Channel failures other than the read timeout end the
/// dialogue with an error.
pub(crate) async fn run_dialogue<S>(
    channel: &mut PtyChannel<S>,
    state: &mut PromptState,
    ctx: &DialogueContext<'_>,
    spec: &DialogueSpec,
) -> Result<DialogueResult>
where
    S: AsyncRead + AsyncWrite + Send,
{
    spec.validate()?;
    let mut pending = spec
        .waits
        .iter()
        .map(|pair| pair.prepare(ctx.cipher))
        .collect::<std::result::Result<Vec<PreparedResponse>, _>>()?;

    let config = ctx.config;
    let prompts = config.prompts();
    let command_timeout = config.timeouts().command;
    let kind = config.rules().classify(&spec.command);
    let completion = state.completion_regex(prompts, kind);
    let will_wait_respond = !pending.is_empty();

    if !spec.search.is_empty() {
        debug!("Waiting for string(s): {}", spec.search_display());
    }
    debug!("Expected prompt regex: {}", completion.as_str());

    let mut buffer = OutputBuffer::new(config.options().search_depth);
    let start = Instant::now();

    info!("Running command: '{}'", spec.command);
    channel.send_line(&spec.command).await?;

    let mut completion_span = None;
    let outcome = loop {
        let chunk = match channel.recv_chunk(command_timeout).await {
            Ok(chunk) => chunk,
            Err(ChannelError::Timeout(_)) => break DialogueOutcome::TimedOut,
            Err(e) => return Err(e.into()),
        };
        buffer.extend(&chunk);

        if buffer.locate_echo(&spec.command).is_none() {
            continue;
        }

        if let Some(span) = buffer.search_region_tail(completion) {
            completion_span = Some(span);
            break DialogueOutcome::Completed;
        }

        if let Some(index) = pending.iter().position(|p| buffer.region_contains(&p.wait)) {
            let response = pending.remove(index);
            info!("Found '{}', sending response '{}'", response.wait, response.display);
            channel.send(response.payload()).await?;
            buffer.advance_mark();
        }
    };

    if outcome == DialogueOutcome::TimedOut {
        debug!("Timeout, output buffer: {:?}", buffer.as_str_lossy());
        if will_wait_respond {
            warn!(
                "Wait string(s) not found and command timeout. Timeout value: {:?}",
                command_timeout
            );
            ctx.results.write_line("Not Found");
        }
        error!("{}", TIMEOUT_MESSAGE);
    }

    let searched = match (buffer.echo_end(), completion_span) {
        (Some(from), Some((to, _))) => buffer.slice(from, to),
        (Some(from), None) => buffer.slice(from, buffer.len()),
        (None, _) => &[][..],
    };

    let search = classify(spec, searched);
    report_search(ctx.results, spec, &search);

    let (unanswered_waits, missing_waits) = leftover_waits(&buffer, &pending);
    if !missing_waits.is_empty() {
        info!("Wait strings not found: {}", quote_list(&missing_waits));
    }
    if !unanswered_waits.is_empty() {
        info!(
            "Wait strings found but response not sent because prompt immediately returned: {}",
            quote_list(&unanswered_waits)
        );
    }

    let prompt = completion_span
        .map(|(from, to)| String::from_utf8_lossy(buffer.slice(from, to)).into_owned())
        .unwrap_or_default();
    let result = command_output(searched, outcome);
    let raw_result = prompts.custom.replace_all(buffer.as_slice(), &b""[..]);
    let raw_result = String::from_utf8_lossy(&raw_result).into_owned();
    let report = spec.report_for(&search).map(str::to_string);

    if kind == CommandKind::Escalation
        && outcome == DialogueOutcome::Completed
        && config.options().set_custom_prompt
    {
        let (set, _) = set_custom_prompt(channel, prompts, config.timeouts().prompt_set).await;
        if !set {
            debug!("Unable to set personalized prompt after '{}'", spec.command);
        }
        state.set_custom_active(set);
    }

    Ok(DialogueResult {
        command: spec.command.clone(),
        result,
        raw_result,
        prompt,
        search,
        report,
        outcome,
        unanswered_waits,
        missing_waits,
        elapsed: start.elapsed(),
    })
}

/// First search term present in `output`, in declaration order.
fn classify(spec: &DialogueSpec, output: &[u8]) -> SearchMatch {
    if let Some(found) = spec
        .search_terms()
        .find(|term| memmem::find(output, term.as_bytes()).is_some())
    {
        debug!("Found search key: {}", found);
        return SearchMatch::Found(found.to_string());
    }
    if spec.wants_not_found() {
        SearchMatch::NotFound
    } else {
        SearchMatch::NoMatch
    }
}

/// Write the search outcome to the results log.
fn report_search(results: &dyn ResultsLog, spec: &DialogueSpec, search: &SearchMatch) {
    if spec.search.is_empty() {
        return;
    }
    match (search.as_key(), spec.report_for(search)) {
        (Some(_), Some(report)) => {
            info!("Report String: {}", report);
            results.write_line(report);
        }
        (Some(key), None) => {
            info!("Found: {}", key);
            results.write_line(&format!("Found: {key}"));
        }
        (None, _) => {
            let display = spec.search_display();
            info!("Search string(s) {} not found.", display);
            results.write_line(&format!("Not Found: {display}"));
        }
    }
}

/// Split unserved wait strings into those seen in the output and those
/// that never appeared.
fn leftover_waits(buffer: &OutputBuffer, pending: &[PreparedResponse]) -> (Vec<String>, Vec<String>) {
    let (seen, missing): (Vec<_>, Vec<_>) = pending.iter().partition(|p| buffer.output_contains(&p.wait));
    (
        seen.into_iter().map(|p| p.wait.clone()).collect(),
        missing.into_iter().map(|p| p.wait.clone()).collect(),
    )
}

/// Output between the echo and the prompt line.
///
/// On completion the trailing prompt line is dropped.
fn command_output(searched: &[u8], outcome: DialogueOutcome) -> String {
    let body = match outcome {
        DialogueOutcome::Completed => match memchr::memrchr(b'\n', searched) {
            Some(pos) => &searched[..pos],
            None => &[][..],
        },
        DialogueOutcome::TimedOut => searched,
    };
    String::from_utf8_lossy(body)
        .trim_start_matches(['\r', '\n'])
        .trim_end_matches('\r')
        .to_string()
}

fn quote_list(items: &[String]) -> String {
    items
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
