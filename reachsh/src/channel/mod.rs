//! Channel layer for the interactive shell.
//!
//! This module handles the byte stream of the shell, the accumulating
//! output buffer and the prompt patterns used to detect completion.

mod buffer;
mod patterns;
mod pty;

pub use buffer::OutputBuffer;
pub use patterns::{
    DEFAULT_CUSTOM_PROMPT, DEFAULT_CUSTOM_PROMPT_REGEX, DEFAULT_PROMPT_REGEX, PromptSpec, Prompts,
    strip_trailing_anchor,
};
pub use pty::{DEFAULT_CHUNK_SIZE, PtyChannel};
