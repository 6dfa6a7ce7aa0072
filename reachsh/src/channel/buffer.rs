//! Accumulating output buffer for a single dialogue.
//!
//! The buffer grows for the lifetime of one command. Two offsets split it:
//! the end of the echoed command line, and the "scanned-so-far" mark that is
//! moved past a wait string once it has been answered. Prompt matching only
//! looks at the tail of the live region, the same tail-search trick scrapli
//! uses to keep large outputs cheap.

use memchr::memmem;
use regex::bytes::Regex;

/// Buffer for accumulating shell output and locating the live region.
#[derive(Debug)]
pub struct OutputBuffer {
    /// Accumulated output with `" \r"` wrap artifacts removed.
    buffer: Vec<u8>,

    /// Offset just past the first occurrence of the echoed command.
    echo_end: Option<usize>,

    /// Offset past the last answered wait string.
    mark: Option<usize>,

    /// How many bytes from the end of the live region prompt regexes see.
    search_depth: usize,

    /// A `\r` after a space, withheld until the next byte shows whether it
    /// ends a line or a wrap.
    held_cr: bool,
}

impl OutputBuffer {
    /// Create an empty buffer with the given prompt search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            echo_end: None,
            mark: None,
            search_depth,
            held_cr: false,
        }
    }

    /// Append raw channel bytes.
    ///
    /// Terminals insert `" \r"` when a long line wraps; the pair is dropped
    /// here, including when it straddles two reads. A `" \r"` followed by
    /// `\n` is a real trailing space and is kept, so a trailing `\r` is held
    /// back until the next byte arrives.
    pub fn extend(&mut self, data: &[u8]) {
        for &byte in data {
            if self.held_cr {
                self.held_cr = false;
                if byte == b'\n' || self.buffer.len() <= self.floor() {
                    self.buffer.push(b'\r');
                } else {
                    self.buffer.pop();
                }
            }
            if byte == b'\r' && self.buffer.len() > self.floor() && self.buffer.last() == Some(&b' ') {
                self.held_cr = true;
                continue;
            }
            self.buffer.push(byte);
        }
    }

    /// Offset below which wrap artifacts are no longer removed.
    fn floor(&self) -> usize {
        self.mark.unwrap_or(0).max(self.echo_end.unwrap_or(0))
    }

    /// Locate the echoed command, remembering where it ends.
    ///
    /// Returns `None` until the full echo has arrived.
    pub fn locate_echo(&mut self, command: &str) -> Option<usize> {
        if self.echo_end.is_none() {
            let needle = command.as_bytes();
            self.echo_end = memmem::find(&self.buffer, needle).map(|pos| pos + needle.len());
        }
        self.echo_end
    }

    /// Offset just past the echoed command, once located.
    pub fn echo_end(&self) -> Option<usize> {
        self.echo_end
    }

    /// Offset where the region still to be scanned begins.
    ///
    /// Before any wait string was answered this is the end of the echo;
    /// afterwards it is the mark. `None` while the echo is still missing.
    pub fn region_start(&self) -> Option<usize> {
        self.mark.or(self.echo_end)
    }

    /// The region still to be scanned, or `None` before the echo arrived.
    pub fn new_region(&self) -> Option<&[u8]> {
        self.region_start().map(|start| &self.buffer[start..])
    }

    /// Move the mark to the end of the buffer so answered output is not
    /// matched again.
    pub fn advance_mark(&mut self) {
        self.mark = Some(self.buffer.len());
    }

    /// Search the tail of the live region for a prompt pattern.
    ///
    /// Returned offsets are absolute within the buffer.
    pub fn search_region_tail(&self, pattern: &Regex) -> Option<(usize, usize)> {
        let start = self.region_start()?;
        let tail_start = self.buffer.len().saturating_sub(self.search_depth).max(start);
        pattern
            .find(&self.buffer[tail_start..])
            .map(|m| (tail_start + m.start(), tail_start + m.end()))
    }

    /// Check whether a literal occurs in the live region.
    pub fn region_contains(&self, needle: &str) -> bool {
        self.new_region()
            .is_some_and(|region| memmem::find(region, needle.as_bytes()).is_some())
    }

    /// Check whether a literal occurs anywhere after the echoed command.
    ///
    /// Always false before the echo was located, so text that only appears
    /// in the command line itself never counts as output.
    pub fn output_contains(&self, needle: &str) -> bool {
        self.echo_end
            .is_some_and(|start| memmem::find(&self.buffer[start..], needle.as_bytes()).is_some())
    }

    /// Slice of the buffer between two offsets.
    pub fn slice(&self, start: usize, end: usize) -> &[u8] {
        &self.buffer[start.min(self.buffer.len())..end.min(self.buffer.len())]
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new(4096)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_artifact_removed() {
        let mut buffer = OutputBuffer::default();
        buffer.extend(b"echo a very long \rline\r\n");
        assert_eq!(buffer.as_slice(), b"echo a very longline\r\n");
    }

    #[test]
    fn test_wrap_artifact_across_reads() {
        let mut buffer = OutputBuffer::default();
        buffer.extend(b"abc ");
        buffer.extend(b"\rdef");
        assert_eq!(buffer.as_slice(), b"abcdef");
    }

    #[test]
    fn test_region_waits_for_echo() {
        let mut buffer = OutputBuffer::default();
        buffer.extend(b"uname -");
        assert_eq!(buffer.locate_echo("uname -a"), None);
        assert!(buffer.new_region().is_none());

        buffer.extend(b"a\r\nLinux box\r\n$ ");
        assert_eq!(buffer.locate_echo("uname -a"), Some(8));
        assert_eq!(buffer.new_region().unwrap(), b"\r\nLinux box\r\n$ ");
    }

    #[test]
    fn test_mark_hides_answered_output() {
        let mut buffer = OutputBuffer::default();
        buffer.extend(b"passwd\r\nNew password: ");
        buffer.locate_echo("passwd");
        assert!(buffer.region_contains("New"));

        buffer.advance_mark();
        assert!(!buffer.region_contains("New"));
        assert_eq!(buffer.new_region().unwrap(), b"");

        buffer.extend(b"\r\nRetype new password: ");
        assert!(buffer.region_contains("Retype"));
        // Older output is still part of the buffer.
        assert!(buffer.output_contains("New password"));
    }

    #[test]
    fn test_tail_search_offsets() {
        let mut buffer = OutputBuffer::new(16);
        buffer.extend(b"ls\r\n");
        buffer.locate_echo("ls");
        buffer.extend(&[b'x'; 100]);
        buffer.extend(b"\r\nhost$ ");

        let prompt = Regex::new(r"[$#>]( )?$").unwrap();
        let (start, end) = buffer.search_region_tail(&prompt).unwrap();
        assert_eq!(buffer.slice(start, end), b"$ ");
        assert_eq!(end, buffer.len());
    }

    #[test]
    fn test_tail_search_ignores_old_output() {
        let mut buffer = OutputBuffer::new(10);
        buffer.extend(b"cmd\r\nrouter#");
        buffer.locate_echo("cmd");
        buffer.extend(&[b'x'; 100]);

        let pattern = Regex::new(r"router#").unwrap();
        assert!(buffer.search_region_tail(&pattern).is_none());
        assert!(pattern.is_match(buffer.as_slice()));
    }

    #[test]
    fn test_trailing_space_before_newline_kept() {
        let mut buffer = OutputBuffer::default();
        buffer.extend(b"ls \r\nfile1 \r\n$ ");
        assert_eq!(buffer.as_slice(), b"ls \r\nfile1 \r\n$ ");
        assert_eq!(buffer.locate_echo("ls "), Some(3));
    }

    #[test]
    fn test_trailing_space_split_across_reads() {
        let mut buffer = OutputBuffer::default();
        buffer.extend(b"ls \r");
        buffer.extend(b"\nfile1");
        assert_eq!(buffer.as_slice(), b"ls \r\nfile1");

        let mut wrapped = OutputBuffer::default();
        wrapped.extend(b"ls \r");
        wrapped.extend(b"-la");
        assert_eq!(wrapped.as_slice(), b"ls-la");
    }

    #[test]
    fn test_output_excludes_echo() {
        let mut buffer = OutputBuffer::default();
        buffer.extend(b"sudo -k; sudo id\r\nuid=1000(ops)");
        assert!(!buffer.output_contains("sudo"));

        buffer.locate_echo("sudo -k; sudo id");
        assert!(!buffer.output_contains("sudo"));
        assert!(buffer.output_contains("uid="));
    }
}
