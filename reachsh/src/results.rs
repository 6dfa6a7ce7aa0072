//! Results log: one line per notable outcome, meant to be pasted next to
//! the inventory it was produced from.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use log::warn;

/// Append-only sink for result lines.
///
/// Implementations serialize whole lines so sessions running in parallel
/// never interleave partial writes.
pub trait ResultsLog: Send + Sync {
    /// Append one line (without trailing newline).
    fn write_line(&self, line: &str);

    /// Flush buffered lines.
    fn flush(&self) {}
}

/// Results log backed by a file.
pub struct FileResultsLog {
    writer: Mutex<BufWriter<File>>,
}

impl FileResultsLog {
    /// Create or truncate the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::from_file(File::create(path)?))
    }

    /// Open the file at `path` for appending.
    pub fn append(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: File) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(file)),
        }
    }
}

impl ResultsLog for FileResultsLog {
    fn write_line(&self, line: &str) {
        let Ok(mut writer) = self.writer.lock() else {
            warn!("Results log lock poisoned, dropping line");
            return;
        };
        if let Err(e) = writeln!(writer, "{line}") {
            warn!("Failed to write results log: {}", e);
        }
    }

    fn flush(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            if let Err(e) = writer.flush() {
                warn!("Failed to flush results log: {}", e);
            }
        }
    }
}

impl Drop for FileResultsLog {
    fn drop(&mut self) {
        ResultsLog::flush(self);
    }
}

/// Results log kept in memory.
#[derive(Debug, Default)]
pub struct MemoryResultsLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryResultsLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl ResultsLog for MemoryResultsLog {
    fn write_line(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

/// Results log that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullResultsLog;

impl ResultsLog for NullResultsLog {
    fn write_line(&self, _line: &str) {}
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_memory_log_collects_lines() {
        let log = MemoryResultsLog::new();
        log.write_line("Found: successfully");
        log.write_line("Not Found");
        assert_eq!(log.lines(), vec!["Found: successfully", "Not Found"]);
    }

    #[test]
    fn test_file_log_writes_whole_lines() {
        let path = std::env::temp_dir().join(format!("reachsh-results-{}.log", std::process::id()));
        {
            let log = Arc::new(FileResultsLog::create(&path).unwrap());
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let log = Arc::clone(&log);
                    std::thread::spawn(move || {
                        for j in 0..50 {
                            log.write_line(&format!("host-{i} line-{j}"));
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 200);
        assert!(lines.iter().all(|l| l.starts_with("host-") && l.contains(" line-")));
    }

    #[test]
    fn test_null_log() {
        let log: Box<dyn ResultsLog> = Box::new(NullResultsLog);
        log.write_line("ignored");
        log.flush();
    }
}
