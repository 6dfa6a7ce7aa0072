//! # Reachsh
//!
//! Async library for running scripted shell dialogues on Unix-like hosts
//! over SSH.
//!
//! Reachsh logs in, opens an interactive shell, pins down the prompt and
//! then runs commands one at a time. A command can answer the questions it
//! asks (`Password:`, `[y/N]`) from a list of wait/response pairs, and its
//! output can be searched for strings whose outcome goes to a results log.
//!
//! ## Features
//!
//! - Async SSH connections via russh, with agent, key and password fallback
//! - Custom prompt marker injection for reliable completion detection
//! - Wait/response pairs answered in the order the host asks them
//! - Encrypted responses (`$CT=`) kept as secrets and masked in logs
//! - Sub-shell and privilege escalation aware prompt handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reachsh::{DialogueSpec, HostSession, SessionBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), reachsh::Error> {
//!     let mut session = SessionBuilder::new("192.168.1.10")
//!         .username("ops")
//!         .password("secret")
//!         .build()?;
//!
//!     let status = session.connect().await;
//!     if !status.is_connected() {
//!         eprintln!("{}", status);
//!         return Ok(());
//!     }
//!
//!     let spec = DialogueSpec::new("passwd")
//!         .search("successfully")
//!         .wait("current", "oldpass")
//!         .wait("New password", "newpass")
//!         .wait("Retype", "newpass");
//!     let result = session.run_dialogue(&spec).await?;
//!     println!("{}", result);
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod cipher;
pub mod config;
pub mod driver;
pub mod error;
pub mod results;
pub mod transport;

// Re-export main types for convenience
pub use cipher::Cipher;
pub use config::{SessionConfig, SessionOptions, Timeouts};
pub use driver::{
    DialogueOutcome, DialogueResult, DialogueSpec, HostSession, SearchMatch, Session,
    SessionBuilder, WaitResponse,
};
pub use error::Error;
pub use results::{FileResultsLog, MemoryResultsLog, NullResultsLog, ResultsLog};
pub use transport::{ConnectStatus, Credentials, HostKeyVerification, SshConfig};
