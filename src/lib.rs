//! diffscribe - A CLI tool that writes commit messages for staged changes.
//!
//! # Overview
//!
//! diffscribe reads the staged diff of the current git repository, sends it
//! to a locally running LLM endpoint that streams newline-delimited JSON
//! (Ollama's `/api/generate`), and writes the generated text into the
//! repository's commit message file.

pub mod command;
pub mod config;
pub mod error;
pub mod generate;
pub mod scm;

// Re-export commonly used types
pub use command::{CommandOutcome, GenerateCommand, Notifier, TerminalNotifier};
pub use config::{Settings, load_settings};
pub use error::{ConfigError, GenerateError, ScmError};
pub use generate::{GenerationClient, GenerationRecord, MessageGenerator, StreamAccumulator};
pub use scm::{GitProvider, InputBox, ScmRepository, SourceControl};
