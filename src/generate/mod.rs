//! Commit message generation against a local streaming LLM endpoint.

pub mod accumulator;
pub mod cleanup;
pub mod client;
pub mod prompt;

pub use accumulator::{GenerationRecord, MalformedLinePolicy, StreamAccumulator};
pub use cleanup::clean_message;
pub use client::{GenerationClient, MessageGenerator};
pub use prompt::{TRUNCATION_MARKER, render_prompt, truncate_diff};
