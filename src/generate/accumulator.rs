//! Incremental parsing of the newline-delimited JSON generation stream.
//!
//! Network chunk boundaries never line up with record boundaries, so bytes
//! are buffered until a newline arrives. A newline-terminated line is a
//! complete record by NDJSON definition; only the unterminated tail is kept
//! between chunks.

use std::error::Error as StdError;
use std::io::ErrorKind;

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::GenerateError;
use crate::generate::cleanup::clean_message;

/// Maximum characters of a rejected line kept for logs and errors.
const MAX_REPORTED_LINE: usize = 200;

/// One decoded line of the streamed response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationRecord {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub created_at: String,
    /// Incremental text fragment.
    #[serde(default)]
    pub response: String,
    /// True on the last record of the stream.
    #[serde(default)]
    pub done: bool,
    /// Set when the endpoint fails after the stream started.
    #[serde(default)]
    pub error: Option<String>,
    pub total_duration: Option<u64>,
    pub load_duration: Option<u64>,
    pub prompt_eval_count: Option<u64>,
    pub prompt_eval_duration: Option<u64>,
    pub eval_count: Option<u64>,
    pub eval_duration: Option<u64>,
}

impl GenerationRecord {
    /// Parse `created_at` as an RFC 3339 timestamp.
    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.created_at).ok()
    }

    /// Generated tokens per second, when the endpoint reported eval counters.
    pub fn tokens_per_second(&self) -> Option<f64> {
        let count = self.eval_count?;
        let nanos = self.eval_duration.filter(|d| *d > 0)?;
        Some(count as f64 / (nanos as f64 / 1_000_000_000.0))
    }
}

/// What to do with a complete line that is not a valid record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedLinePolicy {
    /// Log the line and keep going.
    #[default]
    Drop,
    /// Fail the request with [`GenerateError::MalformedRecord`].
    Fail,
}

/// Buffers stream bytes and accumulates text fragments for one request.
///
/// `on_end` and `on_error` take `self`, so a request resolves exactly once.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    pending: Vec<u8>,
    text: String,
    policy: MalformedLinePolicy,
    bytes_received: usize,
    bytes_consumed: usize,
    records: usize,
    dropped_lines: usize,
    saw_final: bool,
}

impl StreamAccumulator {
    pub fn new(policy: MalformedLinePolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Feed one chunk of the response body.
    ///
    /// Every newline-terminated line in the buffer is parsed and consumed;
    /// the remainder after the last newline stays pending.
    pub fn on_chunk(&mut self, chunk: &[u8]) -> Result<(), GenerateError> {
        self.bytes_received += chunk.len();
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Ok(());
        };

        let complete: Vec<u8> = self.pending.drain(..=last_newline).collect();
        self.bytes_consumed += complete.len();

        for line in complete.split(|&b| b == b'\n') {
            self.consume_line(line)?;
        }

        Ok(())
    }

    /// Finish the stream: parse any pending tail and return the cleaned message.
    pub fn on_end(mut self) -> Result<String, GenerateError> {
        let tail = std::mem::take(&mut self.pending);
        self.bytes_consumed += tail.len();
        self.consume_line(&tail)?;

        debug!(
            "Stream ended: {} records, {} dropped lines, {} bytes, final record seen={}",
            self.records, self.dropped_lines, self.bytes_received, self.saw_final
        );

        let message = clean_message(&self.text);
        if message.is_empty() {
            return Err(GenerateError::EmptyMessage);
        }
        Ok(message)
    }

    /// Fail the stream with a transport error. Any partial text is discarded.
    pub fn on_error(self, err: &(dyn StdError + 'static), url: &str) -> GenerateError {
        debug!(
            "Stream failed after {} bytes ({} records): {}",
            self.bytes_received, self.records, err
        );
        classify_transport_error(err, url)
    }

    /// Text accumulated so far, before cleanup.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Bytes held back waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn bytes_received(&self) -> usize {
        self.bytes_received
    }

    /// Bytes that were parsed into records or rejected as complete lines.
    pub fn bytes_consumed(&self) -> usize {
        self.bytes_consumed
    }

    pub fn dropped_lines(&self) -> usize {
        self.dropped_lines
    }

    pub fn saw_final(&self) -> bool {
        self.saw_final
    }

    fn consume_line(&mut self, line: &[u8]) -> Result<(), GenerateError> {
        let line = line.trim_ascii();
        if line.is_empty() {
            return Ok(());
        }

        match serde_json::from_slice::<GenerationRecord>(line) {
            Ok(record) => self.apply(record),
            Err(e) => self.reject(line, &e),
        }
    }

    fn apply(&mut self, record: GenerationRecord) -> Result<(), GenerateError> {
        if let Some(message) = &record.error {
            return Err(GenerateError::Endpoint(message.clone()));
        }

        self.records += 1;
        self.text.push_str(&record.response);

        if record.done {
            self.saw_final = true;
            debug!(
                model = %record.model,
                created_at = ?record.created_at(),
                eval_count = ?record.eval_count,
                prompt_eval_count = ?record.prompt_eval_count,
                total_duration_ns = ?record.total_duration,
                tokens_per_second = ?record.tokens_per_second(),
                "Final generation record"
            );
        }

        Ok(())
    }

    fn reject(&mut self, line: &[u8], err: &serde_json::Error) -> Result<(), GenerateError> {
        let shown: String = String::from_utf8_lossy(line)
            .chars()
            .take(MAX_REPORTED_LINE)
            .collect();

        match self.policy {
            MalformedLinePolicy::Fail => Err(GenerateError::MalformedRecord { line: shown }),
            MalformedLinePolicy::Drop => {
                warn!("Dropping malformed stream line ({err}): {shown}");
                self.dropped_lines += 1;
                Ok(())
            }
        }
    }
}

/// Map a transport failure to a user-facing error.
///
/// Any connection-refused cause in the source chain wins over the generic
/// stream failure.
pub fn classify_transport_error(err: &(dyn StdError + 'static), url: &str) -> GenerateError {
    if is_connection_refused(err) {
        return GenerateError::ConnectionRefused {
            url: url.to_string(),
        };
    }
    GenerateError::StreamTransport(error_chain_message(err))
}

/// Join the messages of an error and its sources with `": "`.
///
/// A source whose message is already contained in the text so far is
/// skipped, so wrappers that repeat their cause are not printed twice.
pub fn error_chain_message(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        let cause = e.to_string();
        if !cause.is_empty() && !message.contains(&cause) {
            message.push_str(": ");
            message.push_str(&cause);
        }
        current = e.source();
    }
    message
}

/// Walk the source chain looking for a refused connection.
pub fn is_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>()
            && io.kind() == ErrorKind::ConnectionRefused
        {
            return true;
        }
        if e.to_string().to_lowercase().contains("connection refused") {
            return true;
        }
        current = e.source();
    }
    false
}
