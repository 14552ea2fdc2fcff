//! HTTP client for the streaming generation endpoint.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, timeout, timeout_at};
use tracing::debug;

use crate::config::Settings;
use crate::error::GenerateError;
use crate::generate::accumulator::{MalformedLinePolicy, StreamAccumulator, classify_transport_error};
use crate::generate::prompt::render_prompt;

/// How long to wait for the body of an HTTP error response.
pub const ERROR_BODY_TIMEOUT: Duration = Duration::from_millis(500);

/// Used when an error response carried no readable body in time.
pub const NO_ERROR_BODY: &str = "<no error body>";

/// Maximum characters of a plain-text error body kept in the report.
const MAX_ERROR_BODY: usize = 500;

/// Something that turns a staged diff into a commit message.
#[async_trait]
pub trait MessageGenerator: Send + Sync {
    async fn generate(&self, diff: &str, settings: &Settings) -> Result<String, GenerateError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct EndpointErrorBody {
    error: String,
}

/// Streams a completion from an Ollama-style `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    http: Client,
}

impl GenerationClient {
    pub fn new() -> Result<Self, GenerateError> {
        let http = Client::builder()
            .user_agent(concat!("diffscribe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GenerateError::InvalidRequest(e.to_string()))?;
        Ok(Self { http })
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    async fn stream_completion(
        &self,
        diff: &str,
        settings: &Settings,
    ) -> Result<String, GenerateError> {
        let url = settings.api_url.as_str();
        let prompt = render_prompt(&settings.prompt, diff, settings.max_diff_length);

        debug!(
            "POST {} model={} prompt={} chars (diff {} chars, limit {})",
            url,
            settings.model,
            prompt.chars().count(),
            diff.chars().count(),
            settings.max_diff_length
        );

        let request = GenerateRequest {
            model: &settings.model,
            prompt: &prompt,
            stream: true,
        };

        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(&e, url))?;

        let status = response.status();
        if !status.is_success() {
            let body = drain_error_body(response, ERROR_BODY_TIMEOUT).await;
            return Err(GenerateError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let policy = if settings.strict_stream {
            MalformedLinePolicy::Fail
        } else {
            MalformedLinePolicy::Drop
        };
        let mut accumulator = StreamAccumulator::new(policy);
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => accumulator.on_chunk(&bytes)?,
                Err(e) => return Err(accumulator.on_error(&e, url)),
            }
        }

        accumulator.on_end()
    }
}

#[async_trait]
impl MessageGenerator for GenerationClient {
    /// Generate a commit message for `diff`.
    ///
    /// Applies the optional overall request timeout from the settings.
    async fn generate(&self, diff: &str, settings: &Settings) -> Result<String, GenerateError> {
        match settings.request_timeout {
            Some(limit) => timeout(limit, self.stream_completion(diff, settings))
                .await
                .map_err(|_| GenerateError::Timeout(limit.as_secs()))?,
            None => self.stream_completion(diff, settings).await,
        }
    }
}

/// Map a failure that happened before any response arrived.
fn map_send_error(err: &reqwest::Error, url: &str) -> GenerateError {
    if err.is_builder() {
        return GenerateError::InvalidRequest(format!("{url}: {err}"));
    }
    if err.is_connect() {
        return GenerateError::ConnectionRefused {
            url: url.to_string(),
        };
    }
    classify_transport_error(err, url)
}

/// Read as much of an error response body as arrives within `limit`.
async fn drain_error_body(response: Response, limit: Duration) -> String {
    let deadline = Instant::now() + limit;
    let mut collected = Vec::new();
    let mut body = response.bytes_stream();

    loop {
        match timeout_at(deadline, body.next()).await {
            Ok(Some(Ok(bytes))) => collected.extend_from_slice(&bytes),
            Ok(Some(Err(e))) => {
                debug!("Error body read failed after {} bytes: {}", collected.len(), e);
                break;
            }
            Ok(None) => break,
            Err(_) => {
                debug!(
                    "Error body not complete after {:?}, using {} bytes",
                    limit,
                    collected.len()
                );
                break;
            }
        }
    }

    describe_error_body(&collected)
}

/// Turn raw error body bytes into report text.
///
/// Prefers the `error` field of a JSON body, falls back to the trimmed text,
/// then to [`NO_ERROR_BODY`].
pub fn describe_error_body(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if text.is_empty() {
        return NO_ERROR_BODY.to_string();
    }

    if let Ok(parsed) = serde_json::from_str::<EndpointErrorBody>(text) {
        return parsed.error;
    }

    text.chars().take(MAX_ERROR_BODY).collect()
}
