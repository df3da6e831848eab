//! Gemini `streamGenerateContent` client.
//!
//! Calls the REST endpoint with `alt=sse` and decodes the server-sent events
//! into [`Fragment`]s. Each event carries a partial `GenerateContentResponse`
//! whose candidate parts hold the new text.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use sentinel_core::config::ModelConfig;

use crate::backend::{Content, Fragment, FragmentStream, GenerateRequest, GenerationBackend};
use crate::error::ChatError;
use crate::sse::SseDecoder;

/// Streaming client for the hosted Gemini API.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    /// Create a client for `base_url` (e.g.
    /// `https://generativelanguage.googleapis.com`).
    ///
    /// `idle_timeout` bounds the gap between chunks, not the whole stream,
    /// so long replies are never cut off but a stalled one fails.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        connect_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, ChatError> {
        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(idle_timeout)
            .build()
            .map_err(|e| ChatError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Build a client from the `[model]` configuration section.
    pub fn from_config(config: &ModelConfig) -> Result<Self, ChatError> {
        let api_key = resolve_api_key(config)?;
        Self::new(
            config.base_url.clone(),
            api_key,
            Duration::from_secs(config.request_timeout_secs),
            Duration::from_secs(config.stream_idle_timeout_secs),
        )
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{model}:streamGenerateContent?alt=sse",
            self.base_url
        )
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Resolve the API key: the configured value first, then the environment
/// variable named by `api_key_env`.
pub fn resolve_api_key(config: &ModelConfig) -> Result<String, ChatError> {
    if let Some(ref key) = config.api_key {
        if !key.is_empty() {
            return Ok(key.clone());
        }
    }
    match std::env::var(&config.api_key_env) {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => Err(ChatError::Config(format!(
            "Gemini requires an API key (set model.api_key or {})",
            config.api_key_env
        ))),
    }
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    async fn stream_generate(
        &self,
        request: GenerateRequest,
    ) -> Result<Box<dyn FragmentStream>, ChatError> {
        let url = self.stream_url(&request.model);
        let body = StreamRequest::from(&request);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Transport(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            return Err(map_http_error(status, &body_text));
        }

        debug!(model = %request.model, "Stream opened");
        Ok(Box::new(SseStream {
            response,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            done: false,
        }))
    }
}

/// Fragment stream over an open SSE response.
struct SseStream {
    response: reqwest::Response,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    done: bool,
}

#[async_trait]
impl FragmentStream for SseStream {
    async fn next_fragment(&mut self) -> Option<Result<Fragment, ChatError>> {
        loop {
            if let Some(payload) = self.pending.pop_front() {
                return Some(parse_event(&payload));
            }
            if self.done {
                return None;
            }
            match self.response.chunk().await {
                Ok(Some(bytes)) => self.pending.extend(self.decoder.feed(&bytes)),
                Ok(None) => {
                    self.done = true;
                    self.pending.extend(self.decoder.finish());
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(ChatError::Transport(format!(
                        "Gemini stream interrupted: {e}"
                    ))));
                }
            }
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StreamRequest<'a> {
    contents: &'a [Content],
    system_instruction: SystemInstruction<'a>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
    parts: [TextPart<'a>; 1],
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

impl<'a> From<&'a GenerateRequest> for StreamRequest<'a> {
    fn from(request: &'a GenerateRequest) -> Self {
        Self {
            contents: &request.contents,
            system_instruction: SystemInstruction {
                parts: [TextPart {
                    text: &request.system_instruction,
                }],
            },
            generation_config: GenerationConfig {
                temperature: request.temperature,
            },
        }
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<u16>,
    message: Option<String>,
    status: Option<String>,
}

impl ErrorBody {
    fn describe(self, fallback: &str) -> String {
        let message = self.message.unwrap_or_else(|| fallback.to_string());
        match self.status {
            Some(status) if !status.is_empty() => format!("{status}: {message}"),
            _ => message,
        }
    }
}

/// Decode one SSE payload into a fragment.
///
/// The text is the concatenation of the first candidate's text parts. A
/// payload without any text yields an empty fragment.
pub fn parse_event(payload: &str) -> Result<Fragment, ChatError> {
    let chunk: StreamChunk = serde_json::from_str(payload)
        .map_err(|e| ChatError::Stream(format!("invalid Gemini stream payload: {e}")))?;

    if let Some(error) = chunk.error {
        let status = error.code;
        return Err(ChatError::Api {
            status,
            message: error.describe("stream error"),
        });
    }

    let texts: Vec<String> = chunk
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if texts.is_empty() {
        Ok(Fragment::empty())
    } else {
        Ok(Fragment::text(texts.concat()))
    }
}

fn map_http_error(status: StatusCode, body: &str) -> ChatError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| wrapper.error.describe(body))
        .unwrap_or_else(|_| body.to_string());
    ChatError::Api {
        status: Some(status.as_u16()),
        message,
    }
}
