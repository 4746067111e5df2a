//! OCR service boundary: one Messages API call per file.
//!
//! The request carries two content parts in a single user turn: the encoded
//! file (tagged `document` for PDFs, `image` for bitmaps) and the instruction
//! from [`crate::prompts`]. The raw content blocks of the reply are handed to
//! [`crate::pipeline::normalize`] untouched; this module never interprets the
//! text.
//!
//! Each file gets exactly one call; a failure becomes that file's
//! [`FileError`].

use crate::config::BatchConfig;
use crate::error::{FileError, OcrBatchError};
use crate::pipeline::encode::EncodedPayload;
use crate::pipeline::input::MediaKind;
use crate::prompts::{render_instruction, DEFAULT_INSTRUCTION};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

// ── Response model ───────────────────────────────────────────────────────────

/// One block of an OCR reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Text(String),
    /// Any non-text block; kept only so callers can see it was there.
    Other { kind: String },
}

/// Raw reply from the OCR service: content blocks in reply order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OcrResponse {
    blocks: Vec<ContentBlock>,
}

impl OcrResponse {
    pub fn new(blocks: Vec<ContentBlock>) -> Self {
        Self { blocks }
    }

    /// Convenience for a reply made of a single text block.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(vec![ContentBlock::Text(text.into())])
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    /// Text of every text block, in order, joined with `\n`.
    pub fn joined_text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text(t) => Some(t.as_str()),
                ContentBlock::Other { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ── Service trait ────────────────────────────────────────────────────────────

/// A remote capability that reads a document or image and answers with text.
///
/// Implemented by [`AnthropicOcrClient`]; tests and embedders can supply
/// their own implementation to the orchestrator.
#[async_trait]
pub trait OcrService: Send + Sync {
    /// Submit one encoded file and return the raw reply.
    async fn extract(
        &self,
        payload: &EncodedPayload,
        media_kind: MediaKind,
        file_name: &str,
    ) -> Result<OcrResponse, FileError>;
}

// ── Wire format ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [UserMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: [RequestPart<'a>; 2],
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RequestPart<'a> {
    Document { source: Base64Source<'a> },
    Image { source: Base64Source<'a> },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct Base64Source<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Option<Vec<WireBlock>>,
}

#[derive(Debug, Deserialize)]
struct WireBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<ErrorDetail>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────────────

/// [`OcrService`] backed by the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicOcrClient {
    http: reqwest::Client,
    url: String,
    model: String,
    max_tokens: u32,
    api_version: String,
    api_key: Option<String>,
    instruction: String,
}

impl AnthropicOcrClient {
    /// Build a client from the batch configuration.
    pub fn new(config: &BatchConfig) -> Result<Self, OcrBatchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| OcrBatchError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            url: config.messages_url(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_version: config.api_version.clone(),
            api_key: config.api_key.clone(),
            instruction: config
                .instruction
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTRUCTION.to_string()),
        })
    }

    fn build_request<'a>(
        &'a self,
        payload: &'a EncodedPayload,
        media_kind: MediaKind,
        file_name: &str,
    ) -> MessagesRequest<'a> {
        let source = Base64Source {
            kind: "base64",
            media_type: media_kind.mime_type(),
            data: &payload.data,
        };
        let file_part = if media_kind.is_document() {
            RequestPart::Document { source }
        } else {
            RequestPart::Image { source }
        };
        let text = render_instruction(&self.instruction, media_kind.label(), file_name);

        MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: [UserMessage {
                role: "user",
                content: [file_part, RequestPart::Text { text }],
            }],
        }
    }
}

#[async_trait]
impl OcrService for AnthropicOcrClient {
    async fn extract(
        &self,
        payload: &EncodedPayload,
        media_kind: MediaKind,
        file_name: &str,
    ) -> Result<OcrResponse, FileError> {
        let start = Instant::now();
        let body = self.build_request(payload, media_kind, file_name);

        let mut request = self
            .http
            .post(&self.url)
            .header("anthropic-version", &self.api_version)
            .json(&body);
        if let Some(ref key) = self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("request timed out: {e}")
            } else {
                e.to_string()
            };
            warn!("'{}': OCR request failed: {}", file_name, message);
            FileError::Remote {
                status: None,
                message,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = error_message(&text).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            warn!("'{}': OCR service returned {}: {}", file_name, status, message);
            return Err(FileError::Remote {
                status: Some(status.as_u16()),
                message,
            });
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| FileError::Remote {
            status: Some(status.as_u16()),
            message: format!("invalid response body: {e}"),
        })?;

        let blocks: Vec<ContentBlock> = parsed
            .content
            .unwrap_or_default()
            .into_iter()
            .map(|b| match (b.kind.as_str(), b.text) {
                ("text", Some(text)) => ContentBlock::Text(text),
                _ => ContentBlock::Other { kind: b.kind },
            })
            .collect();

        if blocks.is_empty() {
            return Err(FileError::EmptyResponse);
        }

        debug!(
            "'{}': {} content blocks in {:?}",
            file_name,
            blocks.len(),
            start.elapsed()
        );
        Ok(OcrResponse::new(blocks))
    }
}

/// Pull a human-readable message out of an error body, if it has one.
fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .error
        .and_then(|e| e.message)
        .or(parsed.message)
        .filter(|m| !m.trim().is_empty())
}
