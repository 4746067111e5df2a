//! Configuration types for batch OCR runs.
//!
//! All behaviour of the OCR client and the orchestrator is controlled through
//! [`BatchConfig`], built via its [`BatchConfigBuilder`]. Keeping every knob in
//! one struct makes it easy to share a config across runs and to log it.
//!
//! The library never reads environment variables or config files; the CLI
//! maps its flags (and their `env` fallbacks) onto the builder.

use crate::error::OcrBatchError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Default model identifier sent with each request.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default Messages API endpoint root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";

/// Default `anthropic-version` header value.
pub const DEFAULT_API_VERSION: &str = "2023-06-01";

/// Configuration for a batch OCR run.
///
/// # Example
/// ```rust
/// use edgequake_ocr2xlsx::BatchConfig;
///
/// let config = BatchConfig::builder()
///     .model("claude-sonnet-4-20250514")
///     .max_tokens(4000)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_tokens, 4000);
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Token budget for each OCR response. Default: 4000.
    ///
    /// Dense receipts and multi-page PDFs produce long JSON; a budget that is
    /// too small truncates the object mid-array and the file fails to parse.
    pub max_tokens: u32,

    /// Root URL of the Messages API. Default: [`DEFAULT_API_BASE_URL`].
    pub api_base_url: String,

    /// Value of the `anthropic-version` header. Default: [`DEFAULT_API_VERSION`].
    pub api_version: String,

    /// API key sent as `x-api-key`. Default: none.
    ///
    /// When `None` no key header is sent, which suits gateways that inject
    /// credentials themselves.
    pub api_key: Option<String>,

    /// Per-request timeout in seconds. Default: 120.
    pub request_timeout_secs: u64,

    /// Custom instruction template. If None, uses
    /// [`crate::prompts::DEFAULT_INSTRUCTION`].
    pub instruction: Option<String>,

    /// Receiver for per-file progress events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 4000,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            api_key: None,
            request_timeout_secs: 120,
            instruction: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("api_base_url", &self.api_base_url)
            .field("api_version", &self.api_version)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("instruction", &self.instruction.as_ref().map(|_| "<custom>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }

    /// `POST` target for OCR requests.
    pub fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.api_base_url.trim_end_matches('/'))
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = version.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn instruction(mut self, template: impl Into<String>) -> Self {
        self.config.instruction = Some(template.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, OcrBatchError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(OcrBatchError::InvalidConfig("model must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(OcrBatchError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.request_timeout_secs == 0 {
            return Err(OcrBatchError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        match reqwest::Url::parse(&c.api_base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(OcrBatchError::InvalidConfig(format!(
                    "API base URL must be an http(s) URL, got '{}'",
                    c.api_base_url
                )))
            }
        }
        if c.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            return Err(OcrBatchError::InvalidConfig("API key must not be blank".into()));
        }
        Ok(self.config)
    }
}
