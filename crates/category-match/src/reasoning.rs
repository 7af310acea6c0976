use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::FailureClass;

const CHAT_COMPLETIONS_BASE: &str = "https://api.deepseek.com";
const CHAT_COMPLETIONS_MODEL: &str = "deepseek-chat";
const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_MODEL: &str = "gemini-2.5-flash";

const MAX_TEMPERATURE: f32 = 1.0;
const MAX_OUTPUT_TOKENS: u32 = 2048;
const DETAIL_PREFIX_CHARS: usize = 120;

/// Wire dialect spoken by the reasoning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningProvider {
    /// OpenAI-compatible `POST /chat/completions` (DeepSeek and friends).
    ChatCompletions,
    /// Google `models/{model}:generateContent`.
    Gemini,
}

impl FromStr for ReasoningProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat_completions" | "openai" | "deepseek" => Ok(Self::ChatCompletions),
            "gemini" => Ok(Self::Gemini),
            other => Err(format!("unknown reasoning provider: {other}")),
        }
    }
}

#[derive(Clone)]
pub struct ReasoningConfig {
    pub provider: ReasoningProvider,
    pub base_url: String,
    /// `None` means the service is not configured; resolution degrades without a call.
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub max_output_tokens: u32,
    pub max_error_body_bytes: usize,
}

impl fmt::Debug for ReasoningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReasoningConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("max_error_body_bytes", &self.max_error_body_bytes)
            .finish()
    }
}

impl ReasoningConfig {
    /// Provider defaults with no credential.
    pub fn new(provider: ReasoningProvider) -> Self {
        let (base_url, model) = match provider {
            ReasoningProvider::ChatCompletions => (CHAT_COMPLETIONS_BASE, CHAT_COMPLETIONS_MODEL),
            ReasoningProvider::Gemini => (GEMINI_BASE, GEMINI_MODEL),
        };
        Self {
            provider,
            base_url: base_url.to_string(),
            api_key: None,
            model: model.to_string(),
            timeout: Duration::from_secs(30),
            max_output_tokens: 512,
            max_error_body_bytes: 8 * 1024,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let provider = lookup("REASONING_PROVIDER")
            .and_then(|s| {
                s.parse::<ReasoningProvider>()
                    .inspect_err(|e| warn!(error = %e, "falling back to chat_completions"))
                    .ok()
            })
            .unwrap_or(ReasoningProvider::ChatCompletions);
        let mut config = Self::new(provider);

        if let Some(base_url) = lookup("REASONING_BASE_URL").filter(|s| !s.trim().is_empty()) {
            config.base_url = base_url.trim().trim_end_matches('/').to_string();
        }
        config.api_key = lookup("REASONING_API_KEY")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(model) = lookup("REASONING_MODEL").filter(|s| !s.trim().is_empty()) {
            config.model = model.trim().to_string();
        }
        if let Some(secs) = lookup("REASONING_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok()) {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(n) = lookup("REASONING_MAX_OUTPUT_TOKENS").and_then(|s| s.parse::<u32>().ok()) {
            config.max_output_tokens = n;
        }
        if let Some(n) =
            lookup("REASONING_MAX_ERROR_BODY_BYTES").and_then(|s| s.parse::<usize>().ok())
        {
            config.max_error_body_bytes = n;
        }
        config
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    #[error("reasoning service credential is absent")]
    NotConfigured,

    #[error("request failed: {0}")]
    Request(reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("upstream returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("upstream returned non-JSON error: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },

    #[error("upstream returned an error object: {message}")]
    UpstreamError { message: String },

    #[error("upstream returned no completion text")]
    EmptyCompletion,
}

// The URL is dropped so query-string credentials never reach a log line.
impl From<reqwest::Error> for ReasoningError {
    fn from(e: reqwest::Error) -> Self {
        ReasoningError::Request(e.without_url())
    }
}

impl ReasoningError {
    pub fn failure_class(&self) -> FailureClass {
        match self {
            ReasoningError::NotConfigured => FailureClass::NotConfigured,
            ReasoningError::Request(e) if e.is_timeout() => FailureClass::Timeout,
            ReasoningError::Request(_) => FailureClass::Network,
            ReasoningError::Upstream { status, .. }
            | ReasoningError::UpstreamBody { status, .. } => {
                FailureClass::UpstreamStatus(status.as_u16())
            }
            ReasoningError::UpstreamError { .. } => FailureClass::UpstreamError,
            ReasoningError::InvalidJson(_) | ReasoningError::EmptyCompletion => {
                FailureClass::MalformedResponse
            }
        }
    }

    /// Caller-safe detail: upstream text is cut to a short prefix, since error
    /// bodies can carry unrelated account or billing information.
    pub fn short_detail(&self) -> String {
        match self {
            ReasoningError::Upstream { message, .. }
            | ReasoningError::UpstreamError { message } => {
                prefix_chars(message, DETAIL_PREFIX_CHARS)
            }
            ReasoningError::UpstreamBody { body, .. } => prefix_chars(body, DETAIL_PREFIX_CHARS),
            ReasoningError::Request(e) if e.is_timeout() => "request timed out".to_string(),
            ReasoningError::Request(e) if e.is_connect() => "connection failed".to_string(),
            ReasoningError::Request(_) => "request failed".to_string(),
            ReasoningError::InvalidJson(_) | ReasoningError::EmptyCompletion => {
                "malformed response".to_string()
            }
            ReasoningError::NotConfigured => self.to_string(),
        }
    }
}

/// Provider-neutral request. The client adds model and output budget from its config.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningRequest {
    pub prompt: String,
    pub temperature: f32,
    /// Ask the service for a JSON-only reply.
    pub json_only: bool,
}

/// One request/response exchange with a reasoning service.
///
/// Returns the verbatim content text of the reply. Dropping the returned future
/// aborts the exchange.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn complete(&self, request: &ReasoningRequest) -> Result<String, ReasoningError>;
}

#[derive(Clone)]
pub struct ReasoningClient {
    config: ReasoningConfig,
    http: reqwest::Client,
}

impl ReasoningClient {
    pub fn new(config: ReasoningConfig) -> Result<Self, ReasoningError> {
        if !config.is_configured() {
            return Err(ReasoningError::NotConfigured);
        }
        let http = reqwest::Client::builder()
            .user_agent("category-search/reasoning")
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ReasoningConfig {
        &self.config
    }

    async fn chat_completions(&self, request: &ReasoningRequest) -> Result<String, ReasoningError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            temperature: clamp_temperature(request.temperature),
            max_tokens: clamp_output_tokens(self.config.max_output_tokens),
            response_format: request.json_only.then(|| ResponseFormat {
                r#type: "json_object".to_string(),
            }),
        };

        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await?;
        let parsed: ChatCompletionResponse =
            parse_json_response(resp, self.config.max_error_body_bytes).await?;

        if let Some(error) = parsed.error {
            return Err(error.into_reasoning_error());
        }
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(ReasoningError::EmptyCompletion)
    }

    async fn generate_content(&self, request: &ReasoningRequest) -> Result<String, ReasoningError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        let body = GenerateContentRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(request.prompt.clone()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: clamp_temperature(request.temperature),
                max_output_tokens: clamp_output_tokens(self.config.max_output_tokens),
                response_mime_type: request.json_only.then(|| "application/json".to_string()),
            },
        };

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", self.config.api_key.as_deref().unwrap_or_default())
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await?;
        let parsed: GenerateContentResponse =
            parse_json_response(resp, self.config.max_error_body_bytes).await?;

        if let Some(error) = parsed.error {
            return Err(error.into_reasoning_error());
        }
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or(ReasoningError::EmptyCompletion)
    }
}

#[async_trait]
impl ReasoningService for ReasoningClient {
    async fn complete(&self, request: &ReasoningRequest) -> Result<String, ReasoningError> {
        debug!(
            provider = ?self.config.provider,
            model = %self.config.model,
            prompt_chars = request.prompt.chars().count(),
            "sending reasoning request"
        );
        match self.config.provider {
            ReasoningProvider::ChatCompletions => self.chat_completions(request).await,
            ReasoningProvider::Gemini => self.generate_content(request).await,
        }
    }
}

fn clamp_temperature(t: f32) -> f32 {
    if t.is_nan() {
        0.0
    } else {
        t.clamp(0.0, MAX_TEMPERATURE)
    }
}

fn clamp_output_tokens(n: u32) -> u32 {
    n.clamp(1, MAX_OUTPUT_TOKENS)
}

pub(crate) fn prefix_chars(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().nth(max_chars).is_some() {
        out.push_str("...");
    }
    out
}

async fn parse_json_response<T: for<'de> Deserialize<'de>>(
    resp: reqwest::Response,
    max_error_body_bytes: usize,
) -> Result<T, ReasoningError> {
    if resp.status().is_success() {
        let bytes = resp.bytes().await?;
        return Ok(serde_json::from_slice::<T>(&bytes)?);
    }
    Err(to_upstream_error(resp, max_error_body_bytes).await)
}

async fn to_upstream_error(resp: reqwest::Response, max_error_body_bytes: usize) -> ReasoningError {
    let status = resp.status();
    let body = read_limited_text(resp, max_error_body_bytes).await;
    if let Ok(parsed) = serde_json::from_str::<UpstreamErrorEnvelope>(&body) {
        let message = parsed
            .error
            .message
            .unwrap_or_else(|| "unknown upstream error".to_string());
        return ReasoningError::Upstream { status, message };
    }
    ReasoningError::UpstreamBody { status, body }
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorEnvelope {
    error: UpstreamErrorObject,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorObject {
    message: Option<String>,
}

impl UpstreamErrorObject {
    fn into_reasoning_error(self) -> ReasoningError {
        ReasoningError::UpstreamError {
            message: self
                .message
                .unwrap_or_else(|| "unknown upstream error".to_string()),
        }
    }
}

// --- chat/completions ---

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
    error: Option<UpstreamErrorObject>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

// --- generateContent ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    error: Option<UpstreamErrorObject>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}
