use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, StatusCode, Url,
};
use serde::{Deserialize, Serialize};

use crate::errors::RagError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";
const CHAT_COMPLETIONS_PATH: &str = "chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, RagError>;
}

/// Deterministic in-process generator for tests and offline development.
/// Echoes the prompt back, so answers are always non-empty and assertions on
/// prompt assembly are possible end to end.
#[derive(Clone, Default)]
pub struct LocalGenerationClient;

#[async_trait]
impl GenerationClient for LocalGenerationClient {
    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        Ok(format!("[local] {prompt}"))
    }
}

#[derive(Clone, Debug)]
pub struct OpenAiGenerationConfig {
    pub api_key: String,
    pub base_url: Url,
    pub model: String,
    pub request_timeout: Duration,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl OpenAiGenerationConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self, RagError> {
        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|err| RagError::config(&format!("openai base url parse failed: {err}")))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url,
            model: DEFAULT_MODEL.to_string(),
            request_timeout: DEFAULT_GENERATION_TIMEOUT,
            temperature: None,
            max_tokens: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Result<Self, RagError> {
        self.base_url = Url::parse(base_url.as_ref())
            .map_err(|err| RagError::config(&format!("openai base url parse failed: {err}")))?;
        if !self.base_url.path().ends_with('/') {
            self.base_url
                .set_path(&format!("{}/", self.base_url.path().trim_end_matches('/')));
        }
        Ok(self)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<OutboundMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: InboundMessage,
}

#[derive(Deserialize)]
struct InboundMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions generation backend.
pub struct OpenAiGenerationClient {
    client: Client,
    config: OpenAiGenerationConfig,
    chat_url: Url,
}

impl OpenAiGenerationClient {
    pub fn new(config: OpenAiGenerationConfig) -> Result<Self, RagError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth = format!("Bearer {}", config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|err| RagError::config(&format!("invalid openai api key: {err}")))?,
        );

        let client = Client::builder()
            .use_rustls_tls()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| RagError::config(&format!("openai client build failed: {err}")))?;

        let chat_url = config
            .base_url
            .join(CHAT_COMPLETIONS_PATH)
            .map_err(|err| RagError::config(&format!("openai chat url join failed: {err}")))?;

        Ok(Self {
            client,
            config,
            chat_url,
        })
    }
}

#[async_trait]
impl GenerationClient for OpenAiGenerationClient {
    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![OutboundMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(self.chat_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|err| RagError::generation_failed(&format!("chat request error: {err}")))?;
        if response.status() != StatusCode::OK {
            return Err(RagError::generation_failed(&format!(
                "chat completion status: {}",
                response.status()
            )));
        }
        let payload: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| RagError::generation_failed(&format!("chat decode error: {err}")))?;

        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(content)
    }
}
