//! Vision-model client for OpenAI-compatible chat-completions endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{GradingError, HomeworkResult};

pub const DEFAULT_BASE_URL: &str = "https://api-inference.modelscope.cn/v1";
pub const DEFAULT_MODEL: &str = "Qwen/Qwen3-VL-235B-A22B-Instruct";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

const PROBE_PROMPT: &str = "Hello, this is a test message. Please respond with \"OK\".";
const PROBE_MAX_TOKENS: u32 = 10;

/// Remote model settings.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ModelConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            ..Self::default()
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One part of a multipart message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(parts),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

/// A model that turns chat messages into a text reply.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Send `messages` and return the raw text of the first choice.
    async fn complete(&self, messages: &[ChatMessage]) -> HomeworkResult<String>;

    /// Probe the endpoint with a trivial prompt. Never fails.
    async fn test_connection(&self) -> bool;
}

/// Chat-completions client for OpenAI-compatible APIs.
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    config: ModelConfig,
}

impl OpenAiCompatibleClient {
    /// Fails with [`GradingError::MissingApiKey`] when no credential is set.
    pub fn new(config: ModelConfig) -> HomeworkResult<Self> {
        let api_key = match config.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => key.to_string(),
            _ => {
                tracing::warn!("模型服务初始化失败：缺少API密钥");
                return Err(GradingError::MissingApiKey);
            }
        };
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            endpoint,
            config,
        })
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> HomeworkResult<Value> {
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens,
            temperature,
            stream: false,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GradingError::ModelCallFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GradingError::ModelCallFailed(format!(
                "{} {}",
                status.as_u16(),
                detail.trim()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| GradingError::ModelCallFailed(e.to_string()))
    }
}

/// Text of `choices[0].message.content`, if present and non-empty.
fn first_choice_text(response: &Value) -> Option<&str> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl VisionModel for OpenAiCompatibleClient {
    async fn complete(&self, messages: &[ChatMessage]) -> HomeworkResult<String> {
        let response = self
            .send(messages, self.config.max_tokens, self.config.temperature)
            .await?;
        let content = first_choice_text(&response).ok_or(GradingError::EmptyModelReply)?;
        tracing::debug!("模型返回内容: {content}");
        Ok(content.to_string())
    }

    async fn test_connection(&self) -> bool {
        let messages = [ChatMessage::user(PROBE_PROMPT)];
        match self.send(&messages, PROBE_MAX_TOKENS, 0.0).await {
            Ok(response) => first_choice_text(&response).is_some(),
            Err(e) => {
                tracing::error!("模型连接测试失败: {e}");
                false
            }
        }
    }
}
