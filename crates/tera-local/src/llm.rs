use crate::env_any;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tera_core::{Error, Mode, Result};

/// Chat-completion hosts a session can run against. All but Anthropic speak
/// the OpenAI `chat/completions` dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    Xai,
    OpenRouter,
    Anthropic,
    OpenAi,
    DeepSeek,
    Mistral,
}

impl LlmProvider {
    pub fn all() -> [Self; 7] {
        [
            Self::Gemini,
            Self::Xai,
            Self::OpenRouter,
            Self::Anthropic,
            Self::OpenAi,
            Self::DeepSeek,
            Self::Mistral,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Xai => "xai",
            Self::OpenRouter => "openrouter",
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::DeepSeek => "deepseek",
            Self::Mistral => "mistral",
        }
    }

    fn api_key_envs(&self) -> [&'static str; 2] {
        match self {
            Self::Gemini => ["TERA_GEMINI_API_KEY", "GEMINI_API_KEY"],
            Self::Xai => ["TERA_XAI_API_KEY", "XAI_API_KEY"],
            Self::OpenRouter => ["TERA_OPENROUTER_API_KEY", "OPENROUTER_API_KEY"],
            Self::Anthropic => ["TERA_ANTHROPIC_API_KEY", "ANTHROPIC_API_KEY"],
            Self::OpenAi => ["TERA_OPENAI_API_KEY", "OPENAI_API_KEY"],
            Self::DeepSeek => ["TERA_DEEPSEEK_API_KEY", "DEEPSEEK_API_KEY"],
            Self::Mistral => ["TERA_MISTRAL_API_KEY", "MISTRAL_API_KEY"],
        }
    }

    fn model_env_prefix(&self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI",
            Self::Xai => "GROK",
            Self::OpenRouter => "OPENROUTER",
            Self::Anthropic => "ANTHROPIC",
            Self::OpenAi => "OPENAI",
            Self::DeepSeek => "DEEPSEEK",
            Self::Mistral => "MISTRAL",
        }
    }

    pub fn api_key(&self) -> Option<String> {
        env_any(&self.api_key_envs())
    }

    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }

    pub fn default_model(&self, mode: Mode) -> &'static str {
        match (self, mode) {
            (Self::Gemini, Mode::Normal) => "gemini-1.5-flash",
            (Self::Gemini, Mode::Deep) => "gemini-1.5-pro",
            (Self::Xai, Mode::Normal) => "grok-3-mini-beta",
            (Self::Xai, Mode::Deep) => "grok-3-medium-beta",
            (Self::OpenRouter, Mode::Normal) => "mixtral-8x7b-32768",
            (Self::OpenRouter, Mode::Deep) => "mixtral-8x22b-32768",
            (Self::Anthropic, Mode::Normal) => "claude-3-haiku-20240307",
            (Self::Anthropic, Mode::Deep) => "claude-3-opus-20240229",
            (Self::OpenAi, Mode::Normal) => "gpt-3.5-turbo",
            (Self::OpenAi, Mode::Deep) => "gpt-4",
            (Self::DeepSeek, Mode::Normal) => "deepseek-v3",
            (Self::DeepSeek, Mode::Deep) => "deepseek-r1",
            (Self::Mistral, Mode::Normal) => "mixtral-8x7b",
            (Self::Mistral, Mode::Deep) => "mixtral-8x22b",
        }
    }

    /// `TERA_<P>_MODEL_<MODE>`, then `<P>_MODEL_<MODE>`, then the built-in default.
    pub fn model_for(&self, mode: Mode) -> String {
        let suffix = match mode {
            Mode::Normal => "NORMAL",
            Mode::Deep => "DEEP",
        };
        let prefix = self.model_env_prefix();
        let tera_key = format!("TERA_{prefix}_MODEL_{suffix}");
        let bare_key = format!("{prefix}_MODEL_{suffix}");
        env_any(&[tera_key.as_str(), bare_key.as_str()])
            .unwrap_or_else(|| self.default_model(mode).to_string())
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
            Self::Xai => "https://api.x.ai/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::DeepSeek => "https://api.deepseek.com",
            Self::Mistral => "https://api.mistral.ai/v1",
        }
    }

    /// Hosts that honor `response_format: {"type": "json_object"}`.
    pub fn supports_json_mode(&self) -> bool {
        matches!(self, Self::Xai | Self::OpenRouter)
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" | "1" => Ok(Self::Gemini),
            "xai" | "grok" | "2" => Ok(Self::Xai),
            "openrouter" | "3" => Ok(Self::OpenRouter),
            "anthropic" | "claude" | "4" => Ok(Self::Anthropic),
            "openai" | "5" => Ok(Self::OpenAi),
            "deepseek" | "6" => Ok(Self::DeepSeek),
            "mistral" | "7" => Ok(Self::Mistral),
            other => Err(Error::InvalidConfig(format!(
                "unknown llm provider {other:?} (allowed: gemini, xai, openrouter, anthropic, openai, deepseek, mistral)"
            ))),
        }
    }
}

/// One system + user turn, returning the assistant's text.
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    fn model(&self) -> &str;

    /// `json` asks for a JSON object reply where the host supports it; callers
    /// still parse leniently.
    async fn chat(&self, system: &str, user: &str, json: bool) -> Result<String>;
}

pub const DEFAULT_LLM_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone)]
pub struct ChatModelConfig {
    pub provider: LlmProvider,
    pub mode: Mode,
    /// Wins over env and built-in defaults.
    pub model: Option<String>,
    pub timeout_ms: u64,
}

impl ChatModelConfig {
    pub fn new(provider: LlmProvider, mode: Mode) -> Self {
        Self {
            provider,
            mode,
            model: None,
            timeout_ms: DEFAULT_LLM_TIMEOUT_MS,
        }
    }

    pub fn resolved_model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.model_for(self.mode))
    }
}

/// Fails with `NotConfigured` when the provider's key is absent, before any
/// request is made.
pub fn build_chat_model(
    cfg: &ChatModelConfig,
    client: reqwest::Client,
) -> Result<Arc<dyn ChatModel>> {
    let [primary, _] = cfg.provider.api_key_envs();
    let api_key = cfg
        .provider
        .api_key()
        .ok_or_else(|| Error::NotConfigured(format!("missing {primary} for {}", cfg.provider)))?;
    let base_url = env_any(&["TERA_LLM_BASE_URL"])
        .unwrap_or_else(|| cfg.provider.base_url().to_string());
    let model = cfg.resolved_model();
    tracing::debug!(provider = %cfg.provider, %model, %base_url, "chat model configured");

    let chat: Arc<dyn ChatModel> = match cfg.provider {
        LlmProvider::Anthropic => Arc::new(AnthropicClient {
            client,
            base_url,
            api_key,
            model,
            timeout_ms: cfg.timeout_ms,
        }),
        p => Arc::new(OpenAiCompatClient {
            client,
            base_url,
            api_key,
            model,
            json_mode: p.supports_json_mode(),
            timeout_ms: cfg.timeout_ms,
            label: p.as_str(),
        }),
    };
    Ok(chat)
}

#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    json_mode: bool,
    timeout_ms: u64,
    label: &'static str,
}

impl OpenAiCompatClient {
    fn endpoint_chat_completions(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    stream: bool,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

impl Message {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait::async_trait]
impl ChatModel for OpenAiCompatClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, system: &str, user: &str, json: bool) -> Result<String> {
        let req = ChatCompletionsRequest {
            model: self.model.clone(),
            messages: vec![Message::new("system", system), Message::new("user", user)],
            response_format: (json && self.json_mode).then_some(ResponseFormat {
                kind: "json_object",
            }),
            stream: false,
        };

        let resp = self
            .client
            .post(self.endpoint_chat_completions())
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Llm(format!(
                "{} chat.completions HTTP {status}",
                self.label
            )));
        }

        let parsed: ChatCompletionsResponse =
            resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Llm(format!("{} returned no choices", self.label)))
    }
}

/// Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_ms: u64,
}

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Clone, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

fn join_text_blocks(blocks: Vec<ContentBlock>) -> Result<String> {
    let text = blocks
        .into_iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text)
        .collect::<Vec<_>>()
        .join("");
    if text.is_empty() {
        return Err(Error::Llm("anthropic returned no text content".to_string()));
    }
    Ok(text)
}

#[async_trait::async_trait]
impl ChatModel for AnthropicClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, system: &str, user: &str, _json: bool) -> Result<String> {
        let req = MessagesRequest {
            model: self.model.clone(),
            max_tokens: ANTHROPIC_MAX_TOKENS,
            system: system.to_string(),
            messages: vec![Message::new("user", user)],
        };

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url.trim_end_matches('/')))
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Llm(format!("anthropic messages HTTP {status}")));
        }

        let parsed: MessagesResponse = resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;
        join_text_blocks(parsed.content)
    }
}
