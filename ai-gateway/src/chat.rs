//! Chat-completion client.
//!
//! Both supported providers speak the same `/chat/completions` dialect; they
//! differ only in base URL and a couple of attribution headers, so a single
//! client covers both.

use crate::error::{provider_message, Error};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const OPENROUTER_BASE: &str = "https://openrouter.ai/api/v1";
const OPENAI_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_REFERER: &str = "https://github.com/keeper-companion";
const DEFAULT_TITLE: &str = "Keeper";

/// Which chat-completion provider to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenRouter,
    OpenAi,
}

impl Provider {
    /// The provider's default API base URL.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenRouter => OPENROUTER_BASE,
            Provider::OpenAi => OPENAI_BASE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "openrouter",
            Provider::OpenAi => "openai",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Ok(Provider::OpenRouter),
            "openai" => Ok(Provider::OpenAi),
            other => Err(Error::Config(format!("unknown provider '{other}'"))),
        }
    }
}

/// Connection settings for a [`ChatClient`].
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub provider: Provider,
    pub api_key: String,
    /// Overrides the provider's default base URL.
    pub base_url: Option<String>,
    pub model: String,
    /// Attribution headers, only sent to OpenRouter.
    pub referer: Option<String>,
    pub title: Option<String>,
}

impl ChatConfig {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            base_url: None,
            model: DEFAULT_MODEL.to_string(),
            referer: None,
            title: None,
        }
    }

    /// Read the configuration from `AI_PROVIDER`, `AI_API_KEY`, `AI_BASE_URL`
    /// and `AI_MODEL`.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("AI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(Error::NoApiKey)?;
        let provider = match std::env::var("AI_PROVIDER") {
            Ok(p) => p.parse()?,
            Err(_) => Provider::default(),
        };

        let mut config = Self::new(provider, api_key);
        if let Ok(url) = std::env::var("AI_BASE_URL") {
            config = config.with_base_url(url);
        }
        if let Ok(model) = std::env::var("AI_MODEL") {
            config = config.with_model(model);
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.base_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_attribution(
        mut self,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        self.referer = Some(referer.into());
        self.title = Some(title.into());
        self
    }

    /// The base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

/// Anything that can turn a chat request into text.
///
/// Generators depend on this trait rather than on [`ChatClient`] so they can
/// run against scripted models in tests.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn complete_text(&self, request: ChatRequest) -> Result<String, Error>;
}

/// Chat-completion client.
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    config: ChatConfig,
}

impl ChatClient {
    /// Create a new client from a configuration.
    pub fn new(config: ChatConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Create a client from the `AI_*` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::new(ChatConfig::from_env()?)
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Send a completion request and return the full response.
    pub async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, Error> {
        let api_request = self.build_api_request(&request);
        let headers = self.build_headers()?;
        let url = format!("{}/chat/completions", self.config.base_url());

        tracing::debug!(
            provider = %self.config.provider,
            model = %api_request.model,
            json_mode = request.json_mode,
            "sending chat completion"
        );

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: provider_message(&body),
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        parse_response(api_response)
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );

        if self.config.provider == Provider::OpenRouter {
            let referer = self.config.referer.as_deref().unwrap_or(DEFAULT_REFERER);
            let title = self.config.title.as_deref().unwrap_or(DEFAULT_TITLE);
            headers.insert(
                "http-referer",
                HeaderValue::from_str(referer)
                    .map_err(|e| Error::Config(format!("Invalid referer: {e}")))?,
            );
            headers.insert(
                "x-title",
                HeaderValue::from_str(title)
                    .map_err(|e| Error::Config(format!("Invalid title: {e}")))?,
            );
        }
        Ok(headers)
    }

    fn build_api_request(&self, request: &ChatRequest) -> ApiRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(ApiMessage {
                role: Role::System,
                content: system.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| ApiMessage {
            role: m.role,
            content: m.content.clone(),
        }));

        ApiRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_mode.then(|| ResponseFormat {
                r#type: "json_object".to_string(),
            }),
        }
    }
}

#[async_trait]
impl TextModel for ChatClient {
    async fn complete_text(&self, request: ChatRequest) -> Result<String, Error> {
        Ok(self.complete(request).await?.text)
    }
}

fn parse_response(api_response: ApiResponse) -> Result<ChatResponse, Error> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::Parse("response contained no choices".to_string()))?;

    Ok(ChatResponse {
        id: api_response.id.unwrap_or_default(),
        model: api_response.model.unwrap_or_default(),
        text: choice.message.content.unwrap_or_default(),
        finish_reason: choice.finish_reason,
        usage: api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        }),
    })
}

// ============================================================================
// Public types
// ============================================================================

/// A completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: Option<String>,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: usize,
    /// Ask the provider for a JSON-object response.
    pub json_mode: bool,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: None,
            system: None,
            messages,
            temperature: None,
            max_tokens: 2048,
            json_mode: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }

    /// Text of the last user message, if any.
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// A message in the conversation.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub id: String,
    pub model: String,
    pub text: String,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Copy)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: Role,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(provider: Provider) -> ChatClient {
        ChatClient::new(ChatConfig::new(provider, "test-key")).unwrap()
    }

    #[test]
    fn test_provider_base_urls() {
        assert_eq!(
            ChatConfig::new(Provider::OpenRouter, "k").base_url(),
            "https://openrouter.ai/api/v1"
        );
        assert_eq!(
            ChatConfig::new(Provider::OpenAi, "k").base_url(),
            "https://api.openai.com/v1"
        );
    }

    #[test]
    fn test_base_url_override_trims_slash() {
        let config =
            ChatConfig::new(Provider::OpenAi, "k").with_base_url("http://localhost:8080/v1/");
        assert_eq!(config.base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("OpenRouter".parse::<Provider>().unwrap(), Provider::OpenRouter);
        assert_eq!(" openai ".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert!(matches!("anthropic".parse::<Provider>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_openrouter_headers() {
        let headers = client(Provider::OpenRouter).build_headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer test-key");
        assert!(headers.contains_key("http-referer"));
        assert_eq!(headers["x-title"], DEFAULT_TITLE);
    }

    #[test]
    fn test_openai_headers_have_no_attribution() {
        let headers = client(Provider::OpenAi).build_headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer test-key");
        assert!(!headers.contains_key("http-referer"));
        assert!(!headers.contains_key("x-title"));
    }

    #[test]
    fn test_request_body_shape() {
        let request = ChatRequest::new(vec![Message::user("Hello")])
            .with_system("You are a game master's assistant")
            .with_temperature(0.7)
            .with_max_tokens(1000)
            .json_mode();

        let body =
            serde_json::to_value(client(Provider::OpenAi).build_api_request(&request)).unwrap();

        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Hello");
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_request_body_without_json_mode() {
        let request = ChatRequest::new(vec![Message::user("Hi")]).with_model("gpt-4o");
        let body =
            serde_json::to_value(client(Provider::OpenAi).build_api_request(&request)).unwrap();

        assert_eq!(body["model"], "gpt-4o");
        assert!(body.get("response_format").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_parse_response() {
        let raw = r#"{
            "id": "gen-1",
            "model": "openai/gpt-4o-mini",
            "choices": [{"message": {"role": "assistant", "content": "{\"a\":1}"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5}
        }"#;
        let response = parse_response(serde_json::from_str(raw).unwrap()).unwrap();

        assert_eq!(response.text, "{\"a\":1}");
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.usage.unwrap().prompt_tokens, 12);
    }

    #[test]
    fn test_parse_response_without_choices() {
        let raw = r#"{"id": "gen-2", "choices": []}"#;
        let result = parse_response(serde_json::from_str(raw).unwrap());
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_last_user_text() {
        let request = ChatRequest::new(vec![
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("second"),
        ]);
        assert_eq!(request.last_user_text(), Some("second"));
    }
}
