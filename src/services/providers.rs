// AI Provider Service
// OpenAI-compatible chat completion calls (OpenAI, DeepSeek, GLM)

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::config_store::AppConfig;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEEPSEEK_DEFAULT_URL: &str = "https://api.deepseek.com/chat/completions";
const GLM_DEFAULT_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";

pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_CLIENT_TIMEOUT_SECS: u64 = 30;

/// Values shipped in sample env files that must not count as credentials
const PLACEHOLDER_KEYS: &[&str] = &["your_openai_api_key_here", "your_api_key_here", "changeme"];

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
    #[error("API key not configured")]
    MissingApiKey,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderSpec {
    pub name: String,
    pub model: String,
}

pub fn parse_provider(spec: &str) -> ProviderSpec {
    let parts: Vec<&str> = spec.splitn(2, ':').collect();
    if parts.len() == 2 {
        ProviderSpec {
            name: parts[0].trim().to_string(),
            model: parts[1].trim().to_string(),
        }
    } else {
        ProviderSpec {
            name: spec.trim().to_string(),
            model: String::new(),
        }
    }
}

/// Default model per provider when the spec names none
pub fn default_model(provider: &str) -> &'static str {
    match provider {
        "deepseek" => "deepseek-chat",
        "glm" => "glm-4-flash",
        _ => OPENAI_DEFAULT_MODEL,
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: i32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
    reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
    reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Parameters of a single chat completion
#[derive(Debug, Clone)]
pub struct ChatCall<'a> {
    pub model: &'a str,
    pub api_key: &'a str,
    pub system: &'a str,
    pub user: &'a str,
    pub max_tokens: i32,
    pub temperature: f64,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct ProviderClient {
    client: Client,
    openai_url: String,
    deepseek_url: String,
    glm_url: String,
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_CLIENT_TIMEOUT_SECS))
    }
}

impl ProviderClient {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self::with_client(client)
    }

    pub fn with_proxy(proxy_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let proxy = reqwest::Proxy::all(proxy_url)?;
        let client = Client::builder().timeout(timeout).proxy(proxy).build()?;
        Ok(Self::with_client(client))
    }

    fn with_client(client: Client) -> Self {
        let openai_url = env::var("OPENAI_API_URL").unwrap_or_else(|_| OPENAI_DEFAULT_URL.to_string());
        let deepseek_url =
            env::var("DEEPSEEK_API_URL").unwrap_or_else(|_| DEEPSEEK_DEFAULT_URL.to_string());
        let glm_url = env::var("GLM_API_URL").unwrap_or_else(|_| GLM_DEFAULT_URL.to_string());

        Self {
            client,
            openai_url,
            deepseek_url,
            glm_url,
        }
    }

    /// Endpoint for a provider name, if supported
    pub fn url_for(&self, provider: &str) -> Option<&str> {
        match provider {
            "openai" => Some(&self.openai_url),
            "deepseek" => Some(&self.deepseek_url),
            "glm" => Some(&self.glm_url),
            _ => None,
        }
    }

    /// Call a provider by name, optionally at a custom endpoint
    pub async fn call_provider(
        &self,
        provider: &str,
        custom_url: Option<&str>,
        call: &ChatCall<'_>,
    ) -> Result<ChatResult, ProviderError> {
        let url = match custom_url {
            Some(url) => url,
            None => self
                .url_for(provider)
                .ok_or_else(|| ProviderError::UnsupportedProvider(provider.to_string()))?,
        };
        self.call_chat_api(url, call).await
    }

    async fn call_chat_api(&self, url: &str, call: &ChatCall<'_>) -> Result<ChatResult, ProviderError> {
        if call.api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey);
        }

        let request = ChatRequest {
            model: call.model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: call.system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: call.user.to_string(),
                },
            ],
            max_tokens: call.max_tokens,
            temperature: call.temperature,
            response_format: call.json.then(|| ResponseFormat {
                r#type: "json_object".to_string(),
            }),
        };

        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", call.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let message = data
            .choices
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_ref());

        let mut content = message
            .and_then(|m| m.content.clone())
            .filter(|c| !c.trim().is_empty());

        let reasoning = message
            .and_then(|m| m.reasoning_content.clone())
            .or(data.reasoning_content);

        // Reasoning models sometimes leave the JSON answer in the reasoning trace
        if content.is_none() {
            if let Some(ref r) = reasoning {
                content = json_in_text(r);
            }
        }

        let content = content.ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult {
            content,
            latency_ms,
            reasoning,
        })
    }
}

fn json_in_text(text: &str) -> Option<String> {
    static JSON_RE: OnceLock<Regex> = OnceLock::new();
    let re = JSON_RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid json regex"));
    re.find(text).map(|m| m.as_str().to_string())
}

fn usable_key(val: &str) -> Option<String> {
    let v = val.trim();
    if v.is_empty() || PLACEHOLDER_KEYS.contains(&v) {
        None
    } else {
        Some(v.to_string())
    }
}

fn env_key_names(provider: &str) -> &'static [&'static str] {
    match provider {
        "openai" => &["OPENAI_API_KEY", "CIVIC_TRIAGE_OPENAI_API_KEY"],
        "deepseek" => &["DEEPSEEK_API_KEY", "CIVIC_TRIAGE_DEEPSEEK_API_KEY"],
        "glm" => &["GLM_API_KEY", "CIVIC_TRIAGE_GLM_API_KEY"],
        _ => &[],
    }
}

/// Get API key from environment, then from the given config
pub fn resolve_api_key(provider: &str, config: &AppConfig) -> Option<String> {
    for key in env_key_names(provider) {
        if let Some(v) = env::var(key).ok().as_deref().and_then(usable_key) {
            return Some(v);
        }
    }

    config
        .api_keys
        .get(provider)
        .and_then(|k| usable_key(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        let spec = parse_provider("openai:gpt-4o-mini");
        assert_eq!(spec.name, "openai");
        assert_eq!(spec.model, "gpt-4o-mini");

        let spec2 = parse_provider("deepseek");
        assert_eq!(spec2.name, "deepseek");
        assert_eq!(spec2.model, "");
    }

    #[test]
    fn test_default_models() {
        assert_eq!(default_model("deepseek"), "deepseek-chat");
        assert_eq!(default_model("openai"), OPENAI_DEFAULT_MODEL);
    }

    #[test]
    fn test_provider_client_urls() {
        let client = ProviderClient::default();
        assert!(client.url_for("glm").unwrap().contains("bigmodel.cn"));
        assert!(client.url_for("anthropic").is_none());
    }

    #[test]
    fn test_placeholder_keys_are_ignored() {
        assert_eq!(usable_key("your_openai_api_key_here"), None);
        assert_eq!(usable_key("   "), None);
        assert_eq!(usable_key(" sk-123 "), Some("sk-123".to_string()));
    }

    #[test]
    fn test_resolve_api_key_from_config() {
        let mut config = AppConfig::default();
        config.api_keys.insert("unit-test-provider".to_string(), "k-1".to_string());
        assert_eq!(resolve_api_key("unit-test-provider", &config), Some("k-1".to_string()));
        assert_eq!(resolve_api_key("other-provider", &config), None);
    }

    #[test]
    fn test_json_in_text() {
        let text = "thinking...\n{\"category\": \"road\"}\ndone";
        assert_eq!(json_in_text(text).unwrap(), "{\"category\": \"road\"}");
        assert!(json_in_text("no json").is_none());
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let client = ProviderClient::default();
        let call = ChatCall {
            model: "m",
            api_key: "",
            system: "s",
            user: "u",
            max_tokens: 10,
            temperature: 0.0,
            json: true,
        };
        let err = client.call_provider("openai", None, &call).await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey));

        let err = client.call_provider("nope", None, &call).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedProvider(_)));
    }
}
