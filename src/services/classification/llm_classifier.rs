// LLM Classifier
// Chat-completion opinion on a report, with the keyword baseline as a hint,
// plus short acknowledgement messages for citizens.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::{ClassificationRequest, Department, ExternalResult, KeywordResult, Priority};
use crate::services::config_store::AppConfig;
use crate::services::providers::{
    default_model, parse_provider, resolve_api_key, ChatCall, ProviderClient, ProviderError,
};
use crate::services::text_processor::preview;

use super::external::{ExternalClassifier, ExternalUnavailable};

const DEFAULT_PROVIDER: &str = "openai";
const DEFAULT_LLM_CONFIDENCE: f64 = 0.8;
const CLASSIFY_MAX_TOKENS: i32 = 300;
const SUGGEST_MAX_TOKENS: i32 = 150;
const SUGGEST_TEMPERATURE: f64 = 0.7;

const CLASSIFY_SYSTEM_PROMPT: &str = "You are an expert civic complaint classification system. \
You analyze complaint text and any labels detected in attached photos. \
Always answer with a single JSON object.";

const SUGGEST_SYSTEM_PROMPT: &str = "You are a helpful civic service representative.";

/// Fixed acknowledgement used whenever a generated one is unavailable
pub fn fallback_acknowledgement(category: &str) -> String {
    format!(
        "Thank you for reporting this {} issue. Our team has been notified and will investigate shortly. We appreciate your contribution to making our city better.",
        category
    )
}

pub fn build_classify_prompt(request: &ClassificationRequest, baseline: &KeywordResult) -> String {
    let mut prompt = format!(
        "Analyze the following civic complaint and classify it.\n\n\
         Title: {}\n\
         Description: {}\n\n\
         RULE-BASED ANALYSIS:\n\
         - Detected Category: {}\n\
         - Detected Priority: {}\n\
         - Keyword Matches: {}\n\
         - Confidence: {:.2}",
        request.title.trim(),
        request.description.trim(),
        baseline.department.label(),
        baseline.priority,
        baseline.match_count,
        baseline.confidence,
    );

    let labels: Vec<&str> = request
        .image_labels
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();
    if !labels.is_empty() {
        prompt.push_str(&format!(
            "\n\nIMAGE LABELS:\n- {}\n\nTreat the image labels as visual evidence.",
            labels.join(", ")
        ));
    }

    let departments: Vec<&str> = Department::ALL.iter().map(|d| d.label()).collect();
    prompt.push_str(&format!(
        "\n\nClassify this complaint into:\n\
         1. category: exactly one of [{}]\n\
         2. priority: one of [high, medium, low]\n\
         \x20  - high: immediate danger, health hazard, major infrastructure failure\n\
         \x20  - medium: significant inconvenience, needs attention soon\n\
         \x20  - low: minor or cosmetic issue\n\
         3. confidence: number between 0 and 1\n\
         4. reasoning: one or two sentences\n\n\
         Respond ONLY with JSON: {{\"category\": \"...\", \"priority\": \"...\", \"confidence\": 0.9, \"reasoning\": \"...\"}}",
        departments.join(", ")
    ));

    prompt
}

fn build_suggest_prompt(category: &str, title: &str, description: &str) -> String {
    format!(
        "Generate a brief, professional response for this civic complaint:\n\n\
         Category: {}\n\
         Title: {}\n\
         Description: {}\n\n\
         Write a short acknowledgment (2-3 sentences) that thanks the citizen, \
         acknowledges the issue and mentions next steps. Keep it professional and empathetic.",
        category, title, description
    )
}

fn extract_json(content: &str) -> Option<&str> {
    let content = content.trim();
    if content.starts_with('{') {
        return Some(content);
    }
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

#[derive(Debug, Deserialize)]
struct LlmVerdict {
    category: Option<String>,
    priority: Option<String>,
    confidence: Option<f64>,
    reasoning: Option<String>,
}

/// Parse a chat reply into an external opinion
pub fn parse_llm_verdict(source: &str, content: &str) -> Result<ExternalResult, ExternalUnavailable> {
    let json = extract_json(content)
        .ok_or_else(|| ExternalUnavailable::Malformed("no JSON in response".to_string()))?;
    let verdict: LlmVerdict =
        serde_json::from_str(json).map_err(|e| ExternalUnavailable::Malformed(e.to_string()))?;

    let category = verdict
        .category
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ExternalUnavailable::Malformed("missing category".to_string()))?;
    let department = Department::from_label(&category)
        .ok_or_else(|| ExternalUnavailable::UnknownDepartment(category.clone()))?;

    Ok(ExternalResult {
        source: source.to_string(),
        department,
        confidence: verdict.confidence.unwrap_or(DEFAULT_LLM_CONFIDENCE),
        priority: verdict.priority.as_deref().and_then(Priority::from_label),
        reasoning: verdict
            .reasoning
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| format!("{} suggested {}", source, department.label())),
    })
}

fn unavailable(err: ProviderError) -> ExternalUnavailable {
    match err {
        ProviderError::MissingApiKey => ExternalUnavailable::NotConfigured,
        other => ExternalUnavailable::Provider(other.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct LlmClassifier {
    client: ProviderClient,
    name: String,
    provider: String,
    model: String,
    api_key: String,
    base_url: Option<String>,
}

impl LlmClassifier {
    pub fn new(client: ProviderClient, provider: &str, model: &str, api_key: &str) -> Self {
        Self {
            client,
            name: format!("llm:{}", provider),
            provider: provider.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Build from configuration; `None` when the provider is disabled or has no API key
    pub fn from_config(config: &AppConfig, timeout: Duration) -> Option<Self> {
        let spec = parse_provider(config.default_provider.as_deref().unwrap_or(DEFAULT_PROVIDER));
        let provider_config = config.providers.get(&spec.name);

        if provider_config.map_or(false, |p| !p.enabled) {
            debug!(provider = %spec.name, "llm.provider_disabled");
            return None;
        }

        let Some(api_key) = resolve_api_key(&spec.name, config) else {
            debug!(provider = %spec.name, "llm.no_api_key");
            return None;
        };

        let model = if spec.model.is_empty() {
            provider_config
                .and_then(|p| p.model.clone())
                .unwrap_or_else(|| default_model(&spec.name).to_string())
        } else {
            spec.model.clone()
        };

        let client = match config.proxy_url() {
            Some(proxy) => ProviderClient::with_proxy(proxy, timeout).unwrap_or_else(|e| {
                warn!(error = %e, "llm.proxy_rejected");
                ProviderClient::new(timeout)
            }),
            None => ProviderClient::new(timeout),
        };

        let mut classifier = Self::new(client, &spec.name, &model, &api_key);
        if let Some(url) = provider_config.and_then(|p| p.base_url.clone()) {
            classifier = classifier.with_base_url(url);
        }
        Some(classifier)
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        system: &str,
        user: &str,
        max_tokens: i32,
        temperature: f64,
        json: bool,
    ) -> Result<String, ProviderError> {
        let call = ChatCall {
            model: &self.model,
            api_key: &self.api_key,
            system,
            user,
            max_tokens,
            temperature,
            json,
        };
        let result = self
            .client
            .call_provider(&self.provider, self.base_url.as_deref(), &call)
            .await?;
        debug!(provider = %self.provider, latency_ms = result.latency_ms, "llm.chat_completed");
        Ok(result.content)
    }

    /// Short acknowledgement for the citizen; the fixed template on any failure
    pub async fn suggest_response(&self, category: &str, title: &str, description: &str) -> String {
        let prompt = build_suggest_prompt(category, title, description);
        match self
            .chat(SUGGEST_SYSTEM_PROMPT, &prompt, SUGGEST_MAX_TOKENS, SUGGEST_TEMPERATURE, false)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => fallback_acknowledgement(category),
            Err(e) => {
                warn!(provider = %self.provider, error = %e, "llm.suggest_response_failed");
                fallback_acknowledgement(category)
            }
        }
    }
}

#[async_trait]
impl ExternalClassifier for LlmClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn classify(
        &self,
        request: &ClassificationRequest,
        baseline: &KeywordResult,
    ) -> Result<ExternalResult, ExternalUnavailable> {
        if request.title.trim().is_empty() && request.description.trim().is_empty() {
            return Err(ExternalUnavailable::NoSignal);
        }

        let prompt = build_classify_prompt(request, baseline);
        let content = self
            .chat(CLASSIFY_SYSTEM_PROMPT, &prompt, CLASSIFY_MAX_TOKENS, 0.0, true)
            .await
            .map_err(unavailable)?;

        debug!(provider = %self.provider, reply = %preview(&content, 200), "llm.reply");
        parse_llm_verdict(&self.name, &content)
    }
}
