// Classification Orchestrator
// Keyword baseline -> first external opinion within the timeout -> reconciliation.
// Never fails: every provider problem degrades to the keyword result.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};

use crate::models::{ClassificationRequest, ClassificationResult, ExternalResult, KeywordResult};
use crate::services::config_store::AppConfig;
use crate::services::text_processor::preview;

use super::agreement::{from_keywords, reconcile, AgreementPolicy};
use super::external::{ExternalClassifier, ExternalUnavailable};
use super::image_labels::ImageLabelClassifier;
use super::keyword_scorer::classify_by_keywords;
use super::llm_classifier::LlmClassifier;
use super::priority::PriorityPrecedence;
use super::rules::{RuleSet, RuleSetError};

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("invalid rules file: {0}")]
    Rules(#[from] RuleSetError),
}

#[derive(Clone)]
pub struct Classifier {
    rules: Arc<RuleSet>,
    policy: AgreementPolicy,
    providers: Vec<Arc<dyn ExternalClassifier>>,
    provider_timeout: Duration,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(RuleSet::builtin())
    }
}

impl Classifier {
    /// Keyword-only classifier over the given rules
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self {
            rules,
            policy: AgreementPolicy::default(),
            providers: Vec::new(),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: AgreementPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Providers are asked in registration order
    pub fn with_provider(mut self, provider: Arc<dyn ExternalClassifier>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ClassifierError> {
        let settings = &config.classification;

        let rules = match &settings.rules_file {
            Some(path) => {
                let rules = RuleSet::load(path)?;
                info!(path = %path.display(), version = rules.version(), "classifier.rules_loaded");
                Arc::new(rules)
            }
            None => RuleSet::builtin(),
        };

        let policy = AgreementPolicy {
            strong_keyword_threshold: settings.strong_keyword_threshold,
            agreement_boost: settings.agreement_boost,
            priority_precedence: PriorityPrecedence::from_str(&settings.priority_precedence),
        };
        let timeout = Duration::from_secs(settings.provider_timeout_secs.max(1));

        let mut classifier = Self::new(rules).with_policy(policy).with_timeout(timeout);

        if settings.use_image_labels {
            classifier = classifier.with_provider(Arc::new(ImageLabelClassifier));
        }
        if settings.use_llm {
            if let Some(llm) = LlmClassifier::from_config(config, timeout) {
                info!(provider = llm.provider(), model = llm.model(), "classifier.llm_enabled");
                classifier = classifier.with_provider(Arc::new(llm));
            }
        }

        Ok(classifier)
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn policy(&self) -> &AgreementPolicy {
        &self.policy
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn classify_keywords(&self, title: &str, description: &str) -> KeywordResult {
        classify_by_keywords(&self.rules, title, description, self.policy.priority_precedence)
    }

    /// Keyword-only result, no providers consulted
    pub fn classify_offline(&self, title: &str, description: &str) -> ClassificationResult {
        from_keywords(&self.classify_keywords(title, description))
    }

    pub async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult {
        let request_id = uuid::Uuid::new_v4();
        let span = info_span!("classify", %request_id);

        async {
            let baseline = self.classify_keywords(&request.title, &request.description);
            info!(
                title = %preview(&request.title, 60),
                department = %baseline.department,
                matches = baseline.match_count,
                "classify.keyword_baseline"
            );

            let external = self.first_external(request, &baseline).await;
            let result = reconcile(&baseline, external.as_ref(), &self.policy);

            info!(
                department = %result.department,
                priority = %result.priority,
                confidence = result.confidence,
                source = external.as_ref().map_or("keywords", |e| e.source.as_str()),
                "classify.done"
            );
            result
        }
        .instrument(span)
        .await
    }

    async fn first_external(
        &self,
        request: &ClassificationRequest,
        baseline: &KeywordResult,
    ) -> Option<ExternalResult> {
        for provider in &self.providers {
            let outcome = match tokio::time::timeout(
                self.provider_timeout,
                provider.classify(request, baseline),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(ExternalUnavailable::Timeout(self.provider_timeout.as_millis() as u64)),
            };

            match outcome {
                Ok(result) => return Some(result),
                // Missing signal is the normal case for label-less reports
                Err(ExternalUnavailable::NoSignal) => {}
                Err(reason) => {
                    warn!(provider = provider.name(), %reason, "classify.provider_unavailable");
                }
            }
        }
        None
    }
}
