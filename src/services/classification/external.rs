// External Classifiers
// Capability seam for optional higher-order opinions (LLM, image model).
// Absence is a value, never a failure of the caller's flow.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ClassificationRequest, ExternalResult, KeywordResult};

/// Why an external classifier had no opinion
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExternalUnavailable {
    #[error("provider not configured")]
    NotConfigured,
    #[error("no usable signal in the request")]
    NoSignal,
    #[error("provider timed out after {0} ms")]
    Timeout(u64),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("malformed provider response: {0}")]
    Malformed(String),
    #[error("unknown department returned: {0}")]
    UnknownDepartment(String),
}

#[async_trait]
pub trait ExternalClassifier: Send + Sync {
    /// Short name used in reasoning and logs
    fn name(&self) -> &str;

    /// Give an opinion on the request. The keyword baseline is passed as a hint.
    async fn classify(
        &self,
        request: &ClassificationRequest,
        baseline: &KeywordResult,
    ) -> Result<ExternalResult, ExternalUnavailable>;
}
