// Classification Module
// Routes citizen reports to departments:
// - rules: keyword tables per department
// - keyword_scorer / priority: offline baseline
// - external / image_labels / llm_classifier: optional opinions
// - agreement: keyword vs external reconciliation
// - classifier: orchestration with timeouts

pub mod agreement;
pub mod classifier;
pub mod external;
pub mod image_labels;
pub mod keyword_scorer;
pub mod llm_classifier;
pub mod priority;
pub mod rules;

pub use agreement::{from_keywords, reconcile, AgreementPolicy};
pub use classifier::{Classifier, ClassifierError, DEFAULT_PROVIDER_TIMEOUT};
pub use external::{ExternalClassifier, ExternalUnavailable};
pub use image_labels::{classify_labels, ImageLabelClassifier};
pub use keyword_scorer::{classify_by_keywords, keyword_confidence};
pub use llm_classifier::{fallback_acknowledgement, parse_llm_verdict, LlmClassifier};
pub use priority::PriorityPrecedence;
pub use rules::{CategoryRule, PriorityKeywords, RuleSet, RuleSetError};
