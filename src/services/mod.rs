// Civic Triage Core Services

pub mod text_processor;
pub mod config_store;
pub mod providers;
pub mod classification;

pub use text_processor::*;
pub use config_store::*;
pub use providers::*;

pub use classification::{
    AgreementPolicy,
    Classifier,
    ClassifierError,
    ExternalClassifier,
    ExternalUnavailable,
    ImageLabelClassifier,
    LlmClassifier,
    PriorityPrecedence,
    RuleSet,
    RuleSetError,
};
