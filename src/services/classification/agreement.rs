// Agreement / Override
// Reconciles the keyword baseline with at most one external opinion.
// - Agreement: blended confidence, capped at 0.99
// - Disagreement: keyword department is kept once it has strong evidence,
//   otherwise the external department wins

use crate::models::{
    ClassificationResult, ExternalResult, ExternalSummary, KeywordResult, Priority, RuleBasedMatch,
};
use tracing::info;

use super::priority::PriorityPrecedence;

pub const DEFAULT_STRONG_KEYWORD_THRESHOLD: u32 = 3;
pub const DEFAULT_AGREEMENT_BOOST: f64 = 0.10;

const MAX_CONFIDENCE: f64 = 0.99;
const MIN_CONFIDENCE: f64 = 0.5;
const DEFAULT_EXTERNAL_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgreementPolicy {
    /// Keyword match count at which the keyword department overrides a disagreeing source.
    pub strong_keyword_threshold: u32,
    pub agreement_boost: f64,
    pub priority_precedence: PriorityPrecedence,
}

impl Default for AgreementPolicy {
    fn default() -> Self {
        Self {
            strong_keyword_threshold: DEFAULT_STRONG_KEYWORD_THRESHOLD,
            agreement_boost: DEFAULT_AGREEMENT_BOOST,
            priority_precedence: PriorityPrecedence::Severity,
        }
    }
}

fn sanitize_confidence(confidence: f64) -> f64 {
    let c = if confidence.is_finite() {
        confidence
    } else {
        DEFAULT_EXTERNAL_CONFIDENCE
    };
    c.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// Turn a keyword result into a final result without any external input
pub fn from_keywords(keyword: &KeywordResult) -> ClassificationResult {
    ClassificationResult {
        category: keyword.department.label().to_string(),
        department: keyword.department,
        priority: keyword.priority,
        confidence: keyword.confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE),
        reasoning: keyword.reasoning.clone(),
        rule_based_match: RuleBasedMatch {
            department: keyword.department,
            matches: keyword.match_count,
            agreed: true,
        },
        external: None,
    }
}

pub fn reconcile(
    keyword: &KeywordResult,
    external: Option<&ExternalResult>,
    policy: &AgreementPolicy,
) -> ClassificationResult {
    let Some(external) = external else {
        return from_keywords(keyword);
    };

    let ext_confidence = sanitize_confidence(external.confidence);

    let (department, priority, confidence, reasoning) = if external.department == keyword.department {
        let blended = (keyword.confidence + ext_confidence) / 2.0 + policy.agreement_boost;
        let confidence = blended.max(keyword.confidence).min(MAX_CONFIDENCE);
        let priority = if keyword.priority_detected {
            keyword.priority
        } else {
            external.priority.unwrap_or(keyword.priority)
        };
        let reasoning = format!(
            "{} confirmed rule-based classification ({} keyword matches): {}",
            external.source, keyword.match_count, external.reasoning
        );
        (keyword.department, priority, confidence, reasoning)
    } else if keyword.match_count >= policy.strong_keyword_threshold {
        info!(
            keyword_department = %keyword.department,
            matches = keyword.match_count,
            external_department = %external.department,
            source = %external.source,
            "agreement.rule_based_override"
        );
        let confidence = keyword.confidence.max(ext_confidence).min(MAX_CONFIDENCE);
        let reasoning = format!(
            "Rule-based override: {} ({} keyword matches) kept over {} suggestion {}",
            keyword.department.label(),
            keyword.match_count,
            external.source,
            external.department.label()
        );
        (keyword.department, keyword.priority, confidence, reasoning)
    } else {
        let priority: Priority = external.priority.unwrap_or(keyword.priority);
        let reasoning = format!(
            "{} classification preferred over rule-based {} ({} keyword matches): {}",
            external.source,
            keyword.department.label(),
            keyword.match_count,
            external.reasoning
        );
        (external.department, priority, ext_confidence, reasoning)
    };

    ClassificationResult {
        category: department.label().to_string(),
        department,
        priority,
        confidence,
        reasoning,
        rule_based_match: RuleBasedMatch {
            department: keyword.department,
            matches: keyword.match_count,
            agreed: keyword.department == department,
        },
        external: Some(ExternalSummary {
            source: external.source.clone(),
            department: external.department,
            confidence: ext_confidence,
            agreed: external.department == department,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Department;
    use crate::services::classification::keyword_scorer::keyword_confidence;

    fn keyword(department: Department, match_count: u32) -> KeywordResult {
        KeywordResult {
            department,
            priority: Priority::Medium,
            priority_detected: false,
            match_count,
            keyword_hits: match_count,
            matched_keywords: vec![],
            confidence: keyword_confidence(match_count),
            reasoning: format!("Rule-based classification: {} keyword matches found", match_count),
        }
    }

    fn external(department: Department, confidence: f64) -> ExternalResult {
        ExternalResult {
            source: "llm".to_string(),
            department,
            confidence,
            priority: None,
            reasoning: "looks like it".to_string(),
        }
    }

    #[test]
    fn test_no_external_returns_keyword_result() {
        let kw = keyword(Department::WaterManagement, 2);
        let result = reconcile(&kw, None, &AgreementPolicy::default());
        assert_eq!(result.department, Department::WaterManagement);
        assert_eq!(result.confidence, kw.confidence);
        assert_eq!(result.reasoning, kw.reasoning);
        assert!(result.external.is_none());
    }

    #[test]
    fn test_strong_keywords_override_disagreeing_source() {
        let kw = keyword(Department::RoadService, 4);
        let ext = external(Department::WaterManagement, 0.9);
        let result = reconcile(&kw, Some(&ext), &AgreementPolicy::default());
        assert_eq!(result.department, Department::RoadService);
        assert_eq!(result.confidence, 0.95_f64.max(0.9));
        assert!(result.reasoning.contains("override"));
        assert!(result.rule_based_match.agreed);
        assert!(!result.external.unwrap().agreed);
    }

    #[test]
    fn test_weak_keywords_yield_to_external_source() {
        let kw = keyword(Department::HospitalEmergency, 1);
        let ext = external(Department::General, 0.8);
        let result = reconcile(&kw, Some(&ext), &AgreementPolicy::default());
        assert_eq!(result.department, Department::General);
        assert_eq!(result.category, "General Department");
        assert_eq!(result.confidence, 0.8);
        assert!(!result.rule_based_match.agreed);
    }

    #[test]
    fn test_agreement_raises_confidence_and_caps_it() {
        let kw = keyword(Department::ElectricalService, 2);
        let ext = external(Department::ElectricalService, 0.9);
        let result = reconcile(&kw, Some(&ext), &AgreementPolicy::default());
        assert_eq!(result.department, Department::ElectricalService);
        assert!(result.confidence > kw.confidence);
        assert!(result.confidence <= 0.99);
        assert!(result.reasoning.contains("confirmed"));

        let strong = keyword(Department::ElectricalService, 9);
        let certain = external(Department::ElectricalService, 0.99);
        let capped = reconcile(&strong, Some(&certain), &AgreementPolicy::default());
        assert_eq!(capped.confidence, 0.99);
    }

    #[test]
    fn test_external_priority_used_when_keywords_found_none() {
        let kw = keyword(Department::RoadService, 1);
        let mut ext = external(Department::RoadService, 0.7);
        ext.priority = Some(Priority::High);
        let result = reconcile(&kw, Some(&ext), &AgreementPolicy::default());
        assert_eq!(result.priority, Priority::High);

        let mut detected = keyword(Department::RoadService, 3);
        detected.priority = Priority::Low;
        detected.priority_detected = true;
        let result = reconcile(&detected, Some(&ext), &AgreementPolicy::default());
        assert_eq!(result.priority, Priority::Low);
    }

    #[test]
    fn test_external_confidence_is_sanitized() {
        let kw = keyword(Department::RoadService, 0);
        let low = reconcile(&kw, Some(&external(Department::General, 0.1)), &AgreementPolicy::default());
        assert_eq!(low.confidence, 0.5);

        let nan = reconcile(&kw, Some(&external(Department::General, f64::NAN)), &AgreementPolicy::default());
        assert_eq!(nan.confidence, 0.8);

        let high = reconcile(&kw, Some(&external(Department::General, 1.7)), &AgreementPolicy::default());
        assert_eq!(high.confidence, 0.99);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let kw = keyword(Department::RoadService, 2);
        let ext = external(Department::WaterManagement, 0.9);
        let policy = AgreementPolicy {
            strong_keyword_threshold: 2,
            ..AgreementPolicy::default()
        };
        assert_eq!(reconcile(&kw, Some(&ext), &policy).department, Department::RoadService);
        assert_eq!(
            reconcile(&kw, Some(&ext), &AgreementPolicy::default()).department,
            Department::WaterManagement
        );
    }
}
