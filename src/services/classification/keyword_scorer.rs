// Keyword Scoring
// Deterministic, offline baseline: distinct substring hits per department plus
// a +2 bonus for every priority keyword of a rule that already matched.

use crate::models::{Department, KeywordResult, Priority};
use crate::services::text_processor::normalize_report_text;
use tracing::debug;

use super::priority::{detect_priority, PriorityDetection, PriorityPrecedence};
use super::rules::{CategoryRule, RuleSet};

const PRIORITY_BONUS: u32 = 2;
const BASE_CONFIDENCE: f64 = 0.6;
const CONFIDENCE_PER_MATCH: f64 = 0.1;
const MAX_KEYWORD_CONFIDENCE: f64 = 0.95;
const NO_MATCH_CONFIDENCE: f64 = 0.5;

/// Score of one rule against a report text
#[derive(Debug, Clone, PartialEq)]
pub struct RuleScore {
    pub department: Department,
    pub matched_keywords: Vec<String>,
    pub priority: PriorityDetection,
}

impl RuleScore {
    pub fn keyword_hits(&self) -> u32 {
        self.matched_keywords.len() as u32
    }

    pub fn total(&self) -> u32 {
        self.keyword_hits() + PRIORITY_BONUS * self.priority.match_count()
    }
}

pub fn score_rule(rule: &CategoryRule, text: &str) -> RuleScore {
    let matched_keywords: Vec<String> = rule
        .keywords
        .iter()
        .filter(|kw| text.contains(kw.as_str()))
        .cloned()
        .collect();

    // Priority keywords only count for rules with at least one category hit
    let priority = if matched_keywords.is_empty() {
        PriorityDetection::default()
    } else {
        detect_priority(rule, text)
    };

    RuleScore {
        department: rule.department,
        matched_keywords,
        priority,
    }
}

/// Score every rule, in enumeration order
pub fn score_all(rules: &RuleSet, text: &str) -> Vec<RuleScore> {
    rules.rules().iter().map(|rule| score_rule(rule, text)).collect()
}

pub fn keyword_confidence(match_count: u32) -> f64 {
    if match_count == 0 {
        NO_MATCH_CONFIDENCE
    } else {
        (BASE_CONFIDENCE + CONFIDENCE_PER_MATCH * match_count as f64).min(MAX_KEYWORD_CONFIDENCE)
    }
}

/// Classify title + description with the keyword tables alone
pub fn classify_by_keywords(
    rules: &RuleSet,
    title: &str,
    description: &str,
    precedence: PriorityPrecedence,
) -> KeywordResult {
    let text = normalize_report_text(title, description);
    if text.is_empty() {
        return KeywordResult::fallback();
    }

    let scores = score_all(rules, &text);

    // Strict comparison: the first rule reaching the maximum keeps it
    let mut best: Option<&RuleScore> = None;
    let mut max_score = 0;
    for score in &scores {
        debug!(
            department = %score.department,
            keyword_hits = score.keyword_hits(),
            priority_hits = score.priority.match_count(),
            total = score.total(),
            "keyword.rule_score"
        );
        if score.total() > max_score {
            max_score = score.total();
            best = Some(score);
        }
    }

    let Some(best) = best else {
        return KeywordResult::fallback();
    };

    let detected = best.priority.resolve(precedence);

    KeywordResult {
        department: best.department,
        priority: detected.unwrap_or(Priority::Medium),
        priority_detected: detected.is_some(),
        match_count: max_score,
        keyword_hits: best.keyword_hits(),
        matched_keywords: best.matched_keywords.clone(),
        confidence: keyword_confidence(max_score),
        reasoning: format!("Rule-based classification: {} keyword matches found", max_score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classification::rules::PriorityKeywords;

    fn classify(title: &str, description: &str) -> KeywordResult {
        classify_by_keywords(&RuleSet::builtin(), title, description, PriorityPrecedence::Severity)
    }

    fn simple_rules(road: &[&str], water: &[&str]) -> RuleSet {
        let rule = |department, keywords: &[&str]| CategoryRule {
            department,
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            priority_keywords: PriorityKeywords::default(),
        };
        RuleSet::new(
            "test",
            vec![
                rule(Department::RoadService, road),
                rule(Department::WaterManagement, water),
                rule(Department::ElectricalService, &[]),
                rule(Department::HospitalEmergency, &[]),
                rule(Department::General, &[]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_pothole_report_routes_to_roads_with_high_priority() {
        let result = classify("Large pothole on Main Street", "dangerous pothole causing accidents");
        assert_eq!(result.department, Department::RoadService);
        assert_eq!(result.priority, Priority::High);
        assert!(result.priority_detected);
        assert!(result.matched_keywords.contains(&"pothole".to_string()));
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn test_streetlight_report_defaults_to_medium() {
        let result = classify("Streetlight out", "bulb not working, area is dark");
        assert_eq!(result.department, Department::ElectricalService);
        assert_eq!(result.priority, Priority::Medium);
    }

    #[test]
    fn test_empty_input_falls_back_to_general() {
        let result = classify("", "");
        assert_eq!(result.department, Department::General);
        assert_eq!(result.priority, Priority::Medium);
        assert_eq!(result.confidence, 0.5);
        assert_eq!(result.match_count, 0);
    }

    #[test]
    fn test_no_keyword_matches_falls_back_to_general() {
        let result = classify("Bench", "the bench in the square is wobbly");
        assert_eq!(result.department, Department::General);
        assert_eq!(result.priority, Priority::Medium);
        assert!(!result.priority_detected);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_ties_go_to_the_earlier_department() {
        let rules = simple_rules(&["flooded"], &["flooded"]);
        let result = classify_by_keywords(&rules, "flooded", "", PriorityPrecedence::Severity);
        assert_eq!(result.department, Department::RoadService);
        assert_eq!(result.match_count, 1);
    }

    #[test]
    fn test_repeated_keyword_counts_once() {
        let rules = simple_rules(&["pothole"], &[]);
        let once = classify_by_keywords(&rules, "pothole", "", PriorityPrecedence::Severity);
        let twice = classify_by_keywords(&rules, "pothole", "another pothole", PriorityPrecedence::Severity);
        assert_eq!(once.match_count, 1);
        assert_eq!(twice.match_count, once.match_count);
        assert_eq!(twice.department, once.department);
    }

    #[test]
    fn test_priority_bonus_only_applies_to_matched_rules() {
        let rules = RuleSet::builtin();
        let text = normalize_report_text("", "burst");
        let water = score_rule(rules.rule(Department::WaterManagement), &text);
        assert_eq!(water.keyword_hits(), 0);
        assert_eq!(water.total(), 0);

        let text = normalize_report_text("", "burst pipe");
        let water = score_rule(rules.rule(Department::WaterManagement), &text);
        assert_eq!(water.keyword_hits(), 2);
        assert_eq!(water.total(), 2 + 2);
    }

    #[test]
    fn test_priority_bonus_counts_once_per_priority_keyword() {
        let rules = RuleSet::builtin();
        let text = normalize_report_text("Large pothole on Main Street", "dangerous pothole causing accidents");

        let road = score_rule(rules.rule(Department::RoadService), &text);
        assert_eq!(road.keyword_hits(), 2);
        assert_eq!(road.priority.match_count(), 4);
        assert_eq!(road.total(), 10);

        // Four category hits do not multiply the two priority hits
        let hospital = score_rule(rules.rule(Department::HospitalEmergency), &text);
        assert_eq!(hospital.keyword_hits(), 4);
        assert_eq!(hospital.priority.match_count(), 2);
        assert_eq!(hospital.total(), 8);
    }

    #[test]
    fn test_confidence_curve() {
        assert_eq!(keyword_confidence(0), 0.5);
        assert!((keyword_confidence(1) - 0.7).abs() < 1e-9);
        assert!((keyword_confidence(3) - 0.9).abs() < 1e-9);
        assert_eq!(keyword_confidence(12), 0.95);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let a = classify("Water leak", "pipe leaking near the school");
        let b = classify("Water leak", "pipe leaking near the school");
        assert_eq!(a, b);
    }

    #[test]
    fn test_last_match_precedence_keeps_legacy_behaviour() {
        let rules = RuleSet::builtin();
        let severity = classify_by_keywords(
            &rules,
            "Road crack",
            "large pothole and a small crack",
            PriorityPrecedence::Severity,
        );
        let legacy = classify_by_keywords(
            &rules,
            "Road crack",
            "large pothole and a small crack",
            PriorityPrecedence::LastMatch,
        );
        assert_eq!(severity.priority, Priority::High);
        assert_eq!(legacy.priority, Priority::Low);
        assert_eq!(severity.department, legacy.department);
    }
}
