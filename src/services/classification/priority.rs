// Priority Detection
// Severity keywords per department; precedence decides between levels.

use crate::models::Priority;
use super::rules::CategoryRule;

/// How a priority is picked when keywords of several levels match.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum PriorityPrecedence {
    /// high > medium > low
    #[default]
    Severity,
    /// Last level scanned (high, medium, low) with any hit wins.
    LastMatch,
}

impl PriorityPrecedence {
    pub fn from_str(val: &str) -> Self {
        match val.trim().to_lowercase().as_str() {
            "last_match" | "last-match" | "lastmatch" | "legacy" => Self::LastMatch,
            _ => Self::Severity,
        }
    }
}

/// Priority keywords of one rule found in a text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorityDetection {
    pub high: Vec<String>,
    pub medium: Vec<String>,
    pub low: Vec<String>,
}

impl PriorityDetection {
    pub fn hits(&self, level: Priority) -> &[String] {
        match level {
            Priority::High => &self.high,
            Priority::Medium => &self.medium,
            Priority::Low => &self.low,
        }
    }

    /// Number of distinct priority keywords matched across all levels
    pub fn match_count(&self) -> u32 {
        (self.high.len() + self.medium.len() + self.low.len()) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.match_count() == 0
    }

    pub fn resolve(&self, precedence: PriorityPrecedence) -> Option<Priority> {
        let mut levels = Priority::ALL
            .into_iter()
            .filter(|level| !self.hits(*level).is_empty());
        match precedence {
            PriorityPrecedence::Severity => levels.next(),
            PriorityPrecedence::LastMatch => levels.last(),
        }
    }
}

/// Scan a rule's priority keywords against already-normalized text
pub fn detect_priority(rule: &CategoryRule, text: &str) -> PriorityDetection {
    let scan = |level: Priority| -> Vec<String> {
        rule.priority_keywords
            .for_level(level)
            .iter()
            .filter(|kw| text.contains(kw.as_str()))
            .cloned()
            .collect()
    };

    PriorityDetection {
        high: scan(Priority::High),
        medium: scan(Priority::Medium),
        low: scan(Priority::Low),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Department;
    use crate::services::classification::rules::RuleSet;

    #[test]
    fn test_severity_prefers_high_over_lower_levels() {
        let rules = RuleSet::builtin();
        let rule = rules.rule(Department::RoadService);
        let detection = detect_priority(rule, "small crack next to a large pothole");
        assert_eq!(detection.high, vec!["large pothole"]);
        assert!(!detection.low.is_empty());
        assert_eq!(detection.resolve(PriorityPrecedence::Severity), Some(Priority::High));
        assert_eq!(detection.resolve(PriorityPrecedence::LastMatch), Some(Priority::Low));
    }

    #[test]
    fn test_no_hits_resolves_to_none() {
        let rules = RuleSet::builtin();
        let detection = detect_priority(rules.rule(Department::ElectricalService), "the bench is wobbly");
        assert!(detection.is_empty());
        assert_eq!(detection.resolve(PriorityPrecedence::Severity), None);
        assert_eq!(detection.resolve(PriorityPrecedence::LastMatch), None);
    }

    #[test]
    fn test_severity_words_without_category_words() {
        let rules = RuleSet::builtin();
        let detection = detect_priority(rules.rule(Department::WaterManagement), "the main has burst");
        assert_eq!(detection.resolve(PriorityPrecedence::Severity), Some(Priority::High));
        assert_eq!(detection.match_count(), 1);
    }

    #[test]
    fn test_precedence_from_str() {
        assert_eq!(PriorityPrecedence::from_str("severity"), PriorityPrecedence::Severity);
        assert_eq!(PriorityPrecedence::from_str("Last_Match"), PriorityPrecedence::LastMatch);
        assert_eq!(PriorityPrecedence::from_str("anything"), PriorityPrecedence::Severity);
    }
}
