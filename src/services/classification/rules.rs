// Category Rules
// Immutable keyword tables, one rule per department, loaded once and shared

use crate::models::{Department, Priority};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuleSetError {
    #[error("failed to read rules file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse rules: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no rule for department {0}")]
    MissingDepartment(Department),
    #[error("more than one rule for department {0}")]
    DuplicateDepartment(Department),
    #[error("the general rule must not have keywords")]
    GeneralHasKeywords,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriorityKeywords {
    #[serde(default)]
    pub high: Vec<String>,
    #[serde(default)]
    pub medium: Vec<String>,
    #[serde(default)]
    pub low: Vec<String>,
}

impl PriorityKeywords {
    pub fn for_level(&self, priority: Priority) -> &[String] {
        match priority {
            Priority::High => &self.high,
            Priority::Medium => &self.medium,
            Priority::Low => &self.low,
        }
    }

    fn normalized(self) -> Self {
        Self {
            high: normalize_keywords(self.high),
            medium: normalize_keywords(self.medium),
            low: normalize_keywords(self.low),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRule {
    pub department: Department,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub priority_keywords: PriorityKeywords,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    version: String,
    rules: Vec<CategoryRule>,
}

/// Validated rule table, ordered by `Department::ALL`.
#[derive(Debug, Clone)]
pub struct RuleSet {
    version: String,
    rules: Vec<CategoryRule>,
}

static BUILTIN: OnceLock<Arc<RuleSet>> = OnceLock::new();

impl RuleSet {
    pub fn new(version: impl Into<String>, rules: Vec<CategoryRule>) -> Result<Self, RuleSetError> {
        let mut slots: Vec<Option<CategoryRule>> = vec![None; Department::ALL.len()];

        for rule in rules {
            let slot = &mut slots[rule.department as usize];
            if slot.is_some() {
                return Err(RuleSetError::DuplicateDepartment(rule.department));
            }
            *slot = Some(CategoryRule {
                department: rule.department,
                keywords: normalize_keywords(rule.keywords),
                priority_keywords: rule.priority_keywords.normalized(),
            });
        }

        let mut ordered = Vec::with_capacity(slots.len());
        for (dept, slot) in Department::ALL.into_iter().zip(slots) {
            let rule = slot.ok_or(RuleSetError::MissingDepartment(dept))?;
            if dept == Department::General && !rule.keywords.is_empty() {
                return Err(RuleSetError::GeneralHasKeywords);
            }
            ordered.push(rule);
        }

        Ok(Self {
            version: version.into(),
            rules: ordered,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, RuleSetError> {
        let parsed: RuleFile = serde_json::from_str(raw)?;
        Self::new(parsed.version, parsed.rules)
    }

    pub fn load(path: &Path) -> Result<Self, RuleSetError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// The keyword tables shipped with the crate
    pub fn builtin() -> Arc<RuleSet> {
        BUILTIN
            .get_or_init(|| {
                let raw = include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/data/category_rules.json"
                ));
                Arc::new(RuleSet::from_json(raw).expect("category_rules.json parse failed"))
            })
            .clone()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn rule(&self, department: Department) -> &CategoryRule {
        &self.rules[department as usize]
    }
}

/// Lowercase, trim and deduplicate keywords (first occurrence wins)
fn normalize_keywords(keywords: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    keywords
        .into_iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(department: Department, keywords: &[&str]) -> CategoryRule {
        CategoryRule {
            department,
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            priority_keywords: PriorityKeywords::default(),
        }
    }

    fn full_set(general_keywords: &[&str]) -> Vec<CategoryRule> {
        vec![
            rule(Department::General, general_keywords),
            rule(Department::HospitalEmergency, &["hospital"]),
            rule(Department::ElectricalService, &["light"]),
            rule(Department::WaterManagement, &["water"]),
            rule(Department::RoadService, &["road"]),
        ]
    }

    #[test]
    fn test_builtin_rules_are_valid() {
        let rules = RuleSet::builtin();
        assert_eq!(rules.rules().len(), 5);
        assert_eq!(rules.version(), "rules-v1");
        assert!(rules.rule(Department::General).keywords.is_empty());
        assert!(rules
            .rule(Department::RoadService)
            .keywords
            .contains(&"pothole".to_string()));
    }

    #[test]
    fn test_rules_are_stored_in_enumeration_order() {
        let set = RuleSet::new("test", full_set(&[])).unwrap();
        let order: Vec<Department> = set.rules().iter().map(|r| r.department).collect();
        assert_eq!(order, Department::ALL.to_vec());
    }

    #[test]
    fn test_keywords_are_lowercased_and_deduplicated() {
        let mut rules = full_set(&[]);
        rules[4] = rule(Department::RoadService, &["Pothole", " pothole ", "ROAD", ""]);
        let set = RuleSet::new("test", rules).unwrap();
        assert_eq!(set.rule(Department::RoadService).keywords, vec!["pothole", "road"]);
    }

    #[test]
    fn test_missing_department_is_rejected() {
        let mut rules = full_set(&[]);
        rules.remove(2);
        let err = RuleSet::new("test", rules).unwrap_err();
        assert!(matches!(err, RuleSetError::MissingDepartment(Department::ElectricalService)));
    }

    #[test]
    fn test_duplicate_department_is_rejected() {
        let mut rules = full_set(&[]);
        rules.push(rule(Department::WaterManagement, &["pipe"]));
        let err = RuleSet::new("test", rules).unwrap_err();
        assert!(matches!(err, RuleSetError::DuplicateDepartment(Department::WaterManagement)));
    }

    #[test]
    fn test_general_with_keywords_is_rejected() {
        let err = RuleSet::new("test", full_set(&["misc"])).unwrap_err();
        assert!(matches!(err, RuleSetError::GeneralHasKeywords));
    }

    #[test]
    fn test_from_json_reports_parse_errors() {
        assert!(matches!(RuleSet::from_json("{"), Err(RuleSetError::Parse(_))));
    }
}
