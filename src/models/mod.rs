// Civic Triage Data Models
// Departments, priorities and the classification request/result types

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

// ============ Department ============

/// Civic service a report is routed to.
///
/// Variant order is the enumeration order used for tie-breaking.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    RoadService,
    WaterManagement,
    ElectricalService,
    HospitalEmergency,
    General,
}

impl Department {
    pub const ALL: [Department; 5] = [
        Department::RoadService,
        Department::WaterManagement,
        Department::ElectricalService,
        Department::HospitalEmergency,
        Department::General,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Department::RoadService => "road_service",
            Department::WaterManagement => "water_management",
            Department::ElectricalService => "electrical_service",
            Department::HospitalEmergency => "hospital_emergency",
            Department::General => "general",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Department::RoadService => "Road Service Department",
            Department::WaterManagement => "Water Management Department",
            Department::ElectricalService => "Electrical Service Department",
            Department::HospitalEmergency => "Hospital Emergency Department",
            Department::General => "General Department",
        }
    }

    /// Name of the report collection this department's reports land in.
    pub fn partition(self) -> &'static str {
        match self {
            Department::RoadService => "roadservicereports",
            Department::WaterManagement => "watermanagementreports",
            Department::ElectricalService => "electricalservicereports",
            Department::HospitalEmergency => "hospitalemergencyreports",
            Department::General => "generalreports",
        }
    }

    /// Map a free-form department name (as returned by a provider) onto a department.
    ///
    /// Accepts keys (`road_service`), display labels, labels without the
    /// "Department" suffix and the category names of the older visual analyzer.
    pub fn from_label(val: &str) -> Option<Self> {
        let normalized = normalize_label(val);
        let name = normalized
            .strip_suffix(" department")
            .unwrap_or(normalized.as_str())
            .trim();

        match name {
            "road service" | "road services" | "road" | "roads" | "roads infrastructure"
            | "traffic management" => Some(Department::RoadService),
            "water management" | "water" | "water supply" | "drainage sewage" => {
                Some(Department::WaterManagement)
            }
            "electrical service" | "electrical services" | "electrical" | "electricity"
            | "street lighting electricity" => Some(Department::ElectricalService),
            "hospital emergency" | "hospital" | "emergency" | "medical emergency" => {
                Some(Department::HospitalEmergency)
            }
            "general" | "other" | "other civic issue" | "sanitation waste"
            | "public property damage" | "environment parks" | "animal control"
            | "construction public safety" => Some(Department::General),
            _ => None,
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

fn normalize_label(val: &str) -> String {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    let re = NON_WORD.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("valid label regex"));
    let lower = val.trim().to_lowercase().replace('&', " ");
    re.replace_all(&lower, " ").trim().to_string()
}

// ============ Priority ============

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Scan order of the priority keyword tables.
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn from_label(val: &str) -> Option<Self> {
        match val.trim().to_lowercase().as_str() {
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============ Classification Request ============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRequest {
    pub title: String,
    pub description: String,
    /// Labels already extracted from the report's images by a vision step.
    #[serde(default)]
    pub image_labels: Vec<String>,
}

impl ClassificationRequest {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            image_labels: Vec::new(),
        }
    }

    pub fn with_image_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.image_labels = labels.into_iter().map(Into::into).collect();
        self
    }
}

// ============ Source Results ============

/// Output of the keyword-scoring core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordResult {
    pub department: Department,
    pub priority: Priority,
    /// Whether any priority keyword of the winning rule fired.
    pub priority_detected: bool,
    /// Total score of the winning rule (keyword hits plus priority bonuses).
    pub match_count: u32,
    /// Distinct category keywords of the winning rule found in the text.
    pub keyword_hits: u32,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
    pub confidence: f64,
    pub reasoning: String,
}

impl KeywordResult {
    /// Baseline used when nothing in the text matched any rule.
    pub fn fallback() -> Self {
        Self {
            department: Department::General,
            priority: Priority::Medium,
            priority_detected: false,
            match_count: 0,
            keyword_hits: 0,
            matched_keywords: Vec::new(),
            confidence: 0.5,
            reasoning: "Rule-based classification: 0 keyword matches found".to_string(),
        }
    }
}

/// Opinion of an optional higher-order classifier (LLM or image model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalResult {
    pub source: String,
    pub department: Department,
    pub confidence: f64,
    #[serde(default)]
    pub priority: Option<Priority>,
    pub reasoning: String,
}

// ============ Classification Result ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleBasedMatch {
    pub department: Department,
    pub matches: u32,
    pub agreed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSummary {
    pub source: String,
    pub department: Department,
    pub confidence: f64,
    pub agreed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    /// Display label of the department.
    pub category: String,
    pub department: Department,
    pub priority: Priority,
    pub confidence: f64,
    pub reasoning: String,
    pub rule_based_match: RuleBasedMatch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<ExternalSummary>,
}

impl ClassificationResult {
    /// Projection stored with the report as its immutable `ai_metadata`.
    pub fn ai_metadata(&self) -> AiMetadata {
        AiMetadata {
            suggested_category: self.category.clone(),
            suggested_priority: self.priority,
            confidence: self.confidence,
            reasoning: self.reasoning.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiMetadata {
    pub suggested_category: String,
    pub suggested_priority: Priority,
    pub confidence: f64,
    pub reasoning: String,
}
