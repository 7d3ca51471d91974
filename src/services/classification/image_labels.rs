// Image Label Classifier
// Offline external opinion built from labels a vision step attached to the
// report's images. Labels are scored against the image dataset categories.

use async_trait::async_trait;
use tracing::debug;

use crate::models::{ClassificationRequest, Department, ExternalResult, KeywordResult, Priority};
use crate::services::text_processor::normalize_labels;

use super::external::{ExternalClassifier, ExternalUnavailable};

const KEYWORD_WEIGHT: u32 = 10;
const CATEGORY_NAME_WEIGHT: u32 = 15;
const MIN_SCORE: u32 = 5;

struct LabelCategory {
    name: &'static str,
    department: Department,
    priority: Priority,
    keywords: &'static [&'static str],
}

const LABEL_CATEGORIES: &[LabelCategory] = &[
    LabelCategory {
        name: "Pothole Issues",
        department: Department::RoadService,
        priority: Priority::High,
        keywords: &["pothole", "hole", "road damage", "crater", "depression"],
    },
    LabelCategory {
        name: "Damaged Road issues",
        department: Department::RoadService,
        priority: Priority::High,
        keywords: &["damaged road", "cracked", "broken pavement", "road surface"],
    },
    LabelCategory {
        name: "Illegal Parking Issues",
        department: Department::RoadService,
        priority: Priority::Medium,
        keywords: &["illegal parking", "wrong parking", "parking violation", "blocked"],
    },
    LabelCategory {
        name: "Broken Road Sign Issues",
        department: Department::RoadService,
        priority: Priority::Medium,
        keywords: &["broken sign", "damaged sign", "signboard", "road sign"],
    },
    LabelCategory {
        name: "Mixed Issues",
        department: Department::RoadService,
        priority: Priority::Medium,
        keywords: &["road", "infrastructure", "mixed"],
    },
    LabelCategory {
        name: "Littering Garbage on Public Places Issues",
        department: Department::General,
        priority: Priority::High,
        keywords: &["garbage", "litter", "trash", "waste", "dumping", "dirty"],
    },
    LabelCategory {
        name: "Vandalism Issues",
        department: Department::General,
        priority: Priority::Medium,
        keywords: &["vandalism", "graffiti", "damage", "defacement", "destruction"],
    },
    LabelCategory {
        name: "Water Leak Issues",
        department: Department::WaterManagement,
        priority: Priority::High,
        keywords: &["burst pipe", "leak", "flood", "waterlogging", "sewage", "drain"],
    },
    LabelCategory {
        name: "Streetlight Issues",
        department: Department::ElectricalService,
        priority: Priority::Medium,
        keywords: &["streetlight", "street light", "lamp post", "light pole"],
    },
    LabelCategory {
        name: "Exposed Wire Issues",
        department: Department::ElectricalService,
        priority: Priority::High,
        keywords: &["exposed wire", "hanging wire", "sparking", "transformer"],
    },
    LabelCategory {
        name: "Fire Accident Issues",
        department: Department::HospitalEmergency,
        priority: Priority::High,
        keywords: &["fire", "smoke", "accident", "crash", "injured", "ambulance"],
    },
];

fn label_confidence(score: u32) -> f64 {
    match score {
        s if s >= 25 => 0.95,
        s if s >= 20 => 0.90,
        s if s >= 15 => 0.85,
        s if s >= 10 => 0.75,
        _ => 0.60,
    }
}

fn score_category(category: &LabelCategory, text: &str) -> (u32, Vec<&'static str>) {
    let matched: Vec<&'static str> = category
        .keywords
        .iter()
        .copied()
        .filter(|kw| text.contains(kw))
        .collect();

    let mut score = matched.len() as u32 * KEYWORD_WEIGHT;
    let short_name = category.name.to_lowercase().replace(" issues", "");
    if text.contains(short_name.as_str()) {
        score += CATEGORY_NAME_WEIGHT;
    }
    (score, matched)
}

/// Classify image labels against the dataset categories
pub fn classify_labels(labels: &[String]) -> Result<ExternalResult, ExternalUnavailable> {
    let text = normalize_labels(labels);
    if text.is_empty() {
        return Err(ExternalUnavailable::NoSignal);
    }

    let mut best: Option<(&LabelCategory, u32, Vec<&'static str>)> = None;
    for category in LABEL_CATEGORIES {
        let (score, matched) = score_category(category, &text);
        let better = best.as_ref().map_or(true, |(_, top, _)| score > *top);
        if better {
            best = Some((category, score, matched));
        }
    }

    let (category, score, matched) = match best {
        Some(found) if found.1 >= MIN_SCORE => found,
        _ => return Err(ExternalUnavailable::NoSignal),
    };

    debug!(category = category.name, score, "image_labels.best_category");

    Ok(ExternalResult {
        source: ImageLabelClassifier::NAME.to_string(),
        department: category.department,
        confidence: label_confidence(score),
        priority: Some(category.priority),
        reasoning: format!(
            "Image labels matched {} ({})",
            category.name,
            if matched.is_empty() { "category name".to_string() } else { matched.join(", ") }
        ),
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageLabelClassifier;

impl ImageLabelClassifier {
    pub const NAME: &'static str = "image_labels";
}

#[async_trait]
impl ExternalClassifier for ImageLabelClassifier {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn classify(
        &self,
        request: &ClassificationRequest,
        _baseline: &KeywordResult,
    ) -> Result<ExternalResult, ExternalUnavailable> {
        classify_labels(&request.image_labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_dataset_category_label() {
        let result = classify_labels(&labels(&["Pothole Issues"])).unwrap();
        assert_eq!(result.department, Department::RoadService);
        assert_eq!(result.priority, Some(Priority::High));
        assert_eq!(result.confidence, 0.95);
        assert_eq!(result.source, "image_labels");
    }

    #[test]
    fn test_free_form_labels() {
        let result = classify_labels(&labels(&["Street Light", "night"])).unwrap();
        assert_eq!(result.department, Department::ElectricalService);
        assert_eq!(result.confidence, 0.75);

        let result = classify_labels(&labels(&["garbage", "trash bag"])).unwrap();
        assert_eq!(result.department, Department::General);
        assert_eq!(result.confidence, 0.90);
    }

    #[test]
    fn test_no_labels_or_unknown_labels_have_no_signal() {
        assert_eq!(classify_labels(&[]), Err(ExternalUnavailable::NoSignal));
        assert_eq!(
            classify_labels(&labels(&["tree", "sky"])),
            Err(ExternalUnavailable::NoSignal)
        );
    }

    #[tokio::test]
    async fn test_trait_uses_request_labels() {
        let request = ClassificationRequest::new("t", "d").with_image_labels(["burst pipe"]);
        let result = ImageLabelClassifier
            .classify(&request, &KeywordResult::fallback())
            .await
            .unwrap();
        assert_eq!(result.department, Department::WaterManagement);
    }
}
