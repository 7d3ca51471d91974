use anyhow::{Context, Result};
use civic_triage::init_logging;
use civic_triage::models::ClassificationRequest;
use civic_triage::services::classification::Classifier;
use civic_triage::services::config_store::ConfigStore;
use serde::Serialize;
use std::path::PathBuf;

const USAGE: &str = "Usage:\n  classify_report --title <text> --description <text> [--label <text>]... [--config-dir <dir>] [--offline] [--out <json_path>]\n\nNotes:\n  - `--label` may be repeated, one per image label.\n  - `--offline` skips image-label and LLM providers and uses keyword rules only.\n  - Logs go to stderr and CIVIC_TRIAGE_LOG_DIR; the result goes to stdout or --out.";

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn parse_arg_values(args: &[String], key: &str) -> Vec<String> {
    args.iter()
        .zip(args.iter().skip(1))
        .filter(|(k, _)| *k == key)
        .map(|(_, v)| v.clone())
        .collect()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

/// Missing or blank text is passed on; it classifies as general / medium
fn build_request(args: &[String]) -> ClassificationRequest {
    let title = parse_arg_value(args, "--title").unwrap_or_default();
    let description = parse_arg_value(args, "--description").unwrap_or_default();
    ClassificationRequest::new(title, description)
        .with_image_labels(parse_arg_values(args, "--label"))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Output<'a> {
    #[serde(flatten)]
    result: &'a civic_triage::ClassificationResult,
    partition: &'static str,
    ai_metadata: civic_triage::models::AiMetadata,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || has_flag(&args, "--help") {
        eprintln!("{}", USAGE);
        return Ok(());
    }

    let request = build_request(&args);
    let offline = has_flag(&args, "--offline");
    let out_path = parse_arg_value(&args, "--out");

    init_logging();

    let config_dir = parse_arg_value(&args, "--config-dir")
        .map(PathBuf::from)
        .or_else(ConfigStore::default_config_dir)
        .context("no config directory available")?;
    let store = ConfigStore::new(config_dir);
    let mut config = store
        .load()
        .with_context(|| format!("loading {}", store.config_file().display()))?;
    if offline {
        config.classification.use_image_labels = false;
        config.classification.use_llm = false;
    }

    let classifier = Classifier::from_config(&config)?;
    let result = classifier.classify(&request).await;

    let output = Output {
        result: &result,
        partition: result.department.partition(),
        ai_metadata: result.ai_metadata(),
    };
    let json = serde_json::to_string_pretty(&output)?;

    match out_path {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("writing {}", path))?;
            eprintln!("Wrote {}", path);
        }
        None => println!("{}", json),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_triage::{Classifier, Department, Priority};

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_repeated_labels_are_collected() {
        let request = build_request(&args(&[
            "classify_report", "--title", "Leak", "--label", "burst pipe", "--label", "flood",
        ]));
        assert_eq!(request.title, "Leak");
        assert_eq!(request.description, "");
        assert_eq!(request.image_labels, vec!["burst pipe", "flood"]);
    }

    #[test]
    fn test_empty_text_classifies_as_general() {
        let request = build_request(&args(&["classify_report", "--title", "", "--offline"]));
        let result = Classifier::default().classify_offline(&request.title, &request.description);
        assert_eq!(result.department, Department::General);
        assert_eq!(result.priority, Priority::Medium);
        assert_eq!(result.confidence, 0.5);
    }
}
