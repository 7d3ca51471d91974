// Text Processing Service
// Normalizes report text before keyword matching

use regex::Regex;
use std::sync::OnceLock;

fn whitespace_re() -> &'static Regex {
    static WS_RE: OnceLock<Regex> = OnceLock::new();
    WS_RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

/// Normalize punctuation and whitespace in free text
pub fn normalize_punctuation(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    // Replace smart quotes and dashes
    let s = text
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{2013}', '\u{2014}'], "-")
        .replace(['\u{3000}', '\u{00A0}'], " ");

    whitespace_re().replace_all(&s, " ").trim().to_string()
}

/// Build the lowercase text the keyword rules are matched against
pub fn normalize_report_text(title: &str, description: &str) -> String {
    normalize_punctuation(&format!("{} {}", title, description)).to_lowercase()
}

/// Build the lowercase text for a list of image labels
pub fn normalize_labels(labels: &[String]) -> String {
    let joined = labels
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" | ");
    normalize_punctuation(&joined).to_lowercase()
}

/// Char-bounded preview for log lines
pub fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}
