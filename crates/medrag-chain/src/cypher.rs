//! Extraction of Cypher statements from model output.

use std::sync::OnceLock;

use regex::Regex;

fn fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)```[ \t]*(?:[A-Za-z]+[ \t]*\n)?\n?(.*?)```").expect("valid fence regex")
    })
}

/// Pull the Cypher statement out of a model reply.
///
/// Models often wrap the query in a fenced code block, sometimes with prose
/// around it. When a fence is present its body is returned; otherwise the
/// whole reply, trimmed.
pub fn extract_cypher(text: &str) -> String {
    match fence_pattern().captures(text) {
        Some(caps) => caps
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
        None => text.trim().to_string(),
    }
}
