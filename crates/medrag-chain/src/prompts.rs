//! Prompt templates for Cypher generation and answer generation.
//!
//! A template is plain text with `{slot}` placeholders. The declared input
//! variables must match the placeholders exactly; `{{` and `}}` render as
//! literal braces.

use std::collections::BTreeSet;

use crate::error::{ChainError, Result};

/// Query-generation prompt. Slots: `schema`, `question`.
pub const CYPHER_GENERATION_TEMPLATE: &str = r#"
Generate a Cypher query to answer the question using the medical knowledge graph.

STRICT RULES:
- Always use relationships exactly as: has_symptom, treated_with, caused_by (lowercase!)
- Use labels: Disease, Symptom, Treatment, Cause.
- Do NOT uppercase relationship types.
- Return only the Cypher statement, without explanations.

Schema:
{schema}

Question:
{question}
"#;

/// Answer-generation prompt. Slots: `context`, `question`.
pub const QA_GENERATION_TEMPLATE: &str = r#"
You are an assistant that rewrites graph query results into a clear medical explanation.

Query Results:
{context}

Question:
{question}

Final Answer:
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(String),
}

/// A text template with named slots.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    input_variables: Vec<String>,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Create a template, checking that its placeholders are exactly `input_variables`.
    pub fn new<I, S>(template: impl Into<String>, input_variables: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let template = template.into();
        let input_variables: Vec<String> = input_variables.into_iter().map(Into::into).collect();
        let segments = parse_segments(&template)?;

        let declared: BTreeSet<&str> = input_variables.iter().map(String::as_str).collect();
        let found: BTreeSet<&str> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Slot(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect();

        if declared != found {
            let missing: Vec<_> = declared.difference(&found).copied().collect();
            let undeclared: Vec<_> = found.difference(&declared).copied().collect();
            return Err(ChainError::Prompt(format!(
                "template slots do not match input variables (declared but unused: {:?}, used but undeclared: {:?})",
                missing, undeclared
            )));
        }

        Ok(Self {
            template,
            input_variables,
            segments,
        })
    }

    /// Declared slot names.
    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    /// Render the template. Every declared slot must be supplied.
    pub fn format(&self, values: &[(&str, &str)]) -> Result<String> {
        let lookup = |name: &str| {
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| *value)
        };

        for var in &self.input_variables {
            if lookup(var).is_none() {
                return Err(ChainError::Prompt(format!(
                    "missing value for slot '{}'",
                    var
                )));
            }
        }

        let mut out = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(name) => out.push_str(lookup(name).unwrap_or_default()),
            }
        }
        Ok(out)
    }
}

fn parse_segments(template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(ChainError::Prompt(format!(
                                "unterminated slot '{{{}'",
                                name
                            )));
                        }
                    }
                }
                if !is_identifier(&name) {
                    return Err(ChainError::Prompt(format!("invalid slot name '{}'", name)));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Slot(name));
            }
            '}' => {
                return Err(ChainError::Prompt(
                    "unmatched '}' in template (use '}}' for a literal brace)".to_string(),
                ));
            }
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The query-generation template.
pub fn cypher_generation_prompt() -> Result<PromptTemplate> {
    PromptTemplate::new(CYPHER_GENERATION_TEMPLATE, ["schema", "question"])
}

/// The answer-generation template.
pub fn qa_generation_prompt() -> Result<PromptTemplate> {
    PromptTemplate::new(QA_GENERATION_TEMPLATE, ["context", "question"])
}
