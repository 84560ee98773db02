//! Chain setup and the two question entry points.
//!
//! [`ask_graphrag`] never fails: every problem becomes an [`AskOutcome`].
//! [`ask_graphrag_with_path`] propagates chain errors and additionally
//! returns a synthesized graph path built from the raw query rows.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::SharedBackend;
use crate::chain::{
    ChainOptions, GraphCypherQaChain, QaChain, RAW_QUERY_RESULT_KEY, RESULT_KEY, query_input,
};
use crate::error::Result;
use crate::graph::SharedGraphStore;
use crate::path::{GraphPathEntry, is_empty_value, lookup_first, synthesize_path};
use crate::prompts::{cypher_generation_prompt, qa_generation_prompt};

/// Shown when the graph holds nothing relevant to the question.
pub const NO_DATA_MESSAGE: &str = "⚠️ No data found in the graph for this question.";

/// Shown by the path invoker when the chain returned no answer text.
pub const NO_ANSWER_MESSAGE: &str = "⚠️ No answer generated.";

/// Build the graph QA chain with the standard prompts.
///
/// Dangerous requests are acknowledged and verbose query logging is on.
/// Neither handle is checked for liveness here.
pub fn initialize_rag_chain(
    graph: SharedGraphStore,
    llm: SharedBackend,
) -> Result<GraphCypherQaChain> {
    initialize_rag_chain_with(
        graph,
        llm,
        ChainOptions::default()
            .with_verbose(true)
            .with_allow_dangerous_requests(true),
    )
}

/// Build the graph QA chain with explicit options.
pub fn initialize_rag_chain_with(
    graph: SharedGraphStore,
    llm: SharedBackend,
    options: ChainOptions,
) -> Result<GraphCypherQaChain> {
    GraphCypherQaChain::from_llm(
        llm,
        graph,
        cypher_generation_prompt()?,
        qa_generation_prompt()?,
        options,
    )
}

/// Outcome of [`ask_graphrag`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum AskOutcome {
    /// The chain produced an answer.
    Answer(String),
    /// The chain ran but produced nothing usable.
    NoData,
    /// The chain failed; carries the error description.
    Failed(String),
}

impl AskOutcome {
    pub fn is_answer(&self) -> bool {
        matches!(self, AskOutcome::Answer(_))
    }

    /// The answer text, if any.
    pub fn answer(&self) -> Option<&str> {
        match self {
            AskOutcome::Answer(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for AskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AskOutcome::Answer(text) => f.write_str(text),
            AskOutcome::NoData => f.write_str(NO_DATA_MESSAGE),
            AskOutcome::Failed(error) => write!(f, "❌ Error: {}", error),
        }
    }
}

/// Ask a question and return the chain's answer text.
pub async fn ask_graphrag(chain: &dyn QaChain, question: &str) -> AskOutcome {
    let outputs = match chain.invoke(query_input(question)).await {
        Ok(outputs) => outputs,
        Err(e) => {
            tracing::warn!(chain = chain.name(), error = %e, "Question failed");
            return AskOutcome::Failed(e.to_string());
        }
    };

    match outputs.get(RESULT_KEY) {
        Some(Value::String(text)) if text == "[]" => AskOutcome::NoData,
        Some(value) if !is_empty_value(value) => AskOutcome::Answer(render_result(value)),
        _ => AskOutcome::NoData,
    }
}

/// Result text as shown to the user: strings as-is, anything else as JSON.
fn render_result(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Where the path invoker looks for raw rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathOptions {
    /// Output keys tried in order; the first present one wins.
    pub raw_result_keys: Vec<String>,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            raw_result_keys: vec![RAW_QUERY_RESULT_KEY.to_string()],
        }
    }
}

impl PathOptions {
    pub fn with_raw_result_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            raw_result_keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

/// Answer text plus the synthesized path behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRagAnswer {
    pub answer: String,
    pub graph_path: Vec<GraphPathEntry>,
}

/// Ask a question and return the answer with its graph path.
pub async fn ask_graphrag_with_path(
    chain: &dyn QaChain,
    question: &str,
) -> Result<GraphRagAnswer> {
    ask_graphrag_with_path_using(chain, question, &PathOptions::default()).await
}

/// Like [`ask_graphrag_with_path`], reading raw rows from `options.raw_result_keys`.
pub async fn ask_graphrag_with_path_using(
    chain: &dyn QaChain,
    question: &str,
    options: &PathOptions,
) -> Result<GraphRagAnswer> {
    let outputs = chain.invoke(query_input(question)).await?;

    let answer = match outputs.get(RESULT_KEY) {
        Some(Value::Null) | None => NO_ANSWER_MESSAGE.to_string(),
        Some(value) => render_result(value),
    };

    let keys: Vec<&str> = options.raw_result_keys.iter().map(String::as_str).collect();
    let graph_path = match lookup_first(&outputs, &keys) {
        Some(Value::Array(rows)) => synthesize_path(rows),
        Some(other) => {
            tracing::debug!(kind = ?other, "Raw result is not a list; no path");
            Vec::new()
        }
        None => Vec::new(),
    };

    tracing::debug!(entries = graph_path.len(), "Synthesized graph path");

    Ok(GraphRagAnswer { answer, graph_path })
}
