//! Graph question-answering chain.
//!
//! The chain turns a natural-language question into a Cypher query with one
//! model call, runs the query against the graph store, and turns the rows
//! into an answer with a second model call.
//!
//! Inputs and outputs are JSON mappings so that callers address fields by
//! name (`query` in, `result` and the raw rows out), matching the shape the
//! question invokers in [`crate::rag`] consume.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::backend::SharedBackend;
use crate::cypher::extract_cypher;
use crate::error::{ChainError, Result};
use crate::graph::{SharedGraphStore, describe_schema, run_query};
use crate::prompts::PromptTemplate;
use crate::types::{CompletionRequest, Message};

/// Input mapping sent to a chain.
pub type ChainInputs = serde_json::Map<String, Value>;

/// Output mapping returned by a chain.
pub type ChainOutputs = serde_json::Map<String, Value>;

/// Key under which the question is sent.
pub const QUERY_KEY: &str = "query";

/// Key under which the answer text is returned.
pub const RESULT_KEY: &str = "result";

/// Default key for the raw query rows.
pub const RAW_QUERY_RESULT_KEY: &str = "raw_query_result";

/// Key for intermediate steps, when enabled.
pub const INTERMEDIATE_STEPS_KEY: &str = "intermediate_steps";

/// Build the `{"query": question}` input mapping.
pub fn query_input(question: &str) -> ChainInputs {
    let mut inputs = ChainInputs::new();
    inputs.insert(QUERY_KEY.to_string(), Value::String(question.to_string()));
    inputs
}

/// A question-answering chain.
#[async_trait]
pub trait QaChain: Send + Sync {
    /// Run the chain once and return its output mapping.
    async fn invoke(&self, inputs: ChainInputs) -> Result<ChainOutputs>;

    /// Get the name of this chain.
    fn name(&self) -> &str;
}

/// Configuration for [`GraphCypherQaChain`].
#[derive(Debug, Clone)]
pub struct ChainOptions {
    /// Input key holding the question.
    pub input_key: String,

    /// Output key for the answer text.
    pub output_key: String,

    /// Output key for the raw query rows.
    pub raw_result_key: String,

    /// Maximum number of rows passed on to answer generation.
    pub top_k: usize,

    /// Include the generated query and its rows under `intermediate_steps`.
    pub return_intermediate_steps: bool,

    /// Return the rows as the answer, skipping answer generation.
    pub return_direct: bool,

    /// Log generated queries at info level instead of debug.
    pub verbose: bool,

    /// Acknowledge that generated queries run unreviewed against the store.
    pub allow_dangerous_requests: bool,

    /// Model name sent with each request (backends may override).
    pub model: String,

    /// Maximum tokens per model call.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            input_key: QUERY_KEY.to_string(),
            output_key: RESULT_KEY.to_string(),
            raw_result_key: RAW_QUERY_RESULT_KEY.to_string(),
            top_k: 10,
            return_intermediate_steps: false,
            return_direct: false,
            verbose: false,
            allow_dangerous_requests: false,
            model: "default".to_string(),
            max_tokens: 1024,
            temperature: Some(0.0),
        }
    }
}

impl ChainOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn with_raw_result_key(mut self, key: impl Into<String>) -> Self {
        self.raw_result_key = key.into();
        self
    }

    pub fn with_return_intermediate_steps(mut self, enabled: bool) -> Self {
        self.return_intermediate_steps = enabled;
        self
    }

    pub fn with_return_direct(mut self, enabled: bool) -> Self {
        self.return_direct = enabled;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_allow_dangerous_requests(mut self, allow: bool) -> Self {
        self.allow_dangerous_requests = allow;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Question answering over the graph store by generating Cypher.
///
/// The chain is stateless between invocations: the schema is captured once
/// at construction and nothing from previous answers is retained.
pub struct GraphCypherQaChain {
    graph: SharedGraphStore,
    llm: SharedBackend,
    cypher_prompt: PromptTemplate,
    qa_prompt: PromptTemplate,
    schema: String,
    options: ChainOptions,
}

impl GraphCypherQaChain {
    /// Configure a chain from a model, a graph store and the two prompts.
    ///
    /// Fails unless `options.allow_dangerous_requests` is set, or if the
    /// prompts do not declare the slots the chain fills.
    pub fn from_llm(
        llm: SharedBackend,
        graph: SharedGraphStore,
        cypher_prompt: PromptTemplate,
        qa_prompt: PromptTemplate,
        options: ChainOptions,
    ) -> Result<Self> {
        if !options.allow_dangerous_requests {
            return Err(ChainError::Config(
                "generated Cypher runs against the graph without review; \
                 set allow_dangerous_requests to acknowledge this and scope \
                 the database to read-only data"
                    .to_string(),
            ));
        }

        expect_slots(&cypher_prompt, &["schema", "question"], "query-generation")?;
        expect_slots(&qa_prompt, &["context", "question"], "answer-generation")?;

        let schema = describe_schema(&graph)?;

        tracing::debug!(
            backend = llm.name(),
            top_k = options.top_k,
            raw_result_key = %options.raw_result_key,
            "Configured graph QA chain"
        );

        Ok(Self {
            graph,
            llm,
            cypher_prompt,
            qa_prompt,
            schema,
            options,
        })
    }

    async fn generate(&self, prompt: String) -> Result<String> {
        let mut request =
            CompletionRequest::new(&self.options.model, vec![Message::user(prompt)], self.options.max_tokens);
        request.temperature = self.options.temperature;

        let response = self.llm.complete(request).await?;
        Ok(response.text)
    }

    fn log_query(&self, cypher: &str) {
        if self.options.verbose {
            tracing::info!(cypher = %cypher, "Generated Cypher");
        } else {
            tracing::debug!(cypher = %cypher, "Generated Cypher");
        }
    }
}

fn expect_slots(prompt: &PromptTemplate, slots: &[&str], which: &str) -> Result<()> {
    let mut declared: Vec<&str> = prompt.input_variables().iter().map(String::as_str).collect();
    let mut expected = slots.to_vec();
    declared.sort_unstable();
    expected.sort_unstable();

    if declared != expected {
        return Err(ChainError::Prompt(format!(
            "{} prompt must declare exactly {:?}, found {:?}",
            which, slots, declared
        )));
    }
    Ok(())
}

#[async_trait]
impl QaChain for GraphCypherQaChain {
    async fn invoke(&self, inputs: ChainInputs) -> Result<ChainOutputs> {
        let question = inputs
            .get(&self.options.input_key)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ChainError::InvalidInput(format!(
                    "missing required string input '{}'",
                    self.options.input_key
                ))
            })?
            .to_string();

        // Step 1: question -> Cypher
        let prompt = self
            .cypher_prompt
            .format(&[("schema", &self.schema), ("question", &question)])?;
        let generated = self.generate(prompt).await?;
        let cypher = extract_cypher(&generated);
        self.log_query(&cypher);

        // Step 2: Cypher -> rows
        let mut query_error = None;
        let rows = if cypher.is_empty() {
            tracing::warn!("Model produced an empty query");
            Vec::new()
        } else {
            match run_query(&self.graph, &cypher, self.options.top_k) {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::warn!(cypher = %cypher, error = %e, "Generated query failed");
                    query_error = Some(e.to_string());
                    Vec::new()
                }
            }
        };
        let rows: Vec<Value> = rows.into_iter().map(Value::Object).collect();
        let context = serde_json::to_string(&rows)?;

        tracing::debug!(rows = rows.len(), "Query returned rows");

        // Step 3: rows -> answer
        let answer = if self.options.return_direct {
            context.clone()
        } else {
            let prompt = self
                .qa_prompt
                .format(&[("context", &context), ("question", &question)])?;
            self.generate(prompt).await?
        };

        let mut outputs = ChainOutputs::new();
        outputs.insert(self.options.output_key.clone(), Value::String(answer));
        if self.options.return_intermediate_steps {
            let mut query_step = serde_json::json!({ "query": cypher });
            if let Some(error) = query_error {
                query_step["error"] = Value::String(error);
            }
            outputs.insert(
                INTERMEDIATE_STEPS_KEY.to_string(),
                serde_json::json!([query_step, { "context": rows.clone() }]),
            );
        }
        outputs.insert(self.options.raw_result_key.clone(), Value::Array(rows));

        Ok(outputs)
    }

    fn name(&self) -> &str {
        "graph_cypher_qa"
    }
}

/// A mock chain for testing the question invokers.
///
/// Returns pre-configured outcomes in order and records every input mapping.
#[derive(Debug)]
pub struct MockChain {
    responses: Mutex<Vec<Result<ChainOutputs>>>,
    input_log: Mutex<Vec<ChainInputs>>,
}

impl MockChain {
    /// Create a mock chain returning the given outcomes in order.
    pub fn new(responses: Vec<Result<ChainOutputs>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            input_log: Mutex::new(Vec::new()),
        }
    }

    /// A chain returning one output mapping built from a JSON object.
    ///
    /// Non-object values produce an empty mapping.
    pub fn with_outputs(outputs: Value) -> Self {
        let outputs = match outputs {
            Value::Object(map) => map,
            _ => ChainOutputs::new(),
        };
        Self::new(vec![Ok(outputs)])
    }

    /// A chain returning `{"result": text}`.
    pub fn with_result(text: impl Into<String>) -> Self {
        let text: String = text.into();
        Self::with_outputs(serde_json::json!({ RESULT_KEY: text }))
    }

    /// A chain failing with the given error.
    pub fn failing(error: ChainError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// All input mappings received so far.
    pub fn inputs(&self) -> Vec<ChainInputs> {
        self.input_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl QaChain for MockChain {
    async fn invoke(&self, inputs: ChainInputs) -> Result<ChainOutputs> {
        self.input_log
            .lock()
            .map_err(|e| ChainError::Internal(format!("MockChain lock poisoned: {}", e)))?
            .push(inputs);

        let mut responses = self
            .responses
            .lock()
            .map_err(|e| ChainError::Internal(format!("MockChain lock poisoned: {}", e)))?;
        if responses.is_empty() {
            return Err(ChainError::Backend(
                "MockChain: no more responses available".to_string(),
            ));
        }
        responses.remove(0)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
