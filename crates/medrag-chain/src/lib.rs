//! medrag-chain: Graph question answering over the medical knowledge graph
//!
//! This crate provides the question-answering layer for medrag:
//! - Backend abstraction for LLM providers (Ollama, mock)
//! - Prompt templates for Cypher and answer generation
//! - The graph Cypher QA chain
//! - Question invokers returning typed outcomes and synthesized graph paths

pub mod backend;
pub mod chain;
pub mod cypher;
pub mod error;
pub mod graph;
pub mod ollama;
pub mod path;
pub mod prompts;
pub mod rag;
pub mod types;

pub use backend::{LLMBackend, LoggingBackend, MockBackend, SharedBackend};
pub use chain::{
    ChainInputs, ChainOptions, ChainOutputs, GraphCypherQaChain, MockChain, QaChain, query_input,
};
pub use cypher::extract_cypher;
pub use error::{ChainError, Result};
pub use graph::{SharedGraphStore, wrap_store};
pub use ollama::{OllamaBackend, OllamaConfig};
pub use path::{GraphPathEntry, lookup_first, synthesize_path};
pub use prompts::{PromptTemplate, cypher_generation_prompt, qa_generation_prompt};
pub use rag::{
    AskOutcome, GraphRagAnswer, PathOptions, ask_graphrag, ask_graphrag_with_path,
    ask_graphrag_with_path_using, initialize_rag_chain, initialize_rag_chain_with,
};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, Usage};
