//! Cross-crate integration and E2E tests
//!
//! These tests load real records into a graph store, run the QA chain over
//! it, and check both question entry points. Model replies come from either
//! the mock backend or a fake Ollama server speaking the chat-completions
//! protocol over HTTP.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use serial_test::serial;

use medrag_chain::{
    AskOutcome, ChainOptions, LLMBackend, MockBackend, OllamaBackend, OllamaConfig, PathOptions,
    SharedGraphStore, ask_graphrag, ask_graphrag_with_path, ask_graphrag_with_path_using,
    initialize_rag_chain, initialize_rag_chain_with, wrap_store,
};
use medrag_graph::{GraphStore, Relation, load_file};

fn dataset_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/diseases.json")
}

fn loaded_store() -> SharedGraphStore {
    let store = GraphStore::open_in_memory().unwrap();
    load_file(&store, &dataset_path()).unwrap();
    wrap_store(store)
}

/// Fake Ollama server state: queued replies and recorded request bodies.
#[derive(Default)]
struct FakeOllama {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<Value>>,
    fail_with: Option<StatusCode>,
}

impl FakeOllama {
    fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    fn failing(status: StatusCode) -> Self {
        Self {
            fail_with: Some(status),
            ..Default::default()
        }
    }

    fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

async fn chat_completions(
    State(state): State<Arc<FakeOllama>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, String)> {
    state.requests.lock().unwrap().push(body.clone());

    if let Some(status) = state.fail_with {
        return Err((status, "model not loaded".to_string()));
    }

    let text = state.replies.lock().unwrap().pop_front().unwrap_or_default();
    Ok(Json(json!({
        "id": "chatcmpl-test",
        "model": body["model"],
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5}
    })))
}

async fn list_models() -> Json<Value> {
    Json(json!({"object": "list", "data": [{"id": "llama3.1:8b"}]}))
}

/// Start the fake server and return its `/v1` base URL.
async fn spawn_fake_ollama(state: Arc<FakeOllama>) -> String {
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/models", get(list_models))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/v1", addr)
}

fn ollama_backend(base_url: &str) -> Arc<OllamaBackend> {
    Arc::new(
        OllamaBackend::new(
            OllamaConfig::new()
                .with_base_url(base_url)
                .with_model("llama3.1:8b")
                .with_timeout(Duration::from_secs(5))
                .with_max_retries(0),
        )
        .unwrap(),
    )
}

/// E2E Test: basic question over the bundled dataset
///
/// 1. Records are loaded from JSON
/// 2. The chain generates Cypher with the graph schema in the prompt
/// 3. Rows feed the answer prompt
/// 4. The answer comes back as AskOutcome::Answer
#[tokio::test]
#[serial]
async fn test_e2e_ask_over_dataset() {
    let backend = Arc::new(MockBackend::with_texts([
        "```cypher\nMATCH (d:Disease {name: 'Flu'})-[:treated_with]->(t:Treatment) RETURN t.name\n```",
        "Flu is treated with rest, hydration and oseltamivir.",
    ]));
    let chain = initialize_rag_chain(loaded_store(), backend.clone()).unwrap();

    let outcome = ask_graphrag(&chain, "How is flu treated?").await;
    assert_eq!(
        outcome,
        AskOutcome::Answer("Flu is treated with rest, hydration and oseltamivir.".to_string())
    );

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    let answer_prompt = requests[1].last_user_text().unwrap();
    assert!(answer_prompt.contains("Oseltamivir"));
    assert!(answer_prompt.contains("How is flu treated?"));
}

/// E2E Test: path synthesis from real rows with dotted column names
#[tokio::test]
#[serial]
async fn test_e2e_path_over_dataset() {
    let backend = Arc::new(MockBackend::with_texts([
        "MATCH (d:Disease {name: 'Migraine'})-[:has_symptom]->(s:Symptom) RETURN d.name, s.name",
        "Migraine causes headache, nausea and sensitivity to light.",
    ]));
    let chain = initialize_rag_chain(loaded_store(), backend).unwrap();

    let answer = ask_graphrag_with_path(&chain, "What are migraine symptoms?")
        .await
        .unwrap();

    assert_eq!(
        answer.answer,
        "Migraine causes headache, nausea and sensitivity to light."
    );
    assert_eq!(answer.graph_path.len(), 3);
    for entry in &answer.graph_path {
        assert_eq!(entry.node, "Disease: Migraine");
        assert_eq!(entry.relation, Relation::HasSymptom);
        assert_eq!(entry.depth, 1);
        assert_eq!(entry.score, 1.0);
    }
    let targets: Vec<&str> = answer
        .graph_path
        .iter()
        .map(|e| e.next_node.as_str())
        .collect();
    assert!(targets.contains(&"Symptom: Headache"));
    assert!(targets.contains(&"Symptom: Nausea"));
}

/// E2E Test: an unknown disease yields no rows and NoData
#[tokio::test]
#[serial]
async fn test_e2e_no_data_for_unknown_disease() {
    let backend = Arc::new(MockBackend::with_texts([
        "MATCH (d:Disease {name: 'Dragon pox'})-[:caused_by]->(c:Cause) RETURN c.name",
    ]));
    let chain = initialize_rag_chain_with(
        loaded_store(),
        backend,
        ChainOptions::default()
            .with_return_direct(true)
            .with_allow_dangerous_requests(true),
    )
    .unwrap();

    let outcome = ask_graphrag(&chain, "What causes dragon pox?").await;
    assert_eq!(outcome, AskOutcome::NoData);
    assert_eq!(
        outcome.to_string(),
        "⚠️ No data found in the graph for this question."
    );
}

/// E2E Test: raw rows emitted under a custom key are found via PathOptions
#[tokio::test]
#[serial]
async fn test_e2e_custom_raw_result_key() {
    let backend = Arc::new(MockBackend::with_texts([
        "MATCH (d:Disease {name: 'Common cold'})-[:caused_by]->(c:Cause) RETURN d.name, c.name",
        "Colds are caused by rhinovirus.",
    ]));
    let chain = initialize_rag_chain_with(
        loaded_store(),
        backend,
        ChainOptions::default()
            .with_raw_result_key("data")
            .with_allow_dangerous_requests(true),
    )
    .unwrap();

    let options = PathOptions::with_raw_result_keys(["raw_query_result", "data"]);
    let answer = ask_graphrag_with_path_using(&chain, "What causes a cold?", &options)
        .await
        .unwrap();

    assert_eq!(answer.graph_path.len(), 1);
    assert_eq!(answer.graph_path[0].node, "Disease: Common cold");
    assert_eq!(answer.graph_path[0].next_node, "Cause: Rhinovirus");
}

/// E2E Test: an on-disk graph survives reopening and answers questions
#[tokio::test]
#[serial]
async fn test_e2e_on_disk_graph() {
    let dir = tempfile::tempdir().unwrap();
    let graph_path = dir.path().join("graph.db");

    {
        let store = GraphStore::open(&graph_path).unwrap();
        let stats = load_file(&store, &dataset_path()).unwrap();
        assert_eq!(stats.records, 5);
    }

    let store = wrap_store(GraphStore::open(&graph_path).unwrap());
    let backend = Arc::new(MockBackend::with_texts([
        "MATCH (d:Disease)-[:has_symptom]->(s:Symptom {name: 'Fever'}) RETURN d.name",
        "Flu and strep throat both cause fever.",
    ]));
    let chain = initialize_rag_chain(store, backend.clone()).unwrap();

    let outcome = ask_graphrag(&chain, "Which diseases cause fever?").await;
    assert!(outcome.is_answer());

    let answer_prompt = backend.requests()[1].last_user_text().unwrap().to_string();
    assert!(answer_prompt.contains("Flu"));
    assert!(answer_prompt.contains("Strep throat"));
}

/// E2E Test: the Ollama backend over HTTP drives the whole chain
#[tokio::test]
#[serial]
async fn test_e2e_ollama_over_http() {
    let fake = Arc::new(FakeOllama::with_replies([
        "```\nMATCH (d:Disease {name: 'Strep throat'})-[:treated_with]->(t:Treatment) RETURN t.name\n```",
        "Strep throat is treated with antibiotics such as penicillin.",
    ]));
    let base_url = spawn_fake_ollama(fake.clone()).await;
    let backend = ollama_backend(&base_url);

    backend.health_check().await.unwrap();

    let chain = initialize_rag_chain(loaded_store(), backend).unwrap();
    let outcome = ask_graphrag(&chain, "How is strep throat treated?").await;
    assert_eq!(
        outcome.answer(),
        Some("Strep throat is treated with antibiotics such as penicillin.")
    );

    let requests = fake.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0]["model"], "llama3.1:8b");
    assert_eq!(requests[0]["stream"], false);
    let answer_prompt = requests[1]["messages"][0]["content"].as_str().unwrap();
    assert!(answer_prompt.contains("Penicillin"));
}

/// E2E Test: a server error becomes AskOutcome::Failed without retries
#[tokio::test]
#[serial]
async fn test_e2e_ollama_server_error() {
    let fake = Arc::new(FakeOllama::failing(StatusCode::INTERNAL_SERVER_ERROR));
    let base_url = spawn_fake_ollama(fake.clone()).await;

    let chain = initialize_rag_chain(loaded_store(), ollama_backend(&base_url)).unwrap();
    let outcome = ask_graphrag(&chain, "What causes flu?").await;

    match &outcome {
        AskOutcome::Failed(message) => {
            assert!(message.contains("Ollama API error (500)"));
            assert!(message.contains("model not loaded"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(outcome.to_string().starts_with("❌ Error: Backend error:"));
    assert_eq!(fake.requests().len(), 1);

    // The path invoker propagates the same error
    let result = ask_graphrag_with_path(&chain, "What causes flu?").await;
    assert!(result.is_err());
}

/// E2E Test: an unreachable server is reported as a network failure
#[tokio::test]
#[serial]
async fn test_e2e_ollama_unreachable() {
    let chain =
        initialize_rag_chain(loaded_store(), ollama_backend("http://127.0.0.1:1/v1")).unwrap();

    let outcome = ask_graphrag(&chain, "What causes flu?").await;
    match outcome {
        AskOutcome::Failed(message) => assert!(message.starts_with("Network error:")),
        other => panic!("expected failure, got {:?}", other),
    }
}
