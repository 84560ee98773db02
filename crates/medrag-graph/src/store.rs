//! Graph storage using graphqlite.
//!
//! Provides persistent storage for the medical knowledge graph using SQLite
//! with Cypher query support.

use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use graphqlite::{CypherResult, Graph, Value};

use crate::model::{DiseaseRecord, Node, Relationship};
use crate::schema::schema_text;

/// Error type for graph store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] graphqlite::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A query result row: column name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Statistics from a bulk load.
#[derive(Debug, Clone, Default)]
pub struct LoadStats {
    /// Number of disease records processed.
    pub records: usize,
    /// Number of distinct nodes written.
    pub nodes_upserted: usize,
    /// Number of relationships written.
    pub relationships_added: usize,
    /// Wall-clock time spent loading.
    pub load_time_ms: u64,
}

/// Persistent storage for the knowledge graph.
///
/// Diseases, symptoms, treatments and causes are stored as labeled nodes
/// with a `name` property; relationships use the lowercase relation names.
pub struct GraphStore {
    graph: Graph,
}

impl GraphStore {
    /// Open or create a graph database at the specified path.
    ///
    /// Use `:memory:` for an in-memory database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let graph = Graph::open(path)?;
        Ok(Self { graph })
    }

    /// Create an in-memory graph database.
    pub fn open_in_memory() -> Result<Self> {
        let graph = Graph::open_in_memory()?;
        Ok(Self { graph })
    }

    /// Insert or update a node. Returns its ID.
    pub fn upsert_node(&self, node: &Node) -> Result<String> {
        let name = node.name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidData(format!(
                "{} node has an empty name",
                node.label
            )));
        }

        let node_id = node.id();
        let props = vec![("name", name.to_string())];
        self.graph
            .upsert_node(&node_id, props, node.label.as_str())?;

        Ok(node_id)
    }

    /// Insert a relationship, creating both endpoint nodes if needed.
    pub fn insert_relationship(&self, relationship: &Relationship) -> Result<()> {
        let source_id = self.upsert_node(&relationship.source_node())?;
        let target_id = self.upsert_node(&relationship.target_node())?;
        let props: Vec<(&'static str, String)> = vec![];

        self.graph.upsert_edge(
            &source_id,
            &target_id,
            props,
            relationship.relation.as_str(),
        )?;

        Ok(())
    }

    /// Load disease records in a single transaction.
    ///
    /// Either every record is written or none is.
    pub fn load_records(&self, records: &[DiseaseRecord]) -> Result<LoadStats> {
        let start = Instant::now();
        let mut stats = LoadStats::default();

        if records.is_empty() {
            return Ok(stats);
        }

        self.graph.connection().execute("BEGIN")?;
        let mut seen = HashSet::new();
        let result = records
            .iter()
            .try_for_each(|record| self.load_record(record, &mut seen, &mut stats));
        match result {
            Ok(()) => self.graph.connection().execute("COMMIT")?,
            Err(e) => {
                let _ = self.graph.connection().execute("ROLLBACK");
                return Err(e);
            }
        };

        stats.nodes_upserted = seen.len();
        stats.load_time_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            records = stats.records,
            nodes = stats.nodes_upserted,
            relationships = stats.relationships_added,
            duration_ms = stats.load_time_ms,
            "Loaded disease records"
        );

        Ok(stats)
    }

    fn load_record(
        &self,
        record: &DiseaseRecord,
        seen: &mut HashSet<String>,
        stats: &mut LoadStats,
    ) -> Result<()> {
        seen.insert(self.upsert_node(&Node::disease(record.name.clone()))?);

        for relationship in record.relationships() {
            self.insert_relationship(&relationship)?;
            seen.insert(relationship.target_node().id());
            stats.relationships_added += 1;
        }

        stats.records += 1;
        Ok(())
    }

    /// Execute a Cypher query.
    pub fn query(&self, cypher: &str) -> Result<CypherResult> {
        Ok(self.graph.query(cypher)?)
    }

    /// Execute a Cypher query and convert each row to a JSON object keyed by column.
    pub fn query_rows(&self, cypher: &str) -> Result<Vec<Row>> {
        let result = self.query(cypher)?;

        let mut rows = Vec::with_capacity(result.len());
        for row in result.iter() {
            let mut obj = Row::new();
            for col in row.columns() {
                if let Some(value) = row.get_value(col) {
                    obj.insert(col.clone(), value_to_json(value));
                }
            }
            rows.push(obj);
        }

        Ok(rows)
    }

    /// Schema description for Cypher generation.
    pub fn schema(&self) -> String {
        schema_text()
    }

    /// Get graph statistics.
    pub fn stats(&self) -> Result<GraphStats> {
        let stats = self.graph.stats()?;
        Ok(GraphStats {
            node_count: stats.node_count,
            edge_count: stats.edge_count,
        })
    }
}

/// Graph statistics.
#[derive(Debug, Clone)]
pub struct GraphStats {
    pub node_count: i64,
    pub edge_count: i64,
}

/// Convert a graphqlite Value to a serde_json Value.
fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(arr) => serde_json::Value::Array(arr.iter().map(value_to_json).collect()),
        Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
    }
}
