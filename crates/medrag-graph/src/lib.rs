//! medrag-graph: Medical knowledge graph infrastructure
//!
//! This crate provides graph storage for medrag:
//! - Node labels and relationship types of the medical vocabulary
//! - Graph storage and Cypher querying via graphqlite
//! - Schema description for query generation
//! - Bulk loading of disease records from JSON

pub mod loader;
pub mod model;
pub mod schema;
pub mod store;

pub use loader::{LoadError, load_file, parse_records, read_records};
pub use model::{DiseaseRecord, Node, NodeLabel, Relation, Relationship};
pub use schema::schema_text;
pub use store::{GraphStats, GraphStore, LoadStats, Row, StoreError};
