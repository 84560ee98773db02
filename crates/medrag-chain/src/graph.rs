//! Shared access to the graph store from async chain code.

use std::sync::{Arc, Mutex};

use medrag_graph::{GraphStore, Row};

use crate::error::{ChainError, Result};

/// Thread-safe wrapper around GraphStore.
pub type SharedGraphStore = Arc<Mutex<GraphStore>>;

/// Create a shared graph store from a GraphStore.
pub fn wrap_store(store: GraphStore) -> SharedGraphStore {
    Arc::new(Mutex::new(store))
}

/// Acquire the graph store lock with consistent error handling.
fn lock_store(store: &SharedGraphStore) -> Result<std::sync::MutexGuard<'_, GraphStore>> {
    store
        .lock()
        .map_err(|e| ChainError::Internal(format!("Failed to acquire store lock: {}", e)))
}

/// Run a Cypher query and keep at most `limit` rows.
///
/// The lock is released before returning, so callers may await afterwards.
pub fn run_query(store: &SharedGraphStore, cypher: &str, limit: usize) -> Result<Vec<Row>> {
    let guard = lock_store(store)?;
    let mut rows = guard.query_rows(cypher)?;
    drop(guard);

    if rows.len() > limit {
        tracing::debug!(total = rows.len(), limit = limit, "Truncating query rows");
        rows.truncate(limit);
    }
    Ok(rows)
}

/// Schema description of the store.
pub fn describe_schema(store: &SharedGraphStore) -> Result<String> {
    Ok(lock_store(store)?.schema())
}
