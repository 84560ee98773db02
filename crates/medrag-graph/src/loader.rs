//! Dataset loading from JSON files.

use std::path::Path;

use crate::model::DiseaseRecord;
use crate::store::{GraphStore, LoadStats, StoreError};

/// Error type for dataset loading.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid dataset: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, LoadError>;

/// Parse a JSON array of disease records.
pub fn parse_records(json: &str) -> Result<Vec<DiseaseRecord>> {
    Ok(serde_json::from_str(json)?)
}

/// Read disease records from a JSON file.
pub fn read_records(path: &Path) -> Result<Vec<DiseaseRecord>> {
    let content = std::fs::read_to_string(path)?;
    parse_records(&content)
}

/// Read a dataset file and load it into the store.
pub fn load_file(store: &GraphStore, path: &Path) -> Result<LoadStats> {
    let records = read_records(path)?;
    tracing::info!(
        path = %path.display(),
        records = records.len(),
        "Loading dataset"
    );
    Ok(store.load_records(&records)?)
}
