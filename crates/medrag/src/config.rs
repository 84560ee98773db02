//! Configuration file support for medrag.
//!
//! All medrag data is stored in a `.medrag/` directory:
//! - `.medrag/config.toml` - Configuration file
//! - `.medrag/graph.db` - Knowledge graph database
//! - `.medrag/logs/` - Log files, when enabled
//!
//! Config discovery searches for `.medrag/config.toml` starting from the current
//! directory and walking up to parent directories.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use medrag_chain::{ChainOptions, OllamaConfig, PathOptions};

/// The medrag data directory name.
pub const MEDRAG_DIR: &str = ".medrag";
/// The config file name within the medrag directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Graph database settings.
    pub graph: GraphConfig,
    /// Ollama backend settings.
    pub ollama: OllamaSection,
    /// QA chain settings.
    pub chain: ChainConfig,
    /// Log file settings.
    pub logging: LoggingConfig,
}

/// Graph configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Path to the graph database.
    pub path: PathBuf,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            // Relative to .medrag/ directory
            path: PathBuf::from("graph.db"),
        }
    }
}

/// Ollama configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OllamaSection {
    /// OpenAI-compatible API base URL.
    pub base_url: String,
    /// Model used for both query and answer generation.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries on network errors.
    pub max_retries: u32,
}

impl Default for OllamaSection {
    fn default() -> Self {
        let defaults = OllamaConfig::default();
        Self {
            base_url: defaults.base_url,
            model: defaults.model,
            timeout_secs: defaults.timeout.as_secs(),
            max_retries: defaults.max_retries,
        }
    }
}

/// Chain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Maximum rows passed to answer generation.
    pub top_k: usize,
    /// Log generated Cypher at info level.
    pub verbose: bool,
    /// Keep generated Cypher and rows in chain output.
    pub return_intermediate_steps: bool,
    /// Output keys searched in order for raw query rows.
    pub raw_result_keys: Vec<String>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        let chain = ChainOptions::default();
        Self {
            top_k: chain.top_k,
            verbose: true,
            return_intermediate_steps: false,
            raw_result_keys: PathOptions::default().raw_result_keys,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for daily log files, relative to `.medrag/`. Unset means stderr only.
    pub dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Find and load configuration from current or parent directories.
    pub fn find_and_load() -> Result<Option<(Self, PathBuf)>> {
        let current = std::env::current_dir()?;
        Self::find_and_load_from(&current)
    }

    /// Find and load configuration starting from a specific directory.
    ///
    /// Looks for `.medrag/config.toml` in the directory and its parents and
    /// returns the config along with its `.medrag` directory.
    pub fn find_and_load_from(start: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start.to_path_buf();

        loop {
            let medrag_dir = dir.join(MEDRAG_DIR);
            let config_path = medrag_dir.join(CONFIG_FILE);
            if config_path.exists() {
                let config = Self::from_file(&config_path)?;
                return Ok(Some((config, medrag_dir)));
            }

            if !dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Resolve a path relative to the .medrag directory.
    fn resolve(path: &Path, medrag_dir: Option<&Path>) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else if let Some(dir) = medrag_dir {
            dir.join(path)
        } else {
            // Fall back to .medrag in current directory
            PathBuf::from(MEDRAG_DIR).join(path)
        }
    }

    /// Resolve the graph path relative to the .medrag directory.
    pub fn resolve_graph_path(&self, medrag_dir: Option<&Path>) -> PathBuf {
        Self::resolve(&self.graph.path, medrag_dir)
    }

    /// Resolve the log directory, if file logging is enabled.
    pub fn resolve_log_dir(&self, medrag_dir: Option<&Path>) -> Option<PathBuf> {
        self.logging
            .dir
            .as_deref()
            .map(|dir| Self::resolve(dir, medrag_dir))
    }

    /// Settings for the Ollama backend.
    pub fn ollama_config(&self) -> OllamaConfig {
        OllamaConfig::new()
            .with_base_url(&self.ollama.base_url)
            .with_model(&self.ollama.model)
            .with_timeout(Duration::from_secs(self.ollama.timeout_secs))
            .with_max_retries(self.ollama.max_retries)
    }

    /// Options for the QA chain.
    ///
    /// Raw rows are emitted under the first configured key so that the
    /// path invoker finds them.
    pub fn chain_options(&self) -> ChainOptions {
        let mut options = ChainOptions::default()
            .with_top_k(self.chain.top_k)
            .with_verbose(self.chain.verbose)
            .with_return_intermediate_steps(self.chain.return_intermediate_steps)
            .with_model(&self.ollama.model)
            .with_allow_dangerous_requests(true);
        if let Some(key) = self.chain.raw_result_keys.first() {
            options = options.with_raw_result_key(key);
        }
        options
    }

    /// Options for the path invoker.
    pub fn path_options(&self) -> PathOptions {
        PathOptions::with_raw_result_keys(self.chain.raw_result_keys.iter().cloned())
    }

    /// Get the config file path for a given .medrag directory.
    pub fn config_path(medrag_dir: &Path) -> PathBuf {
        medrag_dir.join(CONFIG_FILE)
    }
}

/// Configuration validation error.
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigValidationError {}

impl Config {
    /// Validate the configuration.
    ///
    /// Returns a list of validation errors if any are found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if !(self.ollama.base_url.starts_with("http://")
            || self.ollama.base_url.starts_with("https://"))
        {
            errors.push(ConfigValidationError {
                field: "ollama.base_url".to_string(),
                message: format!(
                    "Invalid URL '{}'. Expected an http:// or https:// address.",
                    self.ollama.base_url
                ),
            });
        }

        if self.ollama.model.trim().is_empty() {
            errors.push(ConfigValidationError {
                field: "ollama.model".to_string(),
                message: "Ollama model cannot be empty.".to_string(),
            });
        }

        if self.ollama.timeout_secs == 0 {
            errors.push(ConfigValidationError {
                field: "ollama.timeout_secs".to_string(),
                message: "Timeout must be at least one second.".to_string(),
            });
        }

        if self.chain.top_k == 0 {
            errors.push(ConfigValidationError {
                field: "chain.top_k".to_string(),
                message: "top_k must be greater than zero.".to_string(),
            });
        }

        if self.chain.raw_result_keys.is_empty()
            || self.chain.raw_result_keys.iter().any(|k| k.is_empty())
        {
            errors.push(ConfigValidationError {
                field: "chain.raw_result_keys".to_string(),
                message: "At least one non-empty key is required (e.g. \"raw_query_result\")."
                    .to_string(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ollama.base_url, "http://localhost:11434/v1");
        assert_eq!(config.ollama.model, "llama3.1:8b");
        assert_eq!(config.chain.top_k, 10);
        assert!(config.chain.verbose);
        assert_eq!(config.chain.raw_result_keys, vec!["raw_query_result"]);
        assert!(config.logging.dir.is_none());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[ollama]
model = "mistral:7b"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.ollama.model, "mistral:7b");
        // Defaults should still apply
        assert_eq!(config.ollama.base_url, "http://localhost:11434/v1");
        assert_eq!(config.graph.path, PathBuf::from("graph.db"));
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[graph]
path = "/data/medical.db"

[ollama]
base_url = "http://gpu-box:11434/v1"
model = "qwen2.5:14b"
timeout_secs = 120
max_retries = 1

[chain]
top_k = 25
verbose = false
return_intermediate_steps = true
raw_result_keys = ["data", "raw_query_result"]

[logging]
dir = "logs"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.graph.path, PathBuf::from("/data/medical.db"));
        assert_eq!(config.ollama.base_url, "http://gpu-box:11434/v1");
        assert_eq!(config.ollama.timeout_secs, 120);
        assert_eq!(config.ollama.max_retries, 1);
        assert_eq!(config.chain.top_k, 25);
        assert!(!config.chain.verbose);
        assert!(config.chain.return_intermediate_steps);
        assert_eq!(config.chain.raw_result_keys, vec!["data", "raw_query_result"]);
        assert_eq!(config.logging.dir, Some(PathBuf::from("logs")));
    }

    #[test]
    fn test_resolve_graph_path() {
        let config = Config::default();
        let medrag_dir = PathBuf::from("/project/.medrag");
        let resolved = config.resolve_graph_path(Some(&medrag_dir));
        assert_eq!(resolved, PathBuf::from("/project/.medrag/graph.db"));

        let resolved = config.resolve_graph_path(None);
        assert_eq!(resolved, PathBuf::from(".medrag/graph.db"));
    }

    #[test]
    fn test_resolve_absolute_graph_path() {
        let mut config = Config::default();
        config.graph.path = PathBuf::from("/var/lib/medrag.db");
        let resolved = config.resolve_graph_path(Some(Path::new("/project/.medrag")));
        assert_eq!(resolved, PathBuf::from("/var/lib/medrag.db"));
    }

    #[test]
    fn test_resolve_log_dir() {
        let mut config = Config::default();
        assert!(config.resolve_log_dir(None).is_none());

        config.logging.dir = Some(PathBuf::from("logs"));
        assert_eq!(
            config.resolve_log_dir(Some(Path::new("/project/.medrag"))),
            Some(PathBuf::from("/project/.medrag/logs"))
        );
    }

    #[test]
    fn test_chain_options_from_config() {
        let mut config = Config::default();
        config.chain.top_k = 3;
        config.chain.raw_result_keys = vec!["data".to_string()];

        let options = config.chain_options();
        assert_eq!(options.top_k, 3);
        assert_eq!(options.raw_result_key, "data");
        assert_eq!(options.model, "llama3.1:8b");
        assert!(options.allow_dangerous_requests);

        assert_eq!(config.path_options().raw_result_keys, vec!["data"]);
    }

    #[test]
    fn test_ollama_config_from_config() {
        let mut config = Config::default();
        config.ollama.timeout_secs = 30;
        let ollama = config.ollama_config();
        assert_eq!(ollama.timeout, Duration::from_secs(30));
        assert_eq!(ollama.model, "llama3.1:8b");
    }

    #[test]
    fn test_validate_invalid_url() {
        let mut config = Config::default();
        config.ollama.base_url = "localhost:11434".to_string();

        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "ollama.base_url"));
    }

    #[test]
    fn test_validate_empty_model_and_keys() {
        let mut config = Config::default();
        config.ollama.model = "".to_string();
        config.chain.raw_result_keys.clear();
        config.chain.top_k = 0;

        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "ollama.model"));
        assert!(errors.iter().any(|e| e.field == "chain.raw_result_keys"));
        assert!(errors.iter().any(|e| e.field == "chain.top_k"));
    }

    #[test]
    fn test_find_and_load_walks_up() {
        let tmp = tempfile::tempdir().unwrap();
        let medrag_dir = tmp.path().join(MEDRAG_DIR);
        std::fs::create_dir_all(&medrag_dir).unwrap();
        std::fs::write(
            medrag_dir.join(CONFIG_FILE),
            "[chain]\ntop_k = 4\n",
        )
        .unwrap();

        let nested = tmp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let (config, found_dir) = Config::find_and_load_from(&nested).unwrap().unwrap();
        assert_eq!(config.chain.top_k, 4);
        assert_eq!(found_dir, medrag_dir);
    }

    #[test]
    fn test_from_file_reports_parse_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        std::fs::write(&path, "[chain\ntop_k = ").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
