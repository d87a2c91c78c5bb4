//! Engine configuration.
//!
//! Every knob has a default; a JSON file can override any subset of them.
//! The binary looks for `~/.config/intent-router/config.json` unless a path is
//! given on the command line.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, RouterError};

/// Config directory name under the platform config dir
const CONFIG_DIR: &str = "intent-router";

/// Default config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Threshold used when the caller does not supply one
    pub default_threshold: f64,

    /// Bonus added per query keyword found in an intention's search text
    pub keyword_match_bonus: f64,

    /// Maximum keyword bonus so keyword stuffing cannot outweigh similarity
    pub keyword_bonus_cap: f64,

    /// Runner-up intentions reported alongside the top candidate
    pub max_alternatives: usize,

    /// Per-tool confidence is the match confidence times this, capped at 1.0
    pub tool_confidence_factor: f64,

    /// Truncate recommended tools to this many (display order); `None` keeps all
    pub max_recommended_tools: Option<usize>,

    /// Threads in the similarity worker pool
    pub worker_threads: usize,

    /// Bound on the (query, threshold) result cache
    pub result_cache_capacity: usize,

    /// Bound on each normalization / keyword memo cache
    pub memo_cache_capacity: usize,

    /// Embedding width: size of the hashing embedder, or the hidden size the
    /// ONNX model is expected to produce
    pub embedding_dimensions: usize,

    /// Sentence-embedding model (ONNX). Needs the `onnx` feature; the
    /// hashing embedder is used when unset
    pub model_path: Option<PathBuf>,

    /// `tokenizer.json` for the model; defaults to the model's directory
    pub tokenizer_path: Option<PathBuf>,

    /// Intention catalog JSON; the built-in catalog is used when unset
    pub catalog_path: Option<PathBuf>,

    /// Tool description JSON; the built-in table is used when unset
    pub tools_path: Option<PathBuf>,

    /// Where embedding snapshots are loaded from and saved to
    pub snapshot_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_threshold: 0.35,
            keyword_match_bonus: 0.05,
            keyword_bonus_cap: 0.15,
            max_alternatives: 3,
            tool_confidence_factor: 0.9,
            max_recommended_tools: None,
            worker_threads: 4,
            result_cache_capacity: 1000,
            memo_cache_capacity: 1000,
            embedding_dimensions: 384,
            model_path: None,
            tokenizer_path: None,
            catalog_path: None,
            tools_path: None,
            snapshot_path: None,
        }
    }
}

impl EngineConfig {
    /// Load a config file. Missing keys fall back to defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| RouterError::Read {
            what: "config",
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Load from `path` if given, else from the default location if it
    /// exists, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_path(path);
        }
        match default_config_path() {
            Some(default) if default.exists() => Self::from_path(&default),
            _ => Ok(Self::default()),
        }
    }

    /// Default snapshot location under the platform cache dir.
    pub fn default_snapshot_path() -> Option<PathBuf> {
        dirs::cache_dir().map(|d| d.join(CONFIG_DIR).join("embeddings.json"))
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR).join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_threshold": 0.5, "worker_threads": 2}}"#).unwrap();

        let config = EngineConfig::from_path(file.path()).unwrap();
        assert_eq!(config.default_threshold, 0.5);
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.keyword_bonus_cap, 0.15);
        assert_eq!(config.max_alternatives, 3);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = EngineConfig::from_path(Path::new("/nonexistent/intent-router.json"));
        assert!(matches!(err, Err(RouterError::Read { what: "config", .. })));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            EngineConfig::from_path(file.path()),
            Err(RouterError::Json(_))
        ));
    }
}
