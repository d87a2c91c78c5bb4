//! Persisted intention embeddings, so restarts skip re-encoding the catalog.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, RouterError};

/// Snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSnapshot {
    pub version: u32,

    /// When the snapshot was generated (RFC 3339)
    #[serde(default)]
    pub generated: String,

    /// Provider name the vectors came from
    pub provider: String,

    pub dimensions: usize,

    /// Intention display texts, catalog order
    pub texts: Vec<String>,

    /// Intention name to tool names
    #[serde(default)]
    pub tools: BTreeMap<String, Vec<String>>,

    /// One vector per text, same order as `texts`
    pub vectors: Vec<Vec<f32>>,
}

/// Where snapshots live. Only touched during startup.
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when no snapshot has been saved yet.
    fn load(&self) -> Result<Option<EmbeddingSnapshot>>;

    fn save(&self, snapshot: &EmbeddingSnapshot) -> Result<()>;

    /// Human-readable location for logs and errors
    fn location(&self) -> String;
}

/// Snapshot stored as a single JSON file
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn load(&self) -> Result<Option<EmbeddingSnapshot>> {
        if !self.path.exists() {
            debug!("No embedding snapshot at {:?}", self.path);
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).map_err(|e| RouterError::Read {
            what: "embedding snapshot",
            path: self.path.clone(),
            source: e,
        })?;
        let snapshot: EmbeddingSnapshot = serde_json::from_str(&content)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(RouterError::SnapshotMismatch {
                location: self.location(),
                reason: format!(
                    "version {} (expected {})",
                    snapshot.version, SNAPSHOT_VERSION
                ),
            });
        }
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &EmbeddingSnapshot) -> Result<()> {
        let write_err = |e| RouterError::SnapshotWrite {
            path: self.path.clone(),
            source: e,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }
        let json = serde_json::to_string(snapshot)?;
        fs::write(&self.path, json).map_err(write_err)?;
        debug!("Saved embedding snapshot to {:?}", self.path);
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EmbeddingSnapshot {
        EmbeddingSnapshot {
            version: SNAPSHOT_VERSION,
            generated: "2026-01-18T00:00:00Z".to_string(),
            provider: "hashing-4".to_string(),
            dimensions: 4,
            texts: vec!["Planning Travel Itineraries".to_string()],
            tools: BTreeMap::from([(
                "Planning Travel Itineraries".to_string(),
                vec!["Packing Checklist".to_string()],
            )]),
            vectors: vec![vec![0.1, -0.25, 0.333_333_34, 0.0]],
        }
    }

    #[test]
    fn test_missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_preserves_vectors_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path().join("nested").join("embeddings.json"));
        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample()));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.json");
        fs::write(&path, "{ not a snapshot").unwrap();
        let store = JsonSnapshotStore::new(&path);
        assert!(matches!(store.load(), Err(RouterError::Json(_))));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path().join("embeddings.json"));
        let mut snapshot = sample();
        snapshot.version = 99;
        store.save(&snapshot).unwrap();
        assert!(matches!(
            store.load(),
            Err(RouterError::SnapshotMismatch { .. })
        ));
    }
}
