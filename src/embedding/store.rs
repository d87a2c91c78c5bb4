//! Read-only intention embeddings, built once at startup.

use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::snapshot::{EmbeddingSnapshot, SnapshotStore, SNAPSHOT_VERSION};
use super::EmbeddingProvider;
use crate::catalog::Catalog;
use crate::error::{Result, RouterError};

/// A catalog intention with its embedding
#[derive(Debug, Clone)]
pub struct Intention {
    pub name: String,
    pub tools: Vec<String>,
    pub embedding: Vec<f32>,
    /// Lowercased name + tool names, precomputed for keyword matching
    pub search_text: String,
}

/// Intentions and their vectors, index-aligned with the catalog.
#[derive(Debug)]
pub struct EmbeddingStore {
    intentions: Vec<Intention>,
    dimensions: usize,
    provider: String,
}

impl EmbeddingStore {
    /// Encode every intention in one batch call.
    pub fn build(catalog: &Catalog, provider: &dyn EmbeddingProvider) -> Result<Self> {
        let vectors = provider.encode_batch(&catalog.texts())?;
        if vectors.len() != catalog.len() {
            return Err(RouterError::Provider {
                provider: provider.name().to_string(),
                reason: format!(
                    "returned {} vectors for {} intentions",
                    vectors.len(),
                    catalog.len()
                ),
            });
        }
        Self::assemble(catalog, vectors, provider)
    }

    /// Rebuild from a snapshot. It must describe exactly this catalog and
    /// come from the same provider.
    pub fn from_snapshot(
        catalog: &Catalog,
        snapshot: EmbeddingSnapshot,
        provider: &dyn EmbeddingProvider,
        location: &str,
    ) -> Result<Self> {
        let mismatch = |reason: String| RouterError::SnapshotMismatch {
            location: location.to_string(),
            reason,
        };

        if snapshot.provider != provider.name() {
            return Err(mismatch(format!(
                "built by provider '{}', current provider is '{}'",
                snapshot.provider,
                provider.name()
            )));
        }
        if snapshot.vectors.len() != catalog.len() || snapshot.texts.len() != catalog.len() {
            return Err(mismatch(format!(
                "holds {} vectors / {} texts, catalog has {} intentions",
                snapshot.vectors.len(),
                snapshot.texts.len(),
                catalog.len()
            )));
        }
        if let Some((i, entry)) = catalog
            .entries()
            .iter()
            .enumerate()
            .find(|(i, entry)| snapshot.texts[*i] != entry.name)
        {
            return Err(mismatch(format!(
                "entry {} is '{}', catalog has '{}'",
                i, snapshot.texts[i], entry.name
            )));
        }
        if snapshot.dimensions != provider.dimensions() {
            return Err(mismatch(format!(
                "{}-dimensional, provider produces {}",
                snapshot.dimensions,
                provider.dimensions()
            )));
        }

        Self::assemble(catalog, snapshot.vectors, provider)
    }

    /// Load a matching snapshot if there is one; otherwise encode the
    /// catalog and try to save a snapshot for next time.
    pub fn initialize(
        catalog: &Catalog,
        provider: &dyn EmbeddingProvider,
        snapshots: Option<&dyn SnapshotStore>,
    ) -> Result<Self> {
        let Some(snapshots) = snapshots else {
            let store = Self::build(catalog, provider)?;
            info!("Encoded {} intentions with {}", store.len(), provider.name());
            return Ok(store);
        };

        if let Some(snapshot) = snapshots.load()? {
            let store = Self::from_snapshot(catalog, snapshot, provider, &snapshots.location())?;
            info!(
                "Loaded {} intention embeddings from {}",
                store.len(),
                snapshots.location()
            );
            return Ok(store);
        }

        let store = Self::build(catalog, provider)?;
        info!("Encoded {} intentions with {}", store.len(), provider.name());
        if let Err(e) = snapshots.save(&store.snapshot()) {
            warn!("Could not persist embedding snapshot: {}", e);
        }
        Ok(store)
    }

    fn assemble(
        catalog: &Catalog,
        vectors: Vec<Vec<f32>>,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Self> {
        let dimensions = provider.dimensions();
        let intentions = catalog
            .entries()
            .iter()
            .zip(vectors)
            .map(|(entry, embedding)| {
                if embedding.len() != dimensions {
                    return Err(RouterError::Dimensions {
                        expected: dimensions,
                        actual: embedding.len(),
                    });
                }
                Ok(Intention {
                    name: entry.name.clone(),
                    tools: entry.tools.clone(),
                    embedding,
                    search_text: entry.search_text(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            intentions,
            dimensions,
            provider: provider.name().to_string(),
        })
    }

    pub fn snapshot(&self) -> EmbeddingSnapshot {
        EmbeddingSnapshot {
            version: SNAPSHOT_VERSION,
            generated: Utc::now().to_rfc3339(),
            provider: self.provider.clone(),
            dimensions: self.dimensions,
            texts: self.intentions.iter().map(|i| i.name.clone()).collect(),
            tools: self
                .intentions
                .iter()
                .map(|i| (i.name.clone(), i.tools.clone()))
                .collect::<BTreeMap<_, _>>(),
            vectors: self.intentions.iter().map(|i| i.embedding.clone()).collect(),
        }
    }

    pub fn intentions(&self) -> &[Intention] {
        &self.intentions
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.intentions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intentions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;
    use crate::embedding::{HashingEmbedder, JsonSnapshotStore};

    fn small_catalog() -> Catalog {
        Catalog::new(vec![
            CatalogEntry::new("Improving Grammar and Vocabulary", &["Flashcard Decks"]),
            CatalogEntry::new("Planning Travel Itineraries", &["Packing Checklist"]),
            CatalogEntry::new("Math Problem Solving", &["Step-by-Step Solutions"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_build_aligns_with_catalog() {
        let catalog = small_catalog();
        let store = EmbeddingStore::build(&catalog, &HashingEmbedder::new(64)).unwrap();
        assert_eq!(store.len(), catalog.len());
        for (intention, entry) in store.intentions().iter().zip(catalog.entries()) {
            assert_eq!(intention.name, entry.name);
            assert_eq!(intention.embedding.len(), 64);
        }
    }

    #[test]
    fn test_initialize_saves_then_reuses_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = JsonSnapshotStore::new(dir.path().join("embeddings.json"));
        let catalog = small_catalog();
        let provider = HashingEmbedder::new(64);

        let first = EmbeddingStore::initialize(&catalog, &provider, Some(&snapshots)).unwrap();
        assert!(snapshots.path().exists());
        let second = EmbeddingStore::initialize(&catalog, &provider, Some(&snapshots)).unwrap();

        for (a, b) in first.intentions().iter().zip(second.intentions()) {
            assert_eq!(a.embedding, b.embedding);
        }
    }

    #[test]
    fn test_snapshot_for_other_catalog_is_fatal() {
        let catalog = small_catalog();
        let provider = HashingEmbedder::new(64);
        let mut snapshot = EmbeddingStore::build(&catalog, &provider).unwrap().snapshot();
        snapshot.vectors.pop();
        snapshot.texts.pop();

        let err = EmbeddingStore::from_snapshot(&catalog, snapshot, &provider, "test");
        assert!(matches!(err, Err(RouterError::SnapshotMismatch { .. })));
    }

    #[test]
    fn test_snapshot_with_renamed_intention_is_fatal() {
        let catalog = small_catalog();
        let provider = HashingEmbedder::new(64);
        let mut snapshot = EmbeddingStore::build(&catalog, &provider).unwrap().snapshot();
        snapshot.texts[1] = "Planning Vacations".to_string();

        let err = EmbeddingStore::from_snapshot(&catalog, snapshot, &provider, "test");
        assert!(matches!(err, Err(RouterError::SnapshotMismatch { .. })));
    }

    #[test]
    fn test_snapshot_from_other_provider_is_fatal() {
        let catalog = small_catalog();
        let snapshot = EmbeddingStore::build(&catalog, &HashingEmbedder::new(32))
            .unwrap()
            .snapshot();

        let err =
            EmbeddingStore::from_snapshot(&catalog, snapshot, &HashingEmbedder::new(64), "test");
        assert!(matches!(err, Err(RouterError::SnapshotMismatch { .. })));
    }

    #[test]
    fn test_short_vector_in_snapshot_is_fatal() {
        let catalog = small_catalog();
        let provider = HashingEmbedder::new(64);
        let mut snapshot = EmbeddingStore::build(&catalog, &provider).unwrap().snapshot();
        snapshot.vectors[2].truncate(10);

        let err = EmbeddingStore::from_snapshot(&catalog, snapshot, &provider, "test");
        assert!(matches!(err, Err(RouterError::Dimensions { .. })));
    }
}
