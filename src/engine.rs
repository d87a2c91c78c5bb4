//! The classification pipeline.
//!
//! normalize → result cache → keywords → gate → (task) scoring → ranking.
//! An engine owns its caches, so separate instances never share state.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::cache::{BoundedCache, CacheStats};
use crate::catalog::{Catalog, ToolTable};
use crate::config::EngineConfig;
use crate::embedding::{
    provider_from_config, EmbeddingProvider, EmbeddingStore, JsonSnapshotStore, SnapshotStore,
};
use crate::error::Result;
use crate::gate::{GateWeights, IntentGate};
use crate::ranking::{Classification, IntentResponse, Ranker};
use crate::scoring::{build_worker_pool, SimilarityScorer};
use crate::text;

/// Result cache key. Thresholds are keyed by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResultKey {
    query: String,
    threshold_bits: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EngineCacheStats {
    pub results: CacheStats,
    pub normalized: CacheStats,
    pub keywords: CacheStats,
}

pub struct IntentEngine {
    config: EngineConfig,
    gate: IntentGate,
    scorer: SimilarityScorer,
    ranker: Ranker,
    store: Arc<EmbeddingStore>,
    tools: Arc<ToolTable>,
    results: BoundedCache<ResultKey, Classification>,
    normalized: BoundedCache<String, String>,
    keywords: BoundedCache<String, Arc<BTreeSet<String>>>,
}

impl IntentEngine {
    /// Build an engine. Embedding the catalog (or loading its snapshot)
    /// happens here; any failure means the engine must not serve.
    pub fn new(
        config: EngineConfig,
        catalog: &Catalog,
        tools: ToolTable,
        provider: Arc<dyn EmbeddingProvider>,
        snapshots: Option<&dyn SnapshotStore>,
    ) -> Result<Self> {
        Self::with_gate(
            config,
            catalog,
            tools,
            provider,
            snapshots,
            IntentGate::new(GateWeights::default()),
        )
    }

    pub fn with_gate(
        config: EngineConfig,
        catalog: &Catalog,
        tools: ToolTable,
        provider: Arc<dyn EmbeddingProvider>,
        snapshots: Option<&dyn SnapshotStore>,
        gate: IntentGate,
    ) -> Result<Self> {
        let store = Arc::new(EmbeddingStore::initialize(
            catalog,
            provider.as_ref(),
            snapshots,
        )?);
        let pool = build_worker_pool(config.worker_threads)?;
        let scorer = SimilarityScorer::new(Arc::clone(&store), provider, pool, &config);

        info!(
            "Intent engine ready: {} intentions, {} tools, {} worker threads",
            store.len(),
            tools.len(),
            config.worker_threads
        );

        Ok(Self {
            gate,
            scorer,
            ranker: Ranker::new(&config),
            store,
            tools: Arc::new(tools),
            results: BoundedCache::new(config.result_cache_capacity),
            normalized: BoundedCache::new(config.memo_cache_capacity),
            keywords: BoundedCache::new(config.memo_cache_capacity),
            config,
        })
    }

    /// Catalog and tool table from the config (built-ins when unset), the
    /// configured embedder, and a JSON snapshot if a path is configured.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let catalog = match &config.catalog_path {
            Some(path) => Catalog::from_path(path)?,
            None => Catalog::builtin()?,
        };
        let tools = match &config.tools_path {
            Some(path) => ToolTable::from_path(path)?,
            None => ToolTable::builtin()?,
        };
        let provider = provider_from_config(&config)?;
        let snapshots = config.snapshot_path.as_ref().map(JsonSnapshotStore::new);

        Self::new(
            config,
            &catalog,
            tools,
            provider,
            snapshots.as_ref().map(|s| s as &dyn SnapshotStore),
        )
    }

    /// Classify `query`. Never fails: scoring errors are logged and produce
    /// a `Failed` fallback.
    pub async fn classify(&self, query: &str, threshold: Option<f64>) -> Classification {
        let threshold = threshold.unwrap_or(self.config.default_threshold);
        let normalized = self
            .normalized
            .get_or_insert_with(query.to_string(), || text::normalize(query));

        let key = ResultKey {
            query: normalized.clone(),
            threshold_bits: threshold.to_bits(),
        };
        if let Some(hit) = self.results.get(&key) {
            debug!("Result cache hit for {:?}", preview(&normalized));
            return hit;
        }

        let keywords = self
            .keywords
            .get_or_insert_with(normalized.clone(), || {
                Arc::new(text::extract_keywords(&normalized))
            });

        match self.run(&normalized, &keywords, threshold).await {
            Ok(result) => {
                self.results.insert(key, result.clone());
                result
            }
            Err(e) => {
                error!("Classification failed for {:?}: {}", preview(query), e);
                Classification::failed()
            }
        }
    }

    /// `classify`, flattened into the response shape.
    pub async fn classify_response(&self, query: &str, threshold: Option<f64>) -> IntentResponse {
        IntentResponse::from(&self.classify(query, threshold).await)
    }

    async fn run(
        &self,
        normalized: &str,
        keywords: &BTreeSet<String>,
        threshold: f64,
    ) -> Result<Classification> {
        let verdict = self.gate.classify(normalized, keywords);
        debug!(
            "Gate: {:?} (confidence {:.2}, casual {:.1}, task {:.1})",
            verdict.kind, verdict.confidence, verdict.casual_score, verdict.task_score
        );
        if verdict.is_casual() {
            return Ok(Classification::casual());
        }

        let scored = self.scorer.score(normalized, keywords).await?;
        let result = self.ranker.decide(&self.store, scored, threshold, &self.tools);
        debug!(
            "Decision: {:?} (confidence {:.3})",
            result.matched_intention(),
            result.confidence()
        );
        Ok(result)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    pub fn tools(&self) -> &ToolTable {
        &self.tools
    }

    pub fn cache_stats(&self) -> EngineCacheStats {
        EngineCacheStats {
            results: self.results.stats(),
            normalized: self.normalized.stats(),
            keywords: self.keywords.stats(),
        }
    }
}

/// First 50 chars, for logs
fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}
