//! Similarity scoring: query encode, batched cosine, keyword bonus.
//!
//! CPU-bound work runs on a bounded rayon pool. The async caller waits on a
//! oneshot channel, so the scheduler thread is never blocked.

use rayon::prelude::*;
use rayon::ThreadPool;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::config::EngineConfig;
use crate::embedding::{cosine_similarity, EmbeddingProvider, EmbeddingStore};
use crate::error::{Result, RouterError};

/// Fused score for one catalog intention
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredIntention {
    /// Index into the embedding store (catalog order)
    pub index: usize,
    pub similarity: f64,
    pub keyword_bonus: f64,
    /// `similarity + keyword_bonus`; not clamped, can exceed 1.0
    pub score: f64,
}

/// Build the bounded pool used for encode and similarity work.
pub fn build_worker_pool(threads: usize) -> Result<Arc<ThreadPool>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("intent-score-{}", i))
        .panic_handler(|_| error!("Scoring worker panicked"))
        .build()?;
    Ok(Arc::new(pool))
}

/// Run `job` on `pool` and wait for it without blocking the async runtime.
async fn offload<T, F>(pool: &ThreadPool, job: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    pool.spawn(move || {
        let _ = tx.send(job());
    });
    rx.await.map_err(|_| RouterError::WorkerGone)
}

/// Keyword-overlap bonus: `per_match` for every keyword found in
/// `search_text`, capped at `cap`.
pub fn keyword_bonus(keywords: &BTreeSet<String>, search_text: &str, per_match: f64, cap: f64) -> f64 {
    let matches = keywords
        .iter()
        .filter(|k| search_text.contains(k.as_str()))
        .count();
    (matches as f64 * per_match).min(cap)
}

pub struct SimilarityScorer {
    store: Arc<EmbeddingStore>,
    provider: Arc<dyn EmbeddingProvider>,
    pool: Arc<ThreadPool>,
    keyword_match_bonus: f64,
    keyword_bonus_cap: f64,
}

impl SimilarityScorer {
    pub fn new(
        store: Arc<EmbeddingStore>,
        provider: Arc<dyn EmbeddingProvider>,
        pool: Arc<ThreadPool>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            provider,
            pool,
            keyword_match_bonus: config.keyword_match_bonus,
            keyword_bonus_cap: config.keyword_bonus_cap,
        }
    }

    /// Encode the query into the catalog's embedding space.
    pub async fn encode_query(&self, normalized: &str) -> Result<Vec<f32>> {
        let provider = Arc::clone(&self.provider);
        let text = normalized.to_string();
        let vector = offload(&self.pool, move || provider.encode(&text)).await??;
        if vector.len() != self.store.dimensions() {
            return Err(RouterError::Dimensions {
                expected: self.store.dimensions(),
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    /// Cosine similarity of `query` against every intention, catalog order.
    pub async fn similarities(&self, query: Vec<f32>) -> Result<Vec<f32>> {
        let store = Arc::clone(&self.store);
        offload(&self.pool, move || {
            store
                .intentions()
                .par_iter()
                .map(|intention| cosine_similarity(&query, &intention.embedding))
                .collect()
        })
        .await
    }

    /// Fused score for every intention, catalog order.
    pub async fn score(
        &self,
        normalized: &str,
        keywords: &BTreeSet<String>,
    ) -> Result<Vec<ScoredIntention>> {
        let query = self.encode_query(normalized).await?;
        let similarities = self.similarities(query).await?;

        let scored: Vec<ScoredIntention> = self
            .store
            .intentions()
            .iter()
            .zip(similarities)
            .enumerate()
            .map(|(index, (intention, similarity))| {
                let bonus = keyword_bonus(
                    keywords,
                    &intention.search_text,
                    self.keyword_match_bonus,
                    self.keyword_bonus_cap,
                );
                let similarity = similarity as f64;
                ScoredIntention {
                    index,
                    similarity,
                    keyword_bonus: bonus,
                    score: similarity + bonus,
                }
            })
            .collect();

        debug!("Scored {} intentions", scored.len());
        Ok(scored)
    }
}
