use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use intent_router::{
    Catalog, Classification, EmbeddingProvider, EngineConfig, FallbackReason, HashingEmbedder,
    IntentEngine, JsonSnapshotStore, Result, RouterError, SnapshotStore, ToolTable,
};

const GRAMMAR_QUERY: &str = "I want to improve my grammar and vocabulary";
const NONSENSE_QUERY: &str = "purple elephants juggling violins";

/// Hashing embedder that counts encode calls and can be told to fail.
struct CountingProvider {
    inner: HashingEmbedder,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl CountingProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: HashingEmbedder::new(EngineConfig::default().embedding_dimensions),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for CountingProvider {
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(RouterError::Provider {
                provider: self.name().to_string(),
                reason: "backend unavailable".into(),
            });
        }
        self.inner.encode_batch(texts)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

fn engine_with(provider: Arc<CountingProvider>, snapshots: Option<&dyn SnapshotStore>) -> IntentEngine {
    IntentEngine::new(
        EngineConfig::default(),
        &Catalog::builtin().unwrap(),
        ToolTable::builtin().unwrap(),
        provider,
        snapshots,
    )
    .unwrap()
}

fn builtin_engine() -> IntentEngine {
    IntentEngine::from_config(EngineConfig::default()).unwrap()
}

#[tokio::test]
async fn test_grammar_request_matches_with_tools() {
    let engine = builtin_engine();
    let result = engine.classify(GRAMMAR_QUERY, Some(0.35)).await;

    let Classification::Match(m) = &result else {
        panic!("expected a match, got {:?}", result);
    };
    assert!(m.intention.contains("Grammar and Vocabulary"), "matched {}", m.intention);
    assert!(m.confidence >= 0.35);
    assert!(!m.tools.is_empty());

    let expected_tool_confidence = (m.confidence * 0.9).min(1.0);
    for tool in &m.tools {
        assert_eq!(tool.confidence, expected_tool_confidence);
        assert_eq!(tool.description, engine.tools().describe(&tool.name));
    }
}

#[tokio::test]
async fn test_alternatives_are_ranked_runner_ups() {
    let engine = builtin_engine();
    let result = engine.classify(GRAMMAR_QUERY, Some(0.35)).await;
    let matched = result.matched_intention().unwrap();
    let alternatives = result.alternatives();

    assert_eq!(alternatives.len(), 3);
    assert!(alternatives.iter().all(|a| a.intention != matched));
    assert!(alternatives.iter().all(|a| a.score <= result.confidence()));
    for pair in alternatives.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn test_small_talk_short_circuits() {
    let provider = CountingProvider::new();
    let engine = engine_with(Arc::clone(&provider), None);
    let after_startup = provider.calls();

    for query in ["hello, how are you?", "hi"] {
        let result = engine.classify(query, None).await;
        assert_eq!(result.fallback_reason(), Some(FallbackReason::Casual), "{}", query);
        assert_eq!(result.confidence(), 0.0);
        assert!(result.alternatives().is_empty());
        assert!(result.tools().is_empty());
    }
    assert_eq!(provider.calls(), after_startup);
}

#[tokio::test]
async fn test_unrelated_request_falls_back_at_high_threshold() {
    let engine = builtin_engine();
    let result = engine.classify(NONSENSE_QUERY, Some(0.99)).await;

    assert_eq!(result.fallback_reason(), Some(FallbackReason::BelowThreshold));
    assert_eq!(result.matched_intention(), None);
    assert!(result.confidence() < 0.99);
    assert_eq!(result.alternatives().len(), 3);
}

#[tokio::test]
async fn test_keyboard_mash_falls_back() {
    let engine = builtin_engine();
    let result = engine.classify("asdkjfh qwpoeiru", Some(0.99)).await;

    assert!(result.is_fallback());
    assert_eq!(result.matched_intention(), None);
    assert!(result.tools().is_empty());
}

#[tokio::test]
async fn test_non_finite_threshold_never_matches() {
    let engine = builtin_engine();
    for threshold in [f64::NAN, f64::INFINITY] {
        let result = engine.classify(GRAMMAR_QUERY, Some(threshold)).await;
        assert_eq!(result.fallback_reason(), Some(FallbackReason::BelowThreshold));
        assert!(result.tools().is_empty());
    }
}

#[tokio::test]
async fn test_higher_threshold_never_turns_fallback_into_match() {
    let engine = builtin_engine();
    for query in [GRAMMAR_QUERY, "Help me plan a trip to Japan", NONSENSE_QUERY] {
        let mut seen_fallback = false;
        for threshold in [0.0, 0.1, 0.2, 0.35, 0.5, 0.75, 0.99, 2.0] {
            let result = engine.classify(query, Some(threshold)).await;
            if seen_fallback {
                assert!(result.is_fallback(), "{} matched at {}", query, threshold);
            }
            seen_fallback |= result.is_fallback();
        }
        assert!(seen_fallback, "{} never fell back", query);
    }
}

#[tokio::test]
async fn test_independent_engines_agree() {
    let a = builtin_engine();
    let b = builtin_engine();
    for query in [GRAMMAR_QUERY, NONSENSE_QUERY, "write a cover letter for a job application"] {
        assert_eq!(a.classify(query, None).await, b.classify(query, None).await);
    }
}

#[tokio::test]
async fn test_result_independent_of_cache_warmth() {
    let cold = builtin_engine()
        .classify("what s up with my code", None)
        .await;

    // Same normalized text, cached first through the apostrophe spelling
    let warm_engine = builtin_engine();
    let apostrophe = warm_engine.classify("what's up with my code", None).await;
    let warm = warm_engine.classify("what s up with my code", None).await;

    assert_eq!(cold, warm);
    assert_eq!(apostrophe, warm);
    assert_eq!(warm_engine.cache_stats().results.hits, 1);
}

#[tokio::test]
async fn test_cached_result_skips_encoding() {
    let provider = CountingProvider::new();
    let engine = engine_with(Arc::clone(&provider), None);
    assert_eq!(provider.calls(), 1);

    let first = engine.classify(GRAMMAR_QUERY, None).await;
    assert_eq!(provider.calls(), 2);

    // Same normalized text, same threshold
    let second = engine
        .classify("  I want to improve my grammar and vocabulary ", None)
        .await;
    assert_eq!(second, first);
    assert_eq!(provider.calls(), 2);

    // A different threshold is a different cache entry
    engine.classify(GRAMMAR_QUERY, Some(0.5)).await;
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_provider_failure_is_reported_and_not_cached() {
    let provider = CountingProvider::new();
    let engine = engine_with(Arc::clone(&provider), None);
    provider.failing.store(true, Ordering::SeqCst);

    let result = engine.classify(GRAMMAR_QUERY, None).await;
    assert_eq!(result.fallback_reason(), Some(FallbackReason::Failed));
    assert_eq!(result.matched_intention(), None);
    assert_eq!(engine.cache_stats().results.entries, 0);

    provider.failing.store(false, Ordering::SeqCst);
    let retry = engine.classify(GRAMMAR_QUERY, None).await;
    assert!(!retry.is_fallback());
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_snapshot_reused_across_engines() {
    let dir = tempfile::tempdir().unwrap();
    let snapshots = JsonSnapshotStore::new(dir.path().join("cache").join("embeddings.json"));

    let first_provider = CountingProvider::new();
    let first = engine_with(Arc::clone(&first_provider), Some(&snapshots));
    assert_eq!(first_provider.calls(), 1);
    assert!(snapshots.path().exists());

    let second_provider = CountingProvider::new();
    let second = engine_with(Arc::clone(&second_provider), Some(&snapshots));
    assert_eq!(second_provider.calls(), 0);

    assert_eq!(
        first.classify(GRAMMAR_QUERY, None).await,
        second.classify(GRAMMAR_QUERY, None).await
    );
}

#[tokio::test]
async fn test_snapshot_from_other_provider_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let snapshots = JsonSnapshotStore::new(dir.path().join("embeddings.json"));
    let catalog = Catalog::builtin().unwrap();

    IntentEngine::new(
        EngineConfig::default(),
        &catalog,
        ToolTable::builtin().unwrap(),
        Arc::new(HashingEmbedder::new(64)),
        Some(&snapshots),
    )
    .unwrap();

    let result = IntentEngine::new(
        EngineConfig::default(),
        &catalog,
        ToolTable::builtin().unwrap(),
        Arc::new(HashingEmbedder::new(384)),
        Some(&snapshots),
    );
    assert!(matches!(result, Err(RouterError::SnapshotMismatch { .. })));
}

#[tokio::test]
async fn test_concurrent_requests() {
    let engine = Arc::new(builtin_engine());
    let expected = engine.classify(GRAMMAR_QUERY, None).await;

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                let query = if i % 2 == 0 { GRAMMAR_QUERY } else { NONSENSE_QUERY };
                (i, engine.classify(query, None).await)
            })
        })
        .collect();

    for handle in handles {
        let (i, result) = handle.await.unwrap();
        if i % 2 == 0 {
            assert_eq!(result, expected);
        }
    }
}
