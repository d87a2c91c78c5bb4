//! Embedding provider seam and the built-in hashing embedder.

#[cfg(feature = "onnx")]
pub mod onnx;
pub mod snapshot;
pub mod store;

#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;
pub use snapshot::{EmbeddingSnapshot, JsonSnapshotStore, SnapshotStore};
pub use store::{EmbeddingStore, Intention};

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::config::EngineConfig;
use crate::error::{Result, RouterError};

/// Anything that maps text into a fixed-dimension vector space.
///
/// Implementations must be deterministic for a fixed model and return
/// `dimensions()`-length vectors for every input.
pub trait EmbeddingProvider: Send + Sync {
    /// Encode a batch of texts, one vector per text, in order.
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Encode a single text.
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.encode_batch(&[text.to_string()])?;
        match (batch.pop(), batch.is_empty()) {
            (Some(vector), true) => Ok(vector),
            _ => Err(RouterError::Provider {
                provider: self.name().to_string(),
                reason: "expected exactly one vector for one text".into(),
            }),
        }
    }

    fn dimensions(&self) -> usize;

    /// Model identifier; snapshots from a different model are rejected.
    fn name(&self) -> &str;
}

/// Cosine similarity; 0.0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Weight of a whole-word feature
const WORD_WEIGHT: f32 = 1.0;

/// Weight of each character trigram feature
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Feature-hashing embedder over word unigrams and character trigrams.
///
/// No model download and fully deterministic. Shared words and shared word
/// stems ("improve" / "improving") land in the same buckets, which is enough
/// signal for a curated catalog of short intention names.
pub struct HashingEmbedder {
    dimensions: usize,
    name: String,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            name: format!("hashing-{}", dimensions.max(1)),
        }
    }

    /// FNV-1a, 64 bit
    fn hash(feature: &str) -> u64 {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in feature.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        h
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.chars().count() >= 2)
            .map(|s| s.to_lowercase())
            .collect()
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut features: HashMap<String, f32> = HashMap::new();
        for token in Self::tokenize(text) {
            let padded: Vec<char> = format!("#{}#", token).chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                *features.entry(format!("g:{}", gram)).or_default() += TRIGRAM_WEIGHT;
            }
            *features.entry(format!("w:{}", token)).or_default() += WORD_WEIGHT;
        }

        let mut vector = vec![0.0f32; self.dimensions];
        // Sorted so float accumulation order never depends on HashMap order
        let mut features: Vec<_> = features.into_iter().collect();
        features.sort_by(|a, b| a.0.cmp(&b.0));
        for (feature, weight) in features {
            let h = Self::hash(&feature);
            let bucket = (h % self.dimensions as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign * weight;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// The provider `config` asks for: the ONNX model when `model_path` is set,
/// the hashing embedder otherwise.
pub fn provider_from_config(config: &EngineConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let Some(model_path) = &config.model_path else {
        return Ok(Arc::new(HashingEmbedder::new(config.embedding_dimensions)));
    };

    #[cfg(feature = "onnx")]
    {
        let tokenizer_path = config
            .tokenizer_path
            .clone()
            .unwrap_or_else(|| model_path.with_file_name("tokenizer.json"));
        let embedder =
            OnnxEmbedder::load(model_path, &tokenizer_path, config.embedding_dimensions)?;
        info!("Using ONNX embedder {}", embedder.name());
        Ok(Arc::new(embedder))
    }

    #[cfg(not(feature = "onnx"))]
    {
        tracing::warn!(
            "Built without the `onnx` feature; ignoring model {:?}, using the hashing embedder",
            model_path
        );
        let embedder = HashingEmbedder::new(config.embedding_dimensions);
        info!("Using {}", embedder.name());
        Ok(Arc::new(embedder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_uses_hashing_embedder() {
        let provider = provider_from_config(&EngineConfig::default()).unwrap();
        assert_eq!(provider.name(), "hashing-384");
        assert_eq!(provider.dimensions(), 384);
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_model_path_without_onnx_feature_falls_back() {
        let config = EngineConfig {
            model_path: Some("models/all-MiniLM-L6-v2.onnx".into()),
            embedding_dimensions: 64,
            ..EngineConfig::default()
        };
        assert_eq!(provider_from_config(&config).unwrap().name(), "hashing-64");
    }

    #[cfg(feature = "onnx")]
    #[test]
    fn test_missing_model_fails_startup() {
        let config = EngineConfig {
            model_path: Some("/nonexistent/all-MiniLM-L6-v2.onnx".into()),
            ..EngineConfig::default()
        };
        assert!(matches!(
            provider_from_config(&config),
            Err(RouterError::Provider { .. })
        ));
    }

    #[test]
    fn test_cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-2.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_hashing_dimensions_and_norm() {
        let embedder = HashingEmbedder::new(384);
        let v = embedder.encode("improving grammar and vocabulary").unwrap();
        assert_eq!(v.len(), 384);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(64);
        let v = embedder.encode("").unwrap();
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_hashing_is_deterministic() {
        let embedder = HashingEmbedder::new(128);
        let texts = vec!["plan a trip".to_string(), "fix my code".to_string()];
        assert_eq!(
            embedder.encode_batch(&texts).unwrap(),
            embedder.encode_batch(&texts).unwrap()
        );
        assert_eq!(
            embedder.encode("plan a trip").unwrap(),
            embedder.encode_batch(&texts).unwrap()[0]
        );
    }

    #[test]
    fn test_shared_stems_score_higher() {
        let embedder = HashingEmbedder::new(384);
        let query = embedder.encode("i want to improve my grammar").unwrap();
        let related = embedder.encode("Improving Grammar and Vocabulary").unwrap();
        let unrelated = embedder.encode("Planning Travel Itineraries").unwrap();
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }
}
