//! Intent Router - hybrid intention classification for free-text requests
//!
//! Two-stage cascade:
//! - a rule-based gate separates small talk from task requests
//! - task requests are matched against precomputed intention embeddings,
//!   with a capped keyword-overlap bonus fused on top of cosine similarity
//!
//! The best intention above the threshold is returned with its recommended
//! tools; otherwise the result is a fallback. Both carry up to three
//! runner-up intentions.
//!
//! # Caching
//! - normalization and keyword extraction are memoized per input
//! - complete results are cached per (normalized query, threshold)
//!
//! All caches are bounded and owned by the [`IntentEngine`] instance.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod gate;
pub mod ranking;
pub mod scoring;
pub mod text;

pub use catalog::{Catalog, CatalogEntry, ToolTable};
pub use config::EngineConfig;
pub use embedding::{EmbeddingProvider, HashingEmbedder, JsonSnapshotStore, SnapshotStore};
pub use engine::IntentEngine;
pub use error::{Result, RouterError};
pub use gate::{GateVerdict, GateWeights, IntentGate, QueryKind};
pub use ranking::{
    Alternative, Classification, Fallback, FallbackReason, IntentMatch, IntentResponse,
    ToolRecommendation,
};
