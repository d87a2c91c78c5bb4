//! Ranking, the match/fallback decision, and the result types.

use serde::{Deserialize, Serialize};

use crate::catalog::ToolTable;
use crate::config::EngineConfig;
use crate::embedding::EmbeddingStore;
use crate::scoring::ScoredIntention;

// ============================================================================
// Result Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRecommendation {
    pub name: String,
    pub description: String,
    pub confidence: f64,
}

/// A runner-up intention with its raw fused score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub intention: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The gate classified the query as small talk
    Casual,
    /// The best fused score did not reach the threshold
    BelowThreshold,
    /// Scoring failed; the error was logged
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentMatch {
    pub intention: String,
    /// Fused score of the match; may exceed 1.0
    pub confidence: f64,
    pub tools: Vec<ToolRecommendation>,
    pub alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fallback {
    pub reason: FallbackReason,
    /// Best fused score for `BelowThreshold`, 0.0 otherwise
    pub confidence: f64,
    pub alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Classification {
    Match(IntentMatch),
    Fallback(Fallback),
}

impl Classification {
    pub fn casual() -> Self {
        Classification::Fallback(Fallback {
            reason: FallbackReason::Casual,
            confidence: 0.0,
            alternatives: Vec::new(),
        })
    }

    pub fn failed() -> Self {
        Classification::Fallback(Fallback {
            reason: FallbackReason::Failed,
            confidence: 0.0,
            alternatives: Vec::new(),
        })
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Classification::Fallback(_))
    }

    pub fn matched_intention(&self) -> Option<&str> {
        match self {
            Classification::Match(m) => Some(&m.intention),
            Classification::Fallback(_) => None,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Classification::Match(m) => m.confidence,
            Classification::Fallback(f) => f.confidence,
        }
    }

    pub fn alternatives(&self) -> &[Alternative] {
        match self {
            Classification::Match(m) => &m.alternatives,
            Classification::Fallback(f) => &f.alternatives,
        }
    }

    pub fn tools(&self) -> &[ToolRecommendation] {
        match self {
            Classification::Match(m) => &m.tools,
            Classification::Fallback(_) => &[],
        }
    }

    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match self {
            Classification::Match(_) => None,
            Classification::Fallback(f) => Some(f.reason),
        }
    }
}

/// Flat response shape for callers that expect a nullable match field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResponse {
    pub matched_intention: Option<String>,
    pub confidence: f64,
    pub recommended_tools: Vec<ToolRecommendation>,
    pub is_fallback: bool,
    pub alternative_intentions: Vec<Alternative>,
}

impl IntentResponse {
    /// Response used when the request could not be processed at all
    pub fn empty() -> Self {
        IntentResponse::from(&Classification::failed())
    }
}

impl From<&Classification> for IntentResponse {
    fn from(result: &Classification) -> Self {
        IntentResponse {
            matched_intention: result.matched_intention().map(str::to_string),
            confidence: result.confidence(),
            recommended_tools: result.tools().to_vec(),
            is_fallback: result.is_fallback(),
            alternative_intentions: result.alternatives().to_vec(),
        }
    }
}

// ============================================================================
// Ranker
// ============================================================================

#[derive(Debug, Clone)]
pub struct Ranker {
    max_alternatives: usize,
    tool_confidence_factor: f64,
    max_recommended_tools: Option<usize>,
}

impl Ranker {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_alternatives: config.max_alternatives,
            tool_confidence_factor: config.tool_confidence_factor,
            max_recommended_tools: config.max_recommended_tools,
        }
    }

    /// Sort by fused score and accept the top intention if it clears
    /// `threshold`. Runner-ups are reported either way.
    pub fn decide(
        &self,
        store: &EmbeddingStore,
        mut scored: Vec<ScoredIntention>,
        threshold: f64,
        tools: &ToolTable,
    ) -> Classification {
        // Stable: equal scores keep catalog order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));

        let Some(top) = scored.first() else {
            return Classification::Fallback(Fallback {
                reason: FallbackReason::BelowThreshold,
                confidence: 0.0,
                alternatives: Vec::new(),
            });
        };

        let intentions = store.intentions();
        let alternatives: Vec<Alternative> = scored
            .iter()
            .skip(1)
            .take(self.max_alternatives)
            .map(|s| Alternative {
                intention: intentions[s.index].name.clone(),
                score: s.score,
            })
            .collect();

        // Non-finite thresholds never match
        if !threshold.is_finite() || top.score < threshold {
            return Classification::Fallback(Fallback {
                reason: FallbackReason::BelowThreshold,
                confidence: top.score,
                alternatives,
            });
        }

        let intention = &intentions[top.index];
        let tool_confidence = (top.score * self.tool_confidence_factor).min(1.0);
        let limit = self.max_recommended_tools.unwrap_or(usize::MAX);
        let recommended = intention
            .tools
            .iter()
            .take(limit)
            .map(|name| ToolRecommendation {
                name: name.clone(),
                description: tools.describe(name).to_string(),
                confidence: tool_confidence,
            })
            .collect();

        Classification::Match(IntentMatch {
            intention: intention.name.clone(),
            confidence: top.score,
            tools: recommended,
            alternatives,
        })
    }
}
