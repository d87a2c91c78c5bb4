//! Casual/task gate.
//!
//! Decides, before any embedding work, whether an utterance is small talk or
//! a task request. Weighted substring indicators and weighted regex patterns
//! vote for each side, plus a few length/shape adjustments.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::text::word_count;

// ============================================================================
// Signal Tables
// ============================================================================

/// Small talk, greetings and questions about the assistant itself
const CASUAL_INDICATORS: &[(&str, f64)] = &[
    ("hello", 2.0),
    ("good morning", 2.0),
    ("good afternoon", 2.0),
    ("good evening", 2.0),
    ("good night", 2.0),
    ("how are you", 3.0),
    ("how s it going", 3.0),
    ("how is it going", 3.0),
    ("what s up", 2.5),
    ("whats up", 2.5),
    ("how was your day", 3.0),
    ("nice to meet", 2.5),
    ("who are you", 3.0),
    ("what are you", 2.5),
    ("your name", 2.5),
    ("are you real", 3.0),
    ("are you human", 3.0),
    ("are you alive", 3.0),
    ("do you like", 2.0),
    ("do you feel", 2.0),
    ("your favorite", 2.0),
    ("your favourite", 2.0),
    ("tell me about yourself", 3.0),
    ("thank you", 2.0),
    ("thanks", 1.5),
    ("goodbye", 2.0),
    ("bye", 1.5),
    ("see you", 1.5),
    ("haha", 1.0),
    ("lol", 1.0),
    ("i m bored", 1.5),
    ("just chatting", 2.5),
];

/// Action verbs and task nouns across writing, coding, planning, learning,
/// design and analysis
const TASK_INDICATORS: &[(&str, f64)] = &[
    // writing
    ("write", 1.5),
    ("essay", 2.0),
    ("draft", 1.5),
    ("proofread", 2.0),
    ("grammar", 2.0),
    ("vocabulary", 2.0),
    ("summarize", 2.0),
    ("summary", 1.5),
    ("rewrite", 1.5),
    ("translate", 2.0),
    ("script", 1.5),
    ("story", 1.0),
    ("documentation", 2.0),
    // coding
    ("code", 1.5),
    ("debug", 2.0),
    ("program", 1.5),
    ("algorithm", 2.0),
    ("function", 1.5),
    ("website", 1.5),
    ("prototype", 1.5),
    // planning
    ("plan", 1.5),
    ("schedule", 1.5),
    ("organize", 1.5),
    ("itinerary", 2.0),
    ("travel", 1.5),
    ("budget", 2.0),
    ("prioritize", 2.0),
    ("procrastinat", 2.0),
    ("deadline", 1.5),
    // learning
    ("learn", 1.5),
    ("study", 1.5),
    ("exam", 1.5),
    ("homework", 2.0),
    ("lesson", 1.5),
    ("practice", 1.5),
    ("improve", 1.5),
    ("explain", 1.5),
    ("understand", 1.0),
    // design
    ("design", 1.5),
    ("create", 1.5),
    ("build", 1.5),
    ("generate", 1.5),
    ("interface", 1.5),
    ("meme", 1.5),
    ("marketing", 1.5),
    ("character", 1.0),
    // analysis
    ("analyze", 1.5),
    ("analyse", 1.5),
    ("analysis", 1.5),
    ("compare", 1.5),
    ("research", 1.5),
    ("calculate", 1.5),
    ("solve", 1.5),
    ("feedback", 1.5),
    ("review", 1.0),
    ("recipe", 2.0),
    ("workout", 2.0),
    ("resume", 1.5),
    ("interview", 1.5),
];

lazy_static! {
    static ref CASUAL_PATTERNS: Vec<Regex> = [
        r"^(hi|hello|hey|yo|hiya|howdy|greetings|sup)\b",
        r"\bhow (are|r) (you|u)\b",
        r"\b(who|what) are you\b",
        r"\b(are|do) you (ever |really )?(feel|think|dream|sleep|like|love|get bored|real|human|alive|conscious)\b",
        r"\b(thank you|thanks|thx)\b",
        r"^(good (morning|afternoon|evening|night)|bye|goodbye|see you|cheers)\b",
        r"\b(tell me (a bit )?about yourself|what( s|s| is) your name)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();

    static ref TASK_PATTERNS: Vec<Regex> = [
        r"\b(help|assist) me (with|to|write|plan|create|learn|understand|fix|make)\b",
        r"\b(i|we) (want|need|would like) to\b",
        r"\b(can|could|would) you (please )?(help|write|make|create|explain|plan|show|give|generate|summarize|translate|review|check|fix)\b",
        r"^(please )?(write|create|make|generate|plan|design|explain|summarize|translate|build|fix|debug|review|list|compare|draft|outline)\b",
        r"\bhow (to|do i|can i|should i)\b",
        r"\b(step[- ]by[- ]step|best way to|tips (for|on))\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();
}

const QUESTION_WORDS: &[&str] = &["what", "how", "why", "when", "where", "who", "which"];

const ASSISTANT_REFERENCES: &[&str] = &["your", "you are", "you have"];

const HOW_TO_PREFIXES: &[&str] = &["how to", "how do", "how can"];

// ============================================================================
// Weights
// ============================================================================

/// Weights and cut-offs for the contextual adjustments
#[derive(Debug, Clone)]
pub struct GateWeights {
    /// Per matching regex pattern (either side)
    pub pattern: f64,
    /// Casual bonus for queries of at most `short_max_words` words
    pub short_query: f64,
    pub short_max_words: usize,
    /// Task bonus for queries longer than `long_min_words` words
    pub long_query: f64,
    pub long_min_words: usize,
    /// Casual bonus for a question about the assistant itself
    pub about_assistant: f64,
    /// Task bonus for "how to / how do / how can" questions
    pub how_to: f64,
    /// Casual bonus when nothing but stop-words remain
    pub no_keywords: f64,
    /// With no signal at all, questions up to this many words lean casual
    pub undecided_question_words: usize,
    pub undecided_casual_confidence: f64,
    pub undecided_task_confidence: f64,
}

impl Default for GateWeights {
    fn default() -> Self {
        Self {
            pattern: 2.0,
            short_query: 1.0,
            short_max_words: 3,
            long_query: 1.0,
            long_min_words: 10,
            about_assistant: 1.5,
            how_to: 1.5,
            no_keywords: 0.5,
            undecided_question_words: 6,
            undecided_casual_confidence: 0.7,
            undecided_task_confidence: 0.6,
        }
    }
}

// ============================================================================
// Verdict
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Casual,
    Task,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GateVerdict {
    pub kind: QueryKind,
    /// In [0.5, 0.95]; never certain
    pub confidence: f64,
    pub casual_score: f64,
    pub task_score: f64,
}

impl GateVerdict {
    pub fn is_casual(&self) -> bool {
        self.kind == QueryKind::Casual
    }
}

// ============================================================================
// Gate
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct IntentGate {
    weights: GateWeights,
}

impl IntentGate {
    pub fn new(weights: GateWeights) -> Self {
        Self { weights }
    }

    /// Classify a normalized query as casual or task. `keywords` must be
    /// extracted from the same normalized text; nothing else is read, so
    /// equal normalized inputs always get equal verdicts.
    pub fn classify(&self, text: &str, keywords: &BTreeSet<String>) -> GateVerdict {
        let w = &self.weights;
        let words = word_count(text);

        let mut casual = indicator_score(text, CASUAL_INDICATORS)
            + pattern_hits(text, &CASUAL_PATTERNS) as f64 * w.pattern;
        let mut task = indicator_score(text, TASK_INDICATORS)
            + pattern_hits(text, &TASK_PATTERNS) as f64 * w.pattern;

        if words <= w.short_max_words {
            casual += w.short_query;
        }
        if words > w.long_min_words {
            task += w.long_query;
        }

        let question = starts_with_question_word(text);
        if question && ASSISTANT_REFERENCES.iter().any(|r| text.contains(r)) {
            casual += w.about_assistant;
        }
        if HOW_TO_PREFIXES.iter().any(|p| text.starts_with(p)) {
            task += w.how_to;
        }
        if keywords.is_empty() {
            casual += w.no_keywords;
        }

        if casual == 0.0 && task == 0.0 {
            let question_like = text.ends_with('?') || question;
            return if question_like && words <= w.undecided_question_words {
                GateVerdict {
                    kind: QueryKind::Casual,
                    confidence: w.undecided_casual_confidence,
                    casual_score: 0.0,
                    task_score: 0.0,
                }
            } else {
                GateVerdict {
                    kind: QueryKind::Task,
                    confidence: w.undecided_task_confidence,
                    casual_score: 0.0,
                    task_score: 0.0,
                }
            };
        }

        let total = casual + task;
        let casual_confidence = casual / total;
        let task_confidence = task / total;

        // Ties go to the task side
        let (kind, winning) = if casual_confidence > task_confidence {
            (QueryKind::Casual, casual_confidence)
        } else {
            (QueryKind::Task, task_confidence)
        };

        GateVerdict {
            kind,
            confidence: (0.5 + winning * 0.4).min(0.95),
            casual_score: casual,
            task_score: task,
        }
    }
}

fn indicator_score(text: &str, indicators: &[(&str, f64)]) -> f64 {
    indicators
        .iter()
        .filter(|(needle, _)| text.contains(needle))
        .map(|(_, weight)| weight)
        .sum()
}

fn pattern_hits(text: &str, patterns: &[Regex]) -> usize {
    patterns.iter().filter(|re| re.is_match(text)).count()
}

fn starts_with_question_word(normalized: &str) -> bool {
    normalized
        .split_whitespace()
        .next()
        .map(|first| first.trim_end_matches(|c: char| !c.is_alphanumeric()))
        .is_some_and(|first| QUESTION_WORDS.contains(&first))
}
