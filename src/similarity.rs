//! # Title Similarity
//! Scoring functions used by the deduplicator to collapse near-duplicate
//! headlines ("Fed raises rates" vs "Fed Raises Rates!!").
//!
//! The scorer is a trait so the dedup set/history logic can be tested and
//! tuned independently of the metric. The default is a token-set (Jaccard)
//! comparison; a normalized-Levenshtein variant via `strsim` is available
//! for shorter, character-level titles.

use std::collections::BTreeSet;

/// Pluggable similarity metric over two text items.
///
/// Contract: `score(a, b)` is in `[0.0, 1.0]`, symmetric, and
/// `score(a, a) == 1.0`. Implementations must be pure.
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f32;
}

/// Jaccard similarity over normalized word tokens.
///
/// Case-insensitive, punctuation-stripped; empty inputs compare equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSetScorer;

impl SimilarityScorer for TokenSetScorer {
    fn score(&self, a: &str, b: &str) -> f32 {
        let ta = tokenize(a);
        let tb = tokenize(b);
        if ta.is_empty() && tb.is_empty() {
            return 1.0;
        }
        if ta.is_empty() || tb.is_empty() {
            return 0.0;
        }
        let inter = ta.intersection(&tb).count();
        let union = ta.union(&tb).count();
        inter as f32 / union as f32
    }
}

/// Character-level alternative backed by `strsim`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EditDistanceScorer;

impl SimilarityScorer for EditDistanceScorer {
    fn score(&self, a: &str, b: &str) -> f32 {
        let na = normalize(a);
        let nb = normalize(b);
        if na.is_empty() && nb.is_empty() {
            return 1.0;
        }
        strsim::normalized_levenshtein(&na, &nb) as f32
    }
}

/// Lowercase, keep alphanumerics, collapse everything else to single spaces.
pub fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for ch in s.chars() {
        if ch.is_alphanumeric() {
            for lc in ch.to_lowercase() {
                out.push(lc);
            }
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim().to_string()
}

fn tokenize(s: &str) -> BTreeSet<String> {
    normalize(s)
        .split_whitespace()
        .map(|t| t.to_string())
        .collect()
}
