//! Similarity scores between two texts, all in `[0, 1]`.
//!
//! Every scorer returns exactly 1.0 for identical strings and 0.0 when
//! exactly one side is blank.

use crate::diff::char_ratio;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// Any run of word characters.
static WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").unwrap());

/// Runs of two or more word characters.
static WORD2_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").unwrap());

/// A similarity measure over two texts.
pub trait Similarity {
    /// Score in `[0, 1]`, where 1 means identical.
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Shortcuts shared by all scorers.
fn trivial_score(a: &str, b: &str) -> Option<f64> {
    if a == b {
        return Some(1.0);
    }
    match (a.trim().is_empty(), b.trim().is_empty()) {
        (true, true) => Some(1.0),
        (true, false) | (false, true) => Some(0.0),
        (false, false) => None,
    }
}

/// Which tokens the TF-IDF vectorizer counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPattern {
    /// Every word, including single characters.
    Word,
    /// Words of two or more characters.
    #[default]
    Default,
}

impl TokenPattern {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let regex = match self {
            TokenPattern::Word => &*WORD_REGEX,
            TokenPattern::Default => &*WORD2_REGEX,
        };
        let lower = text.to_lowercase();
        regex
            .find_iter(&lower)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

/// Cosine similarity of TF-IDF vectors fitted on the two texts.
///
/// Term frequencies are raw counts, idf is smoothed as
/// `ln((1 + n) / (1 + df)) + 1` with `n = 2`, vectors are L2 normalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TfidfCosine {
    pub tokens: TokenPattern,
}

impl TfidfCosine {
    pub fn new(tokens: TokenPattern) -> Self {
        Self { tokens }
    }
}

impl Similarity for TfidfCosine {
    fn score(&self, a: &str, b: &str) -> f64 {
        if let Some(score) = trivial_score(a, b) {
            return score;
        }

        let docs = [self.tokens.tokenize(a), self.tokens.tokenize(b)];
        let counts: Vec<HashMap<&str, f64>> = docs
            .iter()
            .map(|tokens| {
                let mut tf: HashMap<&str, f64> = HashMap::new();
                for token in tokens {
                    *tf.entry(token.as_str()).or_insert(0.0) += 1.0;
                }
                tf
            })
            .collect();

        let n = docs.len() as f64;
        let idf = |term: &str| {
            let df = counts.iter().filter(|tf| tf.contains_key(term)).count() as f64;
            ((1.0 + n) / (1.0 + df)).ln() + 1.0
        };

        let weights: Vec<HashMap<&str, f64>> = counts
            .iter()
            .map(|tf| tf.iter().map(|(term, count)| (*term, count * idf(term))).collect())
            .collect();

        let norm = |w: &HashMap<&str, f64>| w.values().map(|v| v * v).sum::<f64>().sqrt();
        let (norm_a, norm_b) = (norm(&weights[0]), norm(&weights[1]));
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        let dot: f64 = weights[0]
            .iter()
            .filter_map(|(term, wa)| weights[1].get(term).map(|wb| wa * wb))
            .sum();

        (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
    }
}

/// Character sequence ratio `2*M / T` from the differ's matcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceRatio;

impl Similarity for SequenceRatio {
    fn score(&self, a: &str, b: &str) -> f64 {
        if let Some(score) = trivial_score(a, b) {
            return score;
        }
        char_ratio(a, b)
    }
}

/// Loose word overlap: containment ratio when one text contains the other,
/// else Jaccard similarity of the word sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WordOverlap;

impl Similarity for WordOverlap {
    fn score(&self, a: &str, b: &str) -> f64 {
        if let Some(score) = trivial_score(a, b) {
            return score;
        }

        // One contains the other
        if a.contains(b) || b.contains(a) {
            let shorter = a.len().min(b.len()) as f64;
            let longer = a.len().max(b.len()) as f64;
            return shorter / longer;
        }

        let words_a: HashSet<&str> = a.split_whitespace().collect();
        let words_b: HashSet<&str> = b.split_whitespace().collect();
        if words_a.is_empty() || words_b.is_empty() {
            return 0.0;
        }

        let intersection = words_a.intersection(&words_b).count() as f64;
        let union = words_a.union(&words_b).count() as f64;
        intersection / union
    }
}

/// Configurable choice of similarity measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Metric {
    Tfidf {
        #[serde(default)]
        tokens: TokenPattern,
    },
    SequenceRatio,
    WordOverlap,
}

impl Default for Metric {
    fn default() -> Self {
        Metric::Tfidf {
            tokens: TokenPattern::Default,
        }
    }
}

impl Similarity for Metric {
    fn score(&self, a: &str, b: &str) -> f64 {
        match self {
            Metric::Tfidf { tokens } => TfidfCosine::new(*tokens).score(a, b),
            Metric::SequenceRatio => SequenceRatio.score(a, b),
            Metric::WordOverlap => WordOverlap.score(a, b),
        }
    }
}
