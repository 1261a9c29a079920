//! Alignment of candidate units to reference units by textual similarity.
//!
//! The default strategy is greedy: candidates are visited in corpus order,
//! each takes the best-scoring reference that is still free, and the first
//! reference seen wins a tie. [`Assignment::Optimal`] instead solves the
//! maximum-weight bipartite assignment over the whole similarity matrix.
//! Both honour a position [`Window`] and fall back to a global search only
//! for candidates with no acceptable reference inside it.

use crate::error::{Error, Result};
use crate::similarity::{Metric, Similarity};
use crate::types::{Corpus, Unit, UnitId};
use pathfinding::kuhn_munkres::{kuhn_munkres, Weights};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Scale used to turn similarity scores into integer weights.
const WEIGHT_SCALE: f64 = 1_000_000.0;

/// How sure the aligner is about a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Strict,
    Low,
    Unmatched,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Strict => "strict",
            Confidence::Low => "low",
            Confidence::Unmatched => "unmatched",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pairing of a candidate unit with at most one reference unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub candidate: UnitId,
    /// `None` when no reference unit was found.
    pub reference: Option<UnitId>,
    /// Best similarity seen, even when unmatched.
    pub score: f64,
    pub confidence: Confidence,
    /// True if the reference was found inside the position window.
    pub windowed: bool,
}

impl Match {
    fn unmatched(candidate: UnitId, score: f64) -> Self {
        Self {
            candidate,
            reference: None,
            score,
            confidence: Confidence::Unmatched,
            windowed: false,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.reference.is_some()
    }
}

/// Restrict numeric candidates to references near their expected position.
///
/// Candidate `n` looks at reference numbers in `n + offset - radius ..= n + offset + radius`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    #[serde(default)]
    pub offset: i64,
    pub radius: u32,
}

impl Window {
    pub fn new(radius: u32) -> Self {
        Self { offset: 0, radius }
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    fn contains(&self, candidate: u32, reference: u32) -> bool {
        let center = candidate as i64 + self.offset;
        (reference as i64 - center).abs() <= self.radius as i64
    }
}

/// Strategy used to assign references to candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Assignment {
    /// First-match-wins, in candidate order, no backtracking.
    #[default]
    Greedy,
    /// Maximum total similarity over all pairs (Kuhn-Munkres).
    Optimal,
}

/// Aligner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// Scores at or above this are strict matches.
    pub strict: f64,
    /// Scores at or above this (and below `strict`) are low-confidence matches.
    pub low: f64,
    pub metric: Metric,
    pub window: Option<Window>,
    pub assignment: Assignment,
    /// A claimed reference cannot be claimed again.
    pub exclusive: bool,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            strict: 0.9,
            low: 0.75,
            metric: Metric::default(),
            window: None,
            assignment: Assignment::Greedy,
            exclusive: true,
        }
    }
}

impl AlignConfig {
    pub fn with_thresholds(mut self, strict: f64, low: f64) -> Self {
        self.strict = strict;
        self.low = low;
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_window(mut self, window: Window) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_assignment(mut self, assignment: Assignment) -> Self {
        self.assignment = assignment;
        self
    }

    pub fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    /// Check that both thresholds lie in `[0, 1]` and `low <= strict`.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("strict", self.strict), ("low", self.low)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::ConfigError(format!(
                    "{} threshold {} is outside [0, 1]",
                    name, value
                )));
            }
        }
        if self.low > self.strict {
            return Err(Error::ConfigError(format!(
                "low threshold {} is above strict threshold {}",
                self.low, self.strict
            )));
        }
        Ok(())
    }

    /// Classify a score against the two thresholds.
    pub fn classify(&self, score: f64) -> Confidence {
        if score >= self.strict {
            Confidence::Strict
        } else if score >= self.low {
            Confidence::Low
        } else {
            Confidence::Unmatched
        }
    }
}

/// Similarity matrix as integer weights, padded to a square.
struct SquareMatrix {
    data: Vec<Vec<i64>>,
    size: usize,
}

impl SquareMatrix {
    fn new(scores: &[Vec<f64>], size: usize) -> Self {
        let mut data = vec![vec![0i64; size]; size];
        for (i, row) in scores.iter().enumerate() {
            for (j, score) in row.iter().enumerate() {
                data[i][j] = (score * WEIGHT_SCALE).round() as i64;
            }
        }
        Self { data, size }
    }
}

impl Weights<i64> for SquareMatrix {
    fn rows(&self) -> usize {
        self.size
    }

    fn columns(&self) -> usize {
        self.size
    }

    fn at(&self, row: usize, col: usize) -> i64 {
        self.data[row][col]
    }

    fn neg(&self) -> Self {
        let data = self
            .data
            .iter()
            .map(|row| row.iter().map(|&v| -v).collect())
            .collect();
        Self {
            data,
            size: self.size,
        }
    }
}

/// Aligns the units of a candidate corpus to those of a reference corpus.
#[derive(Debug, Clone, Default)]
pub struct Aligner {
    config: AlignConfig,
}

impl Aligner {
    pub fn new(config: AlignConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    /// Similarity of two texts under the configured metric.
    pub fn score(&self, a: &str, b: &str) -> f64 {
        self.config.metric.score(a, b)
    }

    /// Produce one match per candidate unit, in candidate order.
    pub fn align(&self, reference: &Corpus, candidate: &Corpus) -> Vec<Match> {
        log::debug!(
            "Aligning {} candidate units against {} reference units ({:?})",
            candidate.len(),
            reference.len(),
            self.config.assignment
        );
        match self.config.assignment {
            Assignment::Greedy => self.align_greedy(reference, candidate),
            Assignment::Optimal => self.align_optimal(reference, candidate),
        }
    }

    fn align_greedy(&self, reference: &Corpus, candidate: &Corpus) -> Vec<Match> {
        let refs = reference.units();
        let mut claimed: HashSet<usize> = HashSet::new();
        let mut matches = Vec::with_capacity(candidate.len());

        for unit in candidate.units() {
            let free = |j: &usize| !self.config.exclusive || !claimed.contains(j);

            let mut windowed = false;
            let mut best = None;
            if let (Some(window), Some(n)) = (self.config.window, unit.id.number()) {
                let in_window = (0..refs.len())
                    .filter(free)
                    .filter(|&j| refs[j].id.number().is_some_and(|r| window.contains(n, r)));
                best = self.best_of(unit, refs, in_window);
                match best {
                    Some((_, score)) if score >= self.config.low => windowed = true,
                    _ => {
                        log::debug!("No in-window match for {}, searching globally", unit.label);
                        best = None;
                    }
                }
            }
            if best.is_none() {
                best = self.best_of(unit, refs, (0..refs.len()).filter(free));
            }

            let m = match best {
                Some((j, score)) if score >= self.config.low => {
                    claimed.insert(j);
                    Match {
                        candidate: unit.id.clone(),
                        reference: Some(refs[j].id.clone()),
                        score,
                        confidence: self.config.classify(score),
                        windowed,
                    }
                }
                Some((_, score)) => Match::unmatched(unit.id.clone(), score),
                None => Match::unmatched(unit.id.clone(), 0.0),
            };
            matches.push(m);
        }
        matches
    }

    /// Best reference among `indices`; strict `>` keeps the first of equal scores.
    fn best_of(
        &self,
        unit: &Unit,
        refs: &[Unit],
        indices: impl Iterator<Item = usize>,
    ) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for j in indices {
            let score = self.score(&refs[j].text, &unit.text);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((j, score));
            }
        }
        best
    }

    fn align_optimal(&self, reference: &Corpus, candidate: &Corpus) -> Vec<Match> {
        let refs = reference.units();
        let cands = candidate.units();
        if refs.is_empty() || cands.is_empty() {
            return cands
                .iter()
                .map(|u| Match::unmatched(u.id.clone(), 0.0))
                .collect();
        }

        let scores: Vec<Vec<f64>> = cands
            .iter()
            .map(|c| refs.iter().map(|r| self.score(&r.text, &c.text)).collect())
            .collect();

        // With a window, a candidate that has a good in-window reference may
        // only be assigned in-window; the rest compete for any reference
        let in_window: Vec<Vec<bool>> = cands
            .iter()
            .map(|c| refs.iter().map(|r| self.in_window(c, r)).collect())
            .collect();
        let restricted: Vec<bool> = (0..cands.len())
            .map(|i| (0..refs.len()).any(|j| in_window[i][j] && scores[i][j] >= self.config.low))
            .collect();
        let allowed = |i: usize, j: usize| !restricted[i] || in_window[i][j];
        let weights: Vec<Vec<f64>> = scores
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.iter()
                    .enumerate()
                    .map(|(j, &score)| if allowed(i, j) { score } else { 0.0 })
                    .collect()
            })
            .collect();

        let size = refs.len().max(cands.len());
        let matrix = SquareMatrix::new(&weights, size);
        let (_, assignments) = kuhn_munkres(&matrix);

        cands
            .iter()
            .enumerate()
            .map(|(i, unit)| {
                let best_seen = scores[i].iter().cloned().fold(0.0, f64::max);
                match assignments.get(i) {
                    // Padding columns stand for "no reference"
                    Some(&j)
                        if j < refs.len() && allowed(i, j) && scores[i][j] >= self.config.low =>
                    {
                        Match {
                            candidate: unit.id.clone(),
                            reference: Some(refs[j].id.clone()),
                            score: scores[i][j],
                            confidence: self.config.classify(scores[i][j]),
                            windowed: in_window[i][j],
                        }
                    }
                    _ => {
                        if restricted[i] {
                            log::debug!("In-window references for {} went to other units", unit.label);
                        }
                        Match::unmatched(unit.id.clone(), best_seen)
                    }
                }
            })
            .collect()
    }

    /// Whether both units are numbered and the reference sits in the window.
    fn in_window(&self, candidate: &Unit, reference: &Unit) -> bool {
        match (self.config.window, candidate.id.number(), reference.id.number()) {
            (Some(window), Some(n), Some(r)) => window.contains(n, r),
            _ => false,
        }
    }

    /// Pair numeric ids directly: candidate `n` goes with reference `n + offset`.
    ///
    /// A paired unit is `Strict` or `Low` by its score; a candidate without a
    /// counterpart (or without a numeric id) is `Unmatched`.
    pub fn pair_by_key(&self, reference: &Corpus, candidate: &Corpus, offset: i64) -> Vec<Match> {
        candidate
            .units()
            .iter()
            .map(|unit| {
                let target = unit
                    .id
                    .number()
                    .and_then(|n| u32::try_from(n as i64 + offset).ok())
                    .and_then(|n| reference.get(&UnitId::Number(n)));
                match target {
                    Some(target) => {
                        let score = self.score(&target.text, &unit.text);
                        let confidence = if score >= self.config.strict {
                            Confidence::Strict
                        } else {
                            Confidence::Low
                        };
                        Match {
                            candidate: unit.id.clone(),
                            reference: Some(target.id.clone()),
                            score,
                            confidence,
                            windowed: false,
                        }
                    }
                    None => {
                        log::debug!("No counterpart for {} at offset {}", unit.label, offset);
                        Match::unmatched(unit.id.clone(), 0.0)
                    }
                }
            })
            .collect()
    }
}

/// Reference units that no match points at.
pub fn unclaimed<'a>(reference: &'a Corpus, matches: &[Match]) -> Vec<&'a Unit> {
    let claimed: HashSet<&UnitId> = matches.iter().filter_map(|m| m.reference.as_ref()).collect();
    reference
        .units()
        .iter()
        .filter(|u| !claimed.contains(&u.id))
        .collect()
}
