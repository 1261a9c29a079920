//! Text differ producing tagged spans over two strings.
//!
//! The matcher finds the longest matching block between the two token
//! sequences, recurses on the unmatched regions to either side, merges
//! adjacent blocks and converts the result into `equal / replace / delete /
//! insert` opcodes. On long sequences, tokens that occur in more than 1% of
//! the second sequence are not used as anchors (they still take part when a
//! match is extended), which keeps matching fast on prose with many spaces.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::ops::Range;
use std::sync::LazyLock;

/// Whitespace runs and non-whitespace runs, alternating.
static WORD_TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+|\S+").unwrap());

/// Minimum length of the second sequence before popular tokens are dropped as anchors.
const AUTOJUNK_MIN_LEN: usize = 200;

/// Kind of a diff span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiffTag {
    Equal,
    Replace,
    Delete,
    Insert,
}

impl DiffTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffTag::Equal => "equal",
            DiffTag::Replace => "replace",
            DiffTag::Delete => "delete",
            DiffTag::Insert => "insert",
        }
    }
}

/// A tagged region over the old and new texts (byte ranges).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSpan {
    pub tag: DiffTag,
    pub old: Range<usize>,
    pub new: Range<usize>,
}

impl DiffSpan {
    /// The old-side text of this span.
    pub fn old_text<'a>(&self, old: &'a str) -> &'a str {
        &old[self.old.clone()]
    }

    /// The new-side text of this span.
    pub fn new_text<'a>(&self, new: &'a str) -> &'a str {
        &new[self.new.clone()]
    }
}

/// Unit of comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Compare character by character.
    #[default]
    Char,
    /// Compare words; whitespace runs are separate tokens.
    Word,
    /// Compare whole lines.
    Line,
}

/// Differ configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    pub granularity: Granularity,
    /// Skip popular tokens as anchors on long inputs.
    pub autojunk: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::Char,
            autojunk: true,
        }
    }
}

/// A matching block: `a[a..a+size] == b[b..b+size]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchBlock {
    pub a: usize,
    pub b: usize,
    pub size: usize,
}

/// An opcode over token indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opcode {
    pub tag: DiffTag,
    pub a: Range<usize>,
    pub b: Range<usize>,
}

/// Longest-matching-block sequence matcher over any hashable tokens.
pub struct SequenceMatcher<'a, T: Eq + Hash> {
    a: &'a [T],
    b: &'a [T],
    b2j: HashMap<&'a T, Vec<usize>>,
}

impl<'a, T: Eq + Hash> SequenceMatcher<'a, T> {
    pub fn new(a: &'a [T], b: &'a [T]) -> Self {
        Self::with_autojunk(a, b, true)
    }

    pub fn with_autojunk(a: &'a [T], b: &'a [T], autojunk: bool) -> Self {
        let mut b2j: HashMap<&'a T, Vec<usize>> = HashMap::new();
        for (j, item) in b.iter().enumerate() {
            b2j.entry(item).or_default().push(j);
        }

        let n = b.len();
        if autojunk && n >= AUTOJUNK_MIN_LEN {
            let ntest = n / 100 + 1;
            b2j.retain(|_, idxs| idxs.len() <= ntest);
        }

        Self { a, b, b2j }
    }

    /// Find the longest matching block in `a[alo..ahi]` and `b[blo..bhi]`.
    ///
    /// Among blocks of maximal size, the one starting earliest in `a` wins,
    /// then the one starting earliest in `b`.
    pub fn find_longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> MatchBlock {
        let (a, b) = (self.a, self.b);
        let (mut besti, mut bestj, mut bestsize) = (alo, blo, 0usize);

        let mut j2len: HashMap<usize, usize> = HashMap::new();
        for i in alo..ahi {
            let mut new_j2len: HashMap<usize, usize> = HashMap::new();
            if let Some(indices) = self.b2j.get(&a[i]) {
                for &j in indices {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    new_j2len.insert(j, k);
                    if k > bestsize {
                        besti = i + 1 - k;
                        bestj = j + 1 - k;
                        bestsize = k;
                    }
                }
            }
            j2len = new_j2len;
        }

        // Extend with tokens that were not indexed as anchors
        while besti > alo && bestj > blo && a[besti - 1] == b[bestj - 1] {
            besti -= 1;
            bestj -= 1;
            bestsize += 1;
        }
        while besti + bestsize < ahi
            && bestj + bestsize < bhi
            && a[besti + bestsize] == b[bestj + bestsize]
        {
            bestsize += 1;
        }

        MatchBlock {
            a: besti,
            b: bestj,
            size: bestsize,
        }
    }

    /// All matching blocks in order, adjacent blocks merged, terminated by a
    /// zero-size sentinel at `(len(a), len(b))`.
    pub fn matching_blocks(&self) -> Vec<MatchBlock> {
        let (la, lb) = (self.a.len(), self.b.len());
        let mut queue = vec![(0, la, 0, lb)];
        let mut blocks = Vec::new();

        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let m = self.find_longest_match(alo, ahi, blo, bhi);
            if m.size > 0 {
                blocks.push(m);
                if alo < m.a && blo < m.b {
                    queue.push((alo, m.a, blo, m.b));
                }
                if m.a + m.size < ahi && m.b + m.size < bhi {
                    queue.push((m.a + m.size, ahi, m.b + m.size, bhi));
                }
            }
        }
        blocks.sort_by_key(|m| (m.a, m.b, m.size));

        let mut merged: Vec<MatchBlock> = Vec::with_capacity(blocks.len() + 1);
        for block in blocks {
            if let Some(last) = merged.last_mut() {
                if last.a + last.size == block.a && last.b + last.size == block.b {
                    last.size += block.size;
                    continue;
                }
            }
            merged.push(block);
        }
        merged.push(MatchBlock {
            a: la,
            b: lb,
            size: 0,
        });
        merged
    }

    /// Opcodes describing how to turn `a` into `b`.
    pub fn opcodes(&self) -> Vec<Opcode> {
        let (mut i, mut j) = (0, 0);
        let mut answer = Vec::new();

        for block in self.matching_blocks() {
            let tag = if i < block.a && j < block.b {
                Some(DiffTag::Replace)
            } else if i < block.a {
                Some(DiffTag::Delete)
            } else if j < block.b {
                Some(DiffTag::Insert)
            } else {
                None
            };
            if let Some(tag) = tag {
                answer.push(Opcode {
                    tag,
                    a: i..block.a,
                    b: j..block.b,
                });
            }
            i = block.a + block.size;
            j = block.b + block.size;
            if block.size > 0 {
                answer.push(Opcode {
                    tag: DiffTag::Equal,
                    a: block.a..i,
                    b: block.b..j,
                });
            }
        }
        answer
    }

    /// Similarity ratio `2*M / T` in `[0, 1]`; 1.0 for two empty sequences.
    pub fn ratio(&self) -> f64 {
        let total = self.a.len() + self.b.len();
        if total == 0 {
            return 1.0;
        }
        let matches: usize = self.matching_blocks().iter().map(|m| m.size).sum();
        2.0 * matches as f64 / total as f64
    }
}

/// Split text into tokens with their byte offsets.
fn tokenize(text: &str, granularity: Granularity) -> Vec<(usize, &str)> {
    match granularity {
        Granularity::Char => text
            .char_indices()
            .map(|(i, c)| (i, &text[i..i + c.len_utf8()]))
            .collect(),
        Granularity::Word => WORD_TOKEN_REGEX
            .find_iter(text)
            .map(|m| (m.start(), m.as_str()))
            .collect(),
        Granularity::Line => {
            let mut offset = 0;
            text.split_inclusive('\n')
                .map(|line| {
                    let start = offset;
                    offset += line.len();
                    (start, line)
                })
                .collect()
        }
    }
}

/// Byte offset of token `index`, or the text length past the end.
fn byte_offset(tokens: &[(usize, &str)], index: usize, text_len: usize) -> usize {
    tokens.get(index).map(|(start, _)| *start).unwrap_or(text_len)
}

/// Counts of changed tokens in a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub equal: usize,
    pub inserted: usize,
    pub deleted: usize,
    pub replaced: usize,
}

/// Result of comparing two texts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDiff {
    pub spans: Vec<DiffSpan>,
    /// Similarity ratio of the token sequences.
    pub ratio: f64,
}

impl TextDiff {
    /// True when every span is `Equal`.
    pub fn is_unchanged(&self) -> bool {
        self.spans.iter().all(|s| s.tag == DiffTag::Equal)
    }
}

/// Text differ.
#[derive(Debug, Clone, Default)]
pub struct Differ {
    config: DiffConfig,
}

impl Differ {
    pub fn new(config: DiffConfig) -> Self {
        Self { config }
    }

    /// A differ at the given granularity with default settings.
    pub fn with_granularity(granularity: Granularity) -> Self {
        Self::new(DiffConfig {
            granularity,
            ..DiffConfig::default()
        })
    }

    pub fn config(&self) -> &DiffConfig {
        &self.config
    }

    /// Diff two texts into spans that cover both inputs without gaps or overlaps.
    pub fn diff(&self, old: &str, new: &str) -> Vec<DiffSpan> {
        self.compare(old, new).spans
    }

    /// Diff two texts and compute the similarity ratio in one pass.
    pub fn compare(&self, old: &str, new: &str) -> TextDiff {
        if old.is_empty() && new.is_empty() {
            return TextDiff {
                spans: vec![DiffSpan {
                    tag: DiffTag::Equal,
                    old: 0..0,
                    new: 0..0,
                }],
                ratio: 1.0,
            };
        }

        let old_tokens = tokenize(old, self.config.granularity);
        let new_tokens = tokenize(new, self.config.granularity);
        let a: Vec<&str> = old_tokens.iter().map(|(_, t)| *t).collect();
        let b: Vec<&str> = new_tokens.iter().map(|(_, t)| *t).collect();

        let matcher = SequenceMatcher::with_autojunk(&a, &b, self.config.autojunk);
        let opcodes = matcher.opcodes();

        let mut matched = 0usize;
        let spans = opcodes
            .into_iter()
            .map(|op| {
                if op.tag == DiffTag::Equal {
                    matched += op.a.len();
                }
                DiffSpan {
                    tag: op.tag,
                    old: byte_offset(&old_tokens, op.a.start, old.len())
                        ..byte_offset(&old_tokens, op.a.end, old.len()),
                    new: byte_offset(&new_tokens, op.b.start, new.len())
                        ..byte_offset(&new_tokens, op.b.end, new.len()),
                }
            })
            .collect();

        let total = a.len() + b.len();
        let ratio = if total == 0 {
            1.0
        } else {
            2.0 * matched as f64 / total as f64
        };

        TextDiff { spans, ratio }
    }

    /// Token-level change counts for two texts.
    pub fn stats(&self, old: &str, new: &str) -> DiffStats {
        let old_tokens = tokenize(old, self.config.granularity);
        let new_tokens = tokenize(new, self.config.granularity);
        let a: Vec<&str> = old_tokens.iter().map(|(_, t)| *t).collect();
        let b: Vec<&str> = new_tokens.iter().map(|(_, t)| *t).collect();

        let mut stats = DiffStats::default();
        for op in SequenceMatcher::with_autojunk(&a, &b, self.config.autojunk).opcodes() {
            match op.tag {
                DiffTag::Equal => stats.equal += op.a.len(),
                DiffTag::Insert => stats.inserted += op.b.len(),
                DiffTag::Delete => stats.deleted += op.a.len(),
                DiffTag::Replace => stats.replaced += op.a.len().max(op.b.len()),
            }
        }
        stats
    }
}

/// Character-level similarity ratio of two strings.
pub fn char_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    SequenceMatcher::new(&a, &b).ratio()
}
