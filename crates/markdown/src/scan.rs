//! Side-channel scanners: image references, tables, links, code and headings.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::LazyLock;

/// Markdown image target, title included.
static MD_IMAGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\(([^)]+)\)").unwrap());

/// HTML `<img>` source, either quote style, other attributes allowed.
static HTML_IMAGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).unwrap()
});

static INLINE_LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(!?)\[([^\]]*)\]\(\s*([^)\s]*)(?:\s+"[^"]*")?\s*\)"#).unwrap()
});

static REFERENCE_DEF_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}\[([^\]]+)\]:\s*(\S*)").unwrap());

static REFERENCE_USE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\[([^\]]*)\]").unwrap());

static AUTOLINK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<((?:https?|mailto):[^>\s]+)>").unwrap());

static BARE_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)https?://[^\s<>"'()\[\]{}]+"#).unwrap());

static HTML_ANCHOR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\b[^>]*?\bhref\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a>"#).unwrap()
});

/// Explicit anchors: `<a name="x">` or any element with `id="x"`.
static HTML_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<[a-z][^>]*?\b(?:name|id)\s*=\s*["']([^"']+)["']"#).unwrap()
});

static HEADING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}(#{1,6})\s+(.*?)(?:\s+#+)?\s*$").unwrap());

static FENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(?:```|~~~)").unwrap());

static CODE_BLOCK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:\w+\n)?(.*?)```").unwrap());

static CODE_SPAN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`\n]+)`").unwrap());

/// A trailing link to a Markdown file, as left by the export tool for the
/// parent topic.
static PARENT_TOPIC_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[.+\]\(.+\.md\)\s*$").unwrap());

/// Image file names referenced by a document, de-duplicated, in order of
/// first appearance.
pub fn image_refs(content: &str) -> Vec<String> {
    let md = MD_IMAGE_REGEX
        .captures_iter(content)
        .map(|c| (c.get(0).map_or(0, |m| m.start()), c[1].to_string()));
    let html = HTML_IMAGE_REGEX
        .captures_iter(content)
        .map(|c| (c.get(0).map_or(0, |m| m.start()), c[1].to_string()));

    let mut sources: Vec<(usize, String)> = md.chain(html).collect();
    sources.sort_by_key(|(pos, _)| *pos);

    let mut names: Vec<String> = Vec::new();
    for (_, src) in sources {
        let mut cleaned = src.trim();
        // A local path may carry a title after a space
        if !cleaned.starts_with("http://") && !cleaned.starts_with("https://") {
            cleaned = cleaned.split_whitespace().next().unwrap_or("");
        }
        let name = basename(cleaned.trim_matches(|c| c == '<' || c == '>'));
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// A run of consecutive lines containing `|`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableBlock {
    /// 1-based line of the first row.
    pub line: usize,
    pub rows: Vec<String>,
}

/// Find pipe tables: two or more consecutive lines containing `|`.
pub fn find_tables(content: &str) -> Vec<TableBlock> {
    let mut tables = Vec::new();
    let mut current: Option<TableBlock> = None;

    for (idx, line) in content.lines().enumerate() {
        if line.contains('|') {
            current
                .get_or_insert_with(|| TableBlock {
                    line: idx + 1,
                    rows: Vec::new(),
                })
                .rows
                .push(line.to_string());
        } else if let Some(table) = current.take() {
            if table.rows.len() >= 2 {
                tables.push(table);
            }
        }
    }
    if let Some(table) = current {
        if table.rows.len() >= 2 {
            tables.push(table);
        }
    }
    tables
}

/// Check a pipe table: outer pipes on every row, a separator of dashes and
/// colons, and one column count throughout.
pub fn verify_table_format(table: &TableBlock) -> std::result::Result<(), String> {
    let rows: Vec<&str> = table.rows.iter().map(|r| r.trim()).collect();
    if rows.len() < 2 {
        return Err("table needs a header and a separator row".to_string());
    }

    let header = rows[0];
    if !has_outer_pipes(header) {
        return Err("header row is missing outer pipes".to_string());
    }
    let separator = rows[1];
    if !has_outer_pipes(separator) {
        return Err("separator row is missing outer pipes".to_string());
    }
    for part in separator[1..separator.len() - 1].split('|') {
        let part = part.trim();
        if part.is_empty() || !part.chars().all(|c| matches!(c, '-' | ':' | ' ')) {
            return Err(format!("invalid separator cell '{}'", part));
        }
        if !part.contains('-') {
            return Err(format!("separator cell '{}' has no dash", part));
        }
    }

    let columns = column_count(header);
    if column_count(separator) != columns {
        return Err(format!(
            "separator has {} columns, header has {}",
            column_count(separator),
            columns
        ));
    }
    for (idx, row) in rows.iter().enumerate().skip(2) {
        if row.is_empty() {
            continue;
        }
        if !has_outer_pipes(row) {
            return Err(format!("row {} is missing outer pipes", idx + 1));
        }
        if column_count(row) != columns {
            return Err(format!(
                "row {} has {} columns, header has {}",
                idx + 1,
                column_count(row),
                columns
            ));
        }
    }
    Ok(())
}

fn has_outer_pipes(row: &str) -> bool {
    row.len() >= 2 && row.starts_with('|') && row.ends_with('|')
}

fn column_count(row: &str) -> usize {
    row.split('|').count().saturating_sub(2)
}

/// How a link was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// `[text](target)`
    Inline,
    /// `[text][label]` resolved through a `[label]: target` definition.
    Reference,
    /// `<https://...>`
    Autolink,
    BareUrl,
    /// `<a href="...">text</a>`
    Html,
}

/// A link found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub kind: LinkKind,
    pub text: String,
    /// Resolved target. Empty for an empty target or an undefined reference.
    pub target: String,
    /// 1-based line number.
    pub line: usize,
}

impl Link {
    /// The `#fragment` part of the target, if any.
    pub fn fragment(&self) -> Option<&str> {
        self.target.split_once('#').map(|(_, f)| f)
    }

    /// The target without its fragment.
    pub fn path(&self) -> &str {
        self.target.split('#').next().unwrap_or("")
    }

    pub fn is_external(&self) -> bool {
        let lower = self.target.to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("mailto:")
    }
}

/// Lines inside fenced code blocks, fence lines included.
fn fenced_lines(lines: &[&str]) -> Vec<bool> {
    let mut in_fence = false;
    lines
        .iter()
        .map(|line| {
            if FENCE_REGEX.is_match(line) {
                in_fence = !in_fence;
                true
            } else {
                in_fence
            }
        })
        .collect()
}

/// Every link in a document, in reading order. Code blocks are skipped.
pub fn links(content: &str) -> Vec<Link> {
    let lines: Vec<&str> = content.lines().collect();
    let fenced = fenced_lines(&lines);

    let mut definitions: HashMap<String, String> = HashMap::new();
    for (line, _) in lines.iter().zip(&fenced).filter(|(_, f)| !**f) {
        if let Some(c) = REFERENCE_DEF_REGEX.captures(line) {
            definitions
                .entry(c[1].to_lowercase())
                .or_insert_with(|| c[2].to_string());
        }
    }

    let mut found = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if fenced[idx] || REFERENCE_DEF_REGEX.is_match(line) {
            continue;
        }
        let number = idx + 1;
        let mut taken: Vec<Range<usize>> = Vec::new();
        let mut on_line: Vec<(usize, Link)> = Vec::new();

        for c in INLINE_LINK_REGEX.captures_iter(line) {
            let Some(whole) = c.get(0) else { continue };
            taken.push(whole.range());
            if &c[1] == "!" {
                continue;
            }
            on_line.push((
                whole.start(),
                Link {
                    kind: LinkKind::Inline,
                    text: c[2].to_string(),
                    target: c[3].to_string(),
                    line: number,
                },
            ));
        }

        for c in REFERENCE_USE_REGEX.captures_iter(line) {
            let Some(whole) = c.get(0) else { continue };
            if overlaps(&taken, &whole.range()) {
                continue;
            }
            taken.push(whole.range());
            let label = if c[2].is_empty() { &c[1] } else { &c[2] };
            on_line.push((
                whole.start(),
                Link {
                    kind: LinkKind::Reference,
                    text: c[1].to_string(),
                    target: definitions
                        .get(&label.to_lowercase())
                        .cloned()
                        .unwrap_or_default(),
                    line: number,
                },
            ));
        }

        for c in AUTOLINK_REGEX.captures_iter(line) {
            let Some(whole) = c.get(0) else { continue };
            taken.push(whole.range());
            on_line.push((
                whole.start(),
                Link {
                    kind: LinkKind::Autolink,
                    text: c[1].to_string(),
                    target: c[1].to_string(),
                    line: number,
                },
            ));
        }

        for c in HTML_ANCHOR_REGEX.captures_iter(line) {
            let Some(whole) = c.get(0) else { continue };
            taken.push(whole.range());
            on_line.push((
                whole.start(),
                Link {
                    kind: LinkKind::Html,
                    text: c[2].trim().to_string(),
                    target: c[1].to_string(),
                    line: number,
                },
            ));
        }

        for m in BARE_URL_REGEX.find_iter(line) {
            if overlaps(&taken, &m.range()) {
                continue;
            }
            let url = m.as_str().trim_end_matches(['.', ',', ';', ':']);
            on_line.push((
                m.start(),
                Link {
                    kind: LinkKind::BareUrl,
                    text: url.to_string(),
                    target: url.to_string(),
                    line: number,
                },
            ));
        }

        on_line.sort_by_key(|(pos, _)| *pos);
        found.extend(on_line.into_iter().map(|(_, link)| link));
    }
    found
}

fn overlaps(taken: &[Range<usize>], range: &Range<usize>) -> bool {
    taken
        .iter()
        .any(|t| t.start < range.end && range.start < t.end)
}

/// A Markdown heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    /// 1-based line number.
    pub line: usize,
    /// Anchor slug, made unique within the document.
    pub anchor: String,
}

/// ATX headings outside code blocks.
pub fn headings(content: &str) -> Vec<Heading> {
    let lines: Vec<&str> = content.lines().collect();
    let fenced = fenced_lines(&lines);
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut found = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        if fenced[idx] {
            continue;
        }
        let Some(c) = HEADING_REGEX.captures(line) else {
            continue;
        };
        let text = c[2].trim().to_string();
        let base = slugify(&text);
        let anchor = match seen.get_mut(&base) {
            Some(n) => {
                *n += 1;
                format!("{}-{}", base, n)
            }
            None => {
                seen.insert(base.clone(), 0);
                base
            }
        };
        found.push(Heading {
            level: c[1].len() as u8,
            text,
            line: idx + 1,
            anchor,
        });
    }
    found
}

/// Anchors a link fragment may point at: heading slugs and explicit
/// `name`/`id` attributes.
pub fn anchor_targets(content: &str) -> HashSet<String> {
    let mut anchors: HashSet<String> = headings(content).into_iter().map(|h| h.anchor).collect();
    for c in HTML_ID_REGEX.captures_iter(content) {
        anchors.insert(c[1].to_string());
    }
    anchors
}

/// Heading anchor slug: lowercase, spaces to `-`, punctuation dropped.
pub fn slugify(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            '-' | '_' => Some(c),
            c if c.is_alphanumeric() => Some(c),
            _ => None,
        })
        .collect()
}

/// Code from a document: inline spans and fenced blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFragments {
    pub spans: Vec<String>,
    pub blocks: Vec<String>,
}

impl CodeFragments {
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty() && self.blocks.is_empty()
    }

    /// Spans then blocks, one per line.
    pub fn joined(&self) -> String {
        self.spans
            .iter()
            .chain(&self.blocks)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Extract code. Fenced blocks are taken first and masked so their fences
/// are not read as inline spans.
pub fn code_fragments(content: &str) -> CodeFragments {
    let blocks = CODE_BLOCK_REGEX
        .captures_iter(content)
        .map(|c| c[1].trim().to_string())
        .filter(|b| !b.is_empty())
        .collect();

    let masked = CODE_BLOCK_REGEX.replace_all(content, "\n");
    let spans = CODE_SPAN_REGEX
        .captures_iter(&masked)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    CodeFragments { spans, blocks }
}

/// The trailing parent-topic link of a document, if it ends with one.
pub fn parent_topic_link(content: &str) -> Option<String> {
    PARENT_TOPIC_REGEX
        .find(content.trim())
        .map(|m| m.as_str().trim().to_string())
}

/// SHA-256 of the trimmed content, hex encoded.
pub fn content_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.trim().as_bytes()))
}
