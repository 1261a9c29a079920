//! Reading a directory of Markdown files into a corpus.

use crate::clean::MarkdownCleaner;
use crate::scan::{find_tables, headings, image_refs};
use doccheck_core::{Corpus, CorpusKind, Error, Issue, Result, Table, Unit, UnitId, UnitMeta};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Numeric prefix of a file name: the digits before the first `_`.
///
/// `3_introduction.md` gives 3; `intro.md` and `3intro.md` give `None`.
pub fn numeric_prefix(file_name: &str) -> Option<u32> {
    let (prefix, _) = file_name.split_once('_')?;
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}

/// How documents are keyed in a corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyBy {
    /// By numeric file prefix. Files without one are skipped.
    #[default]
    Prefix,
    FileName,
}

/// Directory reading options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownOptions {
    pub key_by: KeyBy,
    /// Also read files whose extension is `.MD` or `.Md`.
    pub ignore_case: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            key_by: KeyBy::Prefix,
            ignore_case: true,
        }
    }
}

impl MarkdownOptions {
    pub fn with_key_by(mut self, key_by: KeyBy) -> Self {
        self.key_by = key_by;
        self
    }
}

/// One Markdown file as read from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkdownDoc {
    pub file_name: String,
    pub path: PathBuf,
    pub prefix: Option<u32>,
    /// Raw file content. Empty if the file could not be read.
    pub content: String,
    pub issues: Vec<Issue>,
}

impl MarkdownDoc {
    /// Build a document from content already in memory.
    pub fn from_content(file_name: impl Into<String>, content: impl Into<String>) -> Self {
        let file_name = file_name.into();
        Self {
            prefix: numeric_prefix(&file_name),
            path: PathBuf::from(&file_name),
            file_name,
            content: content.into(),
            issues: Vec::new(),
        }
    }

    pub fn key(&self, key_by: KeyBy) -> Option<UnitId> {
        match key_by {
            KeyBy::Prefix => self.prefix.map(UnitId::Number),
            KeyBy::FileName => Some(UnitId::Name(self.file_name.clone())),
        }
    }

    /// Turn the document into a unit with cleaned text and scanned metadata.
    pub fn to_unit(&self, id: UnitId, cleaner: &MarkdownCleaner) -> Unit {
        let tables = find_tables(&self.content)
            .into_iter()
            .map(|t| {
                Table::new(
                    t.rows
                        .iter()
                        .map(|row| {
                            row.trim()
                                .trim_matches('|')
                                .split('|')
                                .map(|cell| cell.trim().to_string())
                                .collect()
                        })
                        .collect(),
                )
            })
            .collect();
        let meta = UnitMeta {
            title: headings(&self.content).into_iter().next().map(|h| h.text),
            tables,
            image_count: Some(image_refs(&self.content).len()),
            ..Default::default()
        };

        let mut unit = Unit::new(id, cleaner.clean(&self.content))
            .with_label(self.file_name.clone())
            .with_meta(meta);
        unit.issues.extend(self.issues.iter().cloned());
        unit.flag_if_empty();
        unit
    }
}

/// The Markdown files of one directory, sorted by file name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkdownDir {
    pub root: PathBuf,
    pub docs: Vec<MarkdownDoc>,
    pub key_by: KeyBy,
}

impl MarkdownDir {
    /// Build from in-memory documents.
    pub fn from_docs(root: impl Into<PathBuf>, mut docs: Vec<MarkdownDoc>, key_by: KeyBy) -> Self {
        docs.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Self {
            root: root.into(),
            docs,
            key_by,
        }
    }

    /// Directory name used as the corpus source label.
    pub fn source(&self) -> String {
        self.root
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.root.display().to_string())
    }

    pub fn get(&self, file_name: &str) -> Option<&MarkdownDoc> {
        self.docs.iter().find(|d| d.file_name == file_name)
    }

    /// Documents paired with their keys. Unkeyed documents are reported
    /// through `skipped`.
    pub fn keyed(&self) -> (Vec<(UnitId, &MarkdownDoc)>, Vec<&MarkdownDoc>) {
        let mut keyed = Vec::new();
        let mut skipped = Vec::new();
        for doc in &self.docs {
            match doc.key(self.key_by) {
                Some(id) => keyed.push((id, doc)),
                None => skipped.push(doc),
            }
        }
        (keyed, skipped)
    }

    /// Build a corpus, one unit per keyed document, in key order.
    pub fn to_corpus(&self, cleaner: &MarkdownCleaner) -> Corpus {
        let mut corpus = Corpus::new(self.source(), CorpusKind::MarkdownDir);
        let (keyed, skipped) = self.keyed();
        for doc in skipped {
            log::debug!("Skipping {}: no numeric prefix", doc.file_name);
            corpus.issues.push(Issue::info(format!(
                "Skipped '{}': no numeric prefix",
                doc.file_name
            )));
        }
        for (id, doc) in keyed {
            corpus.push(doc.to_unit(id, cleaner));
        }
        corpus.sort_by_id();
        corpus
    }
}

/// Read every `.md` file directly inside `path`.
///
/// A file that cannot be read becomes an empty document carrying an issue.
/// A path that is not a readable directory is an error.
pub fn read_dir(path: impl AsRef<Path>, options: &MarkdownOptions) -> Result<MarkdownDir> {
    let path = path.as_ref();
    if !path.is_dir() {
        return Err(Error::MarkdownError(format!(
            "Not a directory: {}",
            path.display()
        )));
    }

    let mut docs = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let file_path = entry.path();
        if !file_path.is_file() || !is_markdown(&file_path, options.ignore_case) {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();

        let mut doc = MarkdownDoc::from_content(file_name, "");
        doc.path = file_path.clone();
        match fs::read_to_string(&file_path) {
            Ok(content) => doc.content = content,
            Err(e) => {
                log::warn!("Failed to read {}: {}", file_path.display(), e);
                doc.issues.push(Issue::error(format!("Unreadable: {}", e)));
            }
        }
        docs.push(doc);
    }

    log::debug!("Read {} Markdown files from {}", docs.len(), path.display());
    Ok(MarkdownDir::from_docs(path, docs, options.key_by))
}

fn is_markdown(path: &Path, ignore_case: bool) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ignore_case => ext.eq_ignore_ascii_case("md"),
        Some(ext) => ext == "md",
        None => false,
    }
}
