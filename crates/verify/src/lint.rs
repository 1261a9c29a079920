//! Structural checks on a single Markdown tree.

use crate::common::load_markdown;
use doccheck_core::{Issue, Report, ReportTable, Result, Section};
use doccheck_markdown::{
    anchor_targets, content_hash, find_tables, links, parent_topic_link, slugify,
    verify_table_format, KeyBy, Link, LinkKind, MarkdownDir, MarkdownDoc,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

pub const TABLE_ERRORS_CAPTION: &str = "Table Format Errors";
pub const PARENT_LINKS_CAPTION: &str = "Repeated Parent Topic References";
pub const DUPLICATES_CAPTION: &str = "Duplicate Content";
pub const LINKS_CAPTION: &str = "Link Problems";

/// Lint settings. Every rule is on by default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    pub check_tables: bool,
    pub check_parent_links: bool,
    pub check_duplicates: bool,
    pub check_anchors: bool,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            check_tables: true,
            check_parent_links: true,
            check_duplicates: true,
            check_anchors: true,
        }
    }
}

/// Lints every file of a Markdown directory.
#[derive(Debug, Clone, Default)]
pub struct MarkdownLint {
    config: LintConfig,
}

impl MarkdownLint {
    pub fn new(config: LintConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, markdown: &Path) -> Result<Report> {
        let markdown = load_markdown(markdown, KeyBy::FileName)?;
        Ok(self.lint(&markdown))
    }

    pub fn lint(&self, markdown: &MarkdownDir) -> Report {
        let mut report = Report::new("Markdown Verification").with_labels(markdown.source(), "");
        let mut table_errors =
            ReportTable::new(TABLE_ERRORS_CAPTION, ["File", "Table", "Line", "Problem"]);
        let mut parent_links = ReportTable::new(PARENT_LINKS_CAPTION, ["Reference", "File", "First Seen In"]);
        let mut duplicates = ReportTable::new(DUPLICATES_CAPTION, ["File", "Duplicate Of"]);
        let mut link_problems = ReportTable::new(LINKS_CAPTION, ["File", "Line", "Target", "Problem"]);

        let mut seen_parents: HashMap<String, &str> = HashMap::new();
        let mut seen_hashes: HashMap<String, &str> = HashMap::new();
        report.summary.total = markdown.docs.len();

        for doc in &markdown.docs {
            let mut issues: Vec<Issue> = doc.issues.clone();

            if self.config.check_tables {
                for (idx, table) in find_tables(&doc.content).iter().enumerate() {
                    if let Err(problem) = verify_table_format(table) {
                        issues.push(Issue::warning(format!(
                            "Table {} (line {}): {}",
                            idx + 1,
                            table.line,
                            problem
                        )));
                        table_errors.push_row([
                            doc.file_name.clone(),
                            (idx + 1).to_string(),
                            table.line.to_string(),
                            problem,
                        ]);
                    }
                }
            }

            if self.config.check_parent_links {
                if let Some(reference) = parent_topic_link(&doc.content) {
                    match seen_parents.get(&reference) {
                        Some(first) => {
                            issues.push(Issue::warning(format!(
                                "Parent topic reference {} repeats '{}'",
                                reference, first
                            )));
                            parent_links.push_row([reference, doc.file_name.clone(), first.to_string()]);
                        }
                        None => {
                            seen_parents.insert(reference, &doc.file_name);
                        }
                    }
                }
            }

            if self.config.check_duplicates && !doc.content.trim().is_empty() {
                let hash = content_hash(&doc.content);
                match seen_hashes.get(&hash) {
                    Some(first) => {
                        issues.push(Issue::warning(format!("Duplicate content of '{}'", first)));
                        duplicates.push_row([doc.file_name.clone(), first.to_string()]);
                    }
                    None => {
                        seen_hashes.insert(hash, &doc.file_name);
                    }
                }
            }

            if self.config.check_anchors {
                for (link, problem) in link_problems_in(doc, markdown) {
                    issues.push(Issue::warning(format!(
                        "Line {}: {} ({})",
                        link.line,
                        problem,
                        display_target(&link)
                    )));
                    link_problems.push_row([
                        doc.file_name.clone(),
                        link.line.to_string(),
                        display_target(&link),
                        problem.to_string(),
                    ]);
                }
            }

            if issues.is_empty() {
                report.summary.record_matched();
                continue;
            }
            log::debug!("{}: {} findings", doc.file_name, issues.len());
            report.summary.record_changed(doc.file_name.clone());
            let mut section = Section::new(doc.file_name.clone());
            section.push_messages(issues);
            report.push_section(section);
        }

        let counts: BTreeMap<&str, usize> = [
            (TABLE_ERRORS_CAPTION, table_errors.rows.len()),
            (PARENT_LINKS_CAPTION, parent_links.rows.len()),
            (DUPLICATES_CAPTION, duplicates.rows.len()),
            (LINKS_CAPTION, link_problems.rows.len()),
        ]
        .into_iter()
        .collect();
        for (caption, count) in counts {
            report.note(format!("{}: {}", caption, count));
        }
        report.tables.extend([table_errors, parent_links, duplicates, link_problems]);
        report
    }
}

fn display_target(link: &Link) -> String {
    if link.target.is_empty() {
        format!("[{}]", link.text)
    } else {
        link.target.clone()
    }
}

/// Empty targets, undefined references and anchors that point nowhere.
fn link_problems_in(doc: &MarkdownDoc, markdown: &MarkdownDir) -> Vec<(Link, &'static str)> {
    let own_anchors = anchor_targets(&doc.content);
    let mut problems = Vec::new();

    for link in links(&doc.content) {
        if link.is_external() || matches!(link.kind, LinkKind::Autolink | LinkKind::BareUrl) {
            continue;
        }
        let target = link.target.trim();
        if target.is_empty() || target == "#" {
            let problem = if link.kind == LinkKind::Reference && target.is_empty() {
                "Undefined reference"
            } else {
                "Empty link target"
            };
            problems.push((link, problem));
            continue;
        }

        let path = link.path().trim();
        let anchors = if path.is_empty() {
            Some(own_anchors.clone())
        } else if path.to_ascii_lowercase().ends_with(".md") {
            let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
            match markdown.get(name) {
                Some(other) => Some(anchor_targets(&other.content)),
                None => {
                    problems.push((link, "Linked file not found"));
                    continue;
                }
            }
        } else {
            None
        };

        let (Some(anchors), Some(fragment)) = (anchors, link.fragment()) else {
            continue;
        };
        let fragment = fragment.trim();
        if fragment.is_empty() {
            problems.push((link, "Empty anchor"));
        } else if !anchors.contains(fragment) && !anchors.contains(&slugify(fragment)) {
            problems.push((link, "Anchor not found"));
        }
    }
    problems
}
