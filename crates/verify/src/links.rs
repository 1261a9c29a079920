//! PDF link annotations against the links of the Markdown file numbered
//! after each page.
//!
//! Links pair up in three passes: same normalised URL, then same domain,
//! then similar link text. Each pass looks at the Markdown files of the
//! link's own page first and at unnumbered files after that.

use crate::common::{check_threshold, load_markdown};
use doccheck_core::{Issue, Report, ReportTable, Result};
use doccheck_markdown::{links, KeyBy, Link, MarkdownDir};
use doccheck_pdf::{PdfExtractor, PdfLink};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

pub const PER_PAGE_CAPTION: &str = "Per-Page Links";
pub const MATCHED_CAPTION: &str = "Matched Links";
pub const PDF_ONLY_CAPTION: &str = "PDF-Only Links";
pub const MARKDOWN_ONLY_CAPTION: &str = "Markdown-Only Links";

/// Link texts shorter than this never pair by text.
const MIN_TEXT_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkCheckConfig {
    /// Markdown prefix `n` belongs to PDF page `n + page_offset`.
    pub page_offset: i64,
    /// Pair external links on the same domain when no URL matches.
    pub match_by_domain: bool,
    /// Word overlap of the link texts above which two links pair up.
    pub text_threshold: f64,
}

impl Default for LinkCheckConfig {
    fn default() -> Self {
        Self {
            page_offset: 0,
            match_by_domain: true,
            text_threshold: 0.8,
        }
    }
}

/// Pass that paired two links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMatch {
    ExactUrl,
    Domain,
    Text,
}

impl LinkMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkMatch::ExactUrl => "exact URL",
            LinkMatch::Domain => "same domain",
            LinkMatch::Text => "link text",
        }
    }
}

/// A Markdown link with the page its file belongs to.
struct MarkdownLink<'a> {
    file: &'a str,
    /// `None` for files without a numeric prefix.
    page: Option<u32>,
    link: Link,
}

/// Compares PDF link annotations with Markdown links, page by page.
#[derive(Debug, Clone, Default)]
pub struct LinkCheck {
    config: LinkCheckConfig,
}

impl LinkCheck {
    pub fn new(config: LinkCheckConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, pdf: &Path, markdown: &Path) -> Result<Report> {
        check_threshold("text threshold", self.config.text_threshold)?;
        let annotations = PdfExtractor::load(pdf)?.link_annotations();
        log::debug!(
            "{} link annotations on {} pages",
            annotations.values().map(Vec::len).sum::<usize>(),
            annotations.len()
        );
        let markdown = load_markdown(markdown, KeyBy::Prefix)?;
        let mut report = self.compare(&annotations, &markdown);
        report.reference_label = pdf
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(report)
    }

    /// `pdf` maps 1-based page numbers to the links on that page.
    pub fn compare(&self, pdf: &BTreeMap<u32, Vec<PdfLink>>, markdown: &MarkdownDir) -> Report {
        let mut report = Report::new("PDF vs Markdown Links").with_labels("PDF", markdown.source());
        let pdf_links: Vec<&PdfLink> = pdf.values().flatten().collect();

        let mut md_links: Vec<MarkdownLink<'_>> = Vec::new();
        let mut page_files: BTreeMap<u32, Vec<&str>> = BTreeMap::new();
        let (keyed, unkeyed) = markdown.keyed();
        for (id, doc) in keyed {
            let Some(page) = id
                .number()
                .and_then(|n| u32::try_from(n as i64 + self.config.page_offset).ok())
                .filter(|page| *page > 0)
            else {
                report.issues.push(Issue::warning(format!(
                    "'{}' falls before the first page with offset {}",
                    doc.file_name, self.config.page_offset
                )));
                continue;
            };
            page_files.entry(page).or_default().push(&doc.file_name);
            md_links.extend(markdown_links(&doc.file_name, Some(page), &doc.content));
        }
        for doc in unkeyed {
            report.issues.push(Issue::info(format!(
                "'{}' has no numeric prefix, its links can match any page",
                doc.file_name
            )));
            md_links.extend(markdown_links(&doc.file_name, None, &doc.content));
        }

        let pairs = self.pair(&pdf_links, &md_links);
        let claimed: HashSet<usize> = pairs.iter().flatten().map(|(j, _)| *j).collect();

        let mut matched =
            ReportTable::new(MATCHED_CAPTION, ["Page", "PDF Link", "MD File", "Line", "MD Link", "Match"]);
        let mut pdf_only = ReportTable::new(PDF_ONLY_CAPTION, ["Page", "Link", "Text"]);
        for (pdf_link, pair) in pdf_links.iter().zip(&pairs) {
            report.summary.total += 1;
            match pair {
                Some((j, kind)) => {
                    let md = &md_links[*j];
                    report.summary.record_matched();
                    let how = match md.page {
                        Some(_) => kind.as_str().to_string(),
                        None => format!("{} (unnumbered file)", kind.as_str()),
                    };
                    matched.push_row([
                        pdf_link.page.to_string(),
                        pdf_link.target.to_string(),
                        md.file.to_string(),
                        md.link.line.to_string(),
                        md.link.target.clone(),
                        how,
                    ]);
                }
                None => {
                    report
                        .summary
                        .record_mismatched(format!("Page {}: {}", pdf_link.page, pdf_link.target));
                    pdf_only.push_row([
                        pdf_link.page.to_string(),
                        pdf_link.target.to_string(),
                        pdf_link.text.clone(),
                    ]);
                }
            }
        }

        let mut md_only = ReportTable::new(MARKDOWN_ONLY_CAPTION, ["MD File", "Line", "Page", "Link", "Text"]);
        for (_, md) in md_links.iter().enumerate().filter(|(j, _)| !claimed.contains(j)) {
            report.summary.total += 1;
            report
                .summary
                .record_mismatched(format!("{}:{}: {}", md.file, md.link.line, md.link.target));
            md_only.push_row([
                md.file.to_string(),
                md.link.line.to_string(),
                md.page.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
                md.link.target.clone(),
                md.link.text.clone(),
            ]);
        }

        let mut per_page = ReportTable::new(
            PER_PAGE_CAPTION,
            ["Page", "MD File", "PDF Links", "MD Links", "Matched", "PDF Only", "MD Only"],
        );
        let pages: BTreeSet<u32> = pdf.keys().chain(page_files.keys()).copied().collect();
        for page in pages {
            let on_page: Vec<usize> = (0..pdf_links.len()).filter(|&i| pdf_links[i].page == page).collect();
            let matched_here = on_page.iter().filter(|&&i| pairs[i].is_some()).count();
            let md_here: Vec<usize> = (0..md_links.len()).filter(|&j| md_links[j].page == Some(page)).collect();
            let md_only_here = md_here.iter().filter(|&&j| !claimed.contains(&j)).count();
            per_page.push_row([
                page.to_string(),
                page_files.get(&page).map(|f| f.join(", ")).unwrap_or_default(),
                on_page.len().to_string(),
                md_here.len().to_string(),
                matched_here.to_string(),
                (on_page.len() - matched_here).to_string(),
                md_only_here.to_string(),
            ]);
        }

        report.note(format!(
            "{} PDF links, {} Markdown links, {} matched",
            pdf_links.len(),
            md_links.len(),
            matched.rows.len()
        ));
        if self.config.page_offset != 0 {
            report.note(format!("Page offset: {}", self.config.page_offset));
        }
        report.tables.push(per_page);
        report.tables.push(matched);
        report.tables.push(pdf_only);
        report.tables.push(md_only);
        report
    }

    /// For each PDF link, the Markdown link it pairs with and the pass that
    /// paired them. A Markdown link pairs at most once.
    fn pair(&self, pdf_links: &[&PdfLink], md_links: &[MarkdownLink<'_>]) -> Vec<Option<(usize, LinkMatch)>> {
        let mut pairs: Vec<Option<(usize, LinkMatch)>> = vec![None; pdf_links.len()];
        let mut claimed = vec![false; md_links.len()];

        let mut passes = vec![LinkMatch::ExactUrl];
        if self.config.match_by_domain {
            passes.push(LinkMatch::Domain);
        }
        passes.push(LinkMatch::Text);

        for kind in passes {
            for (i, pdf_link) in pdf_links.iter().enumerate() {
                if pairs[i].is_some() {
                    continue;
                }
                let same_page = (0..md_links.len()).filter(|&j| md_links[j].page == Some(pdf_link.page));
                let unnumbered = (0..md_links.len()).filter(|&j| md_links[j].page.is_none());
                let found = same_page
                    .chain(unnumbered)
                    .find(|&j| !claimed[j] && self.agree(kind, pdf_link, &md_links[j].link));
                if let Some(j) = found {
                    claimed[j] = true;
                    pairs[i] = Some((j, kind));
                }
            }
        }
        pairs
    }

    fn agree(&self, kind: LinkMatch, pdf: &PdfLink, md: &Link) -> bool {
        match kind {
            LinkMatch::ExactUrl => pdf
                .target
                .uri()
                .map(normalize_url)
                .is_some_and(|url| !url.is_empty() && url == normalize_url(&md.target)),
            LinkMatch::Domain => pdf
                .target
                .uri()
                .filter(|uri| is_external(uri))
                .and_then(domain)
                .is_some_and(|host| domain(&md.target).as_deref() == Some(host.as_str())),
            LinkMatch::Text => {
                let text = pdf.text.trim();
                text.chars().count() >= MIN_TEXT_LEN && word_overlap(text, &md.text) > self.config.text_threshold
            }
        }
    }
}

fn markdown_links<'a>(file: &'a str, page: Option<u32>, content: &str) -> Vec<MarkdownLink<'a>> {
    links(content)
        .into_iter()
        .filter(|link| !link.target.is_empty())
        .map(|link| MarkdownLink { file, page, link })
        .collect()
}

/// Lowercase, trailing slash dropped on web URLs, `www.` hosts given a scheme.
pub(crate) fn normalize_url(url: &str) -> String {
    let url = url.trim().to_lowercase();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.trim_end_matches('/').to_string()
    } else if url.starts_with("www.") {
        format!("https://{}", url.trim_end_matches('/'))
    } else {
        url
    }
}

fn is_external(url: &str) -> bool {
    let lower = url.trim().to_lowercase();
    ["http://", "https://", "www.", "mailto:"]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Host of a web URL, or the mail domain of a `mailto:` link.
pub(crate) fn domain(url: &str) -> Option<String> {
    let lower = url.trim().to_lowercase();
    let host = if let Some(address) = lower.strip_prefix("mailto:") {
        address.rsplit('@').next()?.split('?').next()?
    } else {
        let rest = lower
            .strip_prefix("http://")
            .or_else(|| lower.strip_prefix("https://"))
            .or_else(|| lower.starts_with("www.").then_some(lower.as_str()))?;
        rest.split(|c: char| matches!(c, '/' | '?' | '#')).next()?
    };
    (!host.is_empty()).then(|| host.to_string())
}

/// Jaccard similarity of the lowercase word sets.
fn word_overlap(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }
    let shared = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    shared as f64 / union as f64
}
