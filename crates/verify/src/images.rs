//! Per-page image counts of a PDF against the images referenced by the
//! Markdown file numbered after each page.

use crate::common::load_markdown;
use doccheck_core::{Issue, Report, ReportTable, Result};
use doccheck_markdown::{image_refs, KeyBy, MarkdownDir};
use doccheck_pdf::{ImageCountOptions, PdfExtractor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const MISMATCH_CAPTION: &str = "Mismatch Details";
pub const PER_PAGE_CAPTION: &str = "Per-Page Comparison";
pub const MARKDOWN_IMAGES_CAPTION: &str = "Markdown Images";

/// Image count settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageCheckConfig {
    /// Markdown prefix `n` belongs to PDF page `n + page_offset`.
    pub page_offset: i64,
    /// A page passes when the PDF has at least as many images as the Markdown.
    pub tolerance: bool,
    /// Per-page status column shows exact MATCH/MISMATCH only.
    pub strict_status: bool,
    /// Leave out pages whose Markdown references no image.
    pub ignore_zero_image_md: bool,
    /// List tolerated differences in the mismatch table too.
    pub report_all_differences: bool,
    pub pdf: ImageCountOptions,
}

impl Default for ImageCheckConfig {
    fn default() -> Self {
        Self {
            page_offset: 0,
            tolerance: true,
            strict_status: true,
            ignore_zero_image_md: true,
            report_all_differences: true,
            pdf: ImageCountOptions::default(),
        }
    }
}

/// Outcome of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CountStatus {
    Ok,
    /// Counts differ but the PDF has more images.
    Tolerated,
    Mismatch,
}

impl CountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountStatus::Ok => "OK",
            CountStatus::Tolerated => "TOLERATED",
            CountStatus::Mismatch => "MISMATCH",
        }
    }

    fn classify(markdown: usize, pdf: usize, tolerance: bool) -> Self {
        if markdown == pdf {
            CountStatus::Ok
        } else if tolerance && pdf > markdown {
            CountStatus::Tolerated
        } else {
            CountStatus::Mismatch
        }
    }
}

/// Markdown side of one page.
#[derive(Debug, Default)]
struct MarkdownPage {
    files: Vec<String>,
    images: Vec<String>,
}

/// Compares PDF image counts with Markdown image references.
#[derive(Debug, Clone, Default)]
pub struct ImageCounts {
    config: ImageCheckConfig,
}

impl ImageCounts {
    pub fn new(config: ImageCheckConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, pdf: &Path, markdown: &Path) -> Result<Report> {
        let counts: BTreeMap<u32, usize> = PdfExtractor::load(pdf)?
            .image_counts(&self.config.pdf)
            .into_iter()
            .map(|(page, count)| {
                log::debug!(
                    "Page {}: {} images ({} before discount, {})",
                    page,
                    count.count,
                    count.raw,
                    count.method.as_str()
                );
                (page, count.count)
            })
            .collect();
        let markdown = load_markdown(markdown, KeyBy::Prefix)?;
        let mut report = self.compare(&counts, &markdown);
        report.reference_label = pdf
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(report)
    }

    /// `pdf` maps 1-based page numbers to image counts.
    pub fn compare(&self, pdf: &BTreeMap<u32, usize>, markdown: &MarkdownDir) -> Report {
        let mut report = Report::new("PDF vs Markdown Image Count").with_labels("PDF", markdown.source());
        let mut listing = ReportTable::new(MARKDOWN_IMAGES_CAPTION, ["File", "Count", "Images"]);
        let mut pages: BTreeMap<u32, MarkdownPage> = BTreeMap::new();

        let (keyed, skipped) = markdown.keyed();
        for doc in skipped {
            report.issues.push(Issue::info(format!(
                "Skipped '{}': no numeric prefix",
                doc.file_name
            )));
        }
        for (id, doc) in keyed {
            let images = image_refs(&doc.content);
            listing.push_row([doc.file_name.clone(), images.len().to_string(), images.join(", ")]);
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
            let entry = pages.entry(page).or_default();
            entry.files.push(doc.file_name.clone());
            entry.images.extend(images);
        }

        let mut details =
            ReportTable::new(MISMATCH_CAPTION, ["Page", "MD File", "MD", "PDF", "Diff", "Status"]);
        let mut per_page = ReportTable::new(
            PER_PAGE_CAPTION,
            ["Page", "MD File", "MD Images", "PDF Images", "Status", "Exact"],
        );
        let mut ignored = 0;

        let numbers: Vec<u32> = {
            let mut all: Vec<u32> = pdf.keys().chain(pages.keys()).copied().collect();
            all.sort_unstable();
            all.dedup();
            all
        };
        for page in numbers {
            let md_page = pages.get(&page);
            let md_count = md_page.map_or(0, |p| p.images.len());
            if self.config.ignore_zero_image_md && md_count == 0 {
                ignored += 1;
                continue;
            }
            let pdf_count = pdf.get(&page).copied().unwrap_or(0);
            let files = md_page.map(|p| p.files.join(", ")).unwrap_or_default();
            let status = CountStatus::classify(md_count, pdf_count, self.config.tolerance);
            let exact = md_count == pdf_count;

            report.summary.total += 1;
            match status {
                CountStatus::Mismatch => report.summary.record_mismatched(format!("Page {}", page)),
                _ => report.summary.record_matched(),
            }
            if !pdf.contains_key(&page) {
                report.issues.push(Issue::warning(format!(
                    "Page {} does not exist in the PDF ({})",
                    page, files
                )));
            }

            if status == CountStatus::Mismatch || (!exact && self.config.report_all_differences) {
                details.push_row([
                    page.to_string(),
                    files.clone(),
                    md_count.to_string(),
                    pdf_count.to_string(),
                    (pdf_count as i64 - md_count as i64).to_string(),
                    status.as_str().to_string(),
                ]);
            }
            let shown = match (self.config.strict_status, exact) {
                (true, true) => "MATCH",
                (true, false) => "MISMATCH",
                (false, _) => status.as_str(),
            };
            per_page.push_row([
                page.to_string(),
                files,
                md_count.to_string(),
                pdf_count.to_string(),
                shown.to_string(),
                if exact { "Yes" } else { "No" }.to_string(),
            ]);
        }

        report.tables.push(details);
        report.tables.push(per_page);
        report.tables.push(listing);
        if ignored > 0 {
            report.note(format!("{} pages without Markdown images ignored", ignored));
        }
        report.note(format!(
            "Page offset: {}, tolerance: {}",
            self.config.page_offset,
            if self.config.tolerance { "on" } else { "off" }
        ));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::markdown;

    fn counts(pairs: &[(u32, usize)]) -> BTreeMap<u32, usize> {
        pairs.iter().copied().collect()
    }

    fn rows<'a>(report: &'a Report, caption: &str) -> &'a [Vec<String>] {
        &report.table(caption).unwrap().rows
    }

    #[test]
    fn test_equal_counts_pass() {
        let md = markdown("md", KeyBy::Prefix, &[
            ("1_intro.md", "![logo](img/a.png)"),
            ("2_setup.md", "![x](b.png)\n<img src=\"c.png\">"),
        ]);
        let report = ImageCounts::default().compare(&counts(&[(1, 1), (2, 2)]), &md);

        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.matched, 2);
        assert!(report.summary.is_clean());
        assert!(rows(&report, MISMATCH_CAPTION).is_empty());
        assert_eq!(
            rows(&report, PER_PAGE_CAPTION)[1],
            vec!["2", "2_setup.md", "2", "2", "MATCH", "Yes"]
        );
        assert_eq!(rows(&report, MARKDOWN_IMAGES_CAPTION)[1][2], "b.png, c.png");
    }

    #[test]
    fn test_tolerance_accepts_extra_pdf_images() {
        let md = markdown("md", KeyBy::Prefix, &[("1_intro.md", "![a](a.png)")]);
        let pdf = counts(&[(1, 3)]);

        let report = ImageCounts::default().compare(&pdf, &md);
        assert_eq!(report.summary.mismatched, 0);
        assert_eq!(rows(&report, MISMATCH_CAPTION)[0], vec!["1", "1_intro.md", "1", "3", "2", "TOLERATED"]);
        assert_eq!(rows(&report, PER_PAGE_CAPTION)[0][4], "MISMATCH");

        let strict = ImageCounts::new(ImageCheckConfig {
            tolerance: false,
            strict_status: false,
            ..Default::default()
        });
        let report = strict.compare(&pdf, &md);
        assert_eq!(report.summary.mismatched_units, vec!["Page 1"]);
        assert_eq!(rows(&report, PER_PAGE_CAPTION)[0][4], "MISMATCH");
    }

    #[test]
    fn test_fewer_pdf_images_is_mismatch() {
        let md = markdown("md", KeyBy::Prefix, &[("1_intro.md", "![a](a.png) ![b](b.png)")]);
        let report = ImageCounts::default().compare(&counts(&[(1, 1)]), &md);
        assert_eq!(report.summary.mismatched_units, vec!["Page 1"]);
        assert_eq!(rows(&report, MISMATCH_CAPTION)[0][4], "-1");
    }

    #[test]
    fn test_page_offset_and_zero_image_files() {
        let md = markdown("md", KeyBy::Prefix, &[
            ("1_intro.md", "No pictures here"),
            ("2_setup.md", "![a](a.png)"),
        ]);
        let check = ImageCounts::new(ImageCheckConfig {
            page_offset: 1,
            ..Default::default()
        });

        let report = check.compare(&counts(&[(1, 0), (2, 0), (3, 1)]), &md);
        assert_eq!(report.summary.total, 1);
        assert_eq!(rows(&report, PER_PAGE_CAPTION)[0][0], "3");
        assert!(report.notes.iter().any(|n| n == "2 pages without Markdown images ignored"));
    }

    #[test]
    fn test_missing_page_and_unprefixed_file() {
        let md = markdown("md", KeyBy::Prefix, &[
            ("5_extra.md", "![a](a.png)"),
            ("notes.md", "![b](b.png)"),
        ]);
        let report = ImageCounts::default().compare(&counts(&[(1, 0)]), &md);
        assert_eq!(report.summary.mismatched_units, vec!["Page 5"]);
        assert!(report.issues.iter().any(|i| i.message.starts_with("Page 5 does not exist")));
        assert!(report.issues.iter().any(|i| i.message == "Skipped 'notes.md': no numeric prefix"));
    }
}
