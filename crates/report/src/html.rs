//! Self-contained HTML report.

use doccheck_core::{
    Block, DiffPane, DiffTag, Error, Issue, Report, ReportTable, Result, Section, Severity, Summary,
};
use std::fmt::Write;
use std::fs;
use std::path::Path;

const STYLE: &str = r#"
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0 auto; max-width: 1400px; padding: 20px; color: #222; }
h1 { font-size: 24px; }
h2 { font-size: 18px; margin-top: 32px; border-bottom: 1px solid #ddd; padding-bottom: 4px; }
h3 { font-size: 15px; color: #444; }
table { border-collapse: collapse; margin: 12px 0; }
th, td { border: 1px solid #ccc; padding: 6px 10px; text-align: left; vertical-align: top; }
th { background: #f3f3f3; }
.diff { width: 100%; table-layout: fixed; }
.pane { white-space: pre-wrap; font-family: Consolas, Menlo, monospace; font-size: 13px; }
.unchanged { color: #222; }
.added { background: #d4f8d4; }
.removed { background: #ffd6d6; text-decoration: line-through; }
.changed { background: #fff2b3; }
.similarity-high { color: #2e7d32; font-weight: 600; }
.similarity-medium { color: #ef6c00; font-weight: 600; }
.similarity-low { color: #c62828; font-weight: 600; }
.info { color: #555; }
.warning { color: #ef6c00; }
.error { color: #c62828; }
.match { color: #555; }
.notes { color: #777; font-size: 12px; margin-top: 40px; }
"#;

/// CSS class for a similarity score in [0, 1].
pub fn similarity_class(score: f64) -> &'static str {
    if score >= 0.95 {
        "similarity-high"
    } else if score >= 0.85 {
        "similarity-medium"
    } else {
        "similarity-low"
    }
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn severity_class(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "info",
        Severity::Warning => "warning",
        Severity::Error => "error",
    }
}

/// Renders a [`Report`] to one HTML document with inline CSS.
#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    /// Render sections whose diffs show no change.
    include_unchanged: bool,
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlRenderer {
    pub fn new() -> Self {
        Self {
            include_unchanged: true,
        }
    }

    pub fn with_unchanged(mut self, include: bool) -> Self {
        self.include_unchanged = include;
        self
    }

    pub fn render(&self, report: &Report) -> String {
        let mut html = String::new();
        // Writing to a String cannot fail
        let _ = self.write_document(&mut html, report);
        html
    }

    fn write_document(&self, out: &mut String, report: &Report) -> std::fmt::Result {
        let title = escape_html(&report.title);
        write!(
            out,
            r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{title}</title>
  <style>{STYLE}</style>
</head>
<body>
<h1>{title}</h1>
"#
        )?;
        if !report.reference_label.is_empty() || !report.candidate_label.is_empty() {
            writeln!(
                out,
                "<p><strong>Reference:</strong> {}<br><strong>Candidate:</strong> {}</p>",
                escape_html(&report.reference_label),
                escape_html(&report.candidate_label)
            )?;
        }

        write_summary(out, &report.summary)?;

        if !report.issues.is_empty() {
            writeln!(out, "<h2>Issues</h2>")?;
            write_messages(out, &report.issues)?;
        }

        for table in &report.tables {
            writeln!(out, "<h2>{}</h2>", escape_html(&table.caption))?;
            write_table(out, table)?;
        }

        for section in &report.sections {
            if !self.include_unchanged && is_unchanged(section) {
                continue;
            }
            write_section(out, section, report)?;
        }

        if !report.notes.is_empty() {
            writeln!(out, "<div class=\"notes\">")?;
            for note in &report.notes {
                writeln!(out, "<p>{}</p>", escape_html(note))?;
            }
            writeln!(out, "</div>")?;
        }
        writeln!(out, "</body>\n</html>")
    }
}

/// A section with only equal diffs and nothing else to say.
fn is_unchanged(section: &Section) -> bool {
    section.blocks.iter().all(|block| match block {
        Block::Diff(pane) => pane.spans.iter().all(|s| s.tag == DiffTag::Equal),
        _ => false,
    })
}

fn write_summary(out: &mut String, summary: &Summary) -> std::fmt::Result {
    writeln!(out, "<h2>Summary</h2>\n<table>")?;
    for (name, value) in summary.counts() {
        writeln!(out, "<tr><th>{}</th><td>{}</td></tr>", name, value)?;
    }
    writeln!(out, "</table>")?;

    let lists = [
        ("Changed", &summary.changed_units),
        ("Skipped", &summary.skipped_units),
        ("Mismatched", &summary.mismatched_units),
    ];
    for (name, units) in lists {
        if units.is_empty() {
            continue;
        }
        writeln!(out, "<h3>{}</h3>\n<ul>", name)?;
        for unit in units {
            writeln!(out, "<li>{}</li>", escape_html(unit))?;
        }
        writeln!(out, "</ul>")?;
    }
    Ok(())
}

fn write_section(out: &mut String, section: &Section, report: &Report) -> std::fmt::Result {
    writeln!(out, "<div class=\"section\">")?;
    writeln!(out, "<h2>{}</h2>", escape_html(&section.title))?;

    let mut details = Vec::new();
    if let Some(target) = &section.target {
        details.push(format!("Matched: {}", escape_html(target)));
    }
    if let Some(score) = section.score {
        details.push(format!(
            "Similarity: <span class=\"{}\">{:.2}%</span>",
            similarity_class(score),
            score * 100.0
        ));
    }
    if let Some(confidence) = section.confidence {
        details.push(format!("Confidence: {}", confidence));
    }
    if !details.is_empty() {
        writeln!(out, "<p class=\"match\">{}</p>", details.join(" | "))?;
    }

    for block in &section.blocks {
        match block {
            Block::Diff(pane) => write_diff(out, pane, report)?,
            Block::Table(table) => {
                if !table.caption.is_empty() {
                    writeln!(out, "<h3>{}</h3>", escape_html(&table.caption))?;
                }
                write_table(out, table)?;
            }
            Block::Messages(issues) => write_messages(out, issues)?,
            Block::Text { caption, body } => {
                writeln!(out, "<h3>{}</h3>", escape_html(caption))?;
                writeln!(out, "<pre class=\"pane\">{}</pre>", escape_html(body))?;
            }
        }
    }
    writeln!(out, "</div>")
}

fn write_diff(out: &mut String, pane: &DiffPane, report: &Report) -> std::fmt::Result {
    if !pane.caption.is_empty() {
        writeln!(out, "<h3>{}</h3>", escape_html(&pane.caption))?;
    }
    let old_label = if report.reference_label.is_empty() {
        "Old"
    } else {
        report.reference_label.as_str()
    };
    let new_label = if report.candidate_label.is_empty() {
        "New"
    } else {
        report.candidate_label.as_str()
    };

    let mut old_html = String::new();
    let mut new_html = String::new();
    for span in &pane.spans {
        let old_text = escape_html(span.old_text(&pane.old));
        let new_text = escape_html(span.new_text(&pane.new));
        match span.tag {
            DiffTag::Equal => {
                write!(old_html, "<span class=\"unchanged\">{}</span>", old_text)?;
                write!(new_html, "<span class=\"unchanged\">{}</span>", new_text)?;
            }
            DiffTag::Delete => {
                write!(old_html, "<span class=\"removed\">{}</span>", old_text)?;
            }
            DiffTag::Insert => {
                write!(new_html, "<span class=\"added\">{}</span>", new_text)?;
            }
            DiffTag::Replace => {
                write!(old_html, "<span class=\"changed\">{}</span>", old_text)?;
                write!(new_html, "<span class=\"changed\">{}</span>", new_text)?;
            }
        }
    }

    writeln!(
        out,
        "<table class=\"diff\">\n<tr><th>{}</th><th>{}</th></tr>\n<tr><td class=\"pane\">{}</td><td class=\"pane\">{}</td></tr>\n</table>",
        escape_html(old_label),
        escape_html(new_label),
        old_html,
        new_html
    )
}

fn write_table(out: &mut String, table: &ReportTable) -> std::fmt::Result {
    writeln!(out, "<table>")?;
    if !table.headers.is_empty() {
        write!(out, "<tr>")?;
        for header in &table.headers {
            write!(out, "<th>{}</th>", escape_html(header))?;
        }
        writeln!(out, "</tr>")?;
    }
    for row in &table.rows {
        write!(out, "<tr>")?;
        for cell in row {
            write!(out, "<td>{}</td>", escape_html(cell))?;
        }
        writeln!(out, "</tr>")?;
    }
    writeln!(out, "</table>")
}

fn write_messages(out: &mut String, issues: &[Issue]) -> std::fmt::Result {
    writeln!(out, "<ul class=\"messages\">")?;
    for issue in issues {
        writeln!(
            out,
            "<li class=\"{}\">{}</li>",
            severity_class(issue.severity),
            escape_html(&issue.message)
        )?;
    }
    writeln!(out, "</ul>")
}

/// Render a report and write it to `path` in one pass.
pub fn write_html(report: &Report, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let html = HtmlRenderer::new().render(report);
    fs::write(path, html).map_err(|e| Error::report_write(path, e))?;
    log::debug!("Wrote HTML report to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use doccheck_core::{Confidence, Differ, Granularity};
    use tempfile::TempDir;

    fn sample_report() -> Report {
        let mut report = Report::new("Check <1>").with_labels("old.pdf", "new & improved");
        let diff = Differ::with_granularity(Granularity::Char).compare("The fox", "The fox.");
        let mut section = Section::new("1_intro.md")
            .with_target("Page 1")
            .with_score(0.96, Confidence::Strict);
        section.push(Block::Diff(DiffPane::new("Text", "The fox", "The fox.", diff)));
        section.push_messages(vec![Issue::warning("Bullet count differs")]);
        report.push_section(section);
        report.summary.total = 1;
        report.summary.record_changed("1_intro.md");
        report.note("threshold=0.97");
        report
    }

    #[test]
    fn test_similarity_classes() {
        assert_eq!(similarity_class(1.0), "similarity-high");
        assert_eq!(similarity_class(0.95), "similarity-high");
        assert_eq!(similarity_class(0.9), "similarity-medium");
        assert_eq!(similarity_class(0.85), "similarity-medium");
        assert_eq!(similarity_class(0.5), "similarity-low");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_render_sections() {
        let html = HtmlRenderer::new().render(&sample_report());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Check &lt;1&gt;</title>"));
        assert!(html.contains("new &amp; improved"));
        assert!(html.contains("Matched: Page 1"));
        assert!(html.contains("<span class=\"similarity-high\">96.00%</span>"));
        assert!(html.contains("Confidence: strict"));
        assert!(html.contains("<span class=\"unchanged\">The fox</span>"));
        assert!(html.contains("<span class=\"added\">.</span>"));
        assert!(html.contains("<li class=\"warning\">Bullet count differs</li>"));
        assert!(html.contains("<li>1_intro.md</li>"));
        assert!(html.contains("threshold=0.97"));
    }

    #[test]
    fn test_unchanged_sections_can_be_hidden() {
        let mut report = Report::new("r");
        let diff = Differ::with_granularity(Granularity::Word).compare("same", "same");
        let mut section = Section::new("Quiet section");
        section.push(Block::Diff(DiffPane::new("", "same", "same", diff)));
        report.push_section(section);

        assert!(HtmlRenderer::new().render(&report).contains("Quiet section"));
        assert!(!HtmlRenderer::new()
            .with_unchanged(false)
            .render(&report)
            .contains("Quiet section"));
    }

    #[test]
    fn test_write_html() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.html");
        write_html(&sample_report(), &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("1_intro.md"));
    }

    #[test]
    fn test_write_failure_is_report_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("report.html");
        match write_html(&sample_report(), &path) {
            Err(Error::ReportWrite { path: p, .. }) => assert!(p.ends_with("report.html")),
            other => panic!("expected a report write error, got {:?}", other),
        }
    }
}
