//! CLI tool for checking slide decks, PDFs and Markdown trees against each other.

mod config;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use config::FileConfig;
use doccheck_core::{AlignConfig, Assignment, Report, Window};
use doccheck_pptx::PptxParser;
use doccheck_report::{write_html, XlsxWriter};
use doccheck_verify::{
    workbook_file_name, CodeBlocks, DeckToMarkdown, DeckVersions, ImageCounts, LinkCheck,
    MarkdownLint, MarkdownToPdf, MarkdownVersions, PdfToMarkdown,
};
use std::path::{Path, PathBuf};

/// Check decks, PDFs and Markdown trees for consistency.
#[derive(Parser, Debug)]
#[command(name = "doccheck")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// HTML report path (default: <check>_report.html)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// TOML settings file; command-line flags take precedence
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the summary counts as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use optimal (bipartite) assignment instead of greedy matching
    #[arg(long, global = true)]
    optimal: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Slides of a deck against Markdown files numbered after them
    DeckMd {
        deck: PathBuf,
        markdown: PathBuf,
        /// Pairs scoring at or below this are reported as changed
        #[arg(long)]
        threshold: Option<f64>,
        /// Leave speaker notes out of the slide text
        #[arg(long)]
        no_notes: bool,
    },
    /// Markdown files against the best-matching PDF page
    MdPdf {
        markdown: PathBuf,
        pdf: PathBuf,
        #[command(flatten)]
        thresholds: Thresholds,
    },
    /// PDF pages against Markdown files numbered after them
    PdfMd {
        pdf: PathBuf,
        markdown: PathBuf,
        /// Scores at or above this are strict matches
        #[arg(long)]
        strict: Option<f64>,
        /// Pages scoring below this are reported as changed
        #[arg(long)]
        threshold: Option<f64>,
        /// Markdown prefix n belongs to PDF page n + offset
        #[arg(long, allow_hyphen_values = true)]
        page_offset: Option<i64>,
        /// Keep the first and last line of every page
        #[arg(long)]
        keep_headers: bool,
    },
    /// Two versions of a Markdown tree
    MdMd {
        old: PathBuf,
        new: PathBuf,
        #[command(flatten)]
        thresholds: Thresholds,
        /// Matched files scoring at or below this are reported as changed
        #[arg(long)]
        change_threshold: Option<f64>,
    },
    /// Two versions of a slide deck
    DeckDeck {
        old: PathBuf,
        new: PathBuf,
        /// Slide number radius for title and content matching
        #[arg(long)]
        window: Option<u32>,
        /// Workbook path (default: named after the first slide title of the new deck)
        #[arg(long)]
        xlsx: Option<PathBuf>,
        /// Match slides by title only
        #[arg(long)]
        no_content_match: bool,
    },
    /// PDF image counts against Markdown image references
    Images {
        pdf: PathBuf,
        markdown: PathBuf,
        /// Markdown prefix n belongs to PDF page n + offset
        #[arg(long, allow_hyphen_values = true)]
        page_offset: Option<i64>,
        /// Pass pages where the PDF has more images than the Markdown
        #[arg(long, overrides_with = "no_tolerance")]
        tolerance: bool,
        /// Require exactly equal counts
        #[arg(long, overrides_with = "tolerance")]
        no_tolerance: bool,
        /// Decorative images subtracted from every PDF page
        #[arg(long)]
        decorative: Option<usize>,
        /// Also compare pages whose Markdown has no images
        #[arg(long)]
        include_empty: bool,
        /// Workbook path for the count tables
        #[arg(long)]
        xlsx: Option<PathBuf>,
    },
    /// PDF link annotations against the links of Markdown files numbered after each page
    Links {
        pdf: PathBuf,
        markdown: PathBuf,
        /// Markdown prefix n belongs to PDF page n + offset
        #[arg(long, allow_hyphen_values = true)]
        page_offset: Option<i64>,
        /// Only pair links whose URLs match exactly or whose texts agree
        #[arg(long)]
        no_domain_match: bool,
        /// Workbook path for the link tables
        #[arg(long)]
        xlsx: Option<PathBuf>,
    },
    /// Code spans and blocks of a source tree against its translation
    CodeBlocks {
        source: PathBuf,
        translated: PathBuf,
        /// Pairs below this code similarity are reported
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Table format, parent links, duplicate content and anchors of a Markdown tree
    Lint { markdown: PathBuf },
}

/// Aligner thresholds shared by the best-match checks.
#[derive(ClapArgs, Debug)]
struct Thresholds {
    /// Scores at or above this are strict matches
    #[arg(long)]
    strict: Option<f64>,
    /// Scores at or above this are low-confidence matches
    #[arg(long)]
    low: Option<f64>,
}

impl Thresholds {
    fn apply(&self, align: &mut AlignConfig) {
        if let Some(strict) = self.strict {
            align.strict = strict;
        }
        if let Some(low) = self.low {
            align.low = low;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let config = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    let report = run_check(&args, config)?;

    let output = output_path(&args)?;
    write_html(&report, &output)
        .with_context(|| format!("Failed to write report {}", output.display()))?;
    if args.verbose {
        eprintln!("Written to: {}", output.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.summary)?);
    } else {
        for (name, count) in report.summary.counts() {
            eprintln!("  {}: {}", name, count);
        }
    }

    Ok(())
}

/// Run the selected check with file settings overridden by flags.
fn run_check(args: &Args, mut config: FileConfig) -> Result<Report> {
    let assignment = if args.optimal {
        Some(Assignment::Optimal)
    } else {
        None
    };

    let report = match &args.command {
        Command::DeckMd {
            deck,
            markdown,
            threshold,
            no_notes,
        } => {
            announce(args, &[deck, markdown]);
            if let Some(threshold) = threshold {
                config.deck_md.threshold = *threshold;
            }
            if *no_notes {
                config.deck_md.include_notes = false;
            }
            DeckToMarkdown::new(config.deck_md).run(deck, markdown)?
        }
        Command::MdPdf {
            markdown,
            pdf,
            thresholds,
        } => {
            announce(args, &[markdown, pdf]);
            let align = &mut config.md_pdf.align;
            thresholds.apply(align);
            if let Some(assignment) = assignment {
                align.assignment = assignment;
            }
            MarkdownToPdf::new(config.md_pdf).run(markdown, pdf)?
        }
        Command::PdfMd {
            pdf,
            markdown,
            strict,
            threshold,
            page_offset,
            keep_headers,
        } => {
            announce(args, &[pdf, markdown]);
            let settings = &mut config.pdf_md;
            if let Some(strict) = strict {
                settings.strict = *strict;
            }
            if let Some(threshold) = threshold {
                settings.report_threshold = *threshold;
            }
            if let Some(offset) = page_offset {
                settings.page_offset = *offset;
            }
            if *keep_headers {
                settings.trim_headers_footers = false;
            }
            PdfToMarkdown::new(config.pdf_md).run(pdf, markdown)?
        }
        Command::MdMd {
            old,
            new,
            thresholds,
            change_threshold,
        } => {
            announce(args, &[old, new]);
            thresholds.apply(&mut config.md_md.align);
            if let Some(assignment) = assignment {
                config.md_md.align.assignment = assignment;
            }
            if let Some(threshold) = change_threshold {
                config.md_md.change_threshold = *threshold;
            }
            MarkdownVersions::new(config.md_md).run(old, new)?
        }
        Command::DeckDeck {
            old,
            new,
            window,
            xlsx,
            no_content_match,
        } => {
            announce(args, &[old, new]);
            let settings = &mut config.deck_deck;
            if let Some(radius) = window {
                settings.align.window = Some(Window::new(*radius));
            }
            if let Some(assignment) = assignment {
                settings.align.assignment = assignment;
            }
            if *no_content_match {
                settings.match_by_content = false;
            }
            settings.align.validate()?;

            let parser = PptxParser::new();
            let old_deck = parser
                .parse_file(old)
                .with_context(|| format!("Failed to read {}", old.display()))?;
            let new_deck = parser
                .parse_file(new)
                .with_context(|| format!("Failed to read {}", new.display()))?;
            if args.verbose {
                eprintln!(
                    "  Found {} and {} slides",
                    old_deck.slides.len(),
                    new_deck.slides.len()
                );
            }
            let report = DeckVersions::new(config.deck_deck).compare(&old_deck, &new_deck);

            let workbook = xlsx
                .clone()
                .unwrap_or_else(|| sibling(&output_path_or_default(args), &workbook_file_name(&new_deck)));
            write_workbook(args, &report, &workbook)?;
            report
        }
        Command::Images {
            pdf,
            markdown,
            page_offset,
            tolerance,
            no_tolerance,
            decorative,
            include_empty,
            xlsx,
        } => {
            announce(args, &[pdf, markdown]);
            let settings = &mut config.images;
            if let Some(offset) = page_offset {
                settings.page_offset = *offset;
            }
            if *tolerance {
                settings.tolerance = true;
            } else if *no_tolerance {
                settings.tolerance = false;
            }
            if let Some(decorative) = decorative {
                settings.pdf.decorative_per_page = *decorative;
            }
            if *include_empty {
                settings.ignore_zero_image_md = false;
            }
            let report = ImageCounts::new(config.images).run(pdf, markdown)?;
            if let Some(workbook) = xlsx {
                write_workbook(args, &report, workbook)?;
            }
            report
        }
        Command::Links {
            pdf,
            markdown,
            page_offset,
            no_domain_match,
            xlsx,
        } => {
            announce(args, &[pdf, markdown]);
            if let Some(offset) = page_offset {
                config.links.page_offset = *offset;
            }
            if *no_domain_match {
                config.links.match_by_domain = false;
            }
            let report = LinkCheck::new(config.links).run(pdf, markdown)?;
            if let Some(workbook) = xlsx {
                write_workbook(args, &report, workbook)?;
            }
            report
        }
        Command::CodeBlocks {
            source,
            translated,
            threshold,
        } => {
            announce(args, &[source, translated]);
            if let Some(threshold) = threshold {
                config.code_blocks.threshold = *threshold;
            }
            CodeBlocks::new(config.code_blocks).run(source, translated)?
        }
        Command::Lint { markdown } => {
            announce(args, &[markdown]);
            MarkdownLint::new(config.lint).run(markdown)?
        }
    };
    Ok(report)
}

fn announce(args: &Args, inputs: &[&PathBuf]) {
    if args.verbose {
        for input in inputs {
            eprintln!("Processing: {}", input.display());
        }
    }
}

fn write_workbook(args: &Args, report: &Report, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    XlsxWriter::new()
        .write(report, path)
        .with_context(|| format!("Failed to write workbook {}", path.display()))?;
    if args.verbose {
        eprintln!("Written to: {}", path.display());
    }
    Ok(())
}

fn check_name(command: &Command) -> &'static str {
    match command {
        Command::DeckMd { .. } => "deck_md",
        Command::MdPdf { .. } => "md_pdf",
        Command::PdfMd { .. } => "pdf_md",
        Command::MdMd { .. } => "md_md",
        Command::DeckDeck { .. } => "deck_deck",
        Command::Images { .. } => "images",
        Command::Links { .. } => "links",
        Command::CodeBlocks { .. } => "code_blocks",
        Command::Lint { .. } => "lint",
    }
}

fn output_path_or_default(args: &Args) -> PathBuf {
    args.output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}_report.html", check_name(&args.command))))
}

/// Determine the report path, creating its directory when needed.
fn output_path(args: &Args) -> Result<PathBuf> {
    let path = output_path_or_default(args);
    ensure_parent(&path)?;
    Ok(path)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }
    Ok(())
}

/// `name` in the directory of `path`.
fn sibling(path: &Path, name: &str) -> PathBuf {
    match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from([
            "doccheck", "pdf-md", "guide.pdf", "md", "--page-offset", "-1", "-o", "out/r.html", "--json",
        ]);
        assert!(args.json);
        assert_eq!(args.output, Some(PathBuf::from("out/r.html")));
        let Command::PdfMd { page_offset, .. } = args.command else {
            panic!("expected pdf-md");
        };
        assert_eq!(page_offset, Some(-1));
    }

    #[test]
    fn test_default_output_names_the_check() {
        let args = Args::parse_from(["doccheck", "lint", "docs"]);
        assert_eq!(output_path_or_default(&args), PathBuf::from("lint_report.html"));
    }

    #[test]
    fn test_tolerance_flags_last_wins() {
        let args = Args::parse_from(["doccheck", "images", "a.pdf", "md", "--tolerance", "--no-tolerance"]);
        let Command::Images { tolerance, no_tolerance, .. } = args.command else {
            panic!("expected images");
        };
        assert!(!tolerance);
        assert!(no_tolerance);
    }

    #[test]
    fn test_links_flags() {
        let args = Args::parse_from([
            "doccheck", "links", "guide.pdf", "md", "--page-offset", "2", "--no-domain-match",
        ]);
        assert_eq!(output_path_or_default(&args), PathBuf::from("links_report.html"));
        let Command::Links { page_offset, no_domain_match, xlsx, .. } = args.command else {
            panic!("expected links");
        };
        assert_eq!(page_offset, Some(2));
        assert!(no_domain_match);
        assert_eq!(xlsx, None);
    }

    #[test]
    fn test_sibling_keeps_directory() {
        assert_eq!(sibling(Path::new("out/r.html"), "Deck.xlsx"), PathBuf::from("out/Deck.xlsx"));
        assert_eq!(sibling(Path::new("r.html"), "Deck.xlsx"), PathBuf::from("Deck.xlsx"));
    }

    #[test]
    fn test_lint_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "# A\n\n[gone](#nowhere)").unwrap();
        let args = Args::parse_from(["doccheck", "lint", dir.path().to_str().unwrap()]);

        let report = run_check(&args, FileConfig::default()).unwrap();
        assert_eq!(report.summary.changed_units, vec!["a.md"]);
    }
}
