//! Markup stripping applied to Markdown before comparison.

use doccheck_core::TextNormalizer;
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Author front matter written by the export tool on one line.
static FRONT_MATTER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)authorinformation: .* audience:").unwrap());

/// A line holding nothing but an image.
static IMAGE_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*!\[.*?\]\(.*?\)\s*$").unwrap());

/// A line holding nothing but a link.
static LINK_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[.*?\]\(.*?\)\s*$").unwrap());

static INLINE_IMAGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[.*?\]\(.*?\)").unwrap());

static INLINE_LINK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());

static HTML_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>\n]+>").unwrap());

static HEADING_MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}#{1,6}\s+").unwrap());

static CLOSING_HASHES_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+#+\s*$").unwrap());

static LIST_MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+").unwrap());

static BLOCKQUOTE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(?:>\s?)+").unwrap());

static FENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(?:```|~~~)").unwrap());

/// Emphasis markers and code ticks. Single underscores are left alone, they
/// show up inside identifiers.
static EMPHASIS_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*+|_{2,}|`+").unwrap());

/// Remove inline images from a line. Text around the image is returned
/// unchanged.
pub fn strip_images(line: &str) -> Cow<'_, str> {
    INLINE_IMAGE_REGEX.replace_all(line, "")
}

/// Replace `[text](url)` with `text`.
pub fn unwrap_links(line: &str) -> Cow<'_, str> {
    INLINE_LINK_REGEX.replace_all(line, "$1")
}

/// Converts Markdown source into comparable text.
///
/// Each step can be switched off. The defaults suit prose comparison:
/// front matter, media-only lines and images go, link text stays, line
/// structure is kept.
#[derive(Debug, Clone)]
pub struct MarkdownCleaner {
    strip_front_matter: bool,
    /// Drop a first line starting with `--- authorinformation:`.
    old_variant: bool,
    drop_media_lines: bool,
    strip_images: bool,
    unwrap_links: bool,
    /// Strip HTML, headings, emphasis, list markers, fences, quotes and
    /// table markup.
    plain_text: bool,
    preserve_line_breaks: bool,
}

impl Default for MarkdownCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownCleaner {
    pub fn new() -> Self {
        Self {
            strip_front_matter: true,
            old_variant: false,
            drop_media_lines: true,
            strip_images: true,
            unwrap_links: true,
            plain_text: false,
            preserve_line_breaks: true,
        }
    }

    /// Cleaner producing a single line of plain text, as compared against
    /// PDF page text.
    pub fn plain() -> Self {
        Self::new()
            .with_plain_text(true)
            .with_preserve_line_breaks(false)
    }

    pub fn with_front_matter(mut self, strip: bool) -> Self {
        self.strip_front_matter = strip;
        self
    }

    pub fn with_old_variant(mut self, enabled: bool) -> Self {
        self.old_variant = enabled;
        self
    }

    pub fn with_media_lines(mut self, drop: bool) -> Self {
        self.drop_media_lines = drop;
        self
    }

    pub fn with_images(mut self, strip: bool) -> Self {
        self.strip_images = strip;
        self
    }

    pub fn with_links(mut self, unwrap: bool) -> Self {
        self.unwrap_links = unwrap;
        self
    }

    pub fn with_plain_text(mut self, enabled: bool) -> Self {
        self.plain_text = enabled;
        self
    }

    pub fn with_preserve_line_breaks(mut self, preserve: bool) -> Self {
        self.preserve_line_breaks = preserve;
        self
    }

    /// Clean a whole document.
    pub fn clean(&self, content: &str) -> String {
        let content = content.trim();
        let content = if self.strip_front_matter {
            FRONT_MATTER_REGEX.replace_all(content, "")
        } else {
            Cow::Borrowed(content)
        };

        let mut lines = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if self.old_variant
                && idx == 0
                && line.trim().to_lowercase().starts_with("--- authorinformation:")
            {
                continue;
            }
            if self.drop_media_lines
                && (IMAGE_LINE_REGEX.is_match(line) || LINK_LINE_REGEX.is_match(line))
            {
                continue;
            }

            let mut line = Cow::Borrowed(line);
            if self.strip_images {
                line = Cow::Owned(strip_images(&line).into_owned());
            }
            if self.unwrap_links {
                line = Cow::Owned(unwrap_links(&line).into_owned());
            }
            if self.plain_text {
                if FENCE_REGEX.is_match(&line) {
                    continue;
                }
                line = Cow::Owned(plain_line(&line));
            }

            if !line.trim().is_empty() {
                lines.push(line.into_owned());
            }
        }

        TextNormalizer::new()
            .with_preserve_line_breaks(self.preserve_line_breaks)
            .with_strip_table_markup(self.plain_text)
            .normalize(&lines.join("\n"))
    }
}

/// Strip block markers, tags and emphasis from one line.
fn plain_line(line: &str) -> String {
    let line = BLOCKQUOTE_REGEX.replace(line, "");
    let line = HEADING_MARKER_REGEX.replace(&line, "");
    let line = CLOSING_HASHES_REGEX.replace(&line, "");
    let line = LIST_MARKER_REGEX.replace(&line, "");
    let line = HTML_TAG_REGEX.replace_all(&line, " ");
    let line = EMPHASIS_REGEX.replace_all(&line, "");
    decode_entities(&line)
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_images_keeps_surrounding_text() {
        let before = "See the diagram ";
        let after = " for the wiring.";
        let line = format!("{}![a](b.png){}", before, after);
        assert_eq!(strip_images(&line), format!("{}{}", before, after));
    }

    #[test]
    fn test_unwrap_links() {
        assert_eq!(
            unwrap_links("Read [the guide](guide.md) first."),
            "Read the guide first."
        );
    }

    #[test]
    fn test_default_clean() {
        let source = "\
AuthorInformation: Jane Doe audience:
# Setup

![banner](img/banner.png)
[Back to index](index.md)
Install the ![icon](i.png)agent from [the portal](https://example.com).
";
        let cleaned = MarkdownCleaner::new().clean(source);
        assert_eq!(cleaned, "# Setup\nInstall the agent from the portal.");
    }

    #[test]
    fn test_old_variant_first_line() {
        let source = "--- authorinformation: x\nBody text";
        assert_eq!(
            MarkdownCleaner::new()
                .with_front_matter(false)
                .with_old_variant(true)
                .clean(source),
            "Body text"
        );
        // Only the first line is considered
        let source = "Body text\n--- authorinformation: x";
        assert_eq!(
            MarkdownCleaner::new()
                .with_front_matter(false)
                .with_old_variant(true)
                .clean(source),
            source
        );
    }

    #[test]
    fn test_plain_text() {
        let source = "\
## Options ##

> **Note:** use `--force` with care

| Name | Value |
|------|-------|
| a    | 1     |

- first &amp; second
1. <b>numbered</b>

```bash
run --now
```
";
        let cleaned = MarkdownCleaner::plain().clean(source);
        assert_eq!(
            cleaned,
            "Options Note: use force with care Name Value a 1 first & second numbered run now"
        );
    }

    #[test]
    fn test_media_lines_kept_when_disabled() {
        let cleaned = MarkdownCleaner::new()
            .with_media_lines(false)
            .with_images(false)
            .with_links(false)
            .clean("[Index](index.md)");
        assert_eq!(cleaned, "[Index](index.md)");
    }
}
