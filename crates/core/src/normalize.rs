//! Text normalization applied to extracted units before comparison.
//!
//! Handles Unicode normalization, control character removal, whitespace
//! collapsing with optional line break preservation, table/rule markup
//! removal, and bullet standardization.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Regex to collapse multiple horizontal whitespace characters into one.
static WHITESPACE_COLLAPSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").unwrap());

/// Regex matching any whitespace run, including newlines.
static ANY_WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Runs of two or more dashes (Markdown table rules, horizontal rules).
static DASH_RULE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").unwrap());

/// A full stop at the end of a line.
static TRAILING_PERIOD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)\.[ \t]*$").unwrap());

/// Bullet glyphs that are rewritten to `-`.
const BULLET_CHARS: &[char] = &['•', '·', '▪', '◦', '‣'];

/// Text normalizer with switchable steps.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    /// Whether to preserve original line breaks.
    preserve_line_breaks: bool,
    /// Apply Unicode NFC composition.
    unicode_nfc: bool,
    /// Remove ASCII control characters (except newlines and tabs).
    strip_control: bool,
    /// Replace non-printable and non-ASCII characters with this string.
    ascii_only: Option<String>,
    /// Remove `|` and runs of `--`.
    strip_table_markup: bool,
    /// Rewrite bullet glyphs to `-`.
    standardize_bullets: bool,
    /// Drop full stops at line ends.
    strip_trailing_periods: bool,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextNormalizer {
    /// Create a normalizer that composes Unicode, strips control characters
    /// and collapses whitespace while keeping line breaks.
    pub fn new() -> Self {
        Self {
            preserve_line_breaks: true,
            unicode_nfc: true,
            strip_control: true,
            ascii_only: None,
            strip_table_markup: false,
            standardize_bullets: false,
            strip_trailing_periods: false,
        }
    }

    /// Set whether to preserve original line breaks.
    pub fn with_preserve_line_breaks(mut self, preserve: bool) -> Self {
        self.preserve_line_breaks = preserve;
        self
    }

    pub fn with_unicode_nfc(mut self, enabled: bool) -> Self {
        self.unicode_nfc = enabled;
        self
    }

    pub fn with_strip_control(mut self, enabled: bool) -> Self {
        self.strip_control = enabled;
        self
    }

    /// Replace every character outside printable ASCII with `replacement`.
    pub fn with_ascii_only(mut self, replacement: impl Into<String>) -> Self {
        self.ascii_only = Some(replacement.into());
        self
    }

    pub fn with_strip_table_markup(mut self, enabled: bool) -> Self {
        self.strip_table_markup = enabled;
        self
    }

    pub fn with_standardize_bullets(mut self, enabled: bool) -> Self {
        self.standardize_bullets = enabled;
        self
    }

    pub fn with_strip_trailing_periods(mut self, enabled: bool) -> Self {
        self.strip_trailing_periods = enabled;
        self
    }

    /// Normalize a block of text.
    pub fn normalize(&self, text: &str) -> String {
        // Normalize line endings to \n first
        let mut result = text.replace("\r\n", "\n").replace('\r', "\n");

        if self.unicode_nfc {
            result = result.nfc().collect();
        }

        if self.strip_control {
            result = result
                .chars()
                .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
                .collect();
        }

        if let Some(replacement) = &self.ascii_only {
            let mut output = String::with_capacity(result.len());
            for c in result.chars() {
                if c == '\n' || (' '..='~').contains(&c) {
                    output.push(c);
                } else {
                    output.push_str(replacement);
                }
            }
            result = output;
        }

        if self.strip_table_markup {
            result = result.replace('|', "");
            result = DASH_RULE_REGEX.replace_all(&result, "").into_owned();
        }

        if self.standardize_bullets {
            result = result
                .chars()
                .map(|c| if BULLET_CHARS.contains(&c) { '-' } else { c })
                .collect();
        }

        if self.strip_trailing_periods {
            result = TRAILING_PERIOD_REGEX.replace_all(&result, "").into_owned();
        }

        // Collapse whitespace (but preserve newlines if configured)
        if self.preserve_line_breaks {
            result
                .lines()
                .map(|line| WHITESPACE_COLLAPSE_REGEX.replace_all(line, " ").trim().to_string())
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            collapse_whitespace(&result)
        }
    }

    /// Normalize text, returning individual non-empty lines.
    pub fn normalize_to_lines(&self, text: &str) -> Vec<String> {
        self.normalize(text)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect()
    }
}

/// Collapse every whitespace run (newlines included) into one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    ANY_WHITESPACE_REGEX.replace_all(text, " ").trim().to_string()
}

/// Normalize a string for loose comparison.
///
/// Converts to lowercase, removes punctuation, and collapses whitespace.
pub fn normalize_for_comparison(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reduce text to ASCII alphanumerics, for use as a file name.
pub fn format_filename(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace_preserving_lines() {
        let normalizer = TextNormalizer::new();

        assert_eq!(normalizer.normalize("Hello    world"), "Hello world");
        assert_eq!(normalizer.normalize("  Hello  "), "Hello");
        assert_eq!(normalizer.normalize("\t\tHello\t\t"), "Hello");
        assert_eq!(
            normalizer.normalize("Line one\r\nLine two"),
            "Line one\nLine two"
        );
    }

    #[test]
    fn test_blank_lines_dropped() {
        let normalizer = TextNormalizer::new();
        assert_eq!(normalizer.normalize("Hello\n\n\nWorld"), "Hello\nWorld");
        assert_eq!(normalizer.normalize_to_lines("a\n \nb"), vec!["a", "b"]);
    }

    #[test]
    fn test_flatten_lines() {
        let normalizer = TextNormalizer::new().with_preserve_line_breaks(false);
        assert_eq!(normalizer.normalize("Line one\n  Line two "), "Line one Line two");
    }

    #[test]
    fn test_unicode_composition() {
        let normalizer = TextNormalizer::new();
        // "e" + combining acute accent composes to "é"
        assert_eq!(normalizer.normalize("caf\u{0065}\u{0301}"), "caf\u{e9}");
    }

    #[test]
    fn test_control_characters_removed() {
        let normalizer = TextNormalizer::new();
        assert_eq!(normalizer.normalize("Ti\u{0007}tle\u{000b}"), "Title");
    }

    #[test]
    fn test_ascii_only_replacement() {
        let normalizer = TextNormalizer::new().with_ascii_only(" ");
        assert_eq!(normalizer.normalize("smart “quotes”"), "smart quotes");
    }

    #[test]
    fn test_table_markup_removed() {
        let normalizer = TextNormalizer::new()
            .with_preserve_line_breaks(false)
            .with_strip_table_markup(true);
        assert_eq!(
            normalizer.normalize("| Name | Value |\n|------|-------|\n| a | 1 |"),
            "Name Value a 1"
        );
        // A single hyphen is content
        assert_eq!(normalizer.normalize("well-known"), "well-known");
    }

    #[test]
    fn test_standardize_bullets() {
        let normalizer = TextNormalizer::new().with_standardize_bullets(true);
        assert_eq!(normalizer.normalize("• one\n· two"), "- one\n- two");
    }

    #[test]
    fn test_strip_trailing_periods() {
        let normalizer = TextNormalizer::new().with_strip_trailing_periods(true);
        assert_eq!(
            normalizer.normalize("First sentence.\nSecond one. \nv1.2 stays"),
            "First sentence\nSecond one\nv1.2 stays"
        );
    }

    #[test]
    fn test_normalize_for_comparison() {
        assert_eq!(normalize_for_comparison("Amazing Grace!"), "amazing grace");
        assert_eq!(
            normalize_for_comparison("  How  Great   Thou Art  "),
            "how great thou art"
        );
        assert_eq!(normalize_for_comparison("It's Well"), "its well");
    }

    #[test]
    fn test_format_filename() {
        assert_eq!(format_filename("Quarterly Review: 2024!\n"), "QuarterlyReview2024");
        assert_eq!(format_filename("日本"), "");
    }
}
