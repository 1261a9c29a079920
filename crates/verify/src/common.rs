//! Loading and section building shared by the checks.

use doccheck_core::{Block, DiffPane, Error, Issue, Result, Section, TextDiff, Unit};
use doccheck_markdown::{read_dir, KeyBy, MarkdownDir, MarkdownOptions};
use doccheck_pptx::{Deck, PptxParser};
use std::path::Path;

pub(crate) fn load_deck(path: &Path) -> Result<Deck> {
    log::debug!("Reading deck {}", path.display());
    PptxParser::new().parse_file(path)
}

pub(crate) fn load_markdown(path: &Path, key_by: KeyBy) -> Result<MarkdownDir> {
    log::debug!("Reading Markdown directory {}", path.display());
    read_dir(path, &MarkdownOptions::default().with_key_by(key_by))
}

/// Reject a similarity threshold outside `[0, 1]`.
pub(crate) fn check_threshold(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::ConfigError(format!("{} {} is outside [0, 1]", name, value)))
    }
}

/// Issues of the given units, each prefixed with its unit label.
pub(crate) fn unit_issues(units: &[&Unit]) -> Vec<Issue> {
    units
        .iter()
        .flat_map(|unit| {
            unit.issues.iter().map(move |issue| Issue {
                severity: issue.severity,
                message: format!("{}: {}", unit.label, issue.message),
            })
        })
        .collect()
}

/// Section for a paired unit: the diff of `old` against `new` plus the
/// issues both units carry.
pub(crate) fn pair_section(title: &str, target: &str, old: &Unit, new: &Unit, diff: TextDiff) -> Section {
    let mut section = Section::new(title).with_target(target);
    section.push(Block::Diff(DiffPane::new(
        "",
        old.text.clone(),
        new.text.clone(),
        diff,
    )));
    section.push_messages(unit_issues(&[old, new]));
    section
}

/// Section for a unit that has no counterpart.
pub(crate) fn missing_section(unit: &Unit, message: impl Into<String>) -> Section {
    let mut section = Section::new(unit.label.clone());
    let mut issues = vec![Issue::warning(message)];
    issues.extend(unit_issues(&[unit]));
    section.push_messages(issues);
    section
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_threshold() {
        assert!(check_threshold("threshold", 0.0).is_ok());
        assert!(check_threshold("threshold", 1.0).is_ok());
        assert!(matches!(check_threshold("threshold", 1.5), Err(Error::ConfigError(_))));
        assert!(matches!(check_threshold("threshold", -0.1), Err(Error::ConfigError(_))));
        assert!(check_threshold("threshold", f64::NAN).is_err());
    }
}
