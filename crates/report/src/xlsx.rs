//! Excel workbook output: one worksheet per report table plus a summary.

use doccheck_core::{Error, Report, ReportTable, Result};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::path::Path;

/// Excel's limit on worksheet name length.
const MAX_SHEET_NAME: usize = 31;
/// Narrowest auto-sized column, in characters.
const MIN_COLUMN_WIDTH: usize = 8;

/// Writes report tables as worksheets.
#[derive(Debug, Clone)]
pub struct XlsxWriter {
    /// Widest a column is auto-sized to, in characters.
    max_column_width: usize,
}

impl Default for XlsxWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl XlsxWriter {
    pub fn new() -> Self {
        Self {
            max_column_width: 60,
        }
    }

    /// Values below the minimum column width are raised to it.
    pub fn with_max_column_width(mut self, width: usize) -> Self {
        self.max_column_width = width.max(MIN_COLUMN_WIDTH);
        self
    }

    /// Write every report table, then a "Summary" sheet, to `path`.
    pub fn write(&self, report: &Report, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut workbook = Workbook::new();
        let header = Format::new().set_bold();
        let mut used: Vec<String> = Vec::new();

        for table in &report.tables {
            let name = unique_sheet_name(&table.caption, &used);
            let worksheet = workbook
                .add_worksheet()
                .set_name(&name)
                .map_err(|e| Error::report_write(path, e))?;
            self.write_table(worksheet, table, &header)
                .map_err(|e| Error::report_write(path, e))?;
            used.push(name);
        }

        let name = unique_sheet_name("Summary", &used);
        let worksheet = workbook
            .add_worksheet()
            .set_name(&name)
            .map_err(|e| Error::report_write(path, e))?;
        write_summary(worksheet, report, &header).map_err(|e| Error::report_write(path, e))?;

        workbook
            .save(path)
            .map_err(|e| Error::report_write(path, e))?;
        log::debug!("Wrote workbook to {}", path.display());
        Ok(())
    }

    fn write_table(
        &self,
        worksheet: &mut Worksheet,
        table: &ReportTable,
        header: &Format,
    ) -> std::result::Result<(), XlsxError> {
        for (col, title) in table.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, title, header)?;
        }
        for (row, cells) in table.rows.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                let row = row as u32 + 1;
                match cell.parse::<f64>() {
                    Ok(n) if n.is_finite() && !cell.trim().is_empty() => worksheet.write_number(row, col as u16, n)?,
                    _ => worksheet.write_string(row, col as u16, cell)?,
                };
            }
        }

        let columns = table
            .headers
            .len()
            .max(table.rows.iter().map(Vec::len).max().unwrap_or(0));
        for col in 0..columns {
            let widest = std::iter::once(table.headers.get(col))
                .chain(table.rows.iter().map(|r| r.get(col)))
                .flatten()
                .map(|s| s.lines().map(|l| l.chars().count()).max().unwrap_or(0))
                .max()
                .unwrap_or(0);
            let width = (widest + 2).clamp(MIN_COLUMN_WIDTH, self.max_column_width);
            worksheet.set_column_width(col as u16, width as f64)?;
        }
        Ok(())
    }
}

fn write_summary(
    worksheet: &mut Worksheet,
    report: &Report,
    header: &Format,
) -> std::result::Result<(), XlsxError> {
    worksheet.write_string_with_format(0, 0, "Metric", header)?;
    worksheet.write_string_with_format(0, 1, "Value", header)?;

    let mut row = 1u32;
    for (name, value) in report.summary.counts() {
        worksheet.write_string(row, 0, name)?;
        worksheet.write_number(row, 1, value as f64)?;
        row += 1;
    }

    let lists = [
        ("Changed units", &report.summary.changed_units),
        ("Skipped units", &report.summary.skipped_units),
        ("Mismatched units", &report.summary.mismatched_units),
    ];
    for (name, units) in lists {
        if units.is_empty() {
            continue;
        }
        row += 1;
        worksheet.write_string_with_format(row, 0, name, header)?;
        row += 1;
        for unit in units {
            worksheet.write_string(row, 0, unit)?;
            row += 1;
        }
    }
    worksheet.set_column_width(0, 30)?;
    Ok(())
}

/// Sheet name without the characters Excel rejects, cut to 31 characters
/// and made unique against `used`.
fn unique_sheet_name(caption: &str, used: &[String]) -> String {
    let cleaned: String = caption
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'');
    let base: String = if cleaned.is_empty() {
        "Sheet".to_string()
    } else {
        cleaned.chars().take(MAX_SHEET_NAME).collect()
    };

    let taken = |name: &str| used.iter().any(|u| u.eq_ignore_ascii_case(name));
    if !taken(&base) {
        return base;
    }
    (2..)
        .map(|n| {
            let suffix = format!(" ({})", n);
            let keep = MAX_SHEET_NAME - suffix.chars().count();
            format!("{}{}", base.chars().take(keep).collect::<String>(), suffix)
        })
        .find(|name| !taken(name))
        .unwrap_or(base)
}
