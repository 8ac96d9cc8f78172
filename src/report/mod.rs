//! Report rendering.
//!
//! Turns an [`AnalysisResult`] (or a [`ComparisonResult`]) into the bytes of
//! one artifact encoding.

pub mod generator;
pub mod spreadsheet;

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{AnalysisResult, ComparisonResult, OutputFormat};

pub use generator::*;
pub use spreadsheet::*;

/// A rendered report ready to be written or delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub filename: String,
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Keep only characters that are safe in file names.
fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if stem.is_empty() {
        "project".to_string()
    } else {
        stem
    }
}

/// `{stem}_time_report_{YYYYMMDD}.{ext}`
pub fn artifact_filename(stem: &str, format: OutputFormat, date: NaiveDate) -> String {
    format!(
        "{}_time_report_{}.{}",
        file_stem(stem),
        date.format("%Y%m%d"),
        format.extension()
    )
}

/// Render a single-project result in `format`.
pub fn render(result: &AnalysisResult, format: OutputFormat) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Structured => generate_json_report(result),
        OutputFormat::Tabular => generate_tabular_report(result),
        OutputFormat::Spreadsheet => generate_spreadsheet_report(result),
    }
}

/// Render a multi-project comparison in `format`.
pub fn render_comparison(comparison: &ComparisonResult, format: OutputFormat) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Structured => generate_json_comparison(comparison),
        OutputFormat::Tabular => generate_tabular_comparison(comparison),
        OutputFormat::Spreadsheet => generate_spreadsheet_comparison(comparison),
    }
}

/// Render a result into a named artifact dated `date`.
pub fn render_artifact(
    result: &AnalysisResult,
    format: OutputFormat,
    date: NaiveDate,
) -> Result<Artifact> {
    Ok(Artifact {
        filename: artifact_filename(&result.project.identifier, format, date),
        format,
        bytes: render(result, format)?,
    })
}

/// Render a comparison into a named artifact dated `date`.
pub fn render_comparison_artifact(
    comparison: &ComparisonResult,
    format: OutputFormat,
    date: NaiveDate,
) -> Result<Artifact> {
    Ok(Artifact {
        filename: artifact_filename("comparison", format, date),
        format,
        bytes: render_comparison(comparison, format)?,
    })
}
