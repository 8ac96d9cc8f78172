//! Structured and tabular-text report generation.
//!
//! The tabular rendering is a sequence of sections separated by a blank
//! line. Each section starts with its title on its own line, followed by a
//! column header row and comma-separated data rows:
//!
//! - `Summary`: `metric,value`
//! - `By Tracker`: `tracker,hours,issue_count,avg_hours`
//! - `By User`: `user,hours,issue_count,avg_hours`
//! - `Monthly Trend`: `month,hours,issue_count,avg_hours`
//! - `Summary Comparison` (comparison mode only): `project,total_hours,
//!   entry_count,total_issues,open_issues,closed_issues,contributors,
//!   person_days,unlinked_hours`

use crate::error::{EngineError, Result};
use crate::models::{AnalysisResult, ComparisonResult, GroupRow, Summary};

fn render_error(format: &'static str, err: impl std::fmt::Display) -> EngineError {
    EngineError::Render {
        format,
        message: err.to_string(),
    }
}

/// Generate the structured (JSON) encoding of a result.
pub fn generate_json_report(result: &AnalysisResult) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(result).map_err(|e| render_error("structured", e))
}

/// Generate the structured (JSON) encoding of a comparison.
pub fn generate_json_comparison(comparison: &ComparisonResult) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(comparison).map_err(|e| render_error("structured", e))
}

/// One titled block of comma-separated rows.
fn write_section(title: &str, header: &[&str], rows: Vec<Vec<String>>) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    let to_err = |e: csv::Error| render_error("tabular", e);
    writer.write_record([title]).map_err(to_err)?;
    writer.write_record(header).map_err(to_err)?;
    for row in rows {
        writer.write_record(&row).map_err(to_err)?;
    }

    writer
        .into_inner()
        .map_err(|e| render_error("tabular", e.error()))
}

fn join_sections(sections: Vec<Vec<u8>>) -> Vec<u8> {
    let mut output = Vec::new();
    for (i, section) in sections.into_iter().enumerate() {
        if i > 0 {
            output.push(b'\n');
        }
        output.extend(section);
    }
    output
}

fn summary_rows(result: &AnalysisResult) -> Vec<Vec<String>> {
    let s: &Summary = &result.summary;
    [
        ("project", result.project.name.clone()),
        ("total_hours", s.total_hours.to_string()),
        ("entry_count", s.entry_count.to_string()),
        ("total_issues", s.total_issues.to_string()),
        ("open_issues", s.open_issues.to_string()),
        ("closed_issues", s.closed_issues.to_string()),
        ("contributors", s.contributors.to_string()),
        ("person_days", s.person_days.to_string()),
        ("avg_hours_per_issue", s.avg_hours_per_issue.to_string()),
        (
            "avg_hours_per_contributor",
            s.avg_hours_per_contributor.to_string(),
        ),
        ("unlinked_hours", result.unlinked_hours.to_string()),
    ]
    .into_iter()
    .map(|(metric, value)| vec![metric.to_string(), value])
    .collect()
}

fn group_rows(rows: &[GroupRow]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|r| {
            vec![
                r.name.clone(),
                r.hours.to_string(),
                r.issue_count.to_string(),
                r.avg_hours.to_string(),
            ]
        })
        .collect()
}

/// Generate the flat tabular-text encoding of a result.
pub fn generate_tabular_report(result: &AnalysisResult) -> Result<Vec<u8>> {
    let sections = vec![
        write_section("Summary", &["metric", "value"], summary_rows(result))?,
        write_section(
            "By Tracker",
            &["tracker", "hours", "issue_count", "avg_hours"],
            group_rows(&result.by_tracker),
        )?,
        write_section(
            "By User",
            &["user", "hours", "issue_count", "avg_hours"],
            group_rows(&result.by_user),
        )?,
        write_section(
            "Monthly Trend",
            &["month", "hours", "issue_count", "avg_hours"],
            group_rows(&result.by_month),
        )?,
    ];

    Ok(join_sections(sections))
}

/// Generate the tabular-text encoding of a comparison.
pub fn generate_tabular_comparison(comparison: &ComparisonResult) -> Result<Vec<u8>> {
    let rows = comparison
        .projects
        .iter()
        .map(|p| {
            vec![
                p.project.name.clone(),
                p.summary.total_hours.to_string(),
                p.summary.entry_count.to_string(),
                p.summary.total_issues.to_string(),
                p.summary.open_issues.to_string(),
                p.summary.closed_issues.to_string(),
                p.summary.contributors.to_string(),
                p.summary.person_days.to_string(),
                p.unlinked_hours.to_string(),
            ]
        })
        .collect();

    write_section(
        "Summary Comparison",
        &[
            "project",
            "total_hours",
            "entry_count",
            "total_issues",
            "open_issues",
            "closed_issues",
            "contributors",
            "person_days",
            "unlinked_hours",
        ],
        rows,
    )
}
