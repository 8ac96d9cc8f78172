//! Multi-sheet XLSX workbook generation.

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use crate::error::{EngineError, Result};
use crate::models::{AnalysisResult, ComparisonResult, GroupRow, ShareRow};

/// Sheets of a single-project workbook, in order.
pub const REPORT_SHEETS: [&str; 7] = [
    "Summary",
    "By Tracker",
    "By User",
    "By Version",
    "By Custom Field",
    "Monthly Trend",
    "Top Issues",
];

/// The only sheet of a comparison workbook.
pub const COMPARISON_SHEET: &str = "Summary Comparison";

const GROUP_HEADERS: [&str; 3] = ["Hours", "Issues", "Avg Hours"];

fn header(
    sheet: &mut Worksheet,
    row: u32,
    titles: &[&str],
    bold: &Format,
) -> Result<(), XlsxError> {
    for (col, title) in titles.iter().enumerate() {
        sheet.write_string_with_format(row, col as u16, *title, bold)?;
    }
    Ok(())
}

fn add_sheet<'a>(workbook: &'a mut Workbook, name: &str) -> Result<&'a mut Worksheet, XlsxError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;
    sheet.set_column_width(0, 32)?;
    Ok(sheet)
}

fn write_group_sheet(
    workbook: &mut Workbook,
    name: &str,
    key_title: &str,
    rows: &[GroupRow],
    bold: &Format,
) -> Result<(), XlsxError> {
    let sheet = add_sheet(workbook, name)?;
    let mut titles = vec![key_title];
    titles.extend(GROUP_HEADERS.iter().copied());
    header(sheet, 0, &titles, bold)?;

    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_string(r, 0, &row.name)?;
        sheet.write_number(r, 1, row.hours)?;
        sheet.write_number(r, 2, row.issue_count as f64)?;
        sheet.write_number(r, 3, row.avg_hours)?;
    }
    Ok(())
}

/// Write one field's table starting at `row`, returning the next free row.
fn write_share_block(
    sheet: &mut Worksheet,
    mut row: u32,
    field: &str,
    rows: &[ShareRow],
    bold: &Format,
) -> Result<u32, XlsxError> {
    sheet.write_string_with_format(row, 0, field, bold)?;
    row += 1;
    header(sheet, row, &["Value", "Hours", "Issues", "Percentage"], bold)?;
    row += 1;

    for share in rows {
        sheet.write_string(row, 0, &share.name)?;
        sheet.write_number(row, 1, share.hours)?;
        sheet.write_number(row, 2, share.issue_count as f64)?;
        sheet.write_number(row, 3, share.percentage)?;
        row += 1;
    }
    Ok(row)
}

fn write_summary_sheet(
    workbook: &mut Workbook,
    result: &AnalysisResult,
    bold: &Format,
) -> Result<(), XlsxError> {
    let sheet = add_sheet(workbook, REPORT_SHEETS[0])?;
    header(sheet, 0, &["Metric", "Value"], bold)?;

    sheet.write_string(1, 0, "Project")?;
    sheet.write_string(1, 1, &result.project.name)?;

    let s = &result.summary;
    let metrics = [
        ("Total Hours", s.total_hours),
        ("Time Entries", s.entry_count as f64),
        ("Issues", s.total_issues as f64),
        ("Open Issues", s.open_issues as f64),
        ("Closed Issues", s.closed_issues as f64),
        ("Contributors", s.contributors as f64),
        ("Person Days", s.person_days),
        ("Avg Hours per Issue", s.avg_hours_per_issue),
        ("Avg Hours per Contributor", s.avg_hours_per_contributor),
        ("Unlinked Hours", result.unlinked_hours),
    ];
    for (i, (label, value)) in metrics.iter().enumerate() {
        let r = i as u32 + 2;
        sheet.write_string(r, 0, *label)?;
        sheet.write_number(r, 1, *value)?;
    }
    Ok(())
}

fn write_top_issues_sheet(
    workbook: &mut Workbook,
    result: &AnalysisResult,
    bold: &Format,
) -> Result<(), XlsxError> {
    let sheet = add_sheet(workbook, REPORT_SHEETS[6])?;
    header(sheet, 0, &["Issue", "Subject", "Tracker", "Status", "Hours"], bold)?;
    sheet.set_column_width(0, 10)?;
    sheet.set_column_width(1, 48)?;

    for (i, issue) in result.top_issues.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_number(r, 0, issue.issue_id as f64)?;
        sheet.write_string(r, 1, &issue.subject)?;
        sheet.write_string(r, 2, &issue.tracker)?;
        sheet.write_string(r, 3, &issue.status)?;
        sheet.write_number(r, 4, issue.hours)?;
    }
    Ok(())
}

/// Build the single-project workbook without serializing it.
pub fn build_report_workbook(result: &AnalysisResult) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    write_summary_sheet(&mut workbook, result, &bold)?;
    write_group_sheet(&mut workbook, REPORT_SHEETS[1], "Tracker", &result.by_tracker, &bold)?;
    write_group_sheet(&mut workbook, REPORT_SHEETS[2], "User", &result.by_user, &bold)?;
    write_group_sheet(&mut workbook, REPORT_SHEETS[3], "Version", &result.by_version, &bold)?;

    // Fields are stacked vertically, separated by a blank row.
    let sheet = add_sheet(&mut workbook, REPORT_SHEETS[4])?;
    let mut row = 0;
    for (field, rows) in &result.by_custom_field {
        if row > 0 {
            row += 1;
        }
        row = write_share_block(sheet, row, field, rows, &bold)?;
    }

    write_group_sheet(&mut workbook, REPORT_SHEETS[5], "Month", &result.by_month, &bold)?;
    write_top_issues_sheet(&mut workbook, result, &bold)?;

    Ok(workbook)
}

/// Build the comparison workbook without serializing it.
pub fn build_comparison_workbook(comparison: &ComparisonResult) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let sheet = add_sheet(&mut workbook, COMPARISON_SHEET)?;
    header(
        sheet,
        0,
        &[
            "Project",
            "Total Hours",
            "Time Entries",
            "Issues",
            "Open Issues",
            "Closed Issues",
            "Contributors",
            "Person Days",
            "Unlinked Hours",
        ],
        &bold,
    )?;

    for (i, p) in comparison.projects.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_string(r, 0, &p.project.name)?;
        let values = [
            p.summary.total_hours,
            p.summary.entry_count as f64,
            p.summary.total_issues as f64,
            p.summary.open_issues as f64,
            p.summary.closed_issues as f64,
            p.summary.contributors as f64,
            p.summary.person_days,
            p.unlinked_hours,
        ];
        for (col, value) in values.iter().enumerate() {
            sheet.write_number(r, col as u16 + 1, *value)?;
        }
    }

    Ok(workbook)
}

fn build_error(e: XlsxError) -> EngineError {
    EngineError::Render {
        format: "spreadsheet",
        message: e.to_string(),
    }
}

fn save(mut workbook: Workbook) -> Result<Vec<u8>> {
    workbook.save_to_buffer().map_err(build_error)
}

/// Generate the XLSX encoding of a result.
pub fn generate_spreadsheet_report(result: &AnalysisResult) -> Result<Vec<u8>> {
    save(build_report_workbook(result).map_err(build_error)?)
}

/// Generate the XLSX encoding of a comparison.
pub fn generate_spreadsheet_comparison(comparison: &ComparisonResult) -> Result<Vec<u8>> {
    save(build_comparison_workbook(comparison).map_err(build_error)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{aggregate, AggregateOptions};
    use crate::models::{
        AppliedFilters, CustomFieldValue, FieldValue, Issue, NamedRef, ProjectRef, TimeEntry,
    };

    fn create_test_result() -> AnalysisResult {
        let mut issue = Issue {
            id: 1,
            subject: "Login fails".to_string(),
            tracker: NamedRef::new(1, "Bug"),
            status: NamedRef::new(1, "New"),
            project: None,
            fixed_version: None,
            custom_fields: vec![],
            closed_on: None,
        };
        issue.custom_fields = vec![
            CustomFieldValue {
                name: "Component".to_string(),
                value: FieldValue::Single("Auth".to_string()),
            },
            CustomFieldValue {
                name: "Severity".to_string(),
                value: FieldValue::Single("High".to_string()),
            },
        ];
        let entries = vec![TimeEntry {
            id: 1,
            hours: 3.5,
            user: NamedRef::new(1, "Dana"),
            activity: NamedRef::new(9, "Development"),
            issue_id: Some(1),
            spent_on: "2024-03-01".to_string(),
            comments: String::new(),
        }];

        aggregate(
            ProjectRef {
                identifier: "demo".to_string(),
                name: "Demo".to_string(),
            },
            AppliedFilters::default(),
            &entries,
            &[issue],
            &AggregateOptions::default(),
        )
    }

    #[test]
    fn test_report_workbook_sheets() {
        let mut workbook = build_report_workbook(&create_test_result()).unwrap();

        for name in REPORT_SHEETS {
            assert!(workbook.worksheet_from_name(name).is_ok(), "missing {name}");
        }
        assert!(workbook.worksheet_from_name(COMPARISON_SHEET).is_err());
        assert!(workbook.worksheet_from_name("Sheet1").is_err());
    }

    #[test]
    fn test_report_bytes_are_xlsx() {
        let bytes = generate_spreadsheet_report(&create_test_result()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_comparison_workbook_single_sheet() {
        let result = create_test_result();
        let comparison = ComparisonResult::from_results(&[result.clone(), result]);
        let mut workbook = build_comparison_workbook(&comparison).unwrap();

        assert!(workbook.worksheet_from_name(COMPARISON_SHEET).is_ok());
        assert!(workbook.worksheet_from_name("Summary").is_err());

        let bytes = generate_spreadsheet_comparison(&comparison).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
