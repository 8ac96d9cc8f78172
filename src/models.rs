//! Data models for the report engine.
//!
//! This module contains the core data structures used throughout
//! the application for representing tracker records, analysis requests
//! and the aggregated analysis result.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::delivery::DeliveryTarget;

/// Sentinel used for grouping keys that have no value.
pub const NONE_LABEL: &str = "(none)";

/// Placeholder for issue attributes that were not part of the fetched set.
pub const UNKNOWN_LABEL: &str = "(unknown)";

/// An `id` + `name` pair as returned by the tracker for users, activities,
/// trackers, statuses and versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: u64,
    pub name: String,
}

impl NamedRef {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A resolved project: the identifier used in API calls plus its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub identifier: String,
    pub name: String,
}

/// Which issues to include, by open/closed state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatusFilter {
    /// Every issue regardless of status
    #[default]
    All,
    /// Only open issues
    Open,
    /// Only closed issues
    Closed,
}

impl IssueStatusFilter {
    /// Value of the tracker's `status_id` search parameter.
    ///
    /// `*` bypasses the tracker's default open-only filter.
    pub fn as_query_value(&self) -> &'static str {
        match self {
            IssueStatusFilter::All => "*",
            IssueStatusFilter::Open => "open",
            IssueStatusFilter::Closed => "closed",
        }
    }
}

impl fmt::Display for IssueStatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueStatusFilter::All => write!(f, "all"),
            IssueStatusFilter::Open => write!(f, "open"),
            IssueStatusFilter::Closed => write!(f, "closed"),
        }
    }
}

/// Artifact encoding produced by the renderer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Nested JSON document (default)
    #[default]
    #[value(alias = "json")]
    Structured,
    /// Plain-text sections of comma-separated rows
    #[value(aliases = ["csv", "tabular-text"])]
    Tabular,
    /// Multi-sheet XLSX workbook
    #[value(alias = "xlsx")]
    Spreadsheet,
}

impl OutputFormat {
    /// File extension for artifacts in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Structured => "json",
            OutputFormat::Tabular => "csv",
            OutputFormat::Spreadsheet => "xlsx",
        }
    }

    /// MIME type sent along with uploads.
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Structured => "application/json",
            OutputFormat::Tabular => "text/csv",
            OutputFormat::Spreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Structured => write!(f, "structured"),
            OutputFormat::Tabular => write!(f, "tabular"),
            OutputFormat::Spreadsheet => write!(f, "spreadsheet"),
        }
    }
}

/// One logged effort record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: u64,
    /// Logged hours (non-negative).
    pub hours: f64,
    pub user: NamedRef,
    pub activity: NamedRef,
    /// Linked issue, `None` for unlinked entries.
    pub issue_id: Option<u64>,
    /// Spent-on date as sent by the tracker (`YYYY-MM-DD`).
    pub spent_on: String,
    #[serde(default)]
    pub comments: String,
}

/// Value of a custom field on an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// No value set.
    Empty,
    /// A single scalar value.
    Single(String),
    /// A multi-value field.
    Multi(Vec<String>),
    /// A value that could not be coerced into text.
    Unsupported,
}

impl FieldValue {
    /// Coerce a raw JSON value into a field value.
    ///
    /// Strings, numbers and booleans become `Single`; arrays of those become
    /// `Multi`; anything else is `Unsupported`.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        fn scalar(value: &Value) -> Option<String> {
            match value {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            }
        }

        match value {
            Value::Null => FieldValue::Empty,
            Value::Array(items) => items
                .iter()
                .map(scalar)
                .collect::<Option<Vec<_>>>()
                .map(FieldValue::Multi)
                .unwrap_or(FieldValue::Unsupported),
            other => scalar(other)
                .map(FieldValue::Single)
                .unwrap_or(FieldValue::Unsupported),
        }
    }

    /// The grouping label for this value, `None` when absent or empty.
    ///
    /// Multi-value fields are comma-joined into one label.
    pub fn label(&self) -> Option<String> {
        match self {
            FieldValue::Single(s) if !s.trim().is_empty() => Some(s.clone()),
            FieldValue::Multi(values) => {
                let values: Vec<&str> = values
                    .iter()
                    .map(|v| v.as_str())
                    .filter(|v| !v.trim().is_empty())
                    .collect();
                if values.is_empty() {
                    None
                } else {
                    Some(values.join(", "))
                }
            }
            _ => None,
        }
    }
}

/// A named custom field value attached to an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldValue {
    pub name: String,
    pub value: FieldValue,
}

/// One tracked work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: u64,
    pub subject: String,
    pub tracker: NamedRef,
    pub status: NamedRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<NamedRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_version: Option<NamedRef>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldValue>,
    /// Closed-date marker, present once the issue has been closed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_on: Option<String>,
}

impl Issue {
    /// Look up a custom field by name.
    pub fn custom_field(&self, name: &str) -> Option<&FieldValue> {
        self.custom_fields
            .iter()
            .find(|cf| cf.name == name)
            .map(|cf| &cf.value)
    }
}

/// Immutable filter/configuration for one analysis run.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    /// Project identifier (or numeric id) as understood by the tracker.
    pub project: String,
    /// Inclusive lower bound on the spent-on date.
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the spent-on date.
    pub date_to: Option<NaiveDate>,
    pub issue_status: IssueStatusFilter,
    /// Version name, resolved to an id before fetching.
    pub version: Option<String>,
    /// Custom fields to aggregate; empty means every field that appears.
    pub custom_fields: Vec<String>,
    pub output_format: OutputFormat,
    pub delivery_target: Option<DeliveryTarget>,
}

/// Filters as they were applied, echoed back in the result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppliedFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
    pub issue_status: IssueStatusFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_fields: Vec<String>,
}

/// Headline numbers for a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_hours: f64,
    pub entry_count: usize,
    pub total_issues: usize,
    pub open_issues: usize,
    pub closed_issues: usize,
    /// Distinct users with logged time.
    pub contributors: usize,
    pub person_days: f64,
    pub avg_hours_per_issue: f64,
    pub avg_hours_per_contributor: f64,
}

/// One row of a grouped table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRow {
    pub name: String,
    pub hours: f64,
    pub issue_count: usize,
    pub avg_hours: f64,
}

/// A grouped row that also carries its share of the total hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareRow {
    pub name: String,
    pub hours: f64,
    pub issue_count: usize,
    pub percentage: f64,
}

/// One of the most time-consuming issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopIssue {
    pub issue_id: u64,
    pub subject: String,
    pub tracker: String,
    pub status: String,
    pub hours: f64,
}

/// The complete analysis of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub project: ProjectRef,
    pub filters: AppliedFilters,
    pub summary: Summary,
    pub by_tracker: Vec<GroupRow>,
    pub by_user: Vec<GroupRow>,
    pub by_activity: Vec<ShareRow>,
    pub by_version: Vec<GroupRow>,
    pub by_custom_field: BTreeMap<String, Vec<ShareRow>>,
    pub by_month: Vec<GroupRow>,
    pub top_issues: Vec<TopIssue>,
    /// Hours on entries without an issue reference.
    pub unlinked_hours: f64,
}

/// Summary line of one project in comparison mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub project: ProjectRef,
    pub summary: Summary,
    pub unlinked_hours: f64,
}

/// Side-by-side summaries of several projects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub projects: Vec<ProjectSummary>,
}

impl ComparisonResult {
    pub fn from_results(results: &[AnalysisResult]) -> Self {
        Self {
            projects: results
                .iter()
                .map(|r| ProjectSummary {
                    project: r.project.clone(),
                    summary: r.summary.clone(),
                    unlinked_hours: r.unlinked_hours,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_filter_query_value() {
        assert_eq!(IssueStatusFilter::All.as_query_value(), "*");
        assert_eq!(IssueStatusFilter::Open.as_query_value(), "open");
        assert_eq!(IssueStatusFilter::Closed.as_query_value(), "closed");
    }

    #[test]
    fn test_output_format_metadata() {
        assert_eq!(OutputFormat::Structured.extension(), "json");
        assert_eq!(OutputFormat::Tabular.content_type(), "text/csv");
        assert!(OutputFormat::Spreadsheet
            .content_type()
            .contains("spreadsheetml"));
    }

    #[test]
    fn test_field_value_coercion() {
        assert_eq!(FieldValue::from_json(&json!(null)), FieldValue::Empty);
        assert_eq!(
            FieldValue::from_json(&json!("High")),
            FieldValue::Single("High".to_string())
        );
        assert_eq!(
            FieldValue::from_json(&json!(3)),
            FieldValue::Single("3".to_string())
        );
        assert_eq!(
            FieldValue::from_json(&json!(["a", "b"])),
            FieldValue::Multi(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            FieldValue::from_json(&json!({"nested": true})),
            FieldValue::Unsupported
        );
        assert_eq!(
            FieldValue::from_json(&json!(["a", {"x": 1}])),
            FieldValue::Unsupported
        );
    }

    #[test]
    fn test_field_value_label() {
        assert_eq!(FieldValue::Empty.label(), None);
        assert_eq!(FieldValue::Single("  ".to_string()).label(), None);
        assert_eq!(FieldValue::Unsupported.label(), None);
        assert_eq!(FieldValue::Multi(vec![]).label(), None);
        assert_eq!(
            FieldValue::Multi(vec!["web".to_string(), "api".to_string()]).label(),
            Some("web, api".to_string())
        );
    }
}
