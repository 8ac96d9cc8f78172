//! Time entry aggregation and statistics.
//!
//! Every table is an independent pass over the same entries, sharing one
//! issue lookup built up front. Hours are summed unrounded and rounded
//! only when a row is emitted.

use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use super::rounding::round2;
use crate::models::{
    AnalysisResult, AppliedFilters, FieldValue, GroupRow, Issue, ProjectRef, ShareRow, Summary,
    TimeEntry, TopIssue, NONE_LABEL, UNKNOWN_LABEL,
};

/// Maximum number of rows in the top issues table.
pub const TOP_ISSUES_LIMIT: usize = 20;

/// Working hours in one person-day.
pub const DEFAULT_HOURS_PER_DAY: f64 = 8.0;

/// How an issue is classified as closed.
///
/// One strategy is used for a whole run; the two can disagree for trackers
/// that set a closed date under a status name missing from the table.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ClosedClassifier {
    /// The issue carries a closed-date marker.
    #[default]
    ClosedDate,
    /// The status name is in this table (compared case-insensitively).
    StatusNames(Vec<String>),
}

impl ClosedClassifier {
    pub fn status_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ClosedClassifier::StatusNames(
            names
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .collect(),
        )
    }

    pub fn is_closed(&self, issue: &Issue) -> bool {
        match self {
            ClosedClassifier::ClosedDate => issue
                .closed_on
                .as_deref()
                .is_some_and(|d| !d.trim().is_empty()),
            ClosedClassifier::StatusNames(names) => {
                let status = issue.status.name.trim().to_lowercase();
                names.iter().any(|n| *n == status)
            }
        }
    }
}

/// Tunables for one aggregation pass.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub top_issues_limit: usize,
    pub hours_per_day: f64,
    pub classifier: ClosedClassifier,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            top_issues_limit: TOP_ISSUES_LIMIT,
            hours_per_day: DEFAULT_HOURS_PER_DAY,
            classifier: ClosedClassifier::default(),
        }
    }
}

/// Hours and distinct linked issues accumulated for one group key.
#[derive(Debug, Default)]
struct Bucket {
    hours: f64,
    issues: HashSet<u64>,
}

impl Bucket {
    fn add(&mut self, entry: &TimeEntry) {
        self.hours += entry.hours;
        if let Some(id) = entry.issue_id {
            self.issues.insert(id);
        }
    }
}

type Buckets = HashMap<String, Bucket>;

/// Descending by hours, ties broken by ascending name.
fn by_hours_desc(a_hours: f64, a_name: &str, b_hours: f64, b_name: &str) -> Ordering {
    b_hours
        .partial_cmp(&a_hours)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a_name.cmp(b_name))
}

fn percentage(hours: f64, total: f64) -> f64 {
    if total > 0.0 {
        round2(hours / total * 100.0)
    } else {
        0.0
    }
}

fn group_rows(buckets: Buckets) -> Vec<GroupRow> {
    let mut rows: Vec<(String, Bucket)> = buckets.into_iter().collect();
    rows.sort_by(|(a_name, a), (b_name, b)| by_hours_desc(a.hours, a_name, b.hours, b_name));

    rows.into_iter()
        .map(|(name, bucket)| {
            let issue_count = bucket.issues.len();
            let avg_hours = if issue_count > 0 {
                round2(bucket.hours / issue_count as f64)
            } else {
                0.0
            };
            GroupRow {
                name,
                hours: round2(bucket.hours),
                issue_count,
                avg_hours,
            }
        })
        .collect()
}

fn share_rows(buckets: Buckets, total_hours: f64) -> Vec<ShareRow> {
    let mut rows: Vec<(String, Bucket)> = buckets.into_iter().collect();
    rows.sort_by(|(a_name, a), (b_name, b)| by_hours_desc(a.hours, a_name, b.hours, b_name));

    rows.into_iter()
        .map(|(name, bucket)| ShareRow {
            name,
            hours: round2(bucket.hours),
            issue_count: bucket.issues.len(),
            percentage: percentage(bucket.hours, total_hours),
        })
        .collect()
}

/// Reduction of one project's entries and issues.
pub struct Aggregator<'a> {
    entries: &'a [TimeEntry],
    issues: &'a [Issue],
    lookup: HashMap<u64, &'a Issue>,
    options: &'a AggregateOptions,
    total_hours: f64,
}

impl<'a> Aggregator<'a> {
    pub fn new(
        entries: &'a [TimeEntry],
        issues: &'a [Issue],
        options: &'a AggregateOptions,
    ) -> Self {
        let lookup = issues.iter().map(|i| (i.id, i)).collect();
        let total_hours: f64 = entries.iter().map(|e| e.hours).sum();

        Self {
            entries,
            issues,
            lookup,
            options,
            total_hours,
        }
    }

    /// Group linked entries by an attribute of their issue.
    ///
    /// Unlinked entries are skipped; entries whose issue was not fetched
    /// fall into the `(none)` group.
    fn group_by_issue<F>(&self, key: F) -> Buckets
    where
        F: Fn(&Issue) -> String,
    {
        let mut buckets = Buckets::new();
        for entry in self.entries {
            let Some(issue_id) = entry.issue_id else {
                continue;
            };
            let name = self
                .lookup
                .get(&issue_id)
                .map(|&issue| key(issue))
                .unwrap_or_else(|| NONE_LABEL.to_string());
            buckets.entry(name).or_default().add(entry);
        }
        buckets
    }

    pub fn summary(&self) -> Summary {
        let contributors: HashSet<u64> = self.entries.iter().map(|e| e.user.id).collect();
        let closed_issues = self
            .issues
            .iter()
            .filter(|i| self.options.classifier.is_closed(i))
            .count();

        let mut linked_hours = 0.0;
        let mut linked_issues = HashSet::new();
        for entry in self.entries {
            if let Some(id) = entry.issue_id {
                linked_hours += entry.hours;
                linked_issues.insert(id);
            }
        }

        let ratio = |numerator: f64, denominator: f64| {
            if denominator > 0.0 {
                round2(numerator / denominator)
            } else {
                0.0
            }
        };

        Summary {
            total_hours: round2(self.total_hours),
            entry_count: self.entries.len(),
            total_issues: self.issues.len(),
            open_issues: self.issues.len() - closed_issues,
            closed_issues,
            contributors: contributors.len(),
            person_days: ratio(self.total_hours, self.options.hours_per_day),
            avg_hours_per_issue: ratio(linked_hours, linked_issues.len() as f64),
            avg_hours_per_contributor: ratio(self.total_hours, contributors.len() as f64),
        }
    }

    pub fn by_tracker(&self) -> Vec<GroupRow> {
        group_rows(self.group_by_issue(|issue| issue.tracker.name.clone()))
    }

    pub fn by_version(&self) -> Vec<GroupRow> {
        group_rows(self.group_by_issue(|issue| {
            issue
                .fixed_version
                .as_ref()
                .map(|v| v.name.clone())
                .unwrap_or_else(|| NONE_LABEL.to_string())
        }))
    }

    pub fn by_user(&self) -> Vec<GroupRow> {
        let mut buckets = Buckets::new();
        for entry in self.entries {
            buckets.entry(entry.user.name.clone()).or_default().add(entry);
        }
        group_rows(buckets)
    }

    pub fn by_activity(&self) -> Vec<ShareRow> {
        let mut buckets = Buckets::new();
        for entry in self.entries {
            buckets
                .entry(entry.activity.name.clone())
                .or_default()
                .add(entry);
        }
        share_rows(buckets, self.total_hours)
    }

    /// Monthly timeline, ascending by `YYYY-MM`.
    pub fn by_month(&self) -> Vec<GroupRow> {
        let mut buckets = Buckets::new();
        for entry in self.entries {
            match NaiveDate::parse_from_str(entry.spent_on.trim(), "%Y-%m-%d") {
                Ok(date) => buckets
                    .entry(date.format("%Y-%m").to_string())
                    .or_default()
                    .add(entry),
                Err(_) => debug!(
                    "Skipping time entry {} with unparseable date '{}'",
                    entry.id, entry.spent_on
                ),
            }
        }

        let mut rows = group_rows(buckets);
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    /// Field names to aggregate: the explicit list, or every field seen on
    /// an issue in first-seen order.
    fn candidate_fields(&self, requested: &[String]) -> Vec<String> {
        if !requested.is_empty() {
            return requested.to_vec();
        }

        let mut seen = HashSet::new();
        self.issues
            .iter()
            .flat_map(|i| i.custom_fields.iter())
            .filter(|cf| seen.insert(cf.name.clone()))
            .map(|cf| cf.name.clone())
            .collect()
    }

    /// One share table per custom field.
    ///
    /// Only entries whose issue carries the field contribute; an empty or
    /// uncoercible value counts as `(none)`. Fields without contributing
    /// hours are left out of the map.
    pub fn by_custom_field(&self, requested: &[String]) -> BTreeMap<String, Vec<ShareRow>> {
        let mut tables = BTreeMap::new();

        for field in self.candidate_fields(requested) {
            let values: HashMap<u64, String> = self
                .issues
                .iter()
                .filter_map(|issue| {
                    issue.custom_field(&field).map(|value| {
                        if *value == FieldValue::Unsupported {
                            debug!(
                                "Issue {} has an unsupported value for '{}'",
                                issue.id, field
                            );
                        }
                        (
                            issue.id,
                            value.label().unwrap_or_else(|| NONE_LABEL.to_string()),
                        )
                    })
                })
                .collect();

            let mut buckets = Buckets::new();
            for entry in self.entries {
                let Some(label) = entry.issue_id.and_then(|id| values.get(&id)) else {
                    continue;
                };
                buckets.entry(label.clone()).or_default().add(entry);
            }

            let contributed: f64 = buckets.values().map(|b| b.hours).sum();
            if buckets.is_empty() || contributed <= 0.0 {
                debug!("No hours for custom field '{}', omitting", field);
                continue;
            }

            tables.insert(field, share_rows(buckets, self.total_hours));
        }

        tables
    }

    /// Most time-consuming issues plus the hours logged without an issue.
    pub fn top_issues(&self) -> (Vec<TopIssue>, f64) {
        let mut per_issue: HashMap<u64, f64> = HashMap::new();
        let mut unlinked = 0.0;

        for entry in self.entries {
            match entry.issue_id {
                Some(id) => *per_issue.entry(id).or_default() += entry.hours,
                None => unlinked += entry.hours,
            }
        }

        let mut ranked: Vec<(u64, f64)> = per_issue.into_iter().collect();
        ranked.sort_by(|(a_id, a), (b_id, b)| {
            b.partial_cmp(a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a_id.cmp(b_id))
        });
        ranked.truncate(self.options.top_issues_limit);

        let rows = ranked
            .into_iter()
            .map(|(issue_id, hours)| match self.lookup.get(&issue_id) {
                Some(issue) => TopIssue {
                    issue_id,
                    subject: issue.subject.clone(),
                    tracker: issue.tracker.name.clone(),
                    status: issue.status.name.clone(),
                    hours: round2(hours),
                },
                None => TopIssue {
                    issue_id,
                    subject: UNKNOWN_LABEL.to_string(),
                    tracker: UNKNOWN_LABEL.to_string(),
                    status: UNKNOWN_LABEL.to_string(),
                    hours: round2(hours),
                },
            })
            .collect();

        (rows, round2(unlinked))
    }
}

/// Reduce fetched records into a complete [`AnalysisResult`].
pub fn aggregate(
    project: ProjectRef,
    filters: AppliedFilters,
    entries: &[TimeEntry],
    issues: &[Issue],
    options: &AggregateOptions,
) -> AnalysisResult {
    let aggregator = Aggregator::new(entries, issues, options);
    let (top_issues, unlinked_hours) = aggregator.top_issues();
    let by_custom_field = aggregator.by_custom_field(&filters.custom_fields);

    AnalysisResult {
        project,
        summary: aggregator.summary(),
        by_tracker: aggregator.by_tracker(),
        by_user: aggregator.by_user(),
        by_activity: aggregator.by_activity(),
        by_version: aggregator.by_version(),
        by_custom_field,
        by_month: aggregator.by_month(),
        top_issues,
        unlinked_hours,
        filters,
    }
}
