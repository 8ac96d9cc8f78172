//! Exhaustive retrieval of time entries and issues.
//!
//! Both loops request fixed-size pages until the records collected reach the
//! total the tracker reports. The server may return fewer records than asked
//! for, so a short page alone never ends a loop. An empty page always does,
//! so a misreporting server cannot keep it spinning.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::models::{Issue, IssueStatusFilter, TimeEntry};
use crate::tracker::{IssueQuery, TimeEntryQuery, TrackerClient};

/// Page size used for every paginated call.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Largest `limit` Redmine honours.
pub const MAX_PAGE_SIZE: usize = 100;

/// Filters applied when fetching one project's records.
#[derive(Debug, Clone, Default)]
pub struct FetchFilters {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub issue_status: IssueStatusFilter,
    /// Already-resolved version id.
    pub version_id: Option<u64>,
}

/// Paginated reader over a [`TrackerClient`].
pub struct Fetcher<'a> {
    client: &'a dyn TrackerClient,
    page_size: usize,
}

impl<'a> Fetcher<'a> {
    pub fn new(client: &'a dyn TrackerClient) -> Self {
        Self {
            client,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the page size (clamped to `1..=MAX_PAGE_SIZE`).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Fetch every time entry of `project` within the date range.
    pub async fn fetch_time_entries(
        &self,
        project: &str,
        filters: &FetchFilters,
    ) -> Result<Vec<TimeEntry>> {
        let mut entries = Vec::new();

        loop {
            let query = TimeEntryQuery {
                project: project.to_string(),
                from: filters.date_from,
                to: filters.date_to,
                offset: entries.len(),
                limit: self.page_size,
            };
            let page = self
                .client
                .search_time_entries(&query)
                .await
                .map_err(|source| EngineError::Fetch {
                    what: "time entries",
                    source,
                })?;

            let received = page.entries.len();
            debug!(
                "Fetched {} time entries at offset {} (total {})",
                received, query.offset, page.total_count
            );
            entries.extend(page.entries);

            if received == 0 || entries.len() >= page.total_count {
                break;
            }
        }

        info!("Fetched {} time entries for {}", entries.len(), project);
        Ok(entries)
    }

    /// Fetch every issue of `project` matching the status and version filters.
    pub async fn fetch_issues(&self, project: &str, filters: &FetchFilters) -> Result<Vec<Issue>> {
        let mut issues = Vec::new();

        loop {
            let query = IssueQuery {
                project: project.to_string(),
                status: filters.issue_status,
                version_id: filters.version_id,
                offset: issues.len(),
                limit: self.page_size,
            };
            let page = self
                .client
                .search_issues(&query)
                .await
                .map_err(|source| EngineError::Fetch {
                    what: "issues",
                    source,
                })?;

            let received = page.issues.len();
            debug!(
                "Fetched {} issues at offset {} (total {})",
                received, query.offset, page.total_count
            );
            issues.extend(page.issues);

            if received == 0 || issues.len() >= page.total_count {
                break;
            }
        }

        info!("Fetched {} issues for {}", issues.len(), project);
        Ok(issues)
    }
}
