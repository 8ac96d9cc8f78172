//! Issue tracker collaborators.
//!
//! The engine talks to the tracker only through [`TrackerClient`] and to the
//! name lookup only through [`NameResolver`], so both can be replaced by
//! in-memory fakes in tests.

#[cfg(test)]
pub mod mock;
pub mod redmine;
pub mod resolver;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{ResolveError, TrackerError};
use crate::models::{Issue, IssueStatusFilter, NamedRef, ProjectRef, TimeEntry};

pub use redmine::{RedmineClient, RedmineConfig};
pub use resolver::TrackerResolver;

/// One page request for time entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeEntryQuery {
    pub project: String,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub offset: usize,
    pub limit: usize,
}

/// One page request for issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueQuery {
    pub project: String,
    pub status: IssueStatusFilter,
    pub version_id: Option<u64>,
    pub offset: usize,
    pub limit: usize,
}

/// A page of time entries together with the server-reported total.
#[derive(Debug, Clone, Default)]
pub struct TimeEntryPage {
    pub entries: Vec<TimeEntry>,
    pub total_count: usize,
}

/// A page of issues together with the server-reported total.
#[derive(Debug, Clone, Default)]
pub struct IssuePage {
    pub issues: Vec<Issue>,
    pub total_count: usize,
}

/// Reference to uploaded content, attached to a record by token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRef {
    pub token: String,
    pub filename: String,
    pub content_type: String,
}

/// A project file record created from an upload token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProjectFile {
    pub token: String,
    pub filename: String,
    pub version_id: Option<u64>,
    pub description: String,
}

/// A document uploaded directly into the document-management module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub filename: String,
    pub title: String,
    pub folder_id: Option<u64>,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// A wiki page as read from the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiPage {
    pub text: String,
    /// Page revision, when the tracker reports one.
    pub version: Option<u64>,
}

/// Create-or-update payload for a wiki page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiUpdate {
    pub text: String,
    pub comments: String,
    pub uploads: Vec<UploadRef>,
}

/// Operations the engine needs from the issue tracker.
#[async_trait]
pub trait TrackerClient: Send + Sync {
    /// Look up a project by identifier or numeric id.
    async fn get_project(&self, project: &str) -> Result<ProjectRef, TrackerError>;

    /// Fetch one page of time entries.
    async fn search_time_entries(
        &self,
        query: &TimeEntryQuery,
    ) -> Result<TimeEntryPage, TrackerError>;

    /// Fetch one page of issues.
    async fn search_issues(&self, query: &IssueQuery) -> Result<IssuePage, TrackerError>;

    /// List the versions shared with a project.
    async fn list_versions(&self, project: &str) -> Result<Vec<NamedRef>, TrackerError>;

    /// Upload raw content and return its upload token.
    async fn upload(
        &self,
        filename: &str,
        content_type: &str,
        content: Vec<u8>,
    ) -> Result<String, TrackerError>;

    /// Add an uploaded file to the project's file list.
    async fn create_project_file(
        &self,
        project: &str,
        file: &NewProjectFile,
    ) -> Result<(), TrackerError>;

    /// Append a note with attachments to an issue.
    async fn add_issue_note(
        &self,
        issue_id: u64,
        notes: &str,
        uploads: &[UploadRef],
    ) -> Result<(), TrackerError>;

    /// Upload a document in a single call, returning its id.
    async fn create_document(
        &self,
        project: &str,
        document: NewDocument,
    ) -> Result<u64, TrackerError>;

    /// Read a wiki page, `None` when it does not exist.
    async fn get_wiki_page(
        &self,
        project: &str,
        title: &str,
    ) -> Result<Option<WikiPage>, TrackerError>;

    /// Create or replace a wiki page.
    async fn put_wiki_page(
        &self,
        project: &str,
        title: &str,
        update: &WikiUpdate,
    ) -> Result<(), TrackerError>;

    /// Human-facing URL for a path on the tracker.
    fn web_url(&self, path: &str) -> String;
}

/// Maps human names to tracker ids.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Resolve a version name within a project.
    async fn resolve_version(&self, project: &str, name: &str)
        -> Result<NamedRef, ResolveError>;
}
