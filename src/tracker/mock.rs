//! In-memory tracker used by unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{
    IssuePage, IssueQuery, NameResolver, NewDocument, NewProjectFile, TimeEntryPage,
    TimeEntryQuery, TrackerClient, UploadRef, WikiPage, WikiUpdate,
};
use crate::error::{ResolveError, TrackerError};
use crate::models::{Issue, IssueStatusFilter, NamedRef, ProjectRef, TimeEntry};

#[derive(Default)]
struct State {
    calls: Vec<String>,
    project_files: Vec<(String, NewProjectFile)>,
    notes: Vec<(u64, String, Vec<UploadRef>)>,
    documents: Vec<(String, NewDocument)>,
    wiki: HashMap<String, String>,
    wiki_uploads: Vec<UploadRef>,
    uploads: usize,
}

/// Tracker fake that serves fixed records and records every call.
#[derive(Default)]
pub struct MockTracker {
    pub entries: Vec<TimeEntry>,
    pub issues: Vec<Issue>,
    pub versions: Vec<NamedRef>,
    /// Operation name that fails with HTTP 500.
    pub fail_on: Option<&'static str>,
    state: Mutex<State>,
}

impl MockTracker {
    pub fn new(entries: Vec<TimeEntry>, issues: Vec<Issue>) -> Self {
        Self {
            entries,
            issues,
            ..Default::default()
        }
    }

    pub fn with_versions(mut self, versions: Vec<NamedRef>) -> Self {
        self.versions = versions;
        self
    }

    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    pub fn with_wiki_page(self, title: &str, text: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .wiki
            .insert(title.to_string(), text.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(' ').next() == Some(operation))
            .count()
    }

    pub fn project_files(&self) -> Vec<(String, NewProjectFile)> {
        self.state.lock().unwrap().project_files.clone()
    }

    pub fn notes(&self) -> Vec<(u64, String, Vec<UploadRef>)> {
        self.state.lock().unwrap().notes.clone()
    }

    pub fn documents(&self) -> Vec<(String, NewDocument)> {
        self.state.lock().unwrap().documents.clone()
    }

    pub fn wiki_text(&self, title: &str) -> Option<String> {
        self.state.lock().unwrap().wiki.get(title).cloned()
    }

    pub fn wiki_uploads(&self) -> Vec<UploadRef> {
        self.state.lock().unwrap().wiki_uploads.clone()
    }

    fn record(&self, operation: &'static str, detail: String) -> Result<(), TrackerError> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(format!("{} {}", operation, detail));
        if self.fail_on == Some(operation) {
            return Err(TrackerError::Status {
                url: format!("mock://{}", operation),
                status: 500,
                body: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

fn page<T: Clone>(items: &[T], offset: usize, limit: usize) -> Vec<T> {
    items.iter().skip(offset).take(limit).cloned().collect()
}

#[async_trait]
impl TrackerClient for MockTracker {
    async fn get_project(&self, project: &str) -> Result<ProjectRef, TrackerError> {
        self.record("get_project", project.to_string())?;
        Ok(ProjectRef {
            identifier: project.to_string(),
            name: format!("Project {}", project),
        })
    }

    async fn search_time_entries(
        &self,
        query: &TimeEntryQuery,
    ) -> Result<TimeEntryPage, TrackerError> {
        self.record("time_entries", format!("offset={}", query.offset))?;
        Ok(TimeEntryPage {
            entries: page(&self.entries, query.offset, query.limit),
            total_count: self.entries.len(),
        })
    }

    async fn search_issues(&self, query: &IssueQuery) -> Result<IssuePage, TrackerError> {
        self.record("issues", format!("offset={}", query.offset))?;
        let matching: Vec<Issue> = self
            .issues
            .iter()
            .filter(|i| match query.version_id {
                Some(id) => i.fixed_version.as_ref().map(|v| v.id) == Some(id),
                None => true,
            })
            .filter(|i| match query.status {
                IssueStatusFilter::All => true,
                IssueStatusFilter::Open => i.closed_on.is_none(),
                IssueStatusFilter::Closed => i.closed_on.is_some(),
            })
            .cloned()
            .collect();

        Ok(IssuePage {
            issues: page(&matching, query.offset, query.limit),
            total_count: matching.len(),
        })
    }

    async fn list_versions(&self, project: &str) -> Result<Vec<NamedRef>, TrackerError> {
        self.record("versions", project.to_string())?;
        Ok(self.versions.clone())
    }

    async fn upload(
        &self,
        filename: &str,
        _content_type: &str,
        content: Vec<u8>,
    ) -> Result<String, TrackerError> {
        self.record("upload", format!("{} ({} bytes)", filename, content.len()))?;
        let mut state = self.state.lock().unwrap();
        state.uploads += 1;
        Ok(format!("token-{}", state.uploads))
    }

    async fn create_project_file(
        &self,
        project: &str,
        file: &NewProjectFile,
    ) -> Result<(), TrackerError> {
        self.record("create_file", file.token.clone())?;
        self.state
            .lock()
            .unwrap()
            .project_files
            .push((project.to_string(), file.clone()));
        Ok(())
    }

    async fn add_issue_note(
        &self,
        issue_id: u64,
        notes: &str,
        uploads: &[UploadRef],
    ) -> Result<(), TrackerError> {
        self.record("issue_note", issue_id.to_string())?;
        self.state
            .lock()
            .unwrap()
            .notes
            .push((issue_id, notes.to_string(), uploads.to_vec()));
        Ok(())
    }

    async fn create_document(
        &self,
        project: &str,
        document: NewDocument,
    ) -> Result<u64, TrackerError> {
        self.record("document", document.filename.clone())?;
        let mut state = self.state.lock().unwrap();
        state.documents.push((project.to_string(), document));
        Ok(100 + state.documents.len() as u64)
    }

    async fn get_wiki_page(
        &self,
        _project: &str,
        title: &str,
    ) -> Result<Option<WikiPage>, TrackerError> {
        self.record("wiki_get", title.to_string())?;
        Ok(self.wiki_text(title).map(|text| WikiPage {
            text,
            version: Some(1),
        }))
    }

    async fn put_wiki_page(
        &self,
        _project: &str,
        title: &str,
        update: &WikiUpdate,
    ) -> Result<(), TrackerError> {
        self.record("wiki_put", title.to_string())?;
        let mut state = self.state.lock().unwrap();
        state.wiki.insert(title.to_string(), update.text.clone());
        state.wiki_uploads.extend(update.uploads.iter().cloned());
        Ok(())
    }

    fn web_url(&self, path: &str) -> String {
        format!("https://tracker.test/{}", path)
    }
}

#[async_trait]
impl NameResolver for MockTracker {
    async fn resolve_version(&self, _project: &str, name: &str) -> Result<NamedRef, ResolveError> {
        self.versions
            .iter()
            .find(|v| v.name == name)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound {
                kind: "version",
                name: name.to_string(),
            })
    }
}
