//! Redmine REST API client.
//!
//! Implements [`TrackerClient`] over the JSON endpoints of a Redmine
//! installation (plus the DMSF plugin for document uploads).

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{
    IssuePage, IssueQuery, NewDocument, NewProjectFile, TimeEntryPage, TimeEntryQuery,
    TrackerClient, UploadRef, WikiPage, WikiUpdate,
};
use crate::error::TrackerError;
use crate::models::{CustomFieldValue, FieldValue, Issue, NamedRef, ProjectRef, TimeEntry};

const API_KEY_HEADER: &str = "X-Redmine-API-Key";

/// Connection settings for a Redmine server.
#[derive(Debug, Clone)]
pub struct RedmineConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

/// HTTP client for the Redmine REST API.
pub struct RedmineClient {
    config: RedmineConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ProjectEnvelope {
    project: WireProject,
}

#[derive(Debug, Deserialize)]
struct WireProject {
    identifier: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct TimeEntriesEnvelope {
    time_entries: Vec<WireTimeEntry>,
    total_count: usize,
}

#[derive(Debug, Deserialize)]
struct WireId {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct WireTimeEntry {
    id: u64,
    hours: f64,
    user: NamedRef,
    activity: NamedRef,
    #[serde(default)]
    issue: Option<WireId>,
    spent_on: String,
    #[serde(default)]
    comments: Option<String>,
}

impl From<WireTimeEntry> for TimeEntry {
    fn from(wire: WireTimeEntry) -> Self {
        Self {
            id: wire.id,
            hours: wire.hours,
            user: wire.user,
            activity: wire.activity,
            issue_id: wire.issue.map(|i| i.id),
            spent_on: wire.spent_on,
            comments: wire.comments.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IssuesEnvelope {
    issues: Vec<WireIssue>,
    total_count: usize,
}

#[derive(Debug, Deserialize)]
struct WireCustomField {
    name: String,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct WireIssue {
    id: u64,
    subject: String,
    tracker: NamedRef,
    status: NamedRef,
    #[serde(default)]
    project: Option<NamedRef>,
    #[serde(default)]
    fixed_version: Option<NamedRef>,
    #[serde(default)]
    custom_fields: Vec<WireCustomField>,
    #[serde(default)]
    closed_on: Option<String>,
}

impl From<WireIssue> for Issue {
    fn from(wire: WireIssue) -> Self {
        Self {
            id: wire.id,
            subject: wire.subject,
            tracker: wire.tracker,
            status: wire.status,
            project: wire.project,
            fixed_version: wire.fixed_version,
            custom_fields: wire
                .custom_fields
                .into_iter()
                .map(|cf| CustomFieldValue {
                    value: FieldValue::from_json(&cf.value),
                    name: cf.name,
                })
                .collect(),
            closed_on: wire.closed_on,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VersionsEnvelope {
    versions: Vec<NamedRef>,
}

#[derive(Debug, Deserialize)]
struct UploadEnvelope {
    upload: WireUpload,
}

#[derive(Debug, Deserialize)]
struct WireUpload {
    token: String,
}

#[derive(Debug, Deserialize)]
struct DocumentEnvelope {
    dmsf_file: WireId,
}

#[derive(Debug, Deserialize)]
struct WikiEnvelope {
    wiki_page: WireWikiPage,
}

#[derive(Debug, Deserialize)]
struct WireWikiPage {
    #[serde(default)]
    text: String,
    #[serde(default)]
    version: Option<u64>,
}

fn uploads_json(uploads: &[UploadRef]) -> Vec<Value> {
    uploads
        .iter()
        .map(|u| {
            json!({
                "token": u.token,
                "filename": u.filename,
                "content_type": u.content_type,
            })
        })
        .collect()
}

impl RedmineClient {
    /// Create a client for the given server.
    pub fn new(config: RedmineConfig) -> Result<Self, TrackerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|source| TrackerError::Transport {
                url: config.base_url.clone(),
                source,
            })?;

        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match self.config.api_key {
            Some(ref key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> Result<Response, TrackerError> {
        let response = request
            .send()
            .await
            .map_err(|source| TrackerError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TrackerError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackerError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, TrackerError> {
        response.json::<T>().await.map_err(|e| TrackerError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// URL of a wiki page, with the title escaped as a single path segment.
    fn wiki_url(&self, project: &str, title: &str) -> Result<String, TrackerError> {
        let base = self.url(&format!("projects/{}/wiki", project));
        let mut url = Url::parse(&base).map_err(|e| TrackerError::Decode {
            url: base.clone(),
            message: e.to_string(),
        })?;
        url.path_segments_mut()
            .map_err(|()| TrackerError::Decode {
                url: base.clone(),
                message: "base URL cannot hold a path".to_string(),
            })?
            .push(&format!("{}.json", title));
        Ok(url.into())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, TrackerError> {
        self.get_json_at(self.url(path), query).await
    }

    async fn get_json_at<T: DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<T, TrackerError> {
        debug!("GET {} {:?}", url, query);
        let response = self
            .send(&url, self.request(Method::GET, &url).query(query))
            .await?;
        Self::decode(&url, response).await
    }

    async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: &Value,
    ) -> Result<Response, TrackerError> {
        self.send_json_at(method, self.url(path), body).await
    }

    async fn send_json_at(
        &self,
        method: Method,
        url: String,
        body: &Value,
    ) -> Result<Response, TrackerError> {
        debug!("{} {}", method, url);
        self.send(&url, self.request(method, &url).json(body)).await
    }
}

#[async_trait]
impl TrackerClient for RedmineClient {
    async fn get_project(&self, project: &str) -> Result<ProjectRef, TrackerError> {
        let envelope: ProjectEnvelope = self
            .get_json(&format!("projects/{}.json", project), &[])
            .await?;
        Ok(ProjectRef {
            identifier: envelope.project.identifier,
            name: envelope.project.name,
        })
    }

    async fn search_time_entries(
        &self,
        query: &TimeEntryQuery,
    ) -> Result<TimeEntryPage, TrackerError> {
        let mut params = vec![
            ("project_id", query.project.clone()),
            ("offset", query.offset.to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(from) = query.from {
            params.push(("from", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = query.to {
            params.push(("to", to.format("%Y-%m-%d").to_string()));
        }

        let envelope: TimeEntriesEnvelope = self.get_json("time_entries.json", &params).await?;
        Ok(TimeEntryPage {
            entries: envelope.time_entries.into_iter().map(Into::into).collect(),
            total_count: envelope.total_count,
        })
    }

    async fn search_issues(&self, query: &IssueQuery) -> Result<IssuePage, TrackerError> {
        let mut params = vec![
            ("project_id", query.project.clone()),
            ("status_id", query.status.as_query_value().to_string()),
            ("offset", query.offset.to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(version_id) = query.version_id {
            params.push(("fixed_version_id", version_id.to_string()));
        }

        let envelope: IssuesEnvelope = self.get_json("issues.json", &params).await?;
        Ok(IssuePage {
            issues: envelope.issues.into_iter().map(Into::into).collect(),
            total_count: envelope.total_count,
        })
    }

    async fn list_versions(&self, project: &str) -> Result<Vec<NamedRef>, TrackerError> {
        let envelope: VersionsEnvelope = self
            .get_json(&format!("projects/{}/versions.json", project), &[])
            .await?;
        Ok(envelope.versions)
    }

    async fn upload(
        &self,
        filename: &str,
        content_type: &str,
        content: Vec<u8>,
    ) -> Result<String, TrackerError> {
        let url = self.url("uploads.json");
        debug!("POST {} ({} bytes, {})", url, content.len(), content_type);
        let request = self
            .request(Method::POST, &url)
            .query(&[("filename", filename)])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(content);

        let response = self.send(&url, request).await?;
        let envelope: UploadEnvelope = Self::decode(&url, response).await?;
        Ok(envelope.upload.token)
    }

    async fn create_project_file(
        &self,
        project: &str,
        file: &NewProjectFile,
    ) -> Result<(), TrackerError> {
        let mut body = json!({
            "file": {
                "token": file.token,
                "filename": file.filename,
                "description": file.description,
            }
        });
        if let Some(version_id) = file.version_id {
            body["file"]["version_id"] = json!(version_id);
        }

        self.send_json(Method::POST, &format!("projects/{}/files.json", project), &body)
            .await?;
        Ok(())
    }

    async fn add_issue_note(
        &self,
        issue_id: u64,
        notes: &str,
        uploads: &[UploadRef],
    ) -> Result<(), TrackerError> {
        let body = json!({
            "issue": {
                "notes": notes,
                "uploads": uploads_json(uploads),
            }
        });

        self.send_json(Method::PUT, &format!("issues/{}.json", issue_id), &body)
            .await?;
        Ok(())
    }

    async fn create_document(
        &self,
        project: &str,
        document: NewDocument,
    ) -> Result<u64, TrackerError> {
        let url = self.url(&format!("projects/{}/dmsf/files.json", project));
        debug!("POST {} ({} bytes)", url, document.content.len());

        let part = reqwest::multipart::Part::bytes(document.content)
            .file_name(document.filename.clone())
            .mime_str(&document.content_type)
            .map_err(|source| TrackerError::Transport {
                url: url.clone(),
                source,
            })?;
        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("title", document.title);
        if let Some(folder_id) = document.folder_id {
            form = form.text("folder_id", folder_id.to_string());
        }

        let response = self
            .send(&url, self.request(Method::POST, &url).multipart(form))
            .await?;
        let envelope: DocumentEnvelope = Self::decode(&url, response).await?;
        Ok(envelope.dmsf_file.id)
    }

    async fn get_wiki_page(
        &self,
        project: &str,
        title: &str,
    ) -> Result<Option<WikiPage>, TrackerError> {
        let url = self.wiki_url(project, title)?;
        match self.get_json_at::<WikiEnvelope>(url, &[]).await {
            Ok(envelope) => Ok(Some(WikiPage {
                text: envelope.wiki_page.text,
                version: envelope.wiki_page.version,
            })),
            Err(TrackerError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn put_wiki_page(
        &self,
        project: &str,
        title: &str,
        update: &WikiUpdate,
    ) -> Result<(), TrackerError> {
        let body = json!({
            "wiki_page": {
                "text": update.text,
                "comments": update.comments,
                "uploads": uploads_json(&update.uploads),
            }
        });

        let url = self.wiki_url(project, title)?;
        self.send_json_at(Method::PUT, url, &body).await?;
        Ok(())
    }

    fn web_url(&self, path: &str) -> String {
        self.url(path)
    }
}
