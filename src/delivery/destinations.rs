//! Per-destination upload protocols.
//!
//! Files, issue and wiki destinations upload the bytes first and then commit
//! the returned token. The document-management destination sends content,
//! title and folder in one call.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{DeliveryContext, Destination};
use crate::error::{EngineError, Result, TrackerError};
use crate::report::Artifact;
use crate::tracker::{NewDocument, NewProjectFile, UploadRef, WikiUpdate};

/// The project's file list, optionally attached to a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesTarget {
    pub version: Option<String>,
}

/// A note with the artifact attached on an existing issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueTarget {
    pub issue_id: u64,
}

/// A wiki page that gets a reference line appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiTarget {
    pub page: Option<String>,
}

/// The document-management module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmsfTarget {
    pub folder_id: Option<u64>,
}

fn failed(target: String, stage: &'static str) -> impl FnOnce(TrackerError) -> EngineError {
    move |source| EngineError::Delivery {
        target,
        stage,
        source,
    }
}

/// First half of the two-step protocol.
async fn upload(ctx: &DeliveryContext<'_>, target: &str, artifact: &Artifact) -> Result<UploadRef> {
    let token = ctx
        .client
        .upload(&artifact.filename, artifact.content_type(), artifact.bytes.clone())
        .await
        .map_err(failed(target.to_string(), "upload"))?;
    debug!("Uploaded {} ({} bytes)", artifact.filename, artifact.bytes.len());

    Ok(UploadRef {
        token,
        filename: artifact.filename.clone(),
        content_type: artifact.content_type().to_string(),
    })
}

fn description(ctx: &DeliveryContext<'_>) -> String {
    format!(
        "Time report for {} generated {}",
        ctx.project,
        ctx.now.format("%Y-%m-%d %H:%M UTC")
    )
}

#[async_trait]
impl Destination for FilesTarget {
    async fn deliver(&self, ctx: &DeliveryContext<'_>, artifact: &Artifact) -> Result<String> {
        // Resolve before uploading so a bad version name leaves nothing behind.
        let version_id = match &self.version {
            Some(name) => Some(ctx.resolver.resolve_version(ctx.project, name).await?.id),
            None => None,
        };

        let upload = upload(ctx, "files", artifact).await?;
        let file = NewProjectFile {
            token: upload.token,
            filename: upload.filename,
            version_id,
            description: description(ctx),
        };
        ctx.client
            .create_project_file(ctx.project, &file)
            .await
            .map_err(failed("files".to_string(), "commit"))?;

        Ok(ctx.client.web_url(&format!("projects/{}/files", ctx.project)))
    }
}

#[async_trait]
impl Destination for IssueTarget {
    async fn deliver(&self, ctx: &DeliveryContext<'_>, artifact: &Artifact) -> Result<String> {
        let target = format!("issue #{}", self.issue_id);
        let upload = upload(ctx, &target, artifact).await?;
        let notes = format!("{}: {}", description(ctx), artifact.filename);

        ctx.client
            .add_issue_note(self.issue_id, &notes, &[upload])
            .await
            .map_err(failed(target, "commit"))?;

        Ok(ctx.client.web_url(&format!("issues/{}", self.issue_id)))
    }
}

#[async_trait]
impl Destination for WikiTarget {
    async fn deliver(&self, ctx: &DeliveryContext<'_>, artifact: &Artifact) -> Result<String> {
        let title = self.page.as_deref().unwrap_or(ctx.wiki_page);
        let target = format!("wiki page {}", title);

        let upload = upload(ctx, &target, artifact).await?;

        // Read-modify-write without a version check: concurrent writers to
        // the same page can lose lines.
        let existing = ctx
            .client
            .get_wiki_page(ctx.project, title)
            .await
            .map_err(failed(target.clone(), "read page"))?;

        let mut text = match existing {
            Some(page) => {
                debug!("Appending to wiki page {} (version {:?})", title, page.version);
                page.text
            }
            None => {
                info!("Wiki page {} does not exist, creating it", title);
                format!("h1. {}\n", title.replace('_', " "))
            }
        };
        if !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&format!(
            "\n* {} attachment:\"{}\"",
            ctx.now.format("%Y-%m-%d %H:%M UTC"),
            artifact.filename
        ));

        let update = WikiUpdate {
            text,
            comments: format!("Added {}", artifact.filename),
            uploads: vec![upload],
        };
        ctx.client
            .put_wiki_page(ctx.project, title, &update)
            .await
            .map_err(failed(target, "commit"))?;

        Ok(ctx
            .client
            .web_url(&format!("projects/{}/wiki/{}", ctx.project, title)))
    }
}

#[async_trait]
impl Destination for DmsfTarget {
    async fn deliver(&self, ctx: &DeliveryContext<'_>, artifact: &Artifact) -> Result<String> {
        if self.folder_id.is_none() {
            warn!("No DMSF folder given, storing in the project root folder");
        }

        let document = NewDocument {
            filename: artifact.filename.clone(),
            title: artifact.filename.clone(),
            folder_id: self.folder_id,
            content_type: artifact.content_type().to_string(),
            content: artifact.bytes.clone(),
        };
        let id = ctx
            .client
            .create_document(ctx.project, document)
            .await
            .map_err(failed("dmsf".to_string(), "upload"))?;

        Ok(ctx.client.web_url(&format!("dmsf/files/{}", id)))
    }
}
