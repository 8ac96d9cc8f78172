//! Delivery Router.
//!
//! Places a rendered [`Artifact`] into the tracker, or hands the bytes back
//! base64-encoded when no destination was requested. Descriptors are parsed
//! once into a [`DeliveryTarget`]; each variant carries its own upload
//! protocol through the [`Destination`] trait.

pub mod destinations;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::error::{EngineError, Result};
use crate::report::Artifact;
use crate::tracker::{NameResolver, TrackerClient};

pub use destinations::{DmsfTarget, FilesTarget, IssueTarget, WikiTarget};

/// Wiki page used when the descriptor names none.
pub const DEFAULT_WIKI_PAGE: &str = "Time_Reports";

/// Where a rendered artifact should be stored inside the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryTarget {
    /// `files[:<version>]`
    Files(FilesTarget),
    /// `issue:<id>`
    Issue(IssueTarget),
    /// `wiki[:<page>]`
    Wiki(WikiTarget),
    /// `dmsf[:<folderId>]`
    Dmsf(DmsfTarget),
}

impl DeliveryTarget {
    fn destination(&self) -> &dyn Destination {
        match self {
            DeliveryTarget::Files(t) => t,
            DeliveryTarget::Issue(t) => t,
            DeliveryTarget::Wiki(t) => t,
            DeliveryTarget::Dmsf(t) => t,
        }
    }
}

fn invalid(descriptor: &str, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidDeliveryTarget {
        descriptor: descriptor.to_string(),
        reason: reason.into(),
    }
}

fn parse_id(descriptor: &str, what: &str, param: &str) -> Result<u64> {
    match param.trim().parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(invalid(
            descriptor,
            format!("{} must be a positive integer, got '{}'", what, param),
        )),
    }
}

impl FromStr for DeliveryTarget {
    type Err = EngineError;

    fn from_str(descriptor: &str) -> Result<Self> {
        let trimmed = descriptor.trim();
        let (kind, param) = match trimmed.split_once(':') {
            Some((kind, param)) => (kind, Some(param.trim()).filter(|p| !p.is_empty())),
            None => (trimmed, None),
        };

        match kind.to_ascii_lowercase().as_str() {
            "files" => Ok(DeliveryTarget::Files(FilesTarget {
                version: param.map(str::to_string),
            })),
            "issue" => {
                let param = param.ok_or_else(|| invalid(descriptor, "issue id is required"))?;
                Ok(DeliveryTarget::Issue(IssueTarget {
                    issue_id: parse_id(descriptor, "issue id", param)?,
                }))
            }
            "wiki" => Ok(DeliveryTarget::Wiki(WikiTarget {
                page: param.map(str::to_string),
            })),
            "dmsf" => Ok(DeliveryTarget::Dmsf(DmsfTarget {
                folder_id: param
                    .map(|p| parse_id(descriptor, "folder id", p))
                    .transpose()?,
            })),
            "" => Err(invalid(descriptor, "empty descriptor")),
            other => Err(invalid(
                descriptor,
                format!(
                    "unknown destination '{}' (expected files, issue, wiki or dmsf)",
                    other
                ),
            )),
        }
    }
}

impl fmt::Display for DeliveryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryTarget::Files(FilesTarget { version: None }) => write!(f, "files"),
            DeliveryTarget::Files(FilesTarget { version: Some(v) }) => write!(f, "files:{}", v),
            DeliveryTarget::Issue(t) => write!(f, "issue:{}", t.issue_id),
            DeliveryTarget::Wiki(WikiTarget { page: None }) => write!(f, "wiki"),
            DeliveryTarget::Wiki(WikiTarget { page: Some(p) }) => write!(f, "wiki:{}", p),
            DeliveryTarget::Dmsf(DmsfTarget { folder_id: None }) => write!(f, "dmsf"),
            DeliveryTarget::Dmsf(DmsfTarget { folder_id: Some(id) }) => {
                write!(f, "dmsf:{}", id)
            }
        }
    }
}

/// Collaborators and settings shared by every destination.
pub struct DeliveryContext<'a> {
    pub client: &'a dyn TrackerClient,
    pub resolver: &'a dyn NameResolver,
    /// Project the artifact belongs to.
    pub project: &'a str,
    /// Page used by `wiki` without a title.
    pub wiki_page: &'a str,
    /// Timestamp written into wiki lines and descriptions.
    pub now: DateTime<Utc>,
}

/// One destination kind and its upload protocol.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Store `artifact` and return a location reference.
    async fn deliver(&self, ctx: &DeliveryContext<'_>, artifact: &Artifact) -> Result<String>;
}

/// Outcome of the delivery stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Delivery {
    /// No destination: the bytes travel with the response.
    Inline {
        filename: String,
        content_type: String,
        base64: String,
    },
    /// The artifact was stored in the tracker.
    Stored { location: String },
}

impl Delivery {
    pub fn inline(artifact: &Artifact) -> Self {
        Delivery::Inline {
            filename: artifact.filename.clone(),
            content_type: artifact.content_type().to_string(),
            base64: STANDARD.encode(&artifact.bytes),
        }
    }
}

/// Route `artifact` to `target`, or encode it inline when there is none.
pub async fn deliver(
    target: Option<&DeliveryTarget>,
    ctx: &DeliveryContext<'_>,
    artifact: &Artifact,
) -> Result<Delivery> {
    let Some(target) = target else {
        info!("No delivery target, returning {} inline", artifact.filename);
        return Ok(Delivery::inline(artifact));
    };

    info!("Delivering {} to {}", artifact.filename, target);
    let location = target.destination().deliver(ctx, artifact).await?;
    info!("Delivered to {}", location);

    Ok(Delivery::Stored { location })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_descriptors() {
        assert_eq!(
            "files".parse::<DeliveryTarget>().unwrap(),
            DeliveryTarget::Files(FilesTarget { version: None })
        );
        assert_eq!(
            "files:Release 2.0".parse::<DeliveryTarget>().unwrap(),
            DeliveryTarget::Files(FilesTarget {
                version: Some("Release 2.0".to_string())
            })
        );
        assert_eq!(
            "issue:42".parse::<DeliveryTarget>().unwrap(),
            DeliveryTarget::Issue(IssueTarget { issue_id: 42 })
        );
        assert_eq!(
            "wiki".parse::<DeliveryTarget>().unwrap(),
            DeliveryTarget::Wiki(WikiTarget { page: None })
        );
        assert_eq!(
            "WIKI:Reports".parse::<DeliveryTarget>().unwrap(),
            DeliveryTarget::Wiki(WikiTarget {
                page: Some("Reports".to_string())
            })
        );
        assert_eq!(
            "dmsf:7".parse::<DeliveryTarget>().unwrap(),
            DeliveryTarget::Dmsf(DmsfTarget { folder_id: Some(7) })
        );
        assert_eq!(
            "dmsf".parse::<DeliveryTarget>().unwrap(),
            DeliveryTarget::Dmsf(DmsfTarget { folder_id: None })
        );
    }

    #[test]
    fn test_parse_rejects_bad_descriptors() {
        for descriptor in ["ftp:x", "", "issue", "issue:abc", "issue:0", "dmsf:root"] {
            let err = descriptor.parse::<DeliveryTarget>().unwrap_err();
            assert!(
                matches!(err, EngineError::InvalidDeliveryTarget { .. }),
                "{descriptor} should be rejected"
            );
        }
    }

    #[test]
    fn test_display_matches_descriptor() {
        for descriptor in ["files", "files:v1", "issue:9", "wiki", "wiki:Page", "dmsf:3"] {
            let target: DeliveryTarget = descriptor.parse().unwrap();
            assert_eq!(target.to_string(), descriptor);
        }
    }

    #[test]
    fn test_inline_delivery_base64() {
        let artifact = Artifact {
            filename: "demo_time_report_20240301.csv".to_string(),
            format: crate::models::OutputFormat::Tabular,
            bytes: b"hello".to_vec(),
        };

        let delivery = Delivery::inline(&artifact);
        assert_eq!(
            delivery,
            Delivery::Inline {
                filename: "demo_time_report_20240301.csv".to_string(),
                content_type: "text/csv".to_string(),
                base64: "aGVsbG8=".to_string(),
            }
        );
    }
}
