//! Name-to-id resolution backed by the tracker client.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{NameResolver, TrackerClient};
use crate::error::ResolveError;
use crate::models::NamedRef;

/// Resolves names by listing candidates through a [`TrackerClient`].
pub struct TrackerResolver {
    client: Arc<dyn TrackerClient>,
}

impl TrackerResolver {
    pub fn new(client: Arc<dyn TrackerClient>) -> Self {
        Self { client }
    }
}

/// Pick the single candidate whose name matches `name` case-insensitively.
///
/// A numeric `name` falls back to matching a candidate id, but only when no
/// candidate carries that name.
fn pick(
    kind: &'static str,
    name: &str,
    candidates: Vec<NamedRef>,
) -> Result<NamedRef, ResolveError> {
    let wanted = name.trim().to_lowercase();

    let (mut matches, rest): (Vec<NamedRef>, Vec<NamedRef>) = candidates
        .into_iter()
        .partition(|c| c.name.trim().to_lowercase() == wanted);
    if matches.is_empty() {
        if let Ok(id) = wanted.parse::<u64>() {
            matches = rest.into_iter().filter(|c| c.id == id).collect();
        }
    }

    match matches.len() {
        0 => Err(ResolveError::NotFound {
            kind,
            name: name.to_string(),
        }),
        1 => Ok(matches.remove(0)),
        _ => Err(ResolveError::Ambiguous {
            kind,
            name: name.to_string(),
            candidates: matches
                .iter()
                .map(|c| format!("{} (#{})", c.name, c.id))
                .collect(),
        }),
    }
}

#[async_trait]
impl NameResolver for TrackerResolver {
    async fn resolve_version(&self, project: &str, name: &str) -> Result<NamedRef, ResolveError> {
        let versions = self
            .client
            .list_versions(project)
            .await
            .map_err(|source| ResolveError::Lookup {
                kind: "version",
                source,
            })?;
        debug!("Resolving version '{}' among {} candidates", name, versions.len());

        pick("version", name, versions)
    }
}
