//! Error types for the report engine.
//!
//! Each stage of a run (resolve, fetch, render, deliver) has its own
//! variant so callers can tell which stage to retry.

use thiserror::Error;

/// Failure reported by the tracker client.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// The request never produced a response.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The tracker answered with a non-success status.
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Failure to map a human-readable name to a tracker id.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no {kind} named '{name}'")]
    NotFound { kind: &'static str, name: String },

    #[error("'{name}' matches several {kind}s: {}", candidates.join(", "))]
    Ambiguous {
        kind: &'static str,
        name: String,
        candidates: Vec<String>,
    },

    #[error("could not list {kind}s: {source}")]
    Lookup {
        kind: &'static str,
        #[source]
        source: TrackerError,
    },
}

/// Errors surfaced by the engine, one per stage.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A paginated retrieval call failed; nothing was aggregated.
    #[error("failed to fetch {what}: {source}")]
    Fetch {
        what: &'static str,
        #[source]
        source: TrackerError,
    },

    /// A filter name could not be resolved; nothing was fetched.
    #[error("failed to resolve filter: {0}")]
    FilterResolution(#[from] ResolveError),

    /// The result could not be encoded in the requested format.
    #[error("failed to render {format} report: {message}")]
    Render {
        format: &'static str,
        message: String,
    },

    /// Upload or commit into the tracker failed. The result is still valid.
    #[error("delivery to {target} failed during {stage}: {source}")]
    Delivery {
        target: String,
        stage: &'static str,
        #[source]
        source: TrackerError,
    },

    /// The delivery descriptor could not be parsed.
    #[error("invalid delivery target '{descriptor}': {reason}")]
    InvalidDeliveryTarget { descriptor: String, reason: String },
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
