//! redreport - time and effort reports for Redmine projects.
//!
//! The engine retrieves every time entry and issue matching a request,
//! reduces them into grouped statistical tables, renders the result as JSON,
//! CSV or XLSX, and optionally stores the artifact back in the tracker.

pub mod analysis;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod models;
pub mod report;
pub mod tracker;

pub use engine::{EngineSettings, ReportEngine, RunOutcome};
pub use error::{EngineError, Result};
