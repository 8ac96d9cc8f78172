//! Statistical reduction of fetched records.
//!
//! This module turns time entries and issues into the grouped tables of an
//! [`AnalysisResult`](crate::models::AnalysisResult).

pub mod aggregator;
pub mod rounding;

pub use aggregator::*;
pub use rounding::{round2, round_half_up};
