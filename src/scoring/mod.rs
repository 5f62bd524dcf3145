//! Composite route scoring.
//!
//! Confirmed reports are weighted by severity and spread across the four
//! sub-scores (reliability, safety, punctuality, comfort) by report type.
//! The result is persisted once per route through a
//! [`ScoreStore`](crate::store::ScoreStore).

pub mod aggregate;
pub mod weights;

pub use aggregate::{ScoreAggregator, aggregate_reports};
