//! Collaborator interfaces for report, route and score data.
//!
//! [`ReportSource`] and [`RouteSource`] are read-only views supplied by the
//! host application. [`ScoreStore`] is the only write path this crate uses.
//! [`MemoryStore`] implements all three and backs the CLI and the tests.

mod memory;

pub use memory::{Dataset, MemoryStore};

use crate::error::Result;
use crate::models::{Report, ReportStatus, Route, ScoreRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Filter passed to [`ReportSource::list_reports`].
///
/// An empty `statuses` list matches every status. `created_after` is
/// inclusive and `created_before` exclusive.
#[derive(Debug, Clone, Default)]
pub struct ReportQuery {
    pub route_id: Option<String>,
    pub statuses: Vec<ReportStatus>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
}

impl ReportQuery {
    pub fn for_route(route_id: &str) -> Self {
        Self {
            route_id: Some(route_id.to_string()),
            ..Default::default()
        }
    }

    pub fn for_user(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            ..Default::default()
        }
    }

    pub fn with_statuses(mut self, statuses: &[ReportStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn created_after(mut self, after: DateTime<Utc>) -> Self {
        self.created_after = Some(after);
        self
    }

    pub fn created_before(mut self, before: DateTime<Utc>) -> Self {
        self.created_before = Some(before);
        self
    }

    pub fn matches(&self, report: &Report) -> bool {
        if let Some(route_id) = &self.route_id {
            if &report.route_id != route_id {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&report.status) {
            return false;
        }
        if let Some(after) = self.created_after {
            if report.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if report.created_at >= before {
                return false;
            }
        }
        if let Some(user_id) = &self.user_id {
            if report.user_id.as_deref() != Some(user_id.as_str()) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn list_reports(&self, query: &ReportQuery) -> Result<Vec<Report>>;
}

#[async_trait]
pub trait RouteSource: Send + Sync {
    /// Returns the route, or [`AnalyticsError::NotFound`](crate::error::AnalyticsError::NotFound).
    async fn get_route(&self, route_id: &str) -> Result<Route>;

    async fn list_active_routes(&self) -> Result<Vec<Route>>;
}

#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Creates or replaces the score record keyed by `record.route_id`.
    async fn upsert_score(&self, record: ScoreRecord) -> Result<ScoreRecord>;

    async fn get_score(&self, route_id: &str) -> Result<Option<ScoreRecord>>;

    async fn list_scores(&self) -> Result<Vec<ScoreRecord>>;
}
