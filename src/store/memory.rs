use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{ReportQuery, ReportSource, RouteSource, ScoreStore};
use crate::error::{AnalyticsError, Result};
use crate::models::{Report, Route, ScoreRecord};

/// Routes and reports as stored on disk:
/// ```json
/// {
///   "routes": [{ "id": "r1", "name": "Harbor Line", ... }],
///   "reports": [{ "id": "rep-1", "routeId": "r1", ... }]
/// }
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub reports: Vec<Report>,
}

impl Dataset {
    /// Loads a dataset from a JSON file at `path`.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read dataset '{path}'"))?;
        let dataset = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse dataset '{path}'"))?;
        Ok(dataset)
    }
}

/// In-process implementation of every collaborator trait.
///
/// Routes are keyed by id, so iteration order (and therefore batch order) is
/// stable.
#[derive(Default)]
pub struct MemoryStore {
    routes: RwLock<BTreeMap<String, Route>>,
    reports: RwLock<Vec<Report>>,
    scores: RwLock<BTreeMap<String, ScoreRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dataset(dataset: Dataset) -> Self {
        Self {
            routes: RwLock::new(
                dataset
                    .routes
                    .into_iter()
                    .map(|r| (r.id.clone(), r))
                    .collect(),
            ),
            reports: RwLock::new(dataset.reports),
            scores: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn insert_route(&self, route: Route) {
        self.routes.write().await.insert(route.id.clone(), route);
    }

    pub async fn insert_report(&self, report: Report) {
        self.reports.write().await.push(report);
    }
}

#[async_trait]
impl ReportSource for MemoryStore {
    async fn list_reports(&self, query: &ReportQuery) -> Result<Vec<Report>> {
        let reports = self.reports.read().await;
        let matched: Vec<Report> = reports.iter().filter(|r| query.matches(r)).cloned().collect();
        debug!(
            route_id = ?query.route_id,
            matched = matched.len(),
            "Listed reports"
        );
        Ok(matched)
    }
}

#[async_trait]
impl RouteSource for MemoryStore {
    async fn get_route(&self, route_id: &str) -> Result<Route> {
        self.routes
            .read()
            .await
            .get(route_id)
            .cloned()
            .ok_or_else(|| AnalyticsError::route_not_found(route_id))
    }

    async fn list_active_routes(&self) -> Result<Vec<Route>> {
        Ok(self
            .routes
            .read()
            .await
            .values()
            .filter(|r| r.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ScoreStore for MemoryStore {
    async fn upsert_score(&self, record: ScoreRecord) -> Result<ScoreRecord> {
        self.scores
            .write()
            .await
            .insert(record.route_id.clone(), record.clone());
        Ok(record)
    }

    async fn get_score(&self, route_id: &str) -> Result<Option<ScoreRecord>> {
        Ok(self.scores.read().await.get(route_id).cloned())
    }

    async fn list_scores(&self) -> Result<Vec<ScoreRecord>> {
        Ok(self.scores.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReportStatus, ReportType, Severity};
    use chrono::{Duration, TimeZone, Utc};

    fn report(id: &str, route_id: &str, status: ReportStatus, days_ago: i64) -> Report {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        Report {
            id: id.to_string(),
            route_id: route_id.to_string(),
            report_type: ReportType::Delay,
            severity: Severity::Low,
            status,
            created_at: now - Duration::days(days_ago),
            user_id: Some("u1".to_string()),
            is_anonymous: false,
        }
    }

    #[tokio::test]
    async fn test_list_reports_applies_filters() {
        let store = MemoryStore::new();
        store.insert_report(report("a", "r1", ReportStatus::Verified, 1)).await;
        store.insert_report(report("b", "r1", ReportStatus::Pending, 1)).await;
        store.insert_report(report("c", "r1", ReportStatus::Resolved, 40)).await;
        store.insert_report(report("d", "r2", ReportStatus::Verified, 1)).await;

        let cutoff = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap() - Duration::days(30);
        let query = ReportQuery::for_route("r1")
            .with_statuses(&ReportStatus::CONFIRMED)
            .created_after(cutoff);

        let reports = store.list_reports(&query).await.unwrap();
        let ids: Vec<_> = reports.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[tokio::test]
    async fn test_get_missing_route_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get_route("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_record() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.upsert_score(ScoreRecord::zero("r1", now)).await.unwrap();

        let mut updated = ScoreRecord::zero("r1", now);
        updated.safety = 3.0;
        store.upsert_score(updated).await.unwrap();

        let scores = store.list_scores().await.unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].safety, 3.0);
    }

    #[test]
    fn test_dataset_load_missing_file_errors() {
        let err = Dataset::load("/nonexistent/transit.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/transit.json"));
    }
}
