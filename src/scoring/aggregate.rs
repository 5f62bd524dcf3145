use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info};

use crate::analytics::utility::mean;
use crate::clock::Clock;
use crate::error::Result;
use crate::models::{Report, ReportStatus, ScoreRecord};
use crate::scoring::weights::{severity_weight, type_distribution};
use crate::store::{ReportQuery, ReportSource, RouteSource, ScoreStore};

/// Every route starts at this score and reports subtract from it.
const PERFECT_SCORE: f64 = 5.0;

/// Fraction of the severity weight a single report takes off.
const IMPACT_PER_SEVERITY: f64 = 0.5;

/// Folds a route's confirmed reports into a composite [`ScoreRecord`].
///
/// With no reports the all-zero record is returned. Otherwise each report
/// pushes the affected accumulators down by `severity_weight * 0.5` split
/// across sub-scores by its type distribution, and every sub-score is
/// `clamp(5 + accumulator, 0, 5)`.
pub fn aggregate_reports(route_id: &str, reports: &[Report], now: DateTime<Utc>) -> ScoreRecord {
    if reports.is_empty() {
        return ScoreRecord::zero(route_id, now);
    }

    let mut reliability = 0.0;
    let mut safety = 0.0;
    let mut punctuality = 0.0;
    let mut comfort = 0.0;

    for report in reports {
        let impact = -severity_weight(report.severity) * IMPACT_PER_SEVERITY;
        let d = type_distribution(report.report_type);

        reliability += impact * d.reliability;
        safety += impact * d.safety;
        punctuality += impact * d.punctuality;
        comfort += impact * d.comfort;
    }

    let normalize = |acc: f64| (PERFECT_SCORE + acc).clamp(0.0, PERFECT_SCORE);
    let reliability = normalize(reliability);
    let safety = normalize(safety);
    let punctuality = normalize(punctuality);
    let comfort = normalize(comfort);

    ScoreRecord {
        route_id: route_id.to_string(),
        reliability,
        safety,
        punctuality,
        comfort,
        overall: mean(&[reliability, safety, punctuality, comfort]),
        total_reports: reports.len(),
        last_calculated: now,
    }
}

/// Computes and persists composite scores.
#[derive(Clone)]
pub struct ScoreAggregator {
    reports: Arc<dyn ReportSource>,
    routes: Arc<dyn RouteSource>,
    scores: Arc<dyn ScoreStore>,
    clock: Arc<dyn Clock>,
}

impl ScoreAggregator {
    pub fn new(
        reports: Arc<dyn ReportSource>,
        routes: Arc<dyn RouteSource>,
        scores: Arc<dyn ScoreStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reports,
            routes,
            scores,
            clock,
        }
    }

    /// Recomputes and upserts the score for one route.
    #[tracing::instrument(skip(self))]
    pub async fn compute_score(&self, route_id: &str) -> Result<ScoreRecord> {
        self.routes.get_route(route_id).await?;

        let query = ReportQuery::for_route(route_id).with_statuses(&ReportStatus::CONFIRMED);
        let reports = self.reports.list_reports(&query).await?;

        let record = aggregate_reports(route_id, &reports, self.clock.now());
        let saved = self.scores.upsert_score(record).await?;

        info!(
            total_reports = saved.total_reports,
            overall = saved.overall,
            "Score updated"
        );
        Ok(saved)
    }

    /// Recomputes every active route.
    ///
    /// A failure on one route is logged and skipped; the records that were
    /// written are returned. Only a failure to list the routes is fatal.
    #[tracing::instrument(skip(self))]
    pub async fn recompute_all(&self) -> Result<Vec<ScoreRecord>> {
        let routes = self.routes.list_active_routes().await?;
        let mut updated = Vec::with_capacity(routes.len());
        let mut failed = 0usize;

        for route in &routes {
            match self.compute_score(&route.id).await {
                Ok(record) => updated.push(record),
                Err(e) => {
                    failed += 1;
                    error!(route_id = %route.id, error = %e, "Score recomputation failed");
                }
            }
        }

        info!(
            routes = routes.len(),
            updated = updated.len(),
            failed,
            "Batch recomputation finished"
        );
        Ok(updated)
    }

    pub async fn get_score(&self, route_id: &str) -> Result<Option<ScoreRecord>> {
        self.scores.get_score(route_id).await
    }

    pub async fn list_scores(&self) -> Result<Vec<ScoreRecord>> {
        self.scores.list_scores().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReportType, Severity};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn report(report_type: ReportType, severity: Severity) -> Report {
        Report {
            id: "rep".to_string(),
            route_id: "r1".to_string(),
            report_type,
            severity,
            status: ReportStatus::Verified,
            created_at: now(),
            user_id: None,
            is_anonymous: true,
        }
    }

    fn assert_overall_is_mean(s: &ScoreRecord) {
        let expected = (s.reliability + s.safety + s.punctuality + s.comfort) / 4.0;
        assert!((s.overall - expected).abs() < 1e-9);
    }

    #[test]
    fn test_no_reports_yields_zero_record() {
        let score = aggregate_reports("r1", &[], now());
        assert_eq!(score, ScoreRecord::zero("r1", now()));
    }

    #[test]
    fn test_single_critical_safety_report() {
        let score = aggregate_reports("r1", &[report(ReportType::Safety, Severity::Critical)], now());

        assert_eq!(score.safety, 3.0);
        assert_eq!(score.reliability, 5.0);
        assert_eq!(score.punctuality, 5.0);
        assert_eq!(score.comfort, 5.0);
        assert_eq!(score.overall, 4.5);
        assert_eq!(score.total_reports, 1);
    }

    #[test]
    fn test_delay_splits_between_reliability_and_punctuality() {
        // medium: weight 2, impact -1 -> reliability -0.4, punctuality -0.6
        let score = aggregate_reports("r1", &[report(ReportType::Delay, Severity::Medium)], now());

        assert!((score.reliability - 4.6).abs() < 1e-9);
        assert!((score.punctuality - 4.4).abs() < 1e-9);
        assert_eq!(score.safety, 5.0);
        assert_overall_is_mean(&score);
    }

    #[test]
    fn test_scores_clamp_at_zero() {
        let reports: Vec<_> = (0..10)
            .map(|_| report(ReportType::Safety, Severity::Critical))
            .collect();
        let score = aggregate_reports("r1", &reports, now());

        assert_eq!(score.safety, 0.0);
        assert_eq!(score.total_reports, 10);
        assert_overall_is_mean(&score);
    }

    #[test]
    fn test_all_combinations_stay_in_range() {
        let types = [
            ReportType::Delay,
            ReportType::Safety,
            ReportType::Crowding,
            ReportType::Breakdown,
            ReportType::Other,
            ReportType::Unrecognized,
        ];
        let severities = [
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ];

        let mut reports = Vec::new();
        for t in types {
            for s in severities {
                reports.push(report(t, s));
                let score = aggregate_reports("r1", &reports, now());
                for value in [score.reliability, score.safety, score.punctuality, score.comfort] {
                    assert!((0.0..=5.0).contains(&value));
                }
                assert_overall_is_mean(&score);
            }
        }
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let reports = vec![
            report(ReportType::Crowding, Severity::High),
            report(ReportType::Breakdown, Severity::Low),
            report(ReportType::Other, Severity::Medium),
        ];
        let first = aggregate_reports("r1", &reports, now());
        let second = aggregate_reports("r1", &reports, now() + chrono::Duration::hours(1));

        assert_eq!(first.reliability, second.reliability);
        assert_eq!(first.safety, second.safety);
        assert_eq!(first.punctuality, second.punctuality);
        assert_eq!(first.comfort, second.comfort);
        assert_eq!(first.overall, second.overall);
        assert_ne!(first.last_calculated, second.last_calculated);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_scored() {
        use crate::clock::FixedClock;
        use crate::store::MemoryStore;

        let store = Arc::new(MemoryStore::new());
        store.insert_report(report(ReportType::Delay, Severity::High)).await;
        let aggregator = ScoreAggregator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(FixedClock(now())),
        );

        let err = aggregator.compute_score("r1").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(aggregator.list_scores().await.unwrap().is_empty());
    }
}
