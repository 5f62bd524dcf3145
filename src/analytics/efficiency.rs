use chrono::Duration;
use std::sync::Arc;
use tracing::debug;

use crate::analytics::types::{EfficiencyFactors, EfficiencyScore};
use crate::clock::Clock;
use crate::error::Result;
use crate::models::{Report, ReportType, Route, Severity};
use crate::store::{ReportQuery, ReportSource, RouteSource};

/// Days of report history considered by the efficiency analysis.
pub const WINDOW_DAYS: i64 = 30;

/// Report categories as seen by the efficiency analysis. Kept apart from the
/// composite score's type distribution on purpose: here each report type
/// feeds at most one factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EfficiencyCategory {
    Reliability,
    Speed,
    Safety,
    Comfort,
}

/// Which efficiency category a report type counts toward. Types missing
/// from this table (`other`, unrecognized) affect no factor.
static EFFICIENCY_CATEGORIES: &[(ReportType, EfficiencyCategory)] = &[
    (ReportType::Breakdown, EfficiencyCategory::Reliability),
    (ReportType::Delay, EfficiencyCategory::Speed),
    (ReportType::Safety, EfficiencyCategory::Safety),
    (ReportType::Crowding, EfficiencyCategory::Comfort),
];

pub fn efficiency_category(report_type: ReportType) -> Option<EfficiencyCategory> {
    EFFICIENCY_CATEGORIES
        .iter()
        .find(|(t, _)| *t == report_type)
        .map(|(_, c)| *c)
}

/// Factor value when a category has no reports in the window.
fn baseline(category: EfficiencyCategory) -> f64 {
    match category {
        EfficiencyCategory::Reliability => 50.0,
        EfficiencyCategory::Speed => 60.0,
        EfficiencyCategory::Safety => 80.0,
        EfficiencyCategory::Comfort => 70.0,
    }
}

/// Weights of the six factors. They sum to 1.0.
pub static EFFICIENCY_WEIGHTS: &[(&str, f64)] = &[
    ("reliability", 0.25),
    ("speed", 0.20),
    ("safety", 0.25),
    ("comfort", 0.15),
    ("cost", 0.10),
    ("frequency", 0.05),
];

impl EfficiencyFactors {
    fn values(&self) -> [(&'static str, f64); 6] {
        [
            ("reliability", self.reliability),
            ("speed", self.speed),
            ("safety", self.safety),
            ("comfort", self.comfort),
            ("cost", self.cost),
            ("frequency", self.frequency),
        ]
    }

    /// Unrounded weighted sum of the factors.
    pub fn weighted_sum(&self) -> f64 {
        self.values()
            .iter()
            .map(|(name, value)| {
                let weight = EFFICIENCY_WEIGHTS
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, w)| *w)
                    .unwrap_or(0.0);
                value * weight
            })
            .sum()
    }

    /// Weighted sum rounded to the nearest integer.
    pub fn efficiency_score(&self) -> f64 {
        self.weighted_sum().round()
    }
}

/// Share of a category's reports that are low or medium severity, as 0–100,
/// or the category baseline when there are none.
fn category_factor(reports: &[Report], category: EfficiencyCategory) -> f64 {
    let matching: Vec<&Report> = reports
        .iter()
        .filter(|r| efficiency_category(r.report_type) == Some(category))
        .collect();

    if matching.is_empty() {
        return baseline(category);
    }

    let minor = matching
        .iter()
        .filter(|r| matches!(r.severity, Severity::Low | Severity::Medium))
        .count();
    minor as f64 / matching.len() as f64 * 100.0
}

/// `100 - (fare - 30) * 2`, held to 0–100.
pub fn cost_factor(fare: f64) -> f64 {
    (100.0 - (fare - 30.0) * 2.0).clamp(0.0, 100.0)
}

pub fn frequency_factor(route: &Route) -> f64 {
    (route.operating_hours.span_hours() * 2.0).min(100.0)
}

pub fn compute_factors(route: &Route, reports: &[Report]) -> EfficiencyFactors {
    EfficiencyFactors {
        reliability: category_factor(reports, EfficiencyCategory::Reliability),
        speed: category_factor(reports, EfficiencyCategory::Speed),
        safety: category_factor(reports, EfficiencyCategory::Safety),
        comfort: category_factor(reports, EfficiencyCategory::Comfort),
        cost: cost_factor(route.fare),
        frequency: frequency_factor(route),
    }
}

/// Threshold rules, each checked independently.
pub fn recommendations(factors: &EfficiencyFactors) -> Vec<String> {
    let rules: [(bool, &str); 6] = [
        (factors.reliability < 70.0, "Improve on-time performance"),
        (factors.speed < 70.0, "Optimize scheduling to reduce travel delays"),
        (factors.safety < 80.0, "Address safety concerns on this route"),
        (factors.comfort < 70.0, "Reduce overcrowding to improve passenger comfort"),
        (factors.cost < 50.0, "Review fare pricing to improve affordability"),
        (factors.frequency < 50.0, "Increase frequency during peak hours"),
    ];

    rules
        .into_iter()
        .filter(|(fires, _)| *fires)
        .map(|(_, text)| text.to_string())
        .collect()
}

/// Computes multi-factor efficiency scores.
#[derive(Clone)]
pub struct EfficiencyAnalyzer {
    reports: Arc<dyn ReportSource>,
    routes: Arc<dyn RouteSource>,
    clock: Arc<dyn Clock>,
}

impl EfficiencyAnalyzer {
    pub fn new(
        reports: Arc<dyn ReportSource>,
        routes: Arc<dyn RouteSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reports,
            routes,
            clock,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_efficiency(&self, route_id: &str) -> Result<EfficiencyScore> {
        let route = self.routes.get_route(route_id).await?;
        self.evaluate(&route).await
    }

    /// Scores an already-fetched route.
    pub async fn evaluate(&self, route: &Route) -> Result<EfficiencyScore> {
        let now = self.clock.now();
        let query = ReportQuery::for_route(&route.id).created_after(now - Duration::days(WINDOW_DAYS));
        let reports = self.reports.list_reports(&query).await?;

        let factors = compute_factors(route, &reports);
        let efficiency_score = factors.efficiency_score();

        debug!(
            route_id = %route.id,
            reports = reports.len(),
            efficiency_score,
            "Efficiency computed"
        );

        Ok(EfficiencyScore {
            route_id: route.id.clone(),
            route_name: route.name.clone(),
            factors,
            efficiency_score,
            recommendations: recommendations(&factors),
            report_count: reports.len(),
            calculated_at: now,
        })
    }
}
