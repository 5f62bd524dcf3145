use chrono::Duration;
use std::sync::Arc;
use tracing::debug;

use crate::analytics::efficiency::EfficiencyAnalyzer;
use crate::analytics::types::{TrendAnalysis, TrendLabel, TrendMetric, TrendPeriod};
use crate::analytics::utility::percent_change;
use crate::clock::Clock;
use crate::error::Result;
use crate::models::{Report, ReportType};
use crate::store::{ReportQuery, ReportSource, RouteSource};

const RIDERSHIP_THRESHOLD: f64 = 5.0;
const EFFICIENCY_THRESHOLD: f64 = 5.0;
const SAFETY_THRESHOLD: f64 = 10.0;

fn metric(current: f64, previous: f64, label: impl Fn(f64) -> TrendLabel) -> TrendMetric {
    let change = percent_change(current, previous);
    TrendMetric {
        current,
        previous,
        change,
        trend: label(change),
    }
}

pub fn ridership_label(change: f64) -> TrendLabel {
    if change > RIDERSHIP_THRESHOLD {
        TrendLabel::Increasing
    } else if change < -RIDERSHIP_THRESHOLD {
        TrendLabel::Decreasing
    } else {
        TrendLabel::Stable
    }
}

pub fn efficiency_label(change: f64) -> TrendLabel {
    if change > EFFICIENCY_THRESHOLD {
        TrendLabel::Improving
    } else if change < -EFFICIENCY_THRESHOLD {
        TrendLabel::Declining
    } else {
        TrendLabel::Stable
    }
}

/// Fewer safety reports than before reads as safer.
pub fn safety_label(change: f64) -> TrendLabel {
    if change < -SAFETY_THRESHOLD {
        TrendLabel::Safer
    } else if change > SAFETY_THRESHOLD {
        TrendLabel::Riskier
    } else {
        TrendLabel::Stable
    }
}

fn safety_count(reports: &[Report]) -> f64 {
    reports
        .iter()
        .filter(|r| r.report_type == ReportType::Safety)
        .count() as f64
}

pub fn insights(
    period: TrendPeriod,
    ridership: &TrendMetric,
    efficiency: &TrendMetric,
    safety: &TrendMetric,
) -> Vec<String> {
    let mut out = Vec::new();

    match ridership.trend {
        TrendLabel::Increasing => out.push(format!(
            "Ridership activity up {:.1}% over the previous {period}; consider adding capacity",
            ridership.change
        )),
        TrendLabel::Decreasing => out.push(format!(
            "Ridership activity down {:.1}% over the previous {period}; review service quality",
            ridership.change.abs()
        )),
        _ => {}
    }

    match efficiency.trend {
        TrendLabel::Improving => out.push("Efficiency is improving".to_string()),
        TrendLabel::Declining => {
            out.push("Efficiency is declining; review recent delay and breakdown reports".to_string())
        }
        _ => {}
    }

    match safety.trend {
        TrendLabel::Riskier => {
            out.push("Safety reports are rising; prioritize a safety review".to_string())
        }
        TrendLabel::Safer => out.push("Safety reports are falling".to_string()),
        _ => {}
    }

    if out.is_empty() {
        out.push("Route performance is stable".to_string());
    }
    out
}

/// Compares a route's latest window against the window before it.
#[derive(Clone)]
pub struct TrendAnalyzer {
    reports: Arc<dyn ReportSource>,
    routes: Arc<dyn RouteSource>,
    efficiency: EfficiencyAnalyzer,
    clock: Arc<dyn Clock>,
    /// Stand-in for the previous window's efficiency; no history is stored.
    previous_efficiency: f64,
}

impl TrendAnalyzer {
    pub fn new(
        reports: Arc<dyn ReportSource>,
        routes: Arc<dyn RouteSource>,
        efficiency: EfficiencyAnalyzer,
        clock: Arc<dyn Clock>,
        previous_efficiency: f64,
    ) -> Self {
        Self {
            reports,
            routes,
            efficiency,
            clock,
            previous_efficiency,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn analyze(&self, route_id: &str, period: TrendPeriod) -> Result<TrendAnalysis> {
        let route = self.routes.get_route(route_id).await?;

        let now = self.clock.now();
        let length = Duration::days(period.days());
        let current_start = now - length;
        let previous_start = current_start - length;

        let current = self
            .reports
            .list_reports(
                &ReportQuery::for_route(route_id)
                    .created_after(current_start)
                    .created_before(now),
            )
            .await?;
        let previous = self
            .reports
            .list_reports(
                &ReportQuery::for_route(route_id)
                    .created_after(previous_start)
                    .created_before(current_start),
            )
            .await?;

        let ridership = metric(current.len() as f64, previous.len() as f64, ridership_label);
        let efficiency_now = self.efficiency.evaluate(&route).await?.efficiency_score;
        let efficiency = metric(efficiency_now, self.previous_efficiency, efficiency_label);
        let safety = metric(safety_count(&current), safety_count(&previous), safety_label);
        let cost = TrendMetric {
            current: route.fare,
            previous: route.fare,
            change: 0.0,
            trend: TrendLabel::Stable,
        };

        debug!(
            current_reports = current.len(),
            previous_reports = previous.len(),
            "Trend windows loaded"
        );

        Ok(TrendAnalysis {
            route_id: route.id,
            period,
            window_start: current_start,
            window_end: now,
            insights: insights(period, &ridership, &efficiency, &safety),
            ridership,
            efficiency,
            safety,
            cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ridership_label_thresholds() {
        assert_eq!(ridership_label(5.0), TrendLabel::Stable);
        assert_eq!(ridership_label(5.1), TrendLabel::Increasing);
        assert_eq!(ridership_label(-5.1), TrendLabel::Decreasing);
    }

    #[test]
    fn test_efficiency_label_thresholds() {
        assert_eq!(efficiency_label(6.0), TrendLabel::Improving);
        assert_eq!(efficiency_label(-6.0), TrendLabel::Declining);
        assert_eq!(efficiency_label(-5.0), TrendLabel::Stable);
    }

    #[test]
    fn test_safety_label_is_inverted() {
        assert_eq!(safety_label(-50.0), TrendLabel::Safer);
        assert_eq!(safety_label(50.0), TrendLabel::Riskier);
        assert_eq!(safety_label(10.0), TrendLabel::Stable);
    }

    #[test]
    fn test_stable_insight_when_nothing_moves() {
        let flat = metric(4.0, 4.0, ridership_label);
        let eff = metric(75.0, 75.0, efficiency_label);
        let safe = metric(1.0, 1.0, safety_label);
        assert_eq!(
            insights(TrendPeriod::Weekly, &flat, &eff, &safe),
            vec!["Route performance is stable".to_string()]
        );
    }

    #[test]
    fn test_insights_mention_period() {
        let up = metric(12.0, 6.0, ridership_label);
        let eff = metric(60.0, 75.0, efficiency_label);
        let safe = metric(0.0, 3.0, safety_label);
        let out = insights(TrendPeriod::Weekly, &up, &eff, &safe);

        assert_eq!(out.len(), 3);
        assert!(out[0].contains("up 100.0% over the previous week"));
        assert!(out[1].starts_with("Efficiency is declining"));
        assert_eq!(out[2], "Safety reports are falling");
    }
}
