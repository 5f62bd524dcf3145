use chrono::{Duration, NaiveTime, Timelike, Weekday};
use std::sync::Arc;
use tracing::debug;

use crate::analytics::types::{AlternativeTimes, TravelContext, TravelFactors, TravelTimePrediction};
use crate::analytics::utility::{capped_confidence, mean};
use crate::clock::Clock;
use crate::error::Result;
use crate::models::{Report, ReportStatus, Route, Severity};
use crate::store::{ReportQuery, ReportSource, RouteSource};

/// Minutes assumed between consecutive stops.
const MINUTES_PER_STOP: f64 = 3.0;
const MIN_BASE_MINUTES: f64 = 5.0;
/// Used when either stop is not on the route.
const FALLBACK_BASE_MINUTES: f64 = 30.0;
/// Placeholder until a weather feed is wired in.
const WEATHER_MULTIPLIER: f64 = 1.1;
/// Days of confirmed reports feeding the historical multiplier.
const HISTORY_DAYS: i64 = 7;

pub fn base_time(route: &Route, from_stop: &str, to_stop: &str) -> f64 {
    match (route.stop_index(from_stop), route.stop_index(to_stop)) {
        (Some(from), Some(to)) => {
            let stops_between = from.abs_diff(to) as f64;
            (stops_between * MINUTES_PER_STOP).max(MIN_BASE_MINUTES)
        }
        _ => FALLBACK_BASE_MINUTES,
    }
}

pub fn time_of_day_multiplier(time: Option<NaiveTime>) -> f64 {
    match time.map(|t| t.hour()) {
        Some(7..=9) => 1.3,
        Some(17..=19) => 1.4,
        Some(h) if h >= 22 || h <= 5 => 0.8,
        _ => 1.0,
    }
}

pub fn day_of_week_multiplier(weekday: Option<Weekday>) -> f64 {
    match weekday {
        Some(Weekday::Sat | Weekday::Sun) => 0.9,
        _ => 1.0,
    }
}

pub fn traffic_multiplier(time: Option<NaiveTime>) -> f64 {
    match time.map(|t| t.hour()) {
        Some(7..=9) => 1.2,
        Some(17..=19) => 1.3,
        _ => 1.0,
    }
}

fn severity_value(severity: Severity) -> f64 {
    match severity {
        Severity::Low => 1.0,
        Severity::Medium => 1.2,
        Severity::High | Severity::Critical => 1.5,
    }
}

/// `max(0.8, 2.0 - mean severity value)`, or 1.0 without reports.
pub fn historical_multiplier(reports: &[Report]) -> f64 {
    if reports.is_empty() {
        return 1.0;
    }
    let values: Vec<f64> = reports.iter().map(|r| severity_value(r.severity)).collect();
    (2.0 - mean(&values)).max(0.8)
}

pub fn travel_factors(ctx: TravelContext, reports: &[Report]) -> TravelFactors {
    TravelFactors {
        time_of_day: time_of_day_multiplier(ctx.time_of_day),
        day_of_week: day_of_week_multiplier(ctx.weekday),
        weather: WEATHER_MULTIPLIER,
        traffic: traffic_multiplier(ctx.time_of_day),
        historical: historical_multiplier(reports),
    }
}

/// Estimates minutes between two stops of a route.
#[derive(Clone)]
pub struct TravelTimePredictor {
    reports: Arc<dyn ReportSource>,
    routes: Arc<dyn RouteSource>,
    clock: Arc<dyn Clock>,
}

impl TravelTimePredictor {
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

    #[tracing::instrument(skip(self, ctx))]
    pub async fn predict(
        &self,
        route_id: &str,
        from_stop: &str,
        to_stop: &str,
        ctx: TravelContext,
    ) -> Result<TravelTimePrediction> {
        let route = self.routes.get_route(route_id).await?;
        self.predict_for_route(&route, from_stop, to_stop, ctx).await
    }

    pub async fn predict_for_route(
        &self,
        route: &Route,
        from_stop: &str,
        to_stop: &str,
        ctx: TravelContext,
    ) -> Result<TravelTimePrediction> {
        let since = self.clock.now() - Duration::days(HISTORY_DAYS);
        let query = ReportQuery::for_route(&route.id)
            .with_statuses(&ReportStatus::CONFIRMED)
            .created_after(since);
        let reports = self.reports.list_reports(&query).await?;

        let base_time = base_time(route, from_stop, to_stop);
        let factors = travel_factors(ctx, &reports);
        let predicted = (base_time * factors.product()).round();

        debug!(
            route_id = %route.id,
            base_time,
            predicted,
            reports = reports.len(),
            "Travel time predicted"
        );

        Ok(TravelTimePrediction {
            route_id: route.id.clone(),
            from_stop: from_stop.to_string(),
            to_stop: to_stop.to_string(),
            base_time,
            predicted_time: predicted as u32,
            confidence: capped_confidence(50.0 + reports.len() as f64 * 2.0),
            factors,
            alternative_times: AlternativeTimes {
                optimistic: predicted * 0.8,
                realistic: predicted,
                pessimistic: predicted * 1.3,
            },
        })
    }
}
