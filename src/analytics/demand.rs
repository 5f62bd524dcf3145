use chrono::{DateTime, Datelike, Duration, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::analytics::types::{DemandFactors, DemandForecast};
use crate::analytics::utility::capped_confidence;
use crate::clock::Clock;
use crate::error::Result;
use crate::store::{ReportQuery, ReportSource, RouteSource};

const HISTORY_DAYS: i64 = 30;
// Placeholders until weather and event feeds exist.
const WEATHER_FACTOR: f64 = 1.0;
const EVENT_FACTOR: f64 = 1.0;

/// Report volume stands in for ridership: two points per report, capped at 100.
pub fn historical_demand(report_count: usize) -> f64 {
    (report_count as f64 * 2.0).min(100.0)
}

/// Small month-of-year adjustment: quieter in winter, busier in the autumn
/// term, a summer dip.
pub fn seasonality(month: u32) -> f64 {
    match month {
        12 | 1 | 2 => 0.95,
        6..=8 => 0.9,
        9..=11 => 1.1,
        _ => 1.0,
    }
}

pub fn demand_recommendations(predicted: f64) -> Vec<String> {
    if predicted > 80.0 {
        vec!["High demand expected; increase service frequency for this slot".to_string()]
    } else if predicted < 30.0 {
        vec!["Low demand expected; consider reducing frequency for this slot".to_string()]
    } else {
        Vec::new()
    }
}

/// Estimates 0–100 demand for a route at a future time slot.
#[derive(Clone)]
pub struct DemandForecaster {
    reports: Arc<dyn ReportSource>,
    routes: Arc<dyn RouteSource>,
    clock: Arc<dyn Clock>,
}

impl DemandForecaster {
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
    pub async fn forecast(&self, route_id: &str, time_slot: DateTime<Utc>) -> Result<DemandForecast> {
        let route = self.routes.get_route(route_id).await?;
        let since = self.clock.now() - Duration::days(HISTORY_DAYS);
        let reports = self
            .reports
            .list_reports(&ReportQuery::for_route(&route.id).created_after(since))
            .await?;

        let factors = DemandFactors {
            historical: historical_demand(reports.len()),
            weather: WEATHER_FACTOR,
            events: EVENT_FACTOR,
            seasonality: seasonality(time_slot.month()),
        };
        let predicted_demand =
            (factors.historical * factors.weather * factors.events * factors.seasonality)
                .clamp(0.0, 100.0);

        debug!(reports = reports.len(), predicted_demand, "Demand forecast");

        Ok(DemandForecast {
            route_id: route.id,
            time_slot,
            predicted_demand,
            confidence: capped_confidence(60.0 + reports.len() as f64 * 1.5),
            factors,
            recommendations: demand_recommendations(predicted_demand),
        })
    }
}
