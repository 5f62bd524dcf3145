//! Result types returned by the analytics queries. None of these are persisted.

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::AnalyticsError;

/// The six 0–100 efficiency factors for one route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EfficiencyFactors {
    pub reliability: f64,
    pub speed: f64,
    pub safety: f64,
    pub comfort: f64,
    pub cost: f64,
    pub frequency: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EfficiencyScore {
    pub route_id: String,
    pub route_name: String,
    pub factors: EfficiencyFactors,
    pub efficiency_score: f64,
    pub recommendations: Vec<String>,
    pub report_count: usize,
    pub calculated_at: DateTime<Utc>,
}

/// Optional context for a travel-time prediction. Absent fields leave their
/// multiplier at 1.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct TravelContext {
    pub time_of_day: Option<NaiveTime>,
    pub weekday: Option<Weekday>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelFactors {
    pub time_of_day: f64,
    pub day_of_week: f64,
    pub weather: f64,
    pub traffic: f64,
    pub historical: f64,
}

impl TravelFactors {
    pub fn product(&self) -> f64 {
        self.time_of_day * self.day_of_week * self.weather * self.traffic * self.historical
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlternativeTimes {
    pub optimistic: f64,
    pub realistic: f64,
    pub pessimistic: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelTimePrediction {
    pub route_id: String,
    pub from_stop: String,
    pub to_stop: String,
    pub base_time: f64,
    pub predicted_time: u32,
    pub confidence: f64,
    pub factors: TravelFactors,
    pub alternative_times: AlternativeTimes,
}

/// Limits applied by the alternative route finder.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlternativeFilter {
    pub max_time: Option<u32>,
    pub max_cost: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeRoute {
    pub route_id: String,
    pub route_name: String,
    pub travel_time: u32,
    pub fare: f64,
    pub efficiency_score: f64,
    pub stop_count: usize,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl TrendPeriod {
    pub fn days(self) -> i64 {
        match self {
            TrendPeriod::Daily => 1,
            TrendPeriod::Weekly => 7,
            TrendPeriod::Monthly => 30,
        }
    }
}

impl fmt::Display for TrendPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrendPeriod::Daily => "day",
            TrendPeriod::Weekly => "week",
            TrendPeriod::Monthly => "month",
        })
    }
}

impl FromStr for TrendPeriod {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(TrendPeriod::Daily),
            "weekly" => Ok(TrendPeriod::Weekly),
            "monthly" => Ok(TrendPeriod::Monthly),
            other => Err(AnalyticsError::InvalidInput(format!(
                "unknown trend period '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendLabel {
    Increasing,
    Decreasing,
    Improving,
    Declining,
    Safer,
    Riskier,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendMetric {
    pub current: f64,
    pub previous: f64,
    /// Percent change from `previous` to `current`.
    pub change: f64,
    pub trend: TrendLabel,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendAnalysis {
    pub route_id: String,
    pub period: TrendPeriod,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub ridership: TrendMetric,
    pub efficiency: TrendMetric,
    pub safety: TrendMetric,
    pub cost: TrendMetric,
    pub insights: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DemandFactors {
    pub historical: f64,
    pub weather: f64,
    pub events: f64,
    pub seasonality: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandForecast {
    pub route_id: String,
    pub time_slot: DateTime<Utc>,
    pub predicted_demand: f64,
    pub confidence: f64,
    pub factors: DemandFactors,
    pub recommendations: Vec<String>,
}

/// Relative importance a user places on each aspect of a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PreferenceVector {
    pub efficiency: f64,
    pub safety: f64,
    pub cost: f64,
    pub convenience: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationType {
    Reliability,
    Safety,
    Cost,
    Comfort,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedRoute {
    pub route_id: String,
    pub route_name: String,
    pub score: f64,
    pub efficiency_score: f64,
    pub reason: String,
    #[serde(rename = "type")]
    pub recommendation_type: RecommendationType,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecommendation {
    pub user_id: String,
    pub preferences: PreferenceVector,
    pub routes: Vec<RecommendedRoute>,
    pub generated_at: DateTime<Utc>,
}
