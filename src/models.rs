//! Data types shared by the scoring and analytics pipeline.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical category of a crowd-sourced incident report.
///
/// Unknown strings deserialize into [`ReportType::Unrecognized`] so that a
/// report with a category newer than this crate still contributes to scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Delay,
    Safety,
    Crowding,
    Breakdown,
    Other,
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Verified,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    /// Statuses that count as confirmed incidents.
    pub const CONFIRMED: [ReportStatus; 2] = [ReportStatus::Verified, ReportStatus::Resolved];
}

/// A single incident report as supplied by the report collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub route_id: String,
    pub report_type: ReportType,
    pub severity: Severity,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stop {
    pub name: String,
    pub coordinates: Coordinates,
}

/// Daily service window, serialized as `"HH:MM"` strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatingHours {
    #[serde(with = "hh_mm")]
    pub start: NaiveTime,
    #[serde(with = "hh_mm")]
    pub end: NaiveTime,
}

impl OperatingHours {
    /// Length of the service day in hours. An `end` earlier than `start`
    /// wraps past midnight.
    pub fn span_hours(&self) -> f64 {
        let minutes = (self.end - self.start).num_minutes();
        let minutes = if minutes < 0 { minutes + 24 * 60 } else { minutes };
        minutes as f64 / 60.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    pub name: String,
    pub fare: f64,
    pub stops: Vec<Stop>,
    pub operating_hours: OperatingHours,
    pub is_active: bool,
}

impl Route {
    /// Position of the stop called `name`, if the route serves it.
    pub fn stop_index(&self, name: &str) -> Option<usize> {
        self.stops.iter().position(|s| s.name == name)
    }
}

/// Persisted composite score for one route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub route_id: String,
    pub reliability: f64,
    pub safety: f64,
    pub punctuality: f64,
    pub comfort: f64,
    pub overall: f64,
    pub total_reports: usize,
    pub last_calculated: DateTime<Utc>,
}

impl ScoreRecord {
    /// The all-zero record written for a route with no confirmed reports.
    pub fn zero(route_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            route_id: route_id.to_string(),
            reliability: 0.0,
            safety: 0.0,
            punctuality: 0.0,
            comfort: 0.0,
            overall: 0.0,
            total_reports: 0,
            last_calculated: now,
        }
    }
}

/// Parses a `"HH:MM"` string.
pub fn parse_hh_mm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_hh_mm(&raw).ok_or_else(|| D::Error::custom(format!("invalid HH:MM time '{raw}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_type_unknown_string_is_unrecognized() {
        let parsed: ReportType = serde_json::from_str("\"vandalism\"").unwrap();
        assert_eq!(parsed, ReportType::Unrecognized);

        let parsed: ReportType = serde_json::from_str("\"crowding\"").unwrap();
        assert_eq!(parsed, ReportType::Crowding);
    }

    #[test]
    fn test_operating_hours_span() {
        let hours = OperatingHours {
            start: parse_hh_mm("06:00").unwrap(),
            end: parse_hh_mm("22:30").unwrap(),
        };
        assert_eq!(hours.span_hours(), 16.5);
    }

    #[test]
    fn test_operating_hours_span_wraps_midnight() {
        let hours = OperatingHours {
            start: parse_hh_mm("20:00").unwrap(),
            end: parse_hh_mm("02:00").unwrap(),
        };
        assert_eq!(hours.span_hours(), 6.0);
    }

    #[test]
    fn test_route_deserializes_from_camel_case() {
        let json = r#"{
            "id": "r1",
            "name": "Harbor Line",
            "fare": 35.0,
            "stops": [{"name": "Pier", "coordinates": {"lat": 1.0, "lng": 2.0}}],
            "operatingHours": {"start": "05:30", "end": "23:00"},
            "isActive": true
        }"#;
        let route: Route = serde_json::from_str(json).unwrap();
        assert_eq!(route.stop_index("Pier"), Some(0));
        assert_eq!(route.stop_index("Depot"), None);
        assert_eq!(route.operating_hours.span_hours(), 17.5);
    }

    #[test]
    fn test_invalid_hh_mm_rejected() {
        assert!(parse_hh_mm("25:00").is_none());
        assert!(parse_hh_mm("noon").is_none());
    }
}
