use crate::models::{ReportType, Severity};

/// Share of a report's impact that lands on each composite sub-score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Distribution {
    pub reliability: f64,
    pub safety: f64,
    pub punctuality: f64,
    pub comfort: f64,
}

const fn dist(reliability: f64, safety: f64, punctuality: f64, comfort: f64) -> Distribution {
    Distribution {
        reliability,
        safety,
        punctuality,
        comfort,
    }
}

/// Report-type weight distribution used by the score aggregator.
static TYPE_DISTRIBUTIONS: &[(ReportType, Distribution)] = &[
    (ReportType::Delay, dist(0.4, 0.0, 0.6, 0.0)),
    (ReportType::Safety, dist(0.0, 1.0, 0.0, 0.0)),
    (ReportType::Crowding, dist(0.2, 0.0, 0.0, 0.8)),
    (ReportType::Breakdown, dist(0.6, 0.4, 0.0, 0.0)),
    (ReportType::Other, dist(0.3, 0.3, 0.0, 0.4)),
];

const UNIFORM: Distribution = dist(0.25, 0.25, 0.25, 0.25);

pub fn type_distribution(report_type: ReportType) -> Distribution {
    TYPE_DISTRIBUTIONS
        .iter()
        .find(|(t, _)| *t == report_type)
        .map(|(_, d)| *d)
        .unwrap_or(UNIFORM)
}

/// Severity weight: low=1, medium=2, high=3, critical=4.
pub fn severity_weight(severity: Severity) -> f64 {
    match severity {
        Severity::Low => 1.0,
        Severity::Medium => 2.0,
        Severity::High => 3.0,
        Severity::Critical => 4.0,
    }
}
