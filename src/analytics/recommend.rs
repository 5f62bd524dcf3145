use futures::stream::{self, StreamExt as _, TryStreamExt as _};
use std::sync::Arc;
use tracing::info;

use crate::analytics::efficiency::EfficiencyAnalyzer;
use crate::analytics::types::{
    EfficiencyFactors, PreferenceVector, RecommendationType, RecommendedRoute, UserRecommendation,
};
use crate::clock::Clock;
use crate::error::Result;
use crate::models::Report;
use crate::store::{ReportQuery, ReportSource, RouteSource};

/// Routes scoring at or below this are never recommended.
const MIN_RECOMMENDATION_SCORE: f64 = 60.0;

/// Turns a user's report history into a preference vector.
pub trait PreferenceStrategy: Send + Sync {
    fn derive(&self, user_id: &str, history: &[Report]) -> PreferenceVector;
}

/// Returns the same weights for every user and ignores their history.
#[derive(Debug, Clone, Copy)]
pub struct ConstantPreferences(pub PreferenceVector);

impl Default for ConstantPreferences {
    fn default() -> Self {
        Self(PreferenceVector {
            efficiency: 0.3,
            safety: 0.3,
            cost: 0.2,
            convenience: 0.2,
        })
    }
}

impl PreferenceStrategy for ConstantPreferences {
    fn derive(&self, _user_id: &str, _history: &[Report]) -> PreferenceVector {
        self.0
    }
}

pub fn recommendation_score(factors: &EfficiencyFactors, prefs: &PreferenceVector) -> f64 {
    factors.reliability * prefs.efficiency
        + factors.safety * prefs.safety
        + (100.0 - factors.cost) * prefs.cost
        + factors.comfort * prefs.convenience
}

pub fn reason(factors: &EfficiencyFactors) -> &'static str {
    if factors.safety > 85.0 {
        "high safety rating"
    } else if factors.reliability > 85.0 {
        "very reliable service"
    } else if factors.cost < 40.0 {
        "great value for money"
    } else {
        "good overall performance"
    }
}

/// The largest contributor; earlier entries win ties.
pub fn recommendation_type(factors: &EfficiencyFactors) -> RecommendationType {
    [
        (RecommendationType::Reliability, factors.reliability),
        (RecommendationType::Safety, factors.safety),
        (RecommendationType::Cost, 100.0 - factors.cost),
        (RecommendationType::Comfort, factors.comfort),
    ]
    .into_iter()
    .fold((RecommendationType::Reliability, f64::MIN), |best, (kind, value)| {
        if value > best.1 { (kind, value) } else { best }
    })
    .0
}

/// Ranks active routes for a user.
#[derive(Clone)]
pub struct RecommendationEngine {
    reports: Arc<dyn ReportSource>,
    routes: Arc<dyn RouteSource>,
    efficiency: EfficiencyAnalyzer,
    preferences: Arc<dyn PreferenceStrategy>,
    clock: Arc<dyn Clock>,
    default_limit: usize,
    concurrency: usize,
}

impl RecommendationEngine {
    pub fn new(
        reports: Arc<dyn ReportSource>,
        routes: Arc<dyn RouteSource>,
        efficiency: EfficiencyAnalyzer,
        preferences: Arc<dyn PreferenceStrategy>,
        clock: Arc<dyn Clock>,
        default_limit: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            reports,
            routes,
            efficiency,
            preferences,
            clock,
            default_limit,
            concurrency: concurrency.max(1),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn recommend(&self, user_id: &str, limit: Option<usize>) -> Result<UserRecommendation> {
        let history = self.reports.list_reports(&ReportQuery::for_user(user_id)).await?;
        let preferences = self.preferences.derive(user_id, &history);

        let routes = self.routes.list_active_routes().await?;
        let route_count = routes.len();

        let scored: Vec<RecommendedRoute> = stream::iter(routes)
            .map(|route| async move {
                let efficiency = self.efficiency.evaluate(&route).await?;
                let factors = efficiency.factors;
                Ok::<_, crate::error::AnalyticsError>(RecommendedRoute {
                    route_id: route.id,
                    route_name: route.name,
                    score: recommendation_score(&factors, &preferences),
                    efficiency_score: efficiency.efficiency_score,
                    reason: reason(&factors).to_string(),
                    recommendation_type: recommendation_type(&factors),
                })
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let mut ranked: Vec<RecommendedRoute> = scored
            .into_iter()
            .filter(|r| r.score > MIN_RECOMMENDATION_SCORE)
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.route_id.cmp(&b.route_id))
        });
        ranked.truncate(limit.unwrap_or(self.default_limit));

        info!(
            history = history.len(),
            routes = route_count,
            recommended = ranked.len(),
            "Recommendations ranked"
        );

        Ok(UserRecommendation {
            user_id: user_id.to_string(),
            preferences,
            routes: ranked,
            generated_at: self.clock.now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factors(reliability: f64, safety: f64, comfort: f64, cost: f64) -> EfficiencyFactors {
        EfficiencyFactors {
            reliability,
            speed: 60.0,
            safety,
            comfort,
            cost,
            frequency: 32.0,
        }
    }

    #[test]
    fn test_constant_preferences_ignore_history() {
        let prefs = ConstantPreferences::default().derive("u1", &[]);
        assert_eq!(prefs.efficiency, 0.3);
        assert_eq!(prefs.safety, 0.3);
        assert_eq!(prefs.cost, 0.2);
        assert_eq!(prefs.convenience, 0.2);
    }

    #[test]
    fn test_recommendation_score() {
        let prefs = ConstantPreferences::default().0;
        // 80*.3 + 90*.3 + (100-70)*.2 + 60*.2 = 24 + 27 + 6 + 12
        let score = recommendation_score(&factors(80.0, 90.0, 60.0, 70.0), &prefs);
        assert!((score - 69.0).abs() < 1e-9);
    }

    #[test]
    fn test_reason_priority() {
        assert_eq!(reason(&factors(90.0, 90.0, 50.0, 20.0)), "high safety rating");
        assert_eq!(reason(&factors(90.0, 80.0, 50.0, 20.0)), "very reliable service");
        assert_eq!(reason(&factors(50.0, 80.0, 50.0, 20.0)), "great value for money");
        assert_eq!(reason(&factors(50.0, 80.0, 50.0, 70.0)), "good overall performance");
    }

    #[test]
    fn test_recommendation_type_picks_largest() {
        assert_eq!(
            recommendation_type(&factors(50.0, 80.0, 70.0, 100.0)),
            RecommendationType::Safety
        );
        assert_eq!(
            recommendation_type(&factors(50.0, 80.0, 70.0, 0.0)),
            RecommendationType::Cost
        );
        assert_eq!(
            recommendation_type(&factors(70.0, 70.0, 70.0, 30.0)),
            RecommendationType::Reliability
        );
    }
}
