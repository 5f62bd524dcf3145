//! Single entry point wiring every component to one set of collaborators.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::analytics::types::{
    AlternativeFilter, AlternativeRoute, DemandForecast, EfficiencyScore, TravelContext,
    TravelTimePrediction, TrendAnalysis, TrendPeriod, UserRecommendation,
};
use crate::analytics::{
    AlternativeRouteFinder, ConstantPreferences, DemandForecaster, EfficiencyAnalyzer,
    PreferenceStrategy, RecommendationEngine, TravelTimePredictor, TrendAnalyzer,
};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{AnalyticsError, Result};
use crate::models::ScoreRecord;
use crate::scheduler::Scheduler;
use crate::scoring::ScoreAggregator;
use crate::store::{ReportSource, RouteSource, ScoreStore};

/// The external services an [`Engine`] reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub reports: Arc<dyn ReportSource>,
    pub routes: Arc<dyn RouteSource>,
    pub scores: Arc<dyn ScoreStore>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Uses one store for all three roles and the system clock.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: ReportSource + RouteSource + ScoreStore + 'static,
    {
        Self {
            reports: store.clone(),
            routes: store.clone(),
            scores: store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

#[derive(Clone)]
pub struct Engine {
    aggregator: ScoreAggregator,
    scheduler: Arc<Scheduler>,
    efficiency: EfficiencyAnalyzer,
    predictor: TravelTimePredictor,
    alternatives: AlternativeRouteFinder,
    trend: TrendAnalyzer,
    demand: DemandForecaster,
    recommendations: RecommendationEngine,
}

impl Engine {
    pub fn new(collaborators: Collaborators, config: &EngineConfig) -> Self {
        Self::with_preferences(collaborators, config, Arc::new(ConstantPreferences::default()))
    }

    pub fn with_preferences(
        c: Collaborators,
        config: &EngineConfig,
        preferences: Arc<dyn PreferenceStrategy>,
    ) -> Self {
        let aggregator = ScoreAggregator::new(
            c.reports.clone(),
            c.routes.clone(),
            c.scores.clone(),
            c.clock.clone(),
        );
        let efficiency = EfficiencyAnalyzer::new(c.reports.clone(), c.routes.clone(), c.clock.clone());
        let predictor = TravelTimePredictor::new(c.reports.clone(), c.routes.clone(), c.clock.clone());

        Self {
            alternatives: AlternativeRouteFinder::new(
                c.routes.clone(),
                predictor.clone(),
                efficiency.clone(),
                config.concurrency,
            ),
            trend: TrendAnalyzer::new(
                c.reports.clone(),
                c.routes.clone(),
                efficiency.clone(),
                c.clock.clone(),
                config.previous_efficiency,
            ),
            demand: DemandForecaster::new(c.reports.clone(), c.routes.clone(), c.clock.clone()),
            recommendations: RecommendationEngine::new(
                c.reports.clone(),
                c.routes.clone(),
                efficiency.clone(),
                preferences,
                c.clock.clone(),
                config.recommendation_limit,
                config.concurrency,
            ),
            scheduler: Arc::new(Scheduler::new(aggregator.clone())),
            aggregator,
            efficiency,
            predictor,
        }
    }

    /// The engine's scheduler. Every clone of the engine shares it, and with
    /// it the running flag.
    pub fn scheduler(&self) -> Arc<Scheduler> {
        self.scheduler.clone()
    }

    pub async fn compute_score(&self, route_id: &str) -> Result<ScoreRecord> {
        self.aggregator.compute_score(route_id).await
    }

    /// Runs a batch pass now. Fails with `PassInProgress` while a
    /// scheduled pass is running.
    pub async fn recompute_all_scores(&self) -> Result<Vec<ScoreRecord>> {
        self.scheduler.recompute().await
    }

    /// The persisted score, or NotFound if the route was never scored.
    pub async fn get_score(&self, route_id: &str) -> Result<ScoreRecord> {
        self.aggregator
            .get_score(route_id)
            .await?
            .ok_or_else(|| AnalyticsError::NotFound {
                entity: "score",
                id: route_id.to_string(),
            })
    }

    pub async fn list_scores(&self) -> Result<Vec<ScoreRecord>> {
        self.aggregator.list_scores().await
    }

    pub async fn get_efficiency(&self, route_id: &str) -> Result<EfficiencyScore> {
        self.efficiency.get_efficiency(route_id).await
    }

    pub async fn predict_travel_time(
        &self,
        route_id: &str,
        from_stop: &str,
        to_stop: &str,
        ctx: TravelContext,
    ) -> Result<TravelTimePrediction> {
        self.predictor.predict(route_id, from_stop, to_stop, ctx).await
    }

    pub async fn find_alternatives(
        &self,
        from_stop: &str,
        to_stop: &str,
        filter: AlternativeFilter,
    ) -> Result<Vec<AlternativeRoute>> {
        self.alternatives.find(from_stop, to_stop, filter).await
    }

    pub async fn analyze_trend(&self, route_id: &str, period: TrendPeriod) -> Result<TrendAnalysis> {
        self.trend.analyze(route_id, period).await
    }

    pub async fn forecast_demand(
        &self,
        route_id: &str,
        time_slot: DateTime<Utc>,
    ) -> Result<DemandForecast> {
        self.demand.forecast(route_id, time_slot).await
    }

    pub async fn recommend(&self, user_id: &str, limit: Option<usize>) -> Result<UserRecommendation> {
        self.recommendations.recommend(user_id, limit).await
    }
}
