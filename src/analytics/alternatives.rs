use futures::stream::{self, StreamExt as _, TryStreamExt as _};
use std::sync::Arc;
use tracing::info;

use crate::analytics::efficiency::EfficiencyAnalyzer;
use crate::analytics::travel_time::TravelTimePredictor;
use crate::analytics::types::{AlternativeFilter, AlternativeRoute, TravelContext};
use crate::error::Result;
use crate::models::Route;
use crate::store::RouteSource;

/// Whether `route` serves `from_stop` strictly before `to_stop`.
pub fn serves_in_order(route: &Route, from_stop: &str, to_stop: &str) -> bool {
    match (route.stop_index(from_stop), route.stop_index(to_stop)) {
        (Some(from), Some(to)) => from < to,
        _ => false,
    }
}

pub fn reasons(efficiency_score: f64, travel_time: u32, fare: f64, stop_count: usize) -> Vec<String> {
    let rules: [(bool, &str); 4] = [
        (efficiency_score > 80.0, "highly efficient"),
        (travel_time < 20, "fast travel time"),
        (fare < 40.0, "affordable fare"),
        (stop_count > 5, "multiple stops available"),
    ];

    rules
        .into_iter()
        .filter(|(fires, _)| *fires)
        .map(|(_, text)| text.to_string())
        .collect()
}

/// Orders candidates best first: efficiency, then travel time, then id.
pub fn sort_alternatives(candidates: &mut [AlternativeRoute]) {
    candidates.sort_by(|a, b| {
        b.efficiency_score
            .total_cmp(&a.efficiency_score)
            .then(a.travel_time.cmp(&b.travel_time))
            .then_with(|| a.route_id.cmp(&b.route_id))
    });
}

/// Ranks every active route connecting two stops.
#[derive(Clone)]
pub struct AlternativeRouteFinder {
    routes: Arc<dyn RouteSource>,
    predictor: TravelTimePredictor,
    efficiency: EfficiencyAnalyzer,
    concurrency: usize,
}

impl AlternativeRouteFinder {
    pub fn new(
        routes: Arc<dyn RouteSource>,
        predictor: TravelTimePredictor,
        efficiency: EfficiencyAnalyzer,
        concurrency: usize,
    ) -> Self {
        Self {
            routes,
            predictor,
            efficiency,
            concurrency: concurrency.max(1),
        }
    }

    #[tracing::instrument(skip(self, filter))]
    pub async fn find(
        &self,
        from_stop: &str,
        to_stop: &str,
        filter: AlternativeFilter,
    ) -> Result<Vec<AlternativeRoute>> {
        let candidates: Vec<Route> = self
            .routes
            .list_active_routes()
            .await?
            .into_iter()
            .filter(|r| serves_in_order(r, from_stop, to_stop))
            .collect();
        let candidate_count = candidates.len();

        let evaluated: Vec<Option<AlternativeRoute>> = stream::iter(candidates)
            .map(|route| self.evaluate(route, from_stop, to_stop, filter))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let mut alternatives: Vec<AlternativeRoute> = evaluated.into_iter().flatten().collect();
        sort_alternatives(&mut alternatives);

        info!(
            candidates = candidate_count,
            returned = alternatives.len(),
            "Alternative routes ranked"
        );
        Ok(alternatives)
    }

    /// Returns `None` when the route exceeds a filter limit.
    async fn evaluate(
        &self,
        route: Route,
        from_stop: &str,
        to_stop: &str,
        filter: AlternativeFilter,
    ) -> Result<Option<AlternativeRoute>> {
        let prediction = self
            .predictor
            .predict_for_route(&route, from_stop, to_stop, TravelContext::default())
            .await?;
        let travel_time = prediction.predicted_time;

        if filter.max_time.is_some_and(|max| travel_time > max)
            || filter.max_cost.is_some_and(|max| route.fare > max)
        {
            return Ok(None);
        }

        let efficiency = self.efficiency.evaluate(&route).await?;
        let stop_count = route.stops.len();

        Ok(Some(AlternativeRoute {
            reasons: reasons(efficiency.efficiency_score, travel_time, route.fare, stop_count),
            route_id: route.id,
            route_name: route.name,
            travel_time,
            fare: route.fare,
            efficiency_score: efficiency.efficiency_score,
            stop_count,
        }))
    }
}
