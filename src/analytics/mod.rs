//! On-demand route analytics.
//!
//! Each analyzer pulls fresh report and route data through the collaborator
//! traits and returns an ephemeral result. Nothing here is persisted and no
//! analyzer holds mutable state, so they are freely cloned and shared.

pub mod alternatives;
pub mod demand;
pub mod efficiency;
pub mod recommend;
pub mod travel_time;
pub mod trend;
pub mod types;
pub mod utility;

pub use alternatives::AlternativeRouteFinder;
pub use demand::DemandForecaster;
pub use efficiency::EfficiencyAnalyzer;
pub use recommend::{ConstantPreferences, PreferenceStrategy, RecommendationEngine};
pub use travel_time::TravelTimePredictor;
pub use trend::TrendAnalyzer;
