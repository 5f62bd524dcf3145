pub mod analytics;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod output;
pub mod scheduler;
pub mod scoring;
pub mod store;

pub use engine::{Collaborators, Engine};
pub use error::{AnalyticsError, Result};
