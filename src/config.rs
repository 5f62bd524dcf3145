//! Engine configuration loaded from environment variables.

use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

/// Tunables for the scheduler and the analytics queries.
///
/// Every field has a default, so an empty environment yields a working
/// configuration:
///
/// | Variable                    | Default             |
/// |-----------------------------|---------------------|
/// | `SCORE_INTERVAL_SECS`       | 3600                |
/// | `ANALYTICS_CONCURRENCY`     | 5                   |
/// | `RECOMMENDATION_LIMIT`      | 5                   |
/// | `TREND_PREVIOUS_EFFICIENCY` | 75                  |
/// | `TRANSIT_DATA_PATH`         | `data/transit.json` |
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub score_interval: Duration,
    pub concurrency: usize,
    pub recommendation_limit: usize,
    pub previous_efficiency: f64,
    pub data_path: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            score_interval: Duration::from_secs(3600),
            concurrency: 5,
            recommendation_limit: 5,
            previous_efficiency: 75.0,
            data_path: "data/transit.json".to_string(),
        }
    }
}

impl EngineConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let interval_secs = parse_var(&lookup, "SCORE_INTERVAL_SECS")?
            .unwrap_or(defaults.score_interval.as_secs());
        let concurrency: usize =
            parse_var(&lookup, "ANALYTICS_CONCURRENCY")?.unwrap_or(defaults.concurrency);

        if interval_secs == 0 {
            anyhow::bail!("SCORE_INTERVAL_SECS must be greater than zero");
        }

        Ok(Self {
            score_interval: Duration::from_secs(interval_secs),
            concurrency: concurrency.max(1),
            recommendation_limit: parse_var(&lookup, "RECOMMENDATION_LIMIT")?
                .unwrap_or(defaults.recommendation_limit),
            previous_efficiency: parse_var(&lookup, "TREND_PREVIOUS_EFFICIENCY")?
                .unwrap_or(defaults.previous_efficiency),
            data_path: lookup("TRANSIT_DATA_PATH").unwrap_or(defaults.data_path),
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("invalid value '{raw}' for {key}"))
        })
        .transpose()
}
