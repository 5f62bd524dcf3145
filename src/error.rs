use thiserror::Error;

/// Errors surfaced by the scoring and analytics operations.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A route or other required entity does not exist.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// Caller input could not be interpreted.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A batch recomputation already holds the running flag.
    #[error("score recomputation already running")]
    PassInProgress,

    /// Any other failure, typically from a collaborator.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AnalyticsError {
    pub fn route_not_found(id: &str) -> Self {
        AnalyticsError::NotFound {
            entity: "route",
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AnalyticsError::NotFound { .. })
    }
}

pub type Result<T, E = AnalyticsError> = std::result::Result<T, E>;
