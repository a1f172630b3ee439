use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("Invalid life event '{name}': {reason}")]
    InvalidLifeEvent { name: String, reason: String },

    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("Invalid solver config: {0}")]
    InvalidSolverConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ProjectionResult<T> = Result<T, ProjectionError>;
