use thiserror::Error;

/// Errors surfaced by the orchestration engine.
#[derive(Debug, Error)]
pub enum LegionError {
    #[error("no usable credential for {minion}")]
    CredentialUnavailable { minion: String },

    #[error("model invocation failed: {0}")]
    ModelInvocation(String),

    #[error("could not parse decision: {0}")]
    DecisionParse(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("storage error: {0}")]
    Storage(String),

    /// The task running a batch ended without reporting (runtime shutdown).
    #[error("batch interrupted: {0}")]
    Interrupted(String),
}

impl LegionError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LegionError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        LegionError::Validation(message.into())
    }
}

/// Errors from repository operations (used by trait definitions in legion-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,
}
