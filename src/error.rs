//! Error types for scheduling and aggregation.
//!
//! Only [`SchedError::ConcurrencyConflict`] is ever retried by the service;
//! everything else is surfaced to the caller unchanged.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SchedError>;

/// Which kind of entity a [`SchedError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Concept,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::User => "user",
            Entity::Concept => "concept",
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum SchedError {
    /// Caller supplied a value outside the accepted domain. Nothing was written.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The referenced user or concept does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: i64 },

    /// A record changed between load and save.
    #[error("concurrent update detected on {0}")]
    ConcurrencyConflict(String),

    /// The backing store failed or is unavailable.
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("configuration error: {0}")]
    Config(String),
}

impl SchedError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        SchedError::InvalidInput(msg.into())
    }

    pub fn not_found(entity: Entity, id: i64) -> Self {
        SchedError::NotFound { entity, id }
    }

    /// Returns `true` if redoing the whole read-modify-write cycle may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SchedError::ConcurrencyConflict(_))
    }
}
