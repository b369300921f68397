use thiserror::Error;

/// Tagged error kinds surfaced by admin-facing operations.
///
/// The admission and reputation hot paths never return this type to their
/// caller — a store or provider failure there becomes a fail-open decision
/// or a fallback classification plus a log line (see `admission::pipeline`
/// and `reputation_engine::engine`). `EngineError` is for the admin CRUD
/// surface (key/ban/geo/manual-block operations) where a caller-malformed
/// request or a lookup miss must be reported immediately.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::InternalError(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
