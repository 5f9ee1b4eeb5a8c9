//! Repository and session error type.
//!
//! SQLite failures are classified by result code so callers can match on
//! constraint and lock conflicts without inspecting engine messages.

use crate::db::DbError;
use crate::model::ModelError;
use rusqlite::ErrorCode;
use thiserror::Error;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Validation(#[from] ModelError),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },
    /// Uniqueness, foreign-key or not-null conflict reported by the engine.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    /// The engine could not obtain a lock within its busy timeout.
    #[error("lock not acquired: {0}")]
    LockTimeout(String),
    #[error("native query failed: {message} (sql: {sql})")]
    MalformedNativeQuery { sql: String, message: String },
    #[error("no query registered under `{0}`")]
    UnknownNamedQuery(String),
    #[error("query `{query}` expects {expected} argument(s), got {actual}")]
    ArgumentMismatch {
        query: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("query `{query}` argument {index} must be a {expected}")]
    ArgumentType {
        query: &'static str,
        index: usize,
        expected: &'static str,
    },
    #[error("query `{query}` expected at most one result, got {count}")]
    NonUniqueResult { query: &'static str, count: usize },
    #[error("cannot sort by unknown property `{0}`")]
    InvalidSort(String),
    #[error("invalid page request: {0}")]
    InvalidPageRequest(String),
    #[error("{0} has no identifier; save it first")]
    Transient(&'static str),
    #[error("{entity} {id} is already persisted; use merge")]
    AlreadyPersisted { entity: &'static str, id: i64 },
    #[error("managed {entity} {expected} had its identifier replaced (now {actual:?})")]
    IdentifierChanged {
        entity: &'static str,
        expected: i64,
        actual: Option<i64>,
    },
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

impl RepoError {
    /// Wraps an engine error raised while running caller-supplied SQL.
    pub(crate) fn native(sql: &str, err: rusqlite::Error) -> Self {
        match classify(err) {
            Self::Db(DbError::Sqlite(err)) => Self::MalformedNativeQuery {
                sql: sql.to_string(),
                message: err.to_string(),
            },
            classified => classified,
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        classify(value)
    }
}

fn classify(err: rusqlite::Error) -> RepoError {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => RepoError::ConstraintViolation(err.to_string()),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            RepoError::LockTimeout(err.to_string())
        }
        _ => RepoError::Db(DbError::Sqlite(err)),
    }
}
