use rusqlite::ErrorCode;
use shivalik_shared::{ContentError, ErrorKind, RelationshipError};
use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A referenced record does not exist. Carries the entity name.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Input rejected before touching the database.
    #[error("{0}")]
    Invalid(String),

    /// Unique-key clash (e.g. duplicate account name).
    #[error("{0}")]
    Conflict(String),

    /// Friend-request state machine refused the transition.
    #[error(transparent)]
    Relationship(#[from] RelationshipError),

    /// Post/comment content rejected.
    #[error(transparent)]
    Content(#[from] ContentError),

    /// Database busy or locked past the configured timeout.
    #[error("Store temporarily unavailable: {0}")]
    Transient(String),

    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// UUID parsing error.
    #[error("UUID error: {0}")]
    Uuid(#[from] uuid::Error),

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Invalid(_) => ErrorKind::Validation,
            StoreError::Conflict(_) => ErrorKind::Conflict,
            StoreError::Relationship(e) => e.kind(),
            StoreError::Content(e) => e.kind(),
            StoreError::Transient(_) => ErrorKind::Transient,
            StoreError::Sqlite(_)
            | StoreError::Io(_)
            | StoreError::Migration(_)
            | StoreError::Uuid(_)
            | StoreError::ChronoParse(_) => ErrorKind::Internal,
        }
    }

    /// `true` when the underlying SQLite error is a constraint violation.
    pub(crate) fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation
        )
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
            {
                StoreError::Transient(err.to_string())
            }
            _ => StoreError::Sqlite(err),
        }
    }
}

/// Map "no rows" to [`StoreError::NotFound`] for the given entity.
pub(crate) fn not_found(entity: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |e| match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(entity),
        other => StoreError::from(other),
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
