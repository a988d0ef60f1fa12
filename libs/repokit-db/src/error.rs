//! Store-level error type.

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Errors surfaced by the record store, pager and projection mapper.
///
/// Build-time query errors from `repokit_query` are folded into
/// [`StoreError::InvalidField`] and [`StoreError::InvalidArgument`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown field: {0}")]
    InvalidField(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error(transparent)]
    Backend(DbErr),
}

impl StoreError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<DbErr> for StoreError {
    fn from(e: DbErr) -> Self {
        match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg)) => {
                return Self::Conflict(format!("unique constraint violated: {msg}"));
            }
            Some(SqlErr::ForeignKeyConstraintViolation(msg)) => {
                return Self::Conflict(format!("foreign key constraint violated: {msg}"));
            }
            _ => {}
        }
        match e {
            DbErr::ConnectionAcquire(err) => Self::StoreUnavailable(err.to_string()),
            DbErr::Conn(err) => Self::StoreUnavailable(err.to_string()),
            DbErr::RecordNotFound(what) => Self::NotFound(what),
            other => Self::Backend(other),
        }
    }
}

impl From<repokit_query::Error> for StoreError {
    fn from(e: repokit_query::Error) -> Self {
        use repokit_query::Error as Q;
        match e {
            Q::InvalidField(name) => Self::InvalidField(name),
            Q::InvalidArgument(msg) => Self::InvalidArgument(msg),
            other => Self::InvalidArgument(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_not_found_maps_to_not_found() {
        let err = StoreError::from(DbErr::RecordNotFound("member 7".to_owned()));
        assert!(err.is_not_found());
    }

    #[test]
    fn custom_errors_stay_backend() {
        let err = StoreError::from(DbErr::Custom("boom".to_owned()));
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn query_errors_keep_their_kind() {
        assert!(matches!(
            StoreError::from(repokit_query::Error::InvalidField("nope".to_owned())),
            StoreError::InvalidField(name) if name == "nope"
        ));
        assert!(matches!(
            StoreError::from(repokit_query::Error::InvalidLimit),
            StoreError::InvalidArgument(_)
        ));
        assert!(matches!(
            StoreError::from(repokit_query::Error::FilterMismatch),
            StoreError::InvalidArgument(_)
        ));
    }
}
