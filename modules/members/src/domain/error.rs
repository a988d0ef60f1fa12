use repokit_db::{StoreError, TxError};
use thiserror::Error;

/// Errors surfaced by the members repositories and service.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Expected at most one result, got {count}")]
    NonUniqueResult { count: usize },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error(transparent)]
    Store(StoreError),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound {
                entity: "record",
                id: what,
            },
            StoreError::Conflict(message) => Self::Conflict { message },
            StoreError::InvalidField(name) => Self::Validation {
                message: format!("unknown field '{name}'"),
            },
            StoreError::InvalidArgument(message) => Self::Validation { message },
            other => Self::Store(other),
        }
    }
}

impl From<repokit_query::Error> for DomainError {
    fn from(e: repokit_query::Error) -> Self {
        StoreError::from(e).into()
    }
}

impl From<TxError<DomainError>> for DomainError {
    fn from(e: TxError<DomainError>) -> Self {
        match e {
            TxError::Domain(domain) => domain,
            TxError::Infra(infra) => StoreError::from(infra).into(),
        }
    }
}
