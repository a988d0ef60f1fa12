//! Caller-owned transactions.
//!
//! Stores never begin or commit on their own; services open a transaction
//! with [`in_transaction`] and hand the `&DatabaseTransaction` to every store
//! call that must share it.

use std::future::Future;
use std::pin::Pin;

use sea_orm::{
    AccessMode, DatabaseConnection, DatabaseTransaction, DbErr, IsolationLevel, TransactionTrait,
};
use thiserror::Error;

use crate::error::StoreError;

/// Isolation level requested for a transaction.
///
/// `SQLite` always runs serializable; other levels are accepted and ignored
/// there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxIsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxAccessMode {
    ReadOnly,
    #[default]
    ReadWrite,
}

/// Transaction settings. `None` keeps the database default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxConfig {
    pub isolation: Option<TxIsolationLevel>,
    pub access_mode: Option<TxAccessMode>,
}

impl TxConfig {
    #[must_use]
    pub fn with_isolation(isolation: TxIsolationLevel) -> Self {
        Self {
            isolation: Some(isolation),
            access_mode: None,
        }
    }

    #[must_use]
    pub fn read_only() -> Self {
        Self {
            isolation: None,
            access_mode: Some(TxAccessMode::ReadOnly),
        }
    }

    #[must_use]
    pub fn serializable() -> Self {
        Self::with_isolation(TxIsolationLevel::Serializable)
    }
}

impl From<TxIsolationLevel> for IsolationLevel {
    fn from(level: TxIsolationLevel) -> Self {
        match level {
            TxIsolationLevel::ReadUncommitted => IsolationLevel::ReadUncommitted,
            TxIsolationLevel::ReadCommitted => IsolationLevel::ReadCommitted,
            TxIsolationLevel::RepeatableRead => IsolationLevel::RepeatableRead,
            TxIsolationLevel::Serializable => IsolationLevel::Serializable,
        }
    }
}

impl From<TxAccessMode> for AccessMode {
    fn from(mode: TxAccessMode) -> Self {
        match mode {
            TxAccessMode::ReadOnly => AccessMode::ReadOnly,
            TxAccessMode::ReadWrite => AccessMode::ReadWrite,
        }
    }
}

/// Transaction control failed; the closure's own error is not involved.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("begin failed: {0}")]
    Begin(#[source] DbErr),

    #[error("commit failed: {0}")]
    Commit(#[source] DbErr),
}

/// Keeps the driver's classification: a dropped connection stays
/// `StoreUnavailable`, a failed commit on a live one becomes `Backend`.
impl From<InfraError> for StoreError {
    fn from(e: InfraError) -> Self {
        match e {
            InfraError::Begin(db) | InfraError::Commit(db) => StoreError::from(db),
        }
    }
}

/// Result error of [`in_transaction`].
#[derive(Debug, Error)]
pub enum TxError<E> {
    #[error(transparent)]
    Domain(E),

    #[error("transaction control: {0}")]
    Infra(#[source] InfraError),
}

/// Run `f` inside one transaction: commit on `Ok`, roll back on `Err`.
///
/// ```ignore
/// let saved = in_transaction(db.conn(), TxConfig::default(), |tx| {
///     Box::pin(async move {
///         let team = teams.save(tx, team).await?;
///         members.save(tx, member.with_team(team.id)).await
///     })
/// })
/// .await
/// .map_err(DomainError::from)?;
/// ```
///
/// # Errors
/// `TxError::Domain` with the closure's error (after rollback), or
/// `TxError::Infra` when begin or commit fails.
pub async fn in_transaction<T, E, F>(
    db: &DatabaseConnection,
    cfg: TxConfig,
    f: F,
) -> Result<T, TxError<E>>
where
    T: Send,
    E: Send,
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>
        + Send,
{
    let txn = db
        .begin_with_config(
            cfg.isolation.map(Into::into),
            cfg.access_mode.map(Into::into),
        )
        .await
        .map_err(|e| TxError::Infra(InfraError::Begin(e)))?;

    let res = f(&txn).await;

    match res {
        Ok(v) => {
            txn.commit()
                .await
                .map_err(|e| TxError::Infra(InfraError::Commit(e)))?;
            Ok(v)
        }
        Err(e) => {
            if let Err(rb) = txn.rollback().await {
                tracing::warn!(error = %rb, "transaction rollback failed");
            }
            Err(TxError::Domain(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::RuntimeErr;

    #[test]
    fn presets() {
        assert_eq!(TxConfig::default().isolation, None);
        assert_eq!(
            TxConfig::serializable().isolation,
            Some(TxIsolationLevel::Serializable)
        );
        assert_eq!(
            TxConfig::read_only().access_mode,
            Some(TxAccessMode::ReadOnly)
        );
    }

    #[test]
    fn conversions() {
        assert!(matches!(
            IsolationLevel::from(TxIsolationLevel::RepeatableRead),
            IsolationLevel::RepeatableRead
        ));
        assert!(matches!(
            AccessMode::from(TxAccessMode::ReadWrite),
            AccessMode::ReadWrite
        ));
    }

    #[test]
    fn infra_keeps_driver_classification() {
        let begin = InfraError::Begin(DbErr::Conn(RuntimeErr::Internal("closed".to_owned())));
        assert!(matches!(
            StoreError::from(begin),
            StoreError::StoreUnavailable(_)
        ));

        let commit = InfraError::Commit(DbErr::Custom("disk full".to_owned()));
        assert!(matches!(StoreError::from(commit), StoreError::Backend(_)));
    }

    #[test]
    fn domain_errors_display_unchanged() {
        let err: TxError<StoreError> = TxError::Domain(StoreError::conflict("stale"));
        assert_eq!(err.to_string(), "conflict: stale");

        let err: TxError<StoreError> =
            TxError::Infra(InfraError::Commit(DbErr::Custom("disk full".to_owned())));
        assert!(err.to_string().starts_with("transaction control: commit failed"));
    }
}
