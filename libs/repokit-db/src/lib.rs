//! Record stores, query compilation and pagination over `SeaORM`.
//!
//! The crate turns a [`repokit_query::Query`] into `SeaORM` statements:
//! - [`query::FieldMap`] maps API field names (including `relation.field`
//!   paths) onto columns; [`query::QueryPlan`] compiles filters, orders and
//!   the joins they need
//! - [`pager::Pager`] runs offset pages with totals and keyset pages
//! - [`store::RecordStore`] is the per-record CRUD surface with optimistic
//!   versioned writes
//! - [`bulk::bulk_update`] issues one `UPDATE ... WHERE` for a predicate
//! - [`projection::ProjectionMapper`] shapes rows into closed projections with
//!   an explicit round-trip contract
//!
//! Every operation takes the connection from the caller (`&DatabaseConnection`
//! or `&DatabaseTransaction`); transaction boundaries belong to services, see
//! [`tx::in_transaction`].
//!
//! # Example
//! ```rust,no_run
//! use repokit_db::{DbHandle, config::DbConfig};
//!
//! # async fn demo() -> repokit_db::StoreResult<()> {
//! let db = DbHandle::connect(&DbConfig::with_dsn("sqlite::memory:")).await?;
//! db.ping().await?;
//! # Ok(())
//! # }
//! ```

pub use sea_orm::ConnectionTrait as DbConnTrait;

pub mod bulk;
pub mod config;
pub mod error;
pub mod lock;
pub mod pager;
pub mod projection;
pub mod query;
pub mod store;
pub mod tx;

pub use bulk::{Mutation, MutationOp, bulk_update};
pub use config::{DbConfig, MissingDeletePolicy, RepoConfig, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use lock::{LockExt, LockMode};
pub use pager::{LimitCfg, Pager};
pub use projection::{
    FetchPlan, FetchStrategy, Projected, ProjectedPage, Projection, ProjectionMapper,
    ProjectionShape, RoundTrips,
};
pub use store::{RecordMapping, RecordStore, SeaRecordStore};
pub use tx::{InfraError, TxAccessMode, TxConfig, TxError, TxIsolationLevel, in_transaction};

use std::future::Future;
use std::pin::Pin;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DatabaseTransaction};
use tracing::{debug, info};

/// Supported engines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbEngine {
    Postgres,
    MySql,
    Sqlite,
}

fn is_memory_dsn(dsn: &str) -> bool {
    dsn.contains(":memory:") || dsn.contains("mode=memory")
}

/// Main handle: the engine and one pooled `SeaORM` connection.
#[derive(Debug, Clone)]
pub struct DbHandle {
    engine: DbEngine,
    conn: DatabaseConnection,
}

impl DbHandle {
    /// Detect engine by DSN scheme.
    ///
    /// # Errors
    /// `InvalidArgument` if the scheme is not recognized.
    pub fn detect(dsn: &str) -> StoreResult<DbEngine> {
        let s = dsn.trim_start();
        if s.starts_with("postgres://") || s.starts_with("postgresql://") {
            Ok(DbEngine::Postgres)
        } else if s.starts_with("mysql://") {
            Ok(DbEngine::MySql)
        } else if s.starts_with("sqlite:") {
            Ok(DbEngine::Sqlite)
        } else {
            Err(StoreError::invalid_argument(format!("unknown DSN scheme: {dsn}")))
        }
    }

    /// Connect and build handle.
    ///
    /// An in-memory `SQLite` DSN is pinned to a single connection; every
    /// pooled connection would otherwise see its own empty database.
    ///
    /// # Errors
    /// `InvalidArgument` for an unknown DSN, `StoreUnavailable` when the pool
    /// cannot connect.
    pub async fn connect(cfg: &DbConfig) -> StoreResult<Self> {
        let engine = Self::detect(&cfg.dsn)?;

        let mut opts = ConnectOptions::new(cfg.dsn.clone());
        let max_conns = if engine == DbEngine::Sqlite && is_memory_dsn(&cfg.dsn) {
            1
        } else {
            cfg.max_conns
        };
        opts.max_connections(max_conns)
            .acquire_timeout(cfg.acquire_timeout)
            .sqlx_logging(cfg.sqlx_logging);
        if let Some(min) = cfg.min_conns {
            opts.min_connections(min.min(max_conns));
        }

        let conn = Database::connect(opts).await?;
        info!(engine = ?engine, max_conns, "database connected");
        Ok(Self { engine, conn })
    }

    /// Wrap an already open connection.
    ///
    /// # Errors
    /// `InvalidArgument` when the backend is not one of the supported engines.
    pub fn from_connection(conn: DatabaseConnection) -> StoreResult<Self> {
        let engine = match conn.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => DbEngine::Postgres,
            sea_orm::DatabaseBackend::MySql => DbEngine::MySql,
            sea_orm::DatabaseBackend::Sqlite => DbEngine::Sqlite,
            #[allow(unreachable_patterns)]
            _ => return Err(StoreError::invalid_argument("unsupported database backend")),
        };
        Ok(Self { engine, conn })
    }

    #[must_use]
    pub fn engine(&self) -> DbEngine {
        self.engine
    }

    #[must_use]
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// # Errors
    /// `StoreUnavailable` when the database does not answer.
    pub async fn ping(&self) -> StoreResult<()> {
        self.conn.ping().await?;
        debug!(engine = ?self.engine, "ping ok");
        Ok(())
    }

    /// Run `f` in a transaction on this handle's connection.
    ///
    /// # Errors
    /// See [`tx::in_transaction`].
    pub async fn transaction<T, E, F>(&self, cfg: TxConfig, f: F) -> Result<T, TxError<E>>
    where
        T: Send,
        E: Send,
        F: for<'c> FnOnce(
                &'c DatabaseTransaction,
            ) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>
            + Send,
    {
        in_transaction(&self.conn, cfg, f).await
    }

    /// Close the pool.
    ///
    /// # Errors
    /// Backend error from the driver.
    pub async fn close(self) -> StoreResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}
