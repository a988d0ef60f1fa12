//! Per-record persistence.
//!
//! A [`RecordMapping`] ties a domain record to a `SeaORM` entity; the generic
//! [`SeaRecordStore`] then provides [`RecordStore`] for it. Stores never open
//! transactions: every call runs on the connection handed in.

use std::marker::PhantomData;

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, Select,
};
use tracing::{debug, instrument};

use crate::config::{MissingDeletePolicy, StoreConfig};
use crate::error::{StoreError, StoreResult};

pub type EntityOf<M> = <M as RecordMapping>::Entity;
pub type ModelOf<M> = <EntityOf<M> as EntityTrait>::Model;
pub type ActiveOf<M> = <EntityOf<M> as EntityTrait>::ActiveModel;
pub type ColumnOf<M> = <EntityOf<M> as EntityTrait>::Column;

/// Mapping between a domain record and its table.
///
/// `into_active_model` must leave the id `NotSet` for records without an id
/// and set every other column it owns.
pub trait RecordMapping: Send + Sync + 'static {
    type Entity: EntityTrait;
    type Record: Send + Sync + 'static;

    /// Name used in `NotFound` / `Conflict` messages.
    const NAME: &'static str;

    fn id_column() -> ColumnOf<Self>;

    /// Optimistic lock counter, if the table has one.
    fn version_column() -> Option<ColumnOf<Self>> {
        None
    }

    fn record_id(record: &Self::Record) -> Option<i64>;

    fn record_version(_record: &Self::Record) -> Option<i64> {
        None
    }

    fn from_model(model: ModelOf<Self>) -> Self::Record;

    fn into_active_model(record: Self::Record) -> ActiveOf<Self>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    type Record: Send + Sync;

    /// Insert when the record has no id, otherwise overwrite the row with that
    /// id (inserting it when absent). Returns the stored record.
    async fn save<C: ConnectionTrait + Send + Sync>(
        &self,
        conn: &C,
        record: Self::Record,
    ) -> StoreResult<Self::Record>;

    async fn find_by_id<C: ConnectionTrait + Send + Sync>(
        &self,
        conn: &C,
        id: i64,
    ) -> StoreResult<Option<Self::Record>>;

    /// Like [`RecordStore::find_by_id`] but a missing row is `NotFound`.
    async fn get<C: ConnectionTrait + Send + Sync>(
        &self,
        conn: &C,
        id: i64,
    ) -> StoreResult<Self::Record> {
        self.find_by_id(conn, id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("record {id}")))
    }

    /// Every record, ordered by id.
    async fn find_all<C: ConnectionTrait + Send + Sync>(
        &self,
        conn: &C,
    ) -> StoreResult<Vec<Self::Record>>;

    /// Remove the row with `id`. Returns whether a row was deleted; a missing
    /// id is handled per [`MissingDeletePolicy`].
    async fn delete<C: ConnectionTrait + Send + Sync>(&self, conn: &C, id: i64) -> StoreResult<bool>;

    async fn count<C: ConnectionTrait + Send + Sync>(&self, conn: &C) -> StoreResult<u64>;

    async fn exists<C: ConnectionTrait + Send + Sync>(&self, conn: &C, id: i64) -> StoreResult<bool>;

    /// Write the record only if its version still matches the stored one,
    /// bumping the version by one. Returns the reloaded record.
    ///
    /// # Errors
    /// `Conflict` when the row moved on, `NotFound` when it is gone,
    /// `InvalidArgument` when the record has no id or version.
    async fn update_versioned<C: ConnectionTrait + Send + Sync>(
        &self,
        conn: &C,
        record: Self::Record,
    ) -> StoreResult<Self::Record>;
}

/// [`RecordStore`] over any `SeaORM` entity.
pub struct SeaRecordStore<M: RecordMapping> {
    missing_delete: MissingDeletePolicy,
    _mapping: PhantomData<fn() -> M>,
}

impl<M: RecordMapping> Default for SeaRecordStore<M> {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

impl<M: RecordMapping> Clone for SeaRecordStore<M> {
    fn clone(&self) -> Self {
        Self {
            missing_delete: self.missing_delete,
            _mapping: PhantomData,
        }
    }
}

impl<M: RecordMapping> SeaRecordStore<M> {
    #[must_use]
    pub fn new(cfg: &StoreConfig) -> Self {
        Self {
            missing_delete: cfg.missing_delete,
            _mapping: PhantomData,
        }
    }

    #[must_use]
    pub fn select() -> Select<EntityOf<M>> {
        EntityOf::<M>::find()
    }

    fn by_id(id: i64) -> Select<EntityOf<M>> {
        Self::select().filter(M::id_column().eq(id))
    }
}

#[async_trait]
impl<M> RecordStore for SeaRecordStore<M>
where
    M: RecordMapping,
    ModelOf<M>: IntoActiveModel<ActiveOf<M>> + Send + Sync,
    ActiveOf<M>: ActiveModelTrait<Entity = EntityOf<M>> + ActiveModelBehavior + Send + Sync,
{
    type Record = M::Record;

    #[instrument(name = "store.save", skip_all, fields(record = M::NAME, db.operation = "INSERT/UPDATE"))]
    async fn save<C: ConnectionTrait + Send + Sync>(
        &self,
        conn: &C,
        record: Self::Record,
    ) -> StoreResult<Self::Record> {
        let id = M::record_id(&record);
        let am = M::into_active_model(record);
        let model = match id {
            Some(id) if self.exists(conn, id).await? => am.update(conn).await?,
            _ => am.insert(conn).await?,
        };
        Ok(M::from_model(model))
    }

    async fn find_by_id<C: ConnectionTrait + Send + Sync>(
        &self,
        conn: &C,
        id: i64,
    ) -> StoreResult<Option<Self::Record>> {
        Ok(Self::by_id(id).one(conn).await?.map(M::from_model))
    }

    async fn find_all<C: ConnectionTrait + Send + Sync>(
        &self,
        conn: &C,
    ) -> StoreResult<Vec<Self::Record>> {
        let rows = Self::select()
            .order_by_asc(M::id_column())
            .all(conn)
            .await?;
        Ok(rows.into_iter().map(M::from_model).collect())
    }

    #[instrument(name = "store.delete", skip(self, conn), fields(record = M::NAME, db.operation = "DELETE"))]
    async fn delete<C: ConnectionTrait + Send + Sync>(&self, conn: &C, id: i64) -> StoreResult<bool> {
        let res = EntityOf::<M>::delete_many()
            .filter(M::id_column().eq(id))
            .exec(conn)
            .await?;
        if res.rows_affected > 0 {
            return Ok(true);
        }
        match self.missing_delete {
            MissingDeletePolicy::Ignore => {
                debug!("delete of missing id ignored");
                Ok(false)
            }
            MissingDeletePolicy::NotFound => {
                Err(StoreError::not_found(format!("{} {id}", M::NAME)))
            }
        }
    }

    async fn count<C: ConnectionTrait + Send + Sync>(&self, conn: &C) -> StoreResult<u64> {
        Ok(Self::select().count(conn).await?)
    }

    async fn exists<C: ConnectionTrait + Send + Sync>(&self, conn: &C, id: i64) -> StoreResult<bool> {
        Ok(Self::by_id(id).count(conn).await? > 0)
    }

    #[instrument(name = "store.update_versioned", skip_all, fields(record = M::NAME, db.operation = "UPDATE"))]
    async fn update_versioned<C: ConnectionTrait + Send + Sync>(
        &self,
        conn: &C,
        record: Self::Record,
    ) -> StoreResult<Self::Record> {
        let version_col = M::version_column().ok_or_else(|| {
            StoreError::invalid_argument(format!("{} has no version column", M::NAME))
        })?;
        let id = M::record_id(&record)
            .ok_or_else(|| StoreError::invalid_argument("versioned update needs a persisted record"))?;
        let expected = M::record_version(&record)
            .ok_or_else(|| StoreError::invalid_argument("versioned update needs a version"))?;

        let mut am = M::into_active_model(record);
        am.not_set(M::id_column());
        am.not_set(version_col);

        let res = EntityOf::<M>::update_many()
            .set(am)
            .col_expr(version_col, Expr::col(version_col).add(1))
            .filter(M::id_column().eq(id))
            .filter(version_col.eq(expected))
            .exec(conn)
            .await?;

        if res.rows_affected == 0 {
            return if self.exists(conn, id).await? {
                debug!(id, expected, "stale version");
                Err(StoreError::conflict(format!(
                    "{} {id} was modified concurrently (expected version {expected})",
                    M::NAME
                )))
            } else {
                Err(StoreError::not_found(format!("{} {id}", M::NAME)))
            };
        }

        self.get(conn, id).await
    }
}
