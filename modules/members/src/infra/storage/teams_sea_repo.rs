use async_trait::async_trait;
use repokit_db::{DbConnTrait, RecordStore, SeaRecordStore, StoreConfig, StoreError};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tracing::{info, instrument};

use super::entity::member;
use super::mapper::TeamMapping;
use crate::domain::error::DomainError;
use crate::domain::model::{Team, TeamDeletePolicy};
use crate::domain::repos::TeamsRepository;

#[derive(Clone)]
pub struct SeaTeamsRepository {
    store: SeaRecordStore<TeamMapping>,
}

impl SeaTeamsRepository {
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            store: SeaRecordStore::new(config),
        }
    }
}

#[async_trait]
impl TeamsRepository for SeaTeamsRepository {
    #[instrument(skip(self, conn), fields(db.operation = "team.save"))]
    async fn save<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        team: Team,
    ) -> Result<Team, DomainError> {
        Ok(self.store.save(conn, team).await?)
    }

    async fn find_by_id<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        id: i64,
    ) -> Result<Option<Team>, DomainError> {
        Ok(self.store.find_by_id(conn, id).await?)
    }

    async fn find_all<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
    ) -> Result<Vec<Team>, DomainError> {
        Ok(self.store.find_all(conn).await?)
    }

    async fn count<C: DbConnTrait + Send + Sync>(&self, conn: &C) -> Result<u64, DomainError> {
        Ok(self.store.count(conn).await?)
    }

    #[instrument(skip(self, conn), fields(db.operation = "team.delete"))]
    async fn delete<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        id: i64,
        policy: TeamDeletePolicy,
    ) -> Result<bool, DomainError> {
        let referencing = member::Entity::find()
            .filter(member::Column::TeamId.eq(id))
            .count(conn)
            .await
            .map_err(StoreError::from)?;

        if referencing > 0 {
            match policy {
                TeamDeletePolicy::Restrict => {
                    return Err(DomainError::conflict(format!(
                        "team {id} is still referenced by {referencing} member(s)"
                    )));
                }
                TeamDeletePolicy::Detach => {
                    let detached = member::Entity::update_many()
                        .col_expr(member::Column::TeamId, Expr::value(sea_orm::Value::BigInt(None)))
                        .filter(member::Column::TeamId.eq(id))
                        .exec(conn)
                        .await
                        .map_err(StoreError::from)?
                        .rows_affected;
                    info!(team_id = id, detached, "members detached from team");
                }
            }
        }

        Ok(self.store.delete(conn, id).await?)
    }
}
