use async_trait::async_trait;
use repokit_db::query::{FieldMap, QueryPlan};
use repokit_db::{
    DbConnTrait, LockExt, LockMode, Mutation, Pager, Projection, ProjectionMapper, RecordStore,
    SeaRecordStore, StoreConfig, StoreError, bulk_update,
};
use repokit_query::{
    CursorPage, Example, OrderBy, Page, PageRequest, Query, QueryBuilder, SortDir,
};
use sea_orm::{
    DbErr, EntityTrait, FromQueryResult, JsonValue, QueryOrder, QuerySelect, Statement,
};
use tracing::{debug, instrument};

use super::entity::{member, team};
use super::mapper::{MemberMapping, member_field_map};
use crate::domain::error::DomainError;
use crate::domain::fields::{MemberFields, MemberSchema};
use crate::domain::model::{Member, Team};
use crate::domain::projections::{MemberDto, MemberProjection};
use crate::domain::repos::{MemberCustomQueries, MembersRepository};

const NATIVE_COUNT_SQL: &str = "SELECT COUNT(*) AS total FROM member";
const NATIVE_PAGE_SQL: &str = "SELECT m.id AS id, m.username AS username, t.name AS team_name \
     FROM member m LEFT JOIN team t ON m.team_id = t.id ORDER BY m.id";
const CUSTOM_SQL: &str = "SELECT id, username, age, team_id, version FROM member ORDER BY id";

/// `SeaORM` implementation of [`MembersRepository`].
#[derive(Clone)]
pub struct SeaMembersRepository {
    store: SeaRecordStore<MemberMapping>,
    fmap: FieldMap<member::Entity>,
    config: StoreConfig,
}

impl SeaMembersRepository {
    /// # Errors
    /// `Validation` if the member field map cannot be built.
    pub fn new(config: StoreConfig) -> Result<Self, DomainError> {
        Ok(Self {
            store: SeaRecordStore::new(&config),
            fmap: member_field_map()?,
            config,
        })
    }

    fn by_username(username: &str) -> Result<Query, DomainError> {
        Ok(QueryBuilder::<MemberSchema>::new()
            .filter(MemberFields::USERNAME.eq(username))
            .order_by(MemberFields::ID, SortDir::Asc)
            .build()?)
    }

    fn plan(&self, query: &Query) -> Result<QueryPlan, DomainError> {
        let order = query.order.clone().ensure_tiebreaker("id", SortDir::Asc);
        Ok(QueryPlan::compile(&self.fmap, query.filter(), &order)?)
    }
}

#[async_trait]
impl MembersRepository for SeaMembersRepository {
    #[instrument(skip(self, conn), fields(db.operation = "member.save"))]
    async fn save<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        member: Member,
    ) -> Result<Member, DomainError> {
        Ok(self.store.save(conn, member).await?)
    }

    async fn find_by_id<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        id: i64,
    ) -> Result<Option<Member>, DomainError> {
        Ok(self.store.find_by_id(conn, id).await?)
    }

    async fn find_all<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
    ) -> Result<Vec<Member>, DomainError> {
        Ok(self.store.find_all(conn).await?)
    }

    #[instrument(skip(self, conn), fields(db.operation = "member.delete"))]
    async fn delete<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        id: i64,
    ) -> Result<bool, DomainError> {
        Ok(self.store.delete(conn, id).await?)
    }

    async fn count<C: DbConnTrait + Send + Sync>(&self, conn: &C) -> Result<u64, DomainError> {
        Ok(self.store.count(conn).await?)
    }

    #[instrument(skip(self, conn), fields(db.operation = "member.update_versioned"))]
    async fn update_versioned<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        member: Member,
    ) -> Result<Member, DomainError> {
        Ok(self.store.update_versioned(conn, member).await?)
    }

    async fn search<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        query: &Query,
    ) -> Result<Vec<Member>, DomainError> {
        let mut select = self.plan(query)?.apply(member::Entity::find());
        if let Some(limit) = query.limit {
            select = select.limit(limit);
        }
        let rows = select.all(conn).await.map_err(StoreError::from)?;
        debug!(rows = rows.len(), "member search");
        Ok(rows.into_iter().map(Member::from).collect())
    }

    async fn search_selected<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        query: &Query,
    ) -> Result<Vec<serde_json::Value>, DomainError> {
        let mapper = ProjectionMapper::new(&self.fmap).with_config(&self.config);
        let plan = mapper.plan_selected(query)?;
        let projected = mapper
            .fetch(conn, member::Entity::find(), query, &plan)
            .await?;
        Ok(projected.rows)
    }

    #[instrument(skip(self, conn, query), fields(db.operation = "member.find_page"))]
    async fn find_page<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        query: &Query,
        request: &PageRequest,
    ) -> Result<Page<Member>, DomainError> {
        Ok(Pager::new(conn, &self.fmap)
            .with_config(&self.config)
            .fetch_page(member::Entity::find(), query, request, Member::from)
            .await?)
    }

    async fn find_cursor<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        query: &Query,
    ) -> Result<CursorPage<Member>, DomainError> {
        Ok(Pager::new(conn, &self.fmap)
            .with_config(&self.config)
            .fetch_cursor(member::Entity::find(), query, Member::from)
            .await?)
    }

    async fn find_by_username<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        username: &str,
    ) -> Result<Vec<Member>, DomainError> {
        self.search(conn, &Self::by_username(username)?).await
    }

    async fn find_by_username_and_age_greater_than<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        username: &str,
        age: i64,
    ) -> Result<Vec<Member>, DomainError> {
        let query = QueryBuilder::<MemberSchema>::new()
            .filter(MemberFields::USERNAME.eq(username))
            .filter(MemberFields::AGE.gt(age))
            .order_by(MemberFields::ID, SortDir::Asc)
            .build()?;
        self.search(conn, &query).await
    }

    async fn find_user<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        username: &str,
        age: i64,
    ) -> Result<Vec<Member>, DomainError> {
        let query = QueryBuilder::<MemberSchema>::new()
            .filter(MemberFields::USERNAME.eq(username).and(MemberFields::AGE.eq(age)))
            .build()?;
        self.search(conn, &query).await
    }

    async fn find_username_list<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
    ) -> Result<Vec<String>, DomainError> {
        let rows = member::Entity::find()
            .select_only()
            .column(member::Column::Username)
            .order_by_asc(member::Column::Id)
            .into_tuple::<String>()
            .all(conn)
            .await
            .map_err(StoreError::from)?;
        Ok(rows)
    }

    async fn find_member_dto<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
    ) -> Result<Vec<MemberDto>, DomainError> {
        // Members without a team have no team name to report.
        let query = QueryBuilder::<MemberSchema>::new()
            .filter(MemberFields::TEAM_ID.is_not_null())
            .order_by(MemberFields::ID, SortDir::Asc)
            .build()?;
        let mapper = ProjectionMapper::new(&self.fmap).with_config(&self.config);
        let plan = mapper.plan_for::<MemberDto>()?;
        let projected = mapper
            .fetch(conn, member::Entity::find(), &query, &plan)
            .await?;
        Ok(projected.into_typed()?)
    }

    async fn find_by_names<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        names: &[String],
    ) -> Result<Vec<Member>, DomainError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let query = QueryBuilder::<MemberSchema>::new()
            .filter(MemberFields::USERNAME.is_in(names))
            .order_by(MemberFields::ID, SortDir::Asc)
            .build()?;
        self.search(conn, &query).await
    }

    #[instrument(skip(self, conn))]
    async fn find_member_by_username<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        username: &str,
    ) -> Result<Option<Member>, DomainError> {
        let mut found = self.find_by_username(conn, username).await?;
        match found.len() {
            0 | 1 => Ok(found.pop()),
            count => Err(DomainError::NonUniqueResult { count }),
        }
    }

    async fn find_by_age<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        age: i64,
        request: &PageRequest,
    ) -> Result<Page<Member>, DomainError> {
        let query = QueryBuilder::<MemberSchema>::new()
            .filter(MemberFields::AGE.eq(age))
            .build()?;
        self.find_page(conn, &query, request).await
    }

    #[instrument(skip(self, conn), fields(db.operation = "member.bulk_age_plus"))]
    async fn bulk_age_plus<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        age: i64,
    ) -> Result<u64, DomainError> {
        let filter = MemberFields::AGE.ge(age);
        let affected = bulk_update(
            conn,
            &self.fmap,
            Some(&filter),
            &[Mutation::increment("age", 1)],
        )
        .await?;
        debug!(affected, "bulk age update");
        Ok(affected)
    }

    async fn find_entity_graph_by_username<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        username: &str,
    ) -> Result<Vec<(Member, Option<Team>)>, DomainError> {
        let plan = self.plan(&Self::by_username(username)?)?;
        let rows = plan
            .apply(member::Entity::find())
            .find_also_related(team::Entity)
            .all(conn)
            .await
            .map_err(StoreError::from)?;
        Ok(rows
            .into_iter()
            .map(|(m, t)| (Member::from(m), t.map(Team::from)))
            .collect())
    }

    async fn find_lock_by_username<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        username: &str,
        mode: LockMode,
    ) -> Result<Vec<Member>, DomainError> {
        let plan = self.plan(&Self::by_username(username)?)?;
        let rows = plan
            .apply(member::Entity::find())
            .with_lock(mode)
            .all(conn)
            .await
            .map_err(StoreError::from)?;
        Ok(rows.into_iter().map(Member::from).collect())
    }

    async fn find_by_example<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        example: &Example,
    ) -> Result<Vec<Member>, DomainError> {
        let query = QueryBuilder::<MemberSchema>::new()
            .example(example)
            .order_by(MemberFields::ID, SortDir::Asc)
            .build()?;
        self.search(conn, &query).await
    }

    async fn find_projections_by_username<P, C>(
        &self,
        conn: &C,
        username: &str,
    ) -> Result<Vec<P>, DomainError>
    where
        P: Projection + Send,
        C: DbConnTrait + Send + Sync,
    {
        let query = Self::by_username(username)?;
        let mapper = ProjectionMapper::new(&self.fmap).with_config(&self.config);
        let plan = mapper.plan_for::<P>()?;
        let projected = mapper
            .fetch(conn, member::Entity::find(), &query, &plan)
            .await?;
        debug!(
            rows = projected.rows.len(),
            round_trips = projected.round_trips,
            "member projection"
        );
        Ok(projected.into_typed()?)
    }

    #[instrument(skip(self, conn), fields(db.operation = "member.native_page"))]
    async fn find_by_native_projection<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        request: &PageRequest,
    ) -> Result<Page<MemberProjection>, DomainError> {
        if !request.sort().is_empty() {
            return Err(DomainError::validation(
                "the native member listing is always ordered by id",
            ));
        }
        if request.size() > self.config.max_page_size {
            return Err(DomainError::validation(format!(
                "page size {} exceeds the maximum of {}",
                request.size(),
                self.config.max_page_size
            )));
        }
        let offset = request.offset()?;
        let backend = conn.get_database_backend();

        let total = conn
            .query_one(Statement::from_string(backend, NATIVE_COUNT_SQL))
            .await
            .map_err(StoreError::from)?
            .map(|row| row.try_get::<i64>("", "total"))
            .transpose()
            .map_err(StoreError::from)?
            .unwrap_or(0);
        let total = u64::try_from(total).unwrap_or(0);

        let sql = format!(
            "{NATIVE_PAGE_SQL} LIMIT {} OFFSET {offset}",
            request.size()
        );
        let rows = JsonValue::find_by_statement(Statement::from_string(backend, sql))
            .all(conn)
            .await
            .map_err(StoreError::from)?;

        let page = Page::new(rows, request, total);
        page.try_map(|row| {
            serde_json::from_value::<MemberProjection>(row)
                .map_err(|e| DomainError::from(StoreError::from(DbErr::Json(e.to_string()))))
        })
    }

    async fn find_by_team<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        team_id: i64,
    ) -> Result<Vec<Member>, DomainError> {
        let query = Query::new()
            .with_filter(MemberFields::TEAM_ID.eq(team_id))
            .with_order(OrderBy::by("id", SortDir::Asc));
        self.search(conn, &query).await
    }
}

#[async_trait]
impl MemberCustomQueries for SeaMembersRepository {
    async fn find_member_custom<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
    ) -> Result<Vec<Member>, DomainError> {
        let backend = conn.get_database_backend();
        let rows = member::Entity::find()
            .from_raw_sql(Statement::from_string(backend, CUSTOM_SQL))
            .all(conn)
            .await
            .map_err(StoreError::from)?;
        Ok(rows.into_iter().map(Member::from).collect())
    }
}
