//! Closed projections: a fixed set of root fields plus at most one level of
//! nested relation fields, returned as JSON objects.
//!
//! How the nested part is loaded is a planning decision with a declared cost:
//!
//! | strategy | statements |
//! |---|---|
//! | [`FetchStrategy::EagerJoin`] | 1 |
//! | [`FetchStrategy::PerRowFetch`] | 1 + one per row and relation with a non-null key |
//!
//! A shape without nested relations always runs as a single statement.

use repokit_query::{Page, PageRequest, Query};
use sea_orm::sea_query::{Alias, Expr, SimpleExpr};
use sea_orm::{ConnectionTrait, EntityTrait, FromQueryResult, PaginatorTrait, QuerySelect, Select};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::pager::{LimitCfg, TIEBREAKER};
use crate::query::{FieldMap, QueryPlan};

/// Requested output shape.
///
/// Root fields use field map names (dotted joined names are allowed for
/// eager plans) and land under a flat key: the name with `.` replaced by `_`
/// unless renamed with [`ProjectionShape::with_field_as`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct ProjectionShape {
    fields: Vec<(String, String)>,
    nested: Vec<NestedShape>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NestedShape {
    pub relation: String,
    pub fields: Vec<String>,
}

impl ProjectionShape {
    pub fn closed<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|f| {
                    let f = f.into();
                    let key = f.replace('.', "_");
                    (f, key)
                })
                .collect(),
            nested: Vec::new(),
        }
    }

    pub fn with_field_as(mut self, field: impl Into<String>, key: impl Into<String>) -> Self {
        self.fields.push((field.into(), key.into()));
        self
    }

    /// Nest `fields` of `relation` under a `relation` key.
    pub fn with_nested<I, S>(mut self, relation: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nested.push(NestedShape {
            relation: relation.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        });
        self
    }

    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    #[must_use]
    pub fn nested(&self) -> &[NestedShape] {
        &self.nested
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FetchStrategy {
    #[default]
    EagerJoin,
    PerRowFetch,
}

/// Declared statement count of a plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundTrips {
    Single,
    PerRow { relations: usize },
}

impl RoundTrips {
    /// Worst case for `rows` root rows.
    #[must_use]
    pub fn upper_bound(self, rows: u64) -> u64 {
        match self {
            RoundTrips::Single => 1,
            RoundTrips::PerRow { relations } => {
                let relations = u64::try_from(relations).unwrap_or(u64::MAX);
                rows.saturating_mul(relations).saturating_add(1)
            }
        }
    }
}

#[derive(Clone)]
struct PlannedColumn {
    column: sea_orm::sea_query::ColumnRef,
    key: String,
    relation: Option<String>,
}

#[derive(Clone)]
struct PlannedNested {
    relation: String,
    fk: sea_orm::sea_query::ColumnRef,
    target: sea_orm::sea_query::DynIden,
    target_pk: sea_orm::sea_query::ColumnRef,
    columns: Vec<(sea_orm::sea_query::ColumnRef, String)>,
}

/// A validated shape bound to a strategy.
#[derive(Clone)]
#[must_use]
pub struct FetchPlan {
    columns: Vec<PlannedColumn>,
    nested: Vec<PlannedNested>,
    strategy: FetchStrategy,
    round_trips: RoundTrips,
}

impl FetchPlan {
    #[must_use]
    pub fn strategy(&self) -> FetchStrategy {
        self.strategy
    }

    #[must_use]
    pub fn round_trips(&self) -> RoundTrips {
        self.round_trips
    }
}

/// Projected rows and the number of statements it took to load them.
#[derive(Clone, Debug, PartialEq)]
pub struct Projected {
    pub rows: Vec<JsonValue>,
    pub round_trips: u64,
}

impl Projected {
    /// Deserialize every row into `P`.
    ///
    /// # Errors
    /// `InvalidArgument` when a row does not fit `P`.
    pub fn into_typed<P: DeserializeOwned>(self) -> StoreResult<Vec<P>> {
        self.rows
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    StoreError::invalid_argument(format!("projection does not fit target: {e}"))
                })
            })
            .collect()
    }
}

/// One offset page of projected rows.
///
/// `round_trips` counts every statement the page ran: the total count, the
/// root select and any per-row lookups. A page past the end costs one.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectedPage {
    pub page: Page<JsonValue>,
    pub round_trips: u64,
}

impl ProjectedPage {
    /// Deserialize the page content into `P`, keeping the paging metadata.
    ///
    /// # Errors
    /// `InvalidArgument` when a row does not fit `P`.
    pub fn into_typed<P: DeserializeOwned>(self) -> StoreResult<Page<P>> {
        self.page.try_map(|row| {
            serde_json::from_value(row).map_err(|e| {
                StoreError::invalid_argument(format!("projection does not fit target: {e}"))
            })
        })
    }
}

/// Typed read-only view with a fixed shape.
pub trait Projection: DeserializeOwned {
    fn shape() -> ProjectionShape;

    fn strategy() -> FetchStrategy {
        FetchStrategy::EagerJoin
    }
}

fn fk_alias(relation: &str) -> String {
    format!("__fk_{relation}")
}

fn nested_alias(relation: &str, field: &str) -> String {
    format!("{relation}__{field}")
}

fn json_key_value(v: &JsonValue) -> Option<sea_orm::Value> {
    match v {
        JsonValue::Number(n) => n.as_i64().map(|i| sea_orm::Value::BigInt(Some(i))),
        JsonValue::String(s) => Some(sea_orm::Value::String(Some(Box::new(s.clone())))),
        _ => None,
    }
}

#[must_use]
pub struct ProjectionMapper<'a, E: EntityTrait> {
    fmap: &'a FieldMap<E>,
    limits: LimitCfg,
}

impl<'a, E> ProjectionMapper<'a, E>
where
    E: EntityTrait,
    E::Model: Send + Sync,
{
    pub fn new(fmap: &'a FieldMap<E>) -> Self {
        Self {
            fmap,
            limits: LimitCfg::default(),
        }
    }

    pub fn with_config(mut self, cfg: &StoreConfig) -> Self {
        self.limits = LimitCfg {
            default: cfg.default_page_size,
            max: cfg.max_page_size,
        };
        self
    }

    /// Validate `shape` against the field map and fix the strategy.
    ///
    /// # Errors
    /// - `InvalidField` for unknown fields or relations
    /// - `InvalidArgument` for an empty shape, or a joined root field under
    ///   [`FetchStrategy::PerRowFetch`]
    pub fn plan(&self, shape: &ProjectionShape, strategy: FetchStrategy) -> StoreResult<FetchPlan> {
        if shape.fields.is_empty() && shape.nested.is_empty() {
            return Err(StoreError::invalid_argument("projection selects no fields"));
        }

        let mut columns = Vec::with_capacity(shape.fields.len());
        for (name, key) in &shape.fields {
            let field = self.fmap.resolve(name)?;
            let relation = field.relation().map(str::to_owned);
            if relation.is_some() && strategy == FetchStrategy::PerRowFetch {
                return Err(StoreError::invalid_argument(format!(
                    "'{name}' needs a join; nest it instead when fetching per row"
                )));
            }
            columns.push(PlannedColumn {
                column: field.column_ref(),
                key: key.clone(),
                relation,
            });
        }

        let mut nested = Vec::with_capacity(shape.nested.len());
        for n in &shape.nested {
            let spec = self.fmap.resolve_relation(&n.relation)?;
            let mut cols = Vec::with_capacity(n.fields.len());
            for f in &n.fields {
                let path = format!("{}.{f}", n.relation);
                let field = self.fmap.resolve(&path)?;
                if !field
                    .relation()
                    .is_some_and(|r| r.eq_ignore_ascii_case(&n.relation))
                {
                    return Err(StoreError::InvalidField(path));
                }
                cols.push((field.column_ref(), f.clone()));
            }
            nested.push(PlannedNested {
                relation: n.relation.clone(),
                fk: spec.fk_ref(),
                target: spec.target.clone(),
                target_pk: spec.target_pk.clone(),
                columns: cols,
            });
        }

        let round_trips = if nested.is_empty() || strategy == FetchStrategy::EagerJoin {
            RoundTrips::Single
        } else {
            RoundTrips::PerRow {
                relations: nested.len(),
            }
        };

        Ok(FetchPlan {
            columns,
            nested,
            strategy,
            round_trips,
        })
    }

    /// Plan the shape declared by `P`.
    ///
    /// # Errors
    /// See [`ProjectionMapper::plan`].
    pub fn plan_for<P: Projection>(&self) -> StoreResult<FetchPlan> {
        self.plan(&P::shape(), P::strategy())
    }

    /// Closed eager plan over the fields the query selected with
    /// [`repokit_query::QueryBuilder::select`].
    ///
    /// # Errors
    /// - `InvalidArgument` when the query selects nothing
    /// - `InvalidField` for selected names the field map does not know
    pub fn plan_selected(&self, query: &Query) -> StoreResult<FetchPlan> {
        let fields = query
            .selected_fields()
            .ok_or_else(|| StoreError::invalid_argument("query selects no fields"))?;
        self.plan(
            &ProjectionShape::closed(fields.iter().map(String::as_str)),
            FetchStrategy::EagerJoin,
        )
    }

    /// Run `query` (filter, order, optional limit) and shape every row.
    ///
    /// # Errors
    /// Compilation errors of the query, store errors.
    pub async fn fetch<C>(
        &self,
        conn: &C,
        select: Select<E>,
        query: &Query,
        plan: &FetchPlan,
    ) -> StoreResult<Projected>
    where
        C: ConnectionTrait,
    {
        let compiled = self.compile(query, &query.order, plan)?;
        let mut stmt = shape_select(compiled.apply(select), plan);
        if let Some(limit) = query.limit {
            stmt = stmt.limit(limit);
        }
        load(conn, stmt, plan).await
    }

    /// Offset page of projected rows; the total is counted over the same
    /// filter and joins, and the statement count is reported with the page.
    ///
    /// # Errors
    /// `InvalidArgument` when the size exceeds the configured max, compilation
    /// errors, store errors.
    pub async fn fetch_page<C>(
        &self,
        conn: &C,
        select: Select<E>,
        query: &Query,
        request: &PageRequest,
        plan: &FetchPlan,
    ) -> StoreResult<ProjectedPage>
    where
        C: ConnectionTrait,
    {
        if request.size() > self.limits.max {
            return Err(StoreError::invalid_argument(format!(
                "page size {} exceeds the maximum of {}",
                request.size(),
                self.limits.max
            )));
        }
        let offset = request.offset()?;
        let order = if request.sort().is_empty() {
            query.order.clone()
        } else {
            request.sort().clone()
        }
        .ensure_tiebreaker(TIEBREAKER.0, TIEBREAKER.1);

        let compiled = self.compile(query, &order, plan)?;
        let total = compiled.apply_filter(select.clone()).count(conn).await?;
        if offset >= total {
            return Ok(ProjectedPage {
                page: Page::new(Vec::new(), request, total),
                round_trips: 1,
            });
        }

        let stmt = shape_select(compiled.apply(select), plan)
            .offset(offset)
            .limit(request.size());
        let projected = load(conn, stmt, plan).await?;
        Ok(ProjectedPage {
            page: Page::new(projected.rows, request, total),
            round_trips: projected.round_trips + 1,
        })
    }

    fn compile(
        &self,
        query: &Query,
        order: &repokit_query::OrderBy,
        plan: &FetchPlan,
    ) -> StoreResult<QueryPlan> {
        let mut compiled = QueryPlan::compile(self.fmap, query.filter(), order)?;
        for col in &plan.columns {
            if let Some(rel) = &col.relation {
                compiled.require_relation(self.fmap, rel)?;
            }
        }
        if plan.strategy == FetchStrategy::EagerJoin {
            for n in &plan.nested {
                compiled.require_relation(self.fmap, &n.relation)?;
            }
        }
        Ok(compiled)
    }
}

fn shape_select<E: EntityTrait>(select: Select<E>, plan: &FetchPlan) -> Select<E> {
    let mut s = select.select_only();
    for col in &plan.columns {
        s = s.column_as(SimpleExpr::Column(col.column.clone()), col.key.as_str());
    }
    for n in &plan.nested {
        s = s.column_as(SimpleExpr::Column(n.fk.clone()), fk_alias(&n.relation));
        if plan.strategy == FetchStrategy::EagerJoin {
            for (column, field) in &n.columns {
                s = s.column_as(
                    SimpleExpr::Column(column.clone()),
                    nested_alias(&n.relation, field),
                );
            }
        }
    }
    s
}

async fn load<E: EntityTrait, C: ConnectionTrait>(
    conn: &C,
    stmt: Select<E>,
    plan: &FetchPlan,
) -> StoreResult<Projected> {
    let raw = stmt.into_json().all(conn).await?;
    let mut round_trips = 1_u64;
    let mut rows = Vec::with_capacity(raw.len());

    for row in raw {
        let JsonValue::Object(mut obj) = row else {
            return Err(StoreError::invalid_argument("projected row is not an object"));
        };
        for n in &plan.nested {
            let fk = obj.remove(&fk_alias(&n.relation)).unwrap_or(JsonValue::Null);
            let nested = match plan.strategy {
                FetchStrategy::EagerJoin => {
                    let mut inner = Map::new();
                    for (_, field) in &n.columns {
                        let v = obj
                            .remove(&nested_alias(&n.relation, field))
                            .unwrap_or(JsonValue::Null);
                        inner.insert(field.clone(), v);
                    }
                    if fk.is_null() {
                        JsonValue::Null
                    } else {
                        JsonValue::Object(inner)
                    }
                }
                FetchStrategy::PerRowFetch => match json_key_value(&fk) {
                    Some(key) => {
                        round_trips += 1;
                        fetch_related(conn, n, key).await?
                    }
                    None => JsonValue::Null,
                },
            };
            obj.insert(n.relation.clone(), nested);
        }
        rows.push(JsonValue::Object(obj));
    }

    debug!(
        rows = rows.len(),
        round_trips,
        strategy = ?plan.strategy,
        "projection loaded"
    );
    Ok(Projected { rows, round_trips })
}

async fn fetch_related<C: ConnectionTrait>(
    conn: &C,
    nested: &PlannedNested,
    key: sea_orm::Value,
) -> StoreResult<JsonValue> {
    let mut q = sea_orm::sea_query::Query::select();
    for (column, field) in &nested.columns {
        q.expr_as(Expr::col(column.clone()), Alias::new(field.as_str()));
    }
    q.from(nested.target.clone())
        .and_where(Expr::col(nested.target_pk.clone()).eq(key));

    let stmt = conn.get_database_backend().build(&q);
    let row = conn.query_one(stmt).await?;
    Ok(match row {
        Some(r) => <JsonValue as FromQueryResult>::from_query_result(&r, "")?,
        None => JsonValue::Null,
    })
}
