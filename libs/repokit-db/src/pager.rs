//! Offset and keyset pagination over a `SeaORM` select.
//!
//! ```ignore
//! let page = Pager::new(conn, &MEMBER_FIELDS)
//!     .with_config(&cfg.store)
//!     .fetch_page(member::Entity::find(), &query, &PageRequest::of(0, 3)?, Member::from)
//!     .await?;
//! ```
//!
//! Offset pages run one `COUNT` over the filtered (and joined) select, then the
//! windowed select. Keyset pages over-fetch `limit + 1` rows instead and never
//! count.

use repokit_query::{
    CursorDirection, CursorPage, OrderBy, Page, PageInfo, PageRequest, Query, SortDir,
    validate_cursor_against,
};
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait, QuerySelect, Select};
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::query::{FieldMap, QueryPlan, build_cursor_for_model, build_cursor_predicate};

/// Final sort key of every page order, so consecutive pages never overlap.
pub(crate) const TIEBREAKER: (&str, SortDir) = ("id", SortDir::Asc);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LimitCfg {
    pub default: u64,
    pub max: u64,
}

impl Default for LimitCfg {
    fn default() -> Self {
        Self {
            default: 25,
            max: 1000,
        }
    }
}

fn clamp_limit(req: Option<u64>, cfg: LimitCfg) -> u64 {
    req.unwrap_or(cfg.default).clamp(1, cfg.max.max(1))
}

/// Fluent pager bound to one connection and one field map.
///
/// Every order is closed by `id` ascending; limits default to
/// `{ default: 25, max: 1000 }`.
#[must_use]
pub struct Pager<'a, E, C>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    conn: &'a C,
    fmap: &'a FieldMap<E>,
    limits: LimitCfg,
}

impl<'a, E, C> Pager<'a, E, C>
where
    E: EntityTrait,
    E::Model: Send + Sync,
    C: ConnectionTrait + Send + Sync,
{
    pub fn new(conn: &'a C, fmap: &'a FieldMap<E>) -> Self {
        Self {
            conn,
            fmap,
            limits: LimitCfg::default(),
        }
    }

    pub fn limits(mut self, default: u64, max: u64) -> Self {
        self.limits = LimitCfg { default, max };
        self
    }

    pub fn with_config(self, cfg: &StoreConfig) -> Self {
        self.limits(cfg.default_page_size, cfg.max_page_size)
    }

    /// Order used for `request`: its own sort when present, the query's
    /// otherwise, always closed by the tiebreaker.
    pub fn effective_order(&self, query: &Query, request: &PageRequest) -> OrderBy {
        let base = if request.sort().is_empty() {
            query.order.clone()
        } else {
            request.sort().clone()
        };
        base.ensure_tiebreaker(TIEBREAKER.0, TIEBREAKER.1)
    }

    /// Offset pagination with a total count.
    ///
    /// A page past the end has empty content, the real total and
    /// `has_next() == false`.
    ///
    /// # Errors
    /// - `InvalidArgument` when `request.size()` exceeds the configured max
    /// - `InvalidField` / `InvalidArgument` when the query does not compile
    /// - store errors from either statement
    pub async fn fetch_page<D, F>(
        &self,
        select: Select<E>,
        query: &Query,
        request: &PageRequest,
        map: F,
    ) -> StoreResult<Page<D>>
    where
        F: FnMut(E::Model) -> D,
    {
        if request.size() > self.limits.max {
            return Err(StoreError::invalid_argument(format!(
                "page size {} exceeds the maximum of {}",
                request.size(),
                self.limits.max
            )));
        }
        let offset = request.offset()?;
        let order = self.effective_order(query, request);
        let plan = QueryPlan::compile(self.fmap, query.filter(), &order)?;

        let total = plan.apply_filter(select.clone()).count(self.conn).await?;
        if offset >= total {
            debug!(total, page = request.page(), "page starts past the last row");
            return Ok(Page::new(Vec::new(), request, total));
        }

        let rows = plan
            .apply(select)
            .offset(offset)
            .limit(request.size())
            .all(self.conn)
            .await?;
        debug!(
            total,
            page = request.page(),
            size = request.size(),
            returned = rows.len(),
            "fetched page"
        );

        Ok(Page::new(rows.into_iter().map(map).collect(), request, total))
    }

    /// Keyset pagination: filter -> cursor predicate -> order -> overfetch/trim
    /// -> build cursors.
    ///
    /// # Errors
    /// - cursor errors (`OrderMismatch`, `FilterMismatch`, malformed keys) as
    ///   `InvalidArgument`
    /// - `InvalidField` / `InvalidArgument` when the query does not compile
    /// - store errors
    pub async fn fetch_cursor<D, F>(
        &self,
        select: Select<E>,
        query: &Query,
        map: F,
    ) -> StoreResult<CursorPage<D>>
    where
        F: FnMut(E::Model) -> D,
    {
        let limit = clamp_limit(query.limit, self.limits);
        let fetch = limit + 1;

        let effective_order = if let Some(cur) = &query.cursor {
            let from_cursor = OrderBy::from_signed_tokens(&cur.s)
                .map_err(|_| repokit_query::Error::InvalidCursor)?;
            if !query.order.is_empty() {
                let requested = query
                    .order
                    .clone()
                    .ensure_tiebreaker(TIEBREAKER.0, TIEBREAKER.1);
                validate_cursor_against(cur, &requested, query.filter_hash.as_deref())?;
            }
            from_cursor
        } else {
            query
                .order
                .clone()
                .ensure_tiebreaker(TIEBREAKER.0, TIEBREAKER.1)
        };

        if let Some(cur) = &query.cursor {
            if let (Some(h), Some(cf)) = (query.filter_hash.as_deref(), cur.f.as_deref()) {
                if h != cf {
                    return Err(repokit_query::Error::FilterMismatch.into());
                }
            }
        }

        let is_backward = query.cursor.as_ref().is_some_and(|c| c.is_backward());

        // Query order is reversed for backward pages; rows are flipped back below.
        let query_order = if is_backward {
            effective_order.clone().reverse_directions()
        } else {
            effective_order.clone()
        };

        let mut plan = QueryPlan::compile(self.fmap, query.filter(), &query_order)?;
        if let Some(cursor) = &query.cursor {
            plan = plan.and_condition(build_cursor_predicate(cursor, &effective_order, self.fmap)?);
        }

        let mut rows = plan.apply(select).limit(fetch).all(self.conn).await?;
        let has_more = rows.len() as u64 > limit;

        if is_backward {
            if has_more {
                rows.pop();
            }
            rows.reverse();
        } else if has_more {
            rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        let next_cursor = if is_backward || has_more {
            self.cursor_at(&rows, &effective_order, query, true, CursorDirection::Forward)?
        } else {
            None
        };
        let prev_cursor = if (is_backward && has_more) || (!is_backward && query.cursor.is_some())
        {
            self.cursor_at(&rows, &effective_order, query, false, CursorDirection::Backward)?
        } else {
            None
        };

        debug!(limit, returned = rows.len(), has_more, "fetched cursor page");

        Ok(CursorPage {
            items: rows.into_iter().map(map).collect(),
            page_info: PageInfo {
                next_cursor,
                prev_cursor,
                limit,
            },
        })
    }

    fn cursor_at(
        &self,
        rows: &[E::Model],
        order: &OrderBy,
        query: &Query,
        last: bool,
        direction: CursorDirection,
    ) -> StoreResult<Option<String>> {
        let row = if last { rows.last() } else { rows.first() };
        row.map(|m| {
            let primary_dir = order.keys().first().map_or(TIEBREAKER.1, |k| k.dir);
            let cursor = build_cursor_for_model::<E>(
                m,
                order,
                self.fmap,
                primary_dir,
                query.filter_hash.clone(),
                direction,
            )?;
            cursor
                .encode()
                .map_err(|e| StoreError::invalid_argument(format!("cursor encoding failed: {e}")))
        })
        .transpose()
    }
}
