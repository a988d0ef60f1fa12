//! Set-based updates: one `UPDATE ... SET ... WHERE ...` per call.
//!
//! Rows touched here bypass any record previously loaded by the caller; treat
//! such records as stale after a bulk update returns.

use bigdecimal::BigDecimal;
use repokit_query::ast::{self, Value};
use repokit_query::{FieldKind, IntoValue};
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{ConnectionTrait, EntityTrait, QueryFilter};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::query::{FieldMap, QueryPlan, coerce};

#[derive(Clone, Debug, PartialEq)]
pub enum MutationOp {
    /// `field = value`
    Set(Value),
    /// `field = field + by`
    Increment(BigDecimal),
}

/// One `SET` clause addressed by API field name.
#[derive(Clone, Debug, PartialEq)]
pub struct Mutation {
    pub field: String,
    pub op: MutationOp,
}

impl Mutation {
    pub fn set(field: impl Into<String>, value: impl IntoValue) -> Self {
        Self {
            field: field.into(),
            op: MutationOp::Set(value.into_value()),
        }
    }

    pub fn increment(field: impl Into<String>, by: impl Into<BigDecimal>) -> Self {
        Self {
            field: field.into(),
            op: MutationOp::Increment(by.into()),
        }
    }
}

/// Apply `mutations` to every row matching `filter`; `None` matches all rows.
///
/// Returns the number of rows the database reports as affected.
///
/// # Errors
/// - `InvalidArgument` for an empty mutation list, a filter that needs a join,
///   a mutation on a joined field or an increment of a non-numeric field
/// - `InvalidField` for unmapped names
/// - store errors from the statement
pub async fn bulk_update<E, C>(
    conn: &C,
    fmap: &FieldMap<E>,
    filter: Option<&ast::Expr>,
    mutations: &[Mutation],
) -> StoreResult<u64>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    if mutations.is_empty() {
        return Err(StoreError::invalid_argument("bulk update needs at least one mutation"));
    }

    let plan = QueryPlan::for_filter(fmap, filter)?;
    if plan.has_joins() {
        return Err(StoreError::invalid_argument(
            "bulk update filters may only reference the updated table",
        ));
    }

    let mut stmt = E::update_many();
    for m in mutations {
        let field = fmap.resolve(&m.field)?;
        let col = field.own_column().ok_or_else(|| {
            StoreError::invalid_argument(format!("'{}' is not a column of the updated table", m.field))
        })?;
        let expr: SimpleExpr = match &m.op {
            MutationOp::Set(v) => coerce(&m.field, field.kind, v)?.into(),
            MutationOp::Increment(by) => {
                if !matches!(field.kind, FieldKind::I64 | FieldKind::F64) {
                    return Err(StoreError::invalid_argument(format!(
                        "cannot increment non-numeric field '{}'",
                        m.field
                    )));
                }
                let by = coerce(&m.field, field.kind, &Value::Number(by.clone()))?;
                Expr::col(col).add(by)
            }
        };
        stmt = stmt.col_expr(col, expr);
    }
    if let Some(cond) = plan.condition() {
        stmt = stmt.filter(cond.clone());
    }

    let res = stmt.exec(conn).await?;
    debug!(
        table = %E::default().table_name(),
        rows_affected = res.rows_affected,
        mutations = mutations.len(),
        "bulk update"
    );
    Ok(res.rows_affected)
}
