//! Typed query AST -> `sea_orm::Condition` / order / joins.

use bigdecimal::ToPrimitive;
use chrono::Utc;
use repokit_query::ast::{self, CompareOperator};
use repokit_query::{CursorDirection, CursorV1, FieldKind, OrderBy, SortDir};
use sea_orm::sea_query::{ColumnRef, Expr, Order, SimpleExpr};
use sea_orm::{Condition, EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect, RelationDef, Select};

use super::field_map::{Field, FieldMap};
use crate::error::{StoreError, StoreResult};

/* ---------- coercion helpers ---------- */

fn type_mismatch(field: &str, expected: FieldKind, got: &'static str) -> StoreError {
    repokit_query::Error::TypeMismatch {
        field: field.to_owned(),
        expected,
        got,
    }
    .into()
}

/// Convert a literal to the database value for a field of `kind`.
///
/// # Errors
/// `InvalidArgument` when the literal does not fit the field.
pub fn coerce(field: &str, kind: FieldKind, v: &ast::Value) -> StoreResult<sea_orm::Value> {
    use ast::Value as V;
    Ok(match (kind, v) {
        (FieldKind::String, V::String(s)) => sea_orm::Value::String(Some(Box::new(s.clone()))),
        (FieldKind::I64, V::Number(n)) => {
            let i = (n.with_scale(0) == *n)
                .then(|| n.to_i64())
                .flatten()
                .ok_or_else(|| type_mismatch(field, kind, "number"))?;
            sea_orm::Value::BigInt(Some(i))
        }
        (FieldKind::F64, V::Number(n)) => {
            let f = n.to_f64().ok_or_else(|| type_mismatch(field, kind, "number"))?;
            sea_orm::Value::Double(Some(f))
        }
        (FieldKind::Bool, V::Bool(b)) => sea_orm::Value::Bool(Some(*b)),
        (FieldKind::DateTimeUtc, V::DateTime(dt)) => {
            sea_orm::Value::ChronoDateTimeUtc(Some(Box::new(*dt)))
        }
        (FieldKind::String, V::Null) => sea_orm::Value::String(None),
        (FieldKind::I64, V::Null) => sea_orm::Value::BigInt(None),
        (FieldKind::F64, V::Null) => sea_orm::Value::Double(None),
        (FieldKind::Bool, V::Null) => sea_orm::Value::Bool(None),
        (FieldKind::DateTimeUtc, V::Null) => sea_orm::Value::ChronoDateTimeUtc(None),
        (expected, other) => return Err(type_mismatch(field, expected, other.kind_name())),
    })
}

fn coerce_many(field: &str, kind: FieldKind, items: &[ast::Expr]) -> StoreResult<Vec<sea_orm::Value>> {
    items
        .iter()
        .map(|e| match e {
            ast::Expr::Value(ast::Value::Null) => Err(StoreError::invalid_argument(format!(
                "IN list for '{field}' cannot contain null"
            ))),
            ast::Expr::Value(v) => coerce(field, kind, v),
            _ => Err(StoreError::invalid_argument("IN list supports only literals")),
        })
        .collect()
}

/* ---------- cursor value encoding/decoding ---------- */

/// Parse a cursor key back into a database value.
///
/// # Errors
/// `InvalidArgument` when `s` is not a valid literal of `kind`.
pub fn parse_cursor_value(kind: FieldKind, s: &str) -> StoreResult<sea_orm::Value> {
    use sea_orm::Value as V;

    let bad = || StoreError::from(repokit_query::Error::InvalidCursor);
    Ok(match kind {
        FieldKind::String => V::String(Some(Box::new(s.to_owned()))),
        FieldKind::I64 => V::BigInt(Some(s.parse::<i64>().map_err(|_| bad())?)),
        FieldKind::F64 => V::Double(Some(s.parse::<f64>().map_err(|_| bad())?)),
        FieldKind::Bool => V::Bool(Some(s.parse::<bool>().map_err(|_| bad())?)),
        FieldKind::DateTimeUtc => {
            let dt = chrono::DateTime::parse_from_rfc3339(s)
                .map_err(|_| bad())?
                .with_timezone(&Utc);
            V::ChronoDateTimeUtc(Some(Box::new(dt)))
        }
    })
}

/* ---------- plan ---------- */

#[derive(Clone)]
struct JoinSpec {
    relation: String,
    def: fn() -> RelationDef,
}

/// A compiled filter + order with the joins they need.
///
/// The plan is detached from the field map it was compiled against and can be
/// applied to any `Select<E>` of the same root entity.
#[derive(Clone, Default)]
#[must_use]
pub struct QueryPlan {
    condition: Option<Condition>,
    order: Vec<(ColumnRef, Order)>,
    joins: Vec<JoinSpec>,
}

impl QueryPlan {
    /// Compile `filter` and `order` against `fmap`.
    ///
    /// # Errors
    /// `InvalidField` for unmapped names, `InvalidArgument` for ill-typed or
    /// malformed predicates.
    pub fn compile<E: EntityTrait>(
        fmap: &FieldMap<E>,
        filter: Option<&ast::Expr>,
        order: &OrderBy,
    ) -> StoreResult<Self> {
        let mut plan = Self::default();
        if let Some(expr) = filter {
            let cond = plan.expr_to_condition(expr, fmap)?;
            plan.condition = Some(cond);
        }
        for key in order.keys() {
            let field = fmap.resolve(&key.field)?;
            plan.note_join(field, fmap)?;
            let dir = match key.dir {
                SortDir::Asc => Order::Asc,
                SortDir::Desc => Order::Desc,
            };
            plan.order.push((field.column_ref(), dir));
        }
        Ok(plan)
    }

    /// Compile a filter only; no ordering.
    ///
    /// # Errors
    /// Same as [`QueryPlan::compile`].
    pub fn for_filter<E: EntityTrait>(
        fmap: &FieldMap<E>,
        filter: Option<&ast::Expr>,
    ) -> StoreResult<Self> {
        Self::compile(fmap, filter, &OrderBy::empty())
    }

    /// AND an extra condition (e.g. a keyset predicate) into the filter.
    pub fn and_condition(mut self, cond: Condition) -> Self {
        self.condition = Some(match self.condition.take() {
            Some(existing) => Condition::all().add(existing).add(cond),
            None => cond,
        });
        self
    }

    /// Make sure `relation` is joined even when no predicate touches it.
    ///
    /// # Errors
    /// `InvalidField` when the relation is not registered.
    pub fn require_relation<E: EntityTrait>(
        &mut self,
        fmap: &FieldMap<E>,
        relation: &str,
    ) -> StoreResult<()> {
        let spec = fmap.resolve_relation(relation)?;
        self.add_join(relation, spec.def);
        Ok(())
    }

    /// Replace the order with `order` compiled against `fmap`.
    ///
    /// # Errors
    /// `InvalidField` for unmapped sort keys.
    pub fn reorder<E: EntityTrait>(mut self, fmap: &FieldMap<E>, order: &OrderBy) -> StoreResult<Self> {
        let compiled = Self::compile(fmap, None, order)?;
        self.order = compiled.order;
        for join in compiled.joins {
            self.add_join(&join.relation, join.def);
        }
        Ok(self)
    }

    #[must_use]
    pub fn has_joins(&self) -> bool {
        !self.joins.is_empty()
    }

    #[must_use]
    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    /// Joins and WHERE, no ORDER BY. Used for counting.
    #[must_use]
    pub fn apply_filter<E: EntityTrait>(&self, select: Select<E>) -> Select<E> {
        let mut s = select;
        for join in &self.joins {
            s = s.join(JoinType::LeftJoin, (join.def)());
        }
        if let Some(cond) = &self.condition {
            s = s.filter(cond.clone());
        }
        s
    }

    #[must_use]
    pub fn apply<E: EntityTrait>(&self, select: Select<E>) -> Select<E> {
        let mut s = self.apply_filter(select);
        for (col, dir) in &self.order {
            s = s.order_by(SimpleExpr::Column(col.clone()), dir.clone());
        }
        s
    }

    fn add_join(&mut self, relation: &str, def: fn() -> RelationDef) {
        if !self.joins.iter().any(|j| j.relation == relation) {
            self.joins.push(JoinSpec {
                relation: relation.to_owned(),
                def,
            });
        }
    }

    fn note_join<E: EntityTrait>(&mut self, field: &Field<E>, fmap: &FieldMap<E>) -> StoreResult<()> {
        match field.relation() {
            Some(relation) => self.require_relation(fmap, relation),
            None => Ok(()),
        }
    }

    fn expr_to_condition<E: EntityTrait>(
        &mut self,
        expr: &ast::Expr,
        fmap: &FieldMap<E>,
    ) -> StoreResult<Condition> {
        use ast::Expr as X;

        Ok(match expr {
            X::And(a, b) => {
                let left = self.expr_to_condition(a, fmap)?;
                let right = self.expr_to_condition(b, fmap)?;
                Condition::all().add(left).add(right)
            }
            X::Or(a, b) => {
                let left = self.expr_to_condition(a, fmap)?;
                let right = self.expr_to_condition(b, fmap)?;
                Condition::any().add(left).add(right)
            }
            X::Not(x) => {
                let inner = self.expr_to_condition(x, fmap)?;
                Condition::all().add(inner).not()
            }

            X::Compare(lhs, op, rhs) => {
                let X::Identifier(name) = &**lhs else {
                    return Err(StoreError::invalid_argument(
                        "comparison must have a field on the left",
                    ));
                };
                let field = fmap.resolve(name)?;
                self.note_join(field, fmap)?;
                let col = Expr::col(field.column_ref());

                match &**rhs {
                    X::Value(ast::Value::Null) => match op {
                        CompareOperator::Eq => Condition::all().add(col.is_null()),
                        CompareOperator::Ne => Condition::all().add(col.is_not_null()),
                        _ => {
                            return Err(StoreError::invalid_argument(format!(
                                "operator '{}' cannot compare '{name}' with null",
                                op.as_str()
                            )));
                        }
                    },
                    X::Value(v) => {
                        let value = coerce(name, field.kind, v)?;
                        Condition::all().add(compare(col, *op, value))
                    }
                    X::Identifier(other) => {
                        let other_field = fmap.resolve(other)?;
                        if other_field.kind != field.kind {
                            return Err(StoreError::invalid_argument(format!(
                                "cannot compare '{name}' ({}) with '{other}' ({})",
                                field.kind, other_field.kind
                            )));
                        }
                        self.note_join(other_field, fmap)?;
                        let rhs = Expr::col(other_field.column_ref());
                        Condition::all().add(compare(col, *op, rhs))
                    }
                    _ => {
                        return Err(StoreError::invalid_argument(
                            "right side of a comparison must be a literal or a field",
                        ));
                    }
                }
            }

            X::In(l, list) => {
                let X::Identifier(name) = &**l else {
                    return Err(StoreError::invalid_argument("left side of IN must be a field"));
                };
                let field = fmap.resolve(name)?;
                self.note_join(field, fmap)?;
                let vals = coerce_many(name, field.kind, list)?;
                if vals.is_empty() {
                    // IN () is always false
                    Condition::all().add(Expr::cust("1=0"))
                } else {
                    Condition::all().add(Expr::col(field.column_ref()).is_in(vals))
                }
            }

            // Leaf forms are not valid WHERE by themselves
            X::Identifier(name) => {
                return Err(StoreError::invalid_argument(format!(
                    "bare field '{name}' is not a predicate"
                )));
            }
            X::Value(_) => return Err(StoreError::invalid_argument("bare literal is not a predicate")),
        })
    }
}

fn compare<V: Into<SimpleExpr>>(col: Expr, op: CompareOperator, value: V) -> SimpleExpr {
    match op {
        CompareOperator::Eq => col.eq(value),
        CompareOperator::Ne => col.ne(value),
        CompareOperator::Gt => col.gt(value),
        CompareOperator::Ge => col.gte(value),
        CompareOperator::Lt => col.lt(value),
        CompareOperator::Le => col.lte(value),
    }
}

/* ---------- cursor predicate building ---------- */

/// Lexicographic keyset predicate for `cursor` under `order`.
///
/// Forward, ascending key: `(k0 > v0) OR (k0 = v0 AND k1 > v1) OR ...`;
/// descending keys and backward cursors flip the comparison.
///
/// # Errors
/// `InvalidArgument` when the cursor does not fit the order.
pub fn build_cursor_predicate<E: EntityTrait>(
    cursor: &CursorV1,
    order: &OrderBy,
    fmap: &FieldMap<E>,
) -> StoreResult<Condition> {
    if cursor.k.len() != order.keys().len() {
        return Err(repokit_query::Error::InvalidCursor.into());
    }

    let mut keys = Vec::with_capacity(order.keys().len());
    for (key, raw) in order.keys().iter().zip(&cursor.k) {
        let field = fmap.resolve(&key.field)?;
        let value = parse_cursor_value(field.kind, raw)?;
        keys.push((field.column_ref(), value, key.dir));
    }

    let is_backward = cursor.d == CursorDirection::Backward;
    let mut main_condition = Condition::any();

    for (i, (col, value, dir)) in keys.iter().enumerate() {
        let mut prefix = Condition::all();
        for (prev_col, prev_value, _) in keys.iter().take(i) {
            prefix = prefix.add(Expr::col(prev_col.clone()).eq(prev_value.clone()));
        }
        let ascending = matches!(dir, SortDir::Asc) != is_backward;
        let cmp = if ascending {
            Expr::col(col.clone()).gt(value.clone())
        } else {
            Expr::col(col.clone()).lt(value.clone())
        };
        main_condition = main_condition.add(prefix.add(cmp));
    }

    Ok(main_condition)
}

/// Build a cursor from a model using the effective order and the field map
/// extractors.
///
/// # Errors
/// `InvalidArgument` when a sort key has no cursor extractor.
pub fn build_cursor_for_model<E: EntityTrait>(
    model: &E::Model,
    order: &OrderBy,
    fmap: &FieldMap<E>,
    primary_dir: SortDir,
    filter_hash: Option<String>,
    direction: CursorDirection,
) -> StoreResult<CursorV1> {
    let mut k = Vec::with_capacity(order.keys().len());
    for key in order.keys() {
        let s = fmap.encode_model_key(model, &key.field).ok_or_else(|| {
            StoreError::invalid_argument(format!(
                "field '{}' cannot be used as a cursor key",
                key.field
            ))
        })?;
        k.push(s);
    }
    Ok(CursorV1 {
        k,
        o: primary_dir,
        s: order.to_signed_tokens(),
        f: filter_hash,
        d: direction,
    })
}
