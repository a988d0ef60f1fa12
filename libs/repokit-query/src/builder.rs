//! Typed query builder.
//!
//! Filters added with [`QueryBuilder::filter`] (and the name-based
//! [`QueryBuilder::where_field`] / [`QueryBuilder::where_in`]) form a
//! conjunctive list. Sort keys are applied in the order they are added.
//! [`QueryBuilder::build`] validates everything against the schema, so a bad
//! field name surfaces as [`Error::InvalidField`] before a store sees it.
//!
//! ```rust,ignore
//! let query = QueryBuilder::<MemberSchema>::new()
//!     .filter(USERNAME.eq("AAA"))
//!     .filter(AGE.gt(15))
//!     .order_by(USERNAME, SortDir::Desc)
//!     .build()?;
//! ```

use std::marker::PhantomData;

use crate::ast::{CompareOperator, Expr};
use crate::example::Example;
use crate::schema::{AsFieldName, IntoValue, Schema, validate_expr, validate_order};
use crate::{CursorV1, Error, OrderBy, OrderKey, Query, QueryLimits, SortDir};

pub struct QueryBuilder<S: Schema> {
    predicates: Vec<Expr>,
    order: Vec<OrderKey>,
    select: Option<Vec<&'static str>>,
    limit: Option<u64>,
    cursor: Option<CursorV1>,
    limits: QueryLimits,
    _schema: PhantomData<fn() -> S>,
}

impl<S: Schema> QueryBuilder<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            predicates: Vec::new(),
            order: Vec::new(),
            select: None,
            limit: None,
            cursor: None,
            limits: QueryLimits::default(),
            _schema: PhantomData,
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: QueryLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Add a predicate; all predicates are ANDed.
    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.predicates.push(expr);
        self
    }

    /// Add a `(field, op, value)` predicate addressed by name.
    #[must_use]
    pub fn where_field(self, field: &str, op: CompareOperator, value: impl IntoValue) -> Self {
        self.filter(Expr::compare(field, op, value))
    }

    /// Add a `field in (...)` predicate addressed by name.
    #[must_use]
    pub fn where_in<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: IntoValue,
    {
        self.filter(Expr::is_in(field, values))
    }

    /// Add the equality predicates described by a probe.
    #[must_use]
    pub fn example(self, example: &Example) -> Self {
        match example.to_expr() {
            Some(expr) => self.filter(expr),
            None => self,
        }
    }

    #[must_use]
    pub fn order_by<F: AsFieldName>(mut self, field: F, dir: SortDir) -> Self {
        self.order.push(OrderKey::new(field.as_field_name(), dir));
        self
    }

    /// Add a sort key addressed by name; checked in [`Self::build`].
    #[must_use]
    pub fn order_by_name(mut self, field: &str, dir: SortDir) -> Self {
        self.order.push(OrderKey::new(field, dir));
        self
    }

    #[must_use]
    pub fn select<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsFieldName,
    {
        self.select = Some(fields.into_iter().map(|f| f.as_field_name()).collect());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn cursor(mut self, cursor: CursorV1) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Validate and produce the final [`Query`].
    ///
    /// # Errors
    /// - `InvalidField` when a filter or sort key names an unknown field
    /// - `TypeMismatch` / `InvalidArgument` for ill-typed predicates or too
    ///   many sort keys
    /// - `InvalidLimit` when the limit is zero or above the configured cap
    pub fn build(self) -> Result<Query, Error> {
        for predicate in &self.predicates {
            validate_expr::<S>(predicate)?;
        }

        let order = OrderBy(self.order);
        validate_order::<S>(&order)?;
        self.limits.validate_order_count(order.keys().len())?;

        if let Some(limit) = self.limit {
            self.limits.validate_limit(limit)?;
        }

        let mut query = Query::new().with_order(order);
        if let Some(expr) = Expr::all(self.predicates) {
            self.limits.validate_in_lists(&expr)?;
            query = query.with_filter(expr);
        }
        if let Some(limit) = self.limit {
            query = query.with_limit(limit);
        }
        if let Some(cursor) = self.cursor {
            query = query.with_cursor(cursor);
        }
        if let Some(fields) = self.select {
            query = query.with_select(fields.into_iter().map(str::to_owned).collect());
        }
        Ok(query)
    }
}

impl<S: Schema> Default for QueryBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ast::Value;
    use crate::schema::FieldRef;
    use crate::{ExampleMatcher, FieldKind};

    #[derive(Copy, Clone, Eq, PartialEq, Debug)]
    enum MemberField {
        Id,
        Username,
        Age,
        TeamName,
    }

    struct MemberSchema;

    impl Schema for MemberSchema {
        type Field = MemberField;
        const FIELDS: &'static [MemberField] = &[
            MemberField::Id,
            MemberField::Username,
            MemberField::Age,
            MemberField::TeamName,
        ];

        fn field_name(field: MemberField) -> &'static str {
            match field {
                MemberField::Id => "id",
                MemberField::Username => "username",
                MemberField::Age => "age",
                MemberField::TeamName => "team.name",
            }
        }

        fn field_kind(field: MemberField) -> FieldKind {
            match field {
                MemberField::Id | MemberField::Age => FieldKind::I64,
                MemberField::Username | MemberField::TeamName => FieldKind::String,
            }
        }
    }

    const ID: FieldRef<MemberSchema, i64> = FieldRef::new(MemberField::Id);
    const USERNAME: FieldRef<MemberSchema, String> = FieldRef::new(MemberField::Username);
    const AGE: FieldRef<MemberSchema, i32> = FieldRef::new(MemberField::Age);
    const TEAM_NAME: FieldRef<MemberSchema, String> = FieldRef::new(MemberField::TeamName);

    #[test]
    fn successive_filters_are_anded() {
        let query = QueryBuilder::<MemberSchema>::new()
            .filter(USERNAME.eq("AAA"))
            .filter(AGE.gt(15))
            .build()
            .unwrap();

        let Some(Expr::And(left, right)) = query.filter() else {
            panic!("expected conjunction, got {:?}", query.filter());
        };
        assert_eq!(**left, USERNAME.eq("AAA"));
        assert_eq!(**right, AGE.gt(15));
        assert!(query.filter_hash.is_some());
    }

    #[test]
    fn no_filters_means_no_filter_and_no_hash() {
        let query = QueryBuilder::<MemberSchema>::new().build().unwrap();
        assert!(!query.has_filter());
        assert!(query.filter_hash.is_none());
    }

    #[test]
    fn order_keys_keep_insertion_order() {
        let query = QueryBuilder::<MemberSchema>::new()
            .order_by(USERNAME, SortDir::Desc)
            .order_by(ID, SortDir::Asc)
            .build()
            .unwrap();

        assert_eq!(query.order.to_signed_tokens(), "-username,+id");
    }

    #[test]
    fn unknown_name_fails_at_build() {
        let err = QueryBuilder::<MemberSchema>::new()
            .where_field("nickname", CompareOperator::Eq, "x")
            .build()
            .unwrap_err();
        assert_eq!(err, Error::InvalidField("nickname".to_owned()));

        let err = QueryBuilder::<MemberSchema>::new()
            .order_by_name("salary", SortDir::Asc)
            .build()
            .unwrap_err();
        assert_eq!(err, Error::InvalidField("salary".to_owned()));
    }

    #[test]
    fn joined_fields_are_regular_schema_fields() {
        let query = QueryBuilder::<MemberSchema>::new()
            .filter(TEAM_NAME.eq("teamA"))
            .order_by(TEAM_NAME, SortDir::Asc)
            .build()
            .unwrap();
        assert_eq!(query.filter().unwrap().identifiers(), vec!["team.name"]);
    }

    #[test]
    fn in_list_by_name() {
        let query = QueryBuilder::<MemberSchema>::new()
            .where_in("username", ["AAA", "BBB"])
            .build()
            .unwrap();
        let Some(Expr::In(_, list)) = query.filter() else {
            panic!("expected IN");
        };
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let err = QueryBuilder::<MemberSchema>::new().limit(0).build().unwrap_err();
        assert_eq!(err, Error::InvalidLimit);
    }

    #[test]
    fn too_many_order_keys_are_rejected() {
        let err = QueryBuilder::<MemberSchema>::new()
            .with_limits(QueryLimits::default().with_max_order_fields(1))
            .order_by(USERNAME, SortDir::Asc)
            .order_by(AGE, SortDir::Asc)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn select_keeps_field_names() {
        let query = QueryBuilder::<MemberSchema>::new()
            .select([USERNAME, TEAM_NAME])
            .build()
            .unwrap();
        assert_eq!(
            query.selected_fields().unwrap(),
            &["username".to_owned(), "team.name".to_owned()]
        );
    }

    #[test]
    fn example_probe_joins_the_conjunction() {
        let example = Example::of([
            ("username", Value::String("m1".to_owned())),
            ("age", Value::Number(0.into())),
        ])
        .with_matcher(ExampleMatcher::matching().with_ignore_paths(["age"]));

        let query = QueryBuilder::<MemberSchema>::new()
            .example(&example)
            .build()
            .unwrap();
        assert_eq!(query.filter(), Some(&USERNAME.eq("m1")));
    }
}
