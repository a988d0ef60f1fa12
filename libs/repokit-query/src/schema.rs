//! Schema abstraction for type-safe query building.
//!
//! - [`Schema`] declares the queryable fields of one record type, with their
//!   API names and logical kinds.
//! - [`FieldRef`] binds a field to a Rust type so predicates are checked at
//!   compile time.
//! - [`validate_expr`] / [`validate_order`] re-check name-based input against
//!   the schema and are what [`crate::QueryBuilder::build`] runs.

use std::marker::PhantomData;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

use crate::ast::{CompareOperator, Expr, Value};
use crate::{Error, FieldKind, OrderBy};

/// Field catalogue of one queryable record type.
///
/// Related-entity fields reachable through one join are declared with a
/// dotted name such as `team.name`.
///
/// ```rust,ignore
/// #[derive(Copy, Clone, Eq, PartialEq, Debug)]
/// enum MemberField { Id, Username }
///
/// struct MemberSchema;
///
/// impl Schema for MemberSchema {
///     type Field = MemberField;
///     const FIELDS: &'static [MemberField] = &[MemberField::Id, MemberField::Username];
///
///     fn field_name(field: MemberField) -> &'static str {
///         match field {
///             MemberField::Id => "id",
///             MemberField::Username => "username",
///         }
///     }
///
///     fn field_kind(field: MemberField) -> FieldKind {
///         match field {
///             MemberField::Id => FieldKind::I64,
///             MemberField::Username => FieldKind::String,
///         }
///     }
/// }
/// ```
pub trait Schema {
    type Field: Copy + Eq + std::fmt::Debug + 'static;

    const FIELDS: &'static [Self::Field];

    fn field_name(field: Self::Field) -> &'static str;

    fn field_kind(field: Self::Field) -> FieldKind;

    /// Resolve an API name. Matching is ASCII case-insensitive.
    fn resolve(name: &str) -> Option<Self::Field> {
        Self::FIELDS
            .iter()
            .copied()
            .find(|f| Self::field_name(*f).eq_ignore_ascii_case(name))
    }
}

/// Typed reference to a schema field.
///
/// Equality and hashing only look at the schema field; `T` is a phantom used
/// to restrict which values the predicate helpers accept.
pub struct FieldRef<S: Schema, T> {
    field: S::Field,
    _phantom: PhantomData<fn() -> (S, T)>,
}

impl<S: Schema, T> FieldRef<S, T> {
    #[must_use]
    pub const fn new(field: S::Field) -> Self {
        Self {
            field,
            _phantom: PhantomData,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        S::field_name(self.field)
    }

    #[must_use]
    pub fn field(&self) -> S::Field {
        self.field
    }

    fn identifier(self) -> Box<Expr> {
        Box::new(Expr::Identifier(self.name().to_owned()))
    }

    fn compare(self, op: CompareOperator, value: Value) -> Expr {
        Expr::Compare(self.identifier(), op, Box::new(Expr::Value(value)))
    }
}

impl<S: Schema, T> Clone for FieldRef<S, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Schema, T> Copy for FieldRef<S, T> {}

impl<S: Schema, T> std::fmt::Debug for FieldRef<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FieldRef").field(&self.name()).finish()
    }
}

impl<S: Schema, T> PartialEq for FieldRef<S, T> {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field
    }
}

impl<S: Schema, T> Eq for FieldRef<S, T> {}

/// Lets heterogeneous `FieldRef`s be passed to `order_by` / `select`.
#[doc(hidden)]
pub trait AsFieldName {
    fn as_field_name(&self) -> &'static str;
}

impl<S: Schema, T> AsFieldName for FieldRef<S, T> {
    fn as_field_name(&self) -> &'static str {
        self.name()
    }
}

impl<A: AsFieldName + ?Sized> AsFieldName for &A {
    fn as_field_name(&self) -> &'static str {
        (*self).as_field_name()
    }
}

/// Conversion of Rust literals into AST values.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::String(self.to_owned())
    }
}

impl IntoValue for &String {
    fn into_value(self) -> Value {
        Value::String(self.clone())
    }
}

macro_rules! number_into_value {
    ($($t:ty),*) => {
        $(
            impl IntoValue for $t {
                fn into_value(self) -> Value {
                    Value::Number(BigDecimal::from(self))
                }
            }
        )*
    };
}

number_into_value!(i32, i64, u32, u64);

impl IntoValue for BigDecimal {
    fn into_value(self) -> Value {
        Value::Number(self)
    }
}

impl IntoValue for DateTime<Utc> {
    fn into_value(self) -> Value {
        Value::DateTime(self)
    }
}

impl<V: IntoValue> IntoValue for Option<V> {
    fn into_value(self) -> Value {
        self.map_or(Value::Null, IntoValue::into_value)
    }
}

impl<S: Schema, T> FieldRef<S, T> {
    #[must_use]
    pub fn eq<V: IntoValue>(self, value: V) -> Expr {
        self.compare(CompareOperator::Eq, value.into_value())
    }

    #[must_use]
    pub fn ne<V: IntoValue>(self, value: V) -> Expr {
        self.compare(CompareOperator::Ne, value.into_value())
    }

    #[must_use]
    pub fn gt<V: IntoValue>(self, value: V) -> Expr {
        self.compare(CompareOperator::Gt, value.into_value())
    }

    #[must_use]
    pub fn ge<V: IntoValue>(self, value: V) -> Expr {
        self.compare(CompareOperator::Ge, value.into_value())
    }

    #[must_use]
    pub fn lt<V: IntoValue>(self, value: V) -> Expr {
        self.compare(CompareOperator::Lt, value.into_value())
    }

    #[must_use]
    pub fn le<V: IntoValue>(self, value: V) -> Expr {
        self.compare(CompareOperator::Le, value.into_value())
    }

    #[must_use]
    pub fn is_in<I, V>(self, values: I) -> Expr
    where
        I: IntoIterator<Item = V>,
        V: IntoValue,
    {
        Expr::is_in(self.name(), values)
    }

    #[must_use]
    pub fn is_null(self) -> Expr {
        self.compare(CompareOperator::Eq, Value::Null)
    }

    #[must_use]
    pub fn is_not_null(self) -> Expr {
        self.compare(CompareOperator::Ne, Value::Null)
    }

    /// Compare against another field of the same schema and Rust type.
    #[must_use]
    pub fn cmp_field(self, op: CompareOperator, other: FieldRef<S, T>) -> Expr {
        Expr::compare_fields(self.name(), op, other.name())
    }
}

fn resolve<S: Schema>(name: &str) -> Result<S::Field, Error> {
    S::resolve(name).ok_or_else(|| Error::InvalidField(name.to_owned()))
}

fn check_value<S: Schema>(name: &str, field: S::Field, value: &Value) -> Result<(), Error> {
    let expected = S::field_kind(field);
    if expected.accepts(value) {
        Ok(())
    } else {
        Err(Error::TypeMismatch {
            field: name.to_owned(),
            expected,
            got: value.kind_name(),
        })
    }
}

/// Check every identifier and literal in `expr` against schema `S`.
///
/// # Errors
/// - `InvalidField` for names `S` does not declare
/// - `TypeMismatch` for literals of the wrong kind
/// - `InvalidArgument` for shapes that cannot be executed (bare literals,
///   ordering comparisons against null, null inside `in`)
pub fn validate_expr<S: Schema>(expr: &Expr) -> Result<(), Error> {
    match expr {
        Expr::And(a, b) | Expr::Or(a, b) => {
            validate_expr::<S>(a)?;
            validate_expr::<S>(b)
        }
        Expr::Not(x) => validate_expr::<S>(x),
        Expr::Compare(lhs, op, rhs) => match (&**lhs, &**rhs) {
            (Expr::Identifier(name), Expr::Value(value)) => {
                let field = resolve::<S>(name)?;
                if matches!(value, Value::Null)
                    && !matches!(op, CompareOperator::Eq | CompareOperator::Ne)
                {
                    return Err(Error::invalid_argument(format!(
                        "operator '{}' cannot compare '{name}' with null",
                        op.as_str()
                    )));
                }
                check_value::<S>(name, field, value)
            }
            (Expr::Identifier(left), Expr::Identifier(right)) => {
                let l = S::field_kind(resolve::<S>(left)?);
                let r = S::field_kind(resolve::<S>(right)?);
                if l == r {
                    Ok(())
                } else {
                    Err(Error::invalid_argument(format!(
                        "cannot compare '{left}' ({l}) with '{right}' ({r})"
                    )))
                }
            }
            _ => Err(Error::invalid_argument(
                "comparison must have a field on the left",
            )),
        },
        Expr::In(lhs, list) => {
            let Expr::Identifier(name) = &**lhs else {
                return Err(Error::invalid_argument("left side of IN must be a field"));
            };
            let field = resolve::<S>(name)?;
            for item in list {
                match item {
                    Expr::Value(Value::Null) => {
                        return Err(Error::invalid_argument(format!(
                            "IN list for '{name}' cannot contain null"
                        )));
                    }
                    Expr::Value(v) => check_value::<S>(name, field, v)?,
                    _ => {
                        return Err(Error::invalid_argument(
                            "IN list supports only literals",
                        ));
                    }
                }
            }
            Ok(())
        }
        Expr::Identifier(name) => Err(Error::invalid_argument(format!(
            "bare field '{name}' is not a predicate"
        ))),
        Expr::Value(_) => Err(Error::invalid_argument("bare literal is not a predicate")),
    }
}

/// Check every sort key against schema `S`.
///
/// # Errors
/// `InvalidField` for the first unknown key.
pub fn validate_order<S: Schema>(order: &OrderBy) -> Result<(), Error> {
    order
        .keys()
        .iter()
        .try_for_each(|k| resolve::<S>(&k.field).map(|_| ()))
}
