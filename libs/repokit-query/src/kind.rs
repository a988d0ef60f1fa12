//! Logical field kinds shared by the schema layer and the database compiler.

use std::fmt;

use crate::ast::Value;

/// Logical type of a queryable field.
///
/// Drives value validation in [`crate::QueryBuilder::build`] and value
/// coercion when a query is compiled against a concrete store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    I64,
    F64,
    Bool,
    DateTimeUtc,
}

impl FieldKind {
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldKind::I64 | FieldKind::F64)
    }

    /// Whether `value` can be compared against a field of this kind.
    ///
    /// `Null` is accepted for every kind; operator restrictions on null are
    /// checked separately.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null)
            | (FieldKind::String, Value::String(_))
            | (FieldKind::F64, Value::Number(_))
            | (FieldKind::Bool, Value::Bool(_))
            | (FieldKind::DateTimeUtc, Value::DateTime(_)) => true,
            (FieldKind::I64, Value::Number(n)) => n.with_scale(0) == *n,
            _ => false,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::String => "String",
            FieldKind::I64 => "I64",
            FieldKind::F64 => "F64",
            FieldKind::Bool => "Bool",
            FieldKind::DateTimeUtc => "DateTimeUtc",
        };
        f.write_str(name)
    }
}
