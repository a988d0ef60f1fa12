//! Compilation of `repokit_query` queries into `SeaORM` selects.
//!
//! The `FieldMap` is the database-side mirror of a `repokit_query::Schema`:
//! every name a query may reference must be mapped here, either onto a column
//! of the root entity or onto a column of a registered relation.

mod compile;
mod field_map;

pub use compile::{
    build_cursor_for_model, build_cursor_predicate, coerce, parse_cursor_value, QueryPlan,
};
pub use field_map::{CursorExtractor, Field, FieldMap, FieldTarget, RelationSpec};
