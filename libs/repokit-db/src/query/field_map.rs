use std::collections::HashMap;

use repokit_query::FieldKind;
use sea_orm::sea_query::{ColumnRef, DynIden, IntoColumnRef};
use sea_orm::{ColumnTrait, EntityTrait, RelationDef};

use crate::error::{StoreError, StoreResult};

/// Type alias for cursor extraction function to reduce type complexity
pub type CursorExtractor<E> = fn(&<E as EntityTrait>::Model) -> String;

/// Where a mapped field lives.
#[derive(Clone)]
pub enum FieldTarget<E: EntityTrait> {
    /// A column of the root entity.
    Column(E::Column),
    /// A column reached through a registered many-to-one relation.
    Joined { relation: String, column: ColumnRef },
}

#[derive(Clone)]
pub struct Field<E: EntityTrait> {
    pub target: FieldTarget<E>,
    pub kind: FieldKind,
    pub to_string_for_cursor: Option<CursorExtractor<E>>,
}

impl<E: EntityTrait> Field<E> {
    /// Table-qualified column reference, safe to use when joins are present.
    #[must_use]
    pub fn column_ref(&self) -> ColumnRef {
        match &self.target {
            FieldTarget::Column(col) => (col.entity_name(), *col).into_column_ref(),
            FieldTarget::Joined { column, .. } => column.clone(),
        }
    }

    #[must_use]
    pub fn own_column(&self) -> Option<E::Column> {
        match self.target {
            FieldTarget::Column(col) => Some(col),
            FieldTarget::Joined { .. } => None,
        }
    }

    #[must_use]
    pub fn relation(&self) -> Option<&str> {
        match &self.target {
            FieldTarget::Column(_) => None,
            FieldTarget::Joined { relation, .. } => Some(relation),
        }
    }
}

/// A many-to-one relation with an explicit join condition.
///
/// `def` yields `root.fk = target.pk`; `fk` and `target_pk` are kept apart so
/// per-row fetches can look the target up without a join.
#[derive(Clone)]
pub struct RelationSpec<E: EntityTrait> {
    pub def: fn() -> RelationDef,
    pub fk: E::Column,
    pub target: DynIden,
    pub target_pk: ColumnRef,
}

impl<E: EntityTrait> RelationSpec<E> {
    #[must_use]
    pub fn fk_ref(&self) -> ColumnRef {
        (self.fk.entity_name(), self.fk).into_column_ref()
    }
}

/// API field names mapped onto columns of `E` and of its related tables.
///
/// Names are matched case-insensitively. Joined fields use dotted names,
/// e.g. `team.name`.
#[derive(Clone)]
#[must_use]
pub struct FieldMap<E: EntityTrait> {
    map: HashMap<String, Field<E>>,
    relations: HashMap<String, RelationSpec<E>>,
}

impl<E: EntityTrait> Default for FieldMap<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntityTrait> FieldMap<E> {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            relations: HashMap::new(),
        }
    }

    pub fn insert(self, api_name: impl Into<String>, col: E::Column, kind: FieldKind) -> Self {
        self.put(api_name.into(), FieldTarget::Column(col), kind, None)
    }

    pub fn insert_with_extractor(
        self,
        api_name: impl Into<String>,
        col: E::Column,
        kind: FieldKind,
        to_string_for_cursor: CursorExtractor<E>,
    ) -> Self {
        self.put(
            api_name.into(),
            FieldTarget::Column(col),
            kind,
            Some(to_string_for_cursor),
        )
    }

    /// Register a relation reachable from `E` through the foreign key `fk`.
    pub fn relation<C: ColumnTrait>(
        mut self,
        name: impl Into<String>,
        def: fn() -> RelationDef,
        fk: E::Column,
        target_pk: C,
    ) -> Self {
        self.relations.insert(
            name.into().to_lowercase(),
            RelationSpec {
                def,
                fk,
                target: target_pk.entity_name(),
                target_pk: (target_pk.entity_name(), target_pk).into_column_ref(),
            },
        );
        self
    }

    /// Map `api_name` onto `col` of the table behind `relation`.
    ///
    /// The relation must be registered first.
    ///
    /// # Errors
    /// `InvalidField` when `relation` is unknown.
    pub fn insert_joined<C: ColumnTrait>(
        self,
        api_name: impl Into<String>,
        relation: &str,
        col: C,
        kind: FieldKind,
    ) -> StoreResult<Self> {
        let relation = relation.to_lowercase();
        if !self.relations.contains_key(&relation) {
            return Err(StoreError::InvalidField(relation));
        }
        let column = (col.entity_name(), col).into_column_ref();
        Ok(self.put(
            api_name.into(),
            FieldTarget::Joined { relation, column },
            kind,
            None,
        ))
    }

    fn put(
        mut self,
        api_name: String,
        target: FieldTarget<E>,
        kind: FieldKind,
        to_string_for_cursor: Option<CursorExtractor<E>>,
    ) -> Self {
        self.map.insert(
            api_name.to_lowercase(),
            Field {
                target,
                kind,
                to_string_for_cursor,
            },
        );
        self
    }

    pub fn encode_model_key(&self, model: &E::Model, field_name: &str) -> Option<String> {
        let f = self.get(field_name)?;
        f.to_string_for_cursor.map(|f| f(model))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Field<E>> {
        self.map.get(&name.to_lowercase())
    }

    /// # Errors
    /// `InvalidField` when the name is not mapped.
    pub fn resolve(&self, name: &str) -> StoreResult<&Field<E>> {
        self.get(name)
            .ok_or_else(|| StoreError::InvalidField(name.to_owned()))
    }

    #[must_use]
    pub fn relation_spec(&self, name: &str) -> Option<&RelationSpec<E>> {
        self.relations.get(&name.to_lowercase())
    }

    /// # Errors
    /// `InvalidField` when no relation is registered under `name`.
    pub fn resolve_relation(&self, name: &str) -> StoreResult<&RelationSpec<E>> {
        self.relation_spec(name)
            .ok_or_else(|| StoreError::InvalidField(name.to_owned()))
    }
}
