//! Model <-> domain conversions and the member field map.

use repokit_db::RecordMapping;
use repokit_db::StoreResult;
use repokit_db::query::FieldMap;
use repokit_query::FieldKind;
use sea_orm::{ActiveValue, RelationTrait, Set};

use super::entity::{item, member, team};
use crate::domain::model::{Item, Member, Team};

impl From<member::Model> for Member {
    fn from(m: member::Model) -> Self {
        Self {
            id: Some(m.id),
            username: m.username,
            age: m.age,
            team_id: m.team_id,
            version: m.version,
        }
    }
}

impl From<team::Model> for Team {
    fn from(m: team::Model) -> Self {
        Self {
            id: Some(m.id),
            name: m.name,
        }
    }
}

impl From<item::Model> for Item {
    fn from(m: item::Model) -> Self {
        Self {
            id: Some(m.id),
            created_at: Some(m.created_at),
        }
    }
}

pub struct MemberMapping;

impl RecordMapping for MemberMapping {
    type Entity = member::Entity;
    type Record = Member;

    const NAME: &'static str = "member";

    fn id_column() -> member::Column {
        member::Column::Id
    }

    fn version_column() -> Option<member::Column> {
        Some(member::Column::Version)
    }

    fn record_id(record: &Member) -> Option<i64> {
        record.id
    }

    fn record_version(record: &Member) -> Option<i64> {
        Some(record.version)
    }

    fn from_model(m: member::Model) -> Member {
        m.into()
    }

    fn into_active_model(r: Member) -> member::ActiveModel {
        member::ActiveModel {
            id: r.id.map_or(ActiveValue::NotSet, Set),
            username: Set(r.username),
            age: Set(r.age),
            team_id: Set(r.team_id),
            version: Set(r.version),
        }
    }
}

pub struct TeamMapping;

impl RecordMapping for TeamMapping {
    type Entity = team::Entity;
    type Record = Team;

    const NAME: &'static str = "team";

    fn id_column() -> team::Column {
        team::Column::Id
    }

    fn record_id(record: &Team) -> Option<i64> {
        record.id
    }

    fn from_model(m: team::Model) -> Team {
        m.into()
    }

    fn into_active_model(r: Team) -> team::ActiveModel {
        team::ActiveModel {
            id: r.id.map_or(ActiveValue::NotSet, Set),
            name: Set(r.name),
        }
    }
}

pub struct ItemMapping;

impl RecordMapping for ItemMapping {
    type Entity = item::Entity;
    type Record = Item;

    const NAME: &'static str = "item";

    fn id_column() -> item::Column {
        item::Column::Id
    }

    fn record_id(record: &Item) -> Option<i64> {
        record.id
    }

    fn from_model(m: item::Model) -> Item {
        m.into()
    }

    fn into_active_model(r: Item) -> item::ActiveModel {
        item::ActiveModel {
            id: r.id.map_or(ActiveValue::NotSet, Set),
            created_at: r.created_at.map_or(ActiveValue::NotSet, Set),
        }
    }
}

/// Field map for member queries; `team.*` fields join `member.team_id = team.id`.
///
/// # Errors
/// `InvalidField` if a joined field names an unregistered relation.
pub fn member_field_map() -> StoreResult<FieldMap<member::Entity>> {
    FieldMap::<member::Entity>::new()
        .insert_with_extractor("id", member::Column::Id, FieldKind::I64, |m| {
            m.id.to_string()
        })
        .insert_with_extractor(
            "username",
            member::Column::Username,
            FieldKind::String,
            |m| m.username.clone(),
        )
        .insert_with_extractor("age", member::Column::Age, FieldKind::I64, |m| {
            m.age.to_string()
        })
        .insert("team_id", member::Column::TeamId, FieldKind::I64)
        .insert("version", member::Column::Version, FieldKind::I64)
        .relation(
            "team",
            || member::Relation::Team.def(),
            member::Column::TeamId,
            team::Column::Id,
        )
        .insert_joined("team.name", "team", team::Column::Name, FieldKind::String)
}
