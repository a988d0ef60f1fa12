//! Queryable fields of a member, including the joined team name.

use repokit_query::{FieldKind, FieldRef, Schema};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum MemberField {
    Id,
    Username,
    Age,
    TeamId,
    Version,
    TeamName,
}

pub struct MemberSchema;

impl Schema for MemberSchema {
    type Field = MemberField;

    const FIELDS: &'static [MemberField] = &[
        MemberField::Id,
        MemberField::Username,
        MemberField::Age,
        MemberField::TeamId,
        MemberField::Version,
        MemberField::TeamName,
    ];

    fn field_name(field: MemberField) -> &'static str {
        match field {
            MemberField::Id => "id",
            MemberField::Username => "username",
            MemberField::Age => "age",
            MemberField::TeamId => "team_id",
            MemberField::Version => "version",
            MemberField::TeamName => "team.name",
        }
    }

    fn field_kind(field: MemberField) -> FieldKind {
        match field {
            MemberField::Id | MemberField::Age | MemberField::TeamId | MemberField::Version => {
                FieldKind::I64
            }
            MemberField::Username | MemberField::TeamName => FieldKind::String,
        }
    }
}

pub struct MemberFields;

impl MemberFields {
    pub const ID: FieldRef<MemberSchema, i64> = FieldRef::new(MemberField::Id);
    pub const USERNAME: FieldRef<MemberSchema, String> = FieldRef::new(MemberField::Username);
    pub const AGE: FieldRef<MemberSchema, i64> = FieldRef::new(MemberField::Age);
    pub const TEAM_ID: FieldRef<MemberSchema, i64> = FieldRef::new(MemberField::TeamId);
    pub const VERSION: FieldRef<MemberSchema, i64> = FieldRef::new(MemberField::Version);
    pub const TEAM_NAME: FieldRef<MemberSchema, String> = FieldRef::new(MemberField::TeamName);
}
