//! Domain records. Relations are plain foreign-key ids; a team's members are
//! looked up through the indexed `member.team_id` column.

use chrono::{DateTime, Utc};

/// A member of at most one team.
///
/// Once persisted, equality is identity: two members with the same `id` are
/// equal whatever their other fields hold. Unsaved members compare field by
/// field.
#[derive(Clone, Debug)]
pub struct Member {
    pub id: Option<i64>,
    pub username: String,
    pub age: i64,
    pub team_id: Option<i64>,
    pub version: i64,
}

impl Member {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
            age: 0,
            team_id: None,
            version: 0,
        }
    }

    #[must_use]
    pub fn with_age(mut self, age: i64) -> Self {
        self.age = age;
        self
    }

    #[must_use]
    pub fn with_team(mut self, team_id: i64) -> Self {
        self.team_id = Some(team_id);
        self
    }

    /// Move this member to `team`. The team must already be saved.
    pub fn change_team(&mut self, team: &Team) {
        self.team_id = team.id;
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            _ => {
                self.id == other.id
                    && self.username == other.username
                    && self.age == other.age
                    && self.team_id == other.team_id
                    && self.version == other.version
            }
        }
    }
}

impl Eq for Member {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Team {
    pub id: Option<i64>,
    pub name: String,
}

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

/// Audited record; `created_at` is stamped on first save when absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Item {
    pub id: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Item {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// What deleting a team does to the members that still reference it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TeamDeletePolicy {
    /// Refuse with `Conflict` while any member references the team.
    #[default]
    Restrict,
    /// Set `team_id` to null on every referencing member, then delete the
    /// team. No member rows are removed.
    Detach,
}
