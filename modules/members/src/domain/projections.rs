//! Read-only views of members. Each view declares the fields it needs and
//! whether nested team data is joined or fetched per row.

use repokit_db::{FetchStrategy, Projection, ProjectionShape};
use serde::Deserialize;

/// Closed single-column view.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct UsernameOnly {
    pub username: String,
}

impl Projection for UsernameOnly {
    fn shape() -> ProjectionShape {
        ProjectionShape::closed(["username"])
    }
}

/// Same column as [`UsernameOnly`], built as a standalone value object.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct UsernameOnlyDto {
    username: String,
}

impl UsernameOnlyDto {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl Projection for UsernameOnlyDto {
    fn shape() -> ProjectionShape {
        ProjectionShape::closed(["username"])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TeamInfo {
    pub name: String,
}

/// Member username with its team nested one level down; `team` is `None`
/// for members without a team.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NestedClosedProjection {
    pub username: String,
    pub team: Option<TeamInfo>,
}

impl Projection for NestedClosedProjection {
    fn shape() -> ProjectionShape {
        ProjectionShape::closed(["username"]).with_nested("team", ["name"])
    }
}

/// Same shape as [`NestedClosedProjection`], loaded with one extra lookup per
/// member that has a team.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NestedPerRowProjection {
    pub username: String,
    pub team: Option<TeamInfo>,
}

impl Projection for NestedPerRowProjection {
    fn shape() -> ProjectionShape {
        NestedClosedProjection::shape()
    }

    fn strategy() -> FetchStrategy {
        FetchStrategy::PerRowFetch
    }
}

/// Flat member + team name row.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MemberDto {
    pub id: i64,
    pub username: String,
    pub team_name: String,
}

impl Projection for MemberDto {
    fn shape() -> ProjectionShape {
        ProjectionShape::closed(["id", "username", "team.name"])
    }
}

/// Row of the hand-written paged member listing; `team_name` is absent for
/// members without a team.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MemberProjection {
    pub id: i64,
    pub username: String,
    pub team_name: Option<String>,
}
