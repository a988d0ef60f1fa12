use async_trait::async_trait;
use repokit_db::{DbConnTrait, LockMode, Projection};
use repokit_query::{CursorPage, Example, Page, PageRequest, Query};

use crate::domain::error::DomainError;
use crate::domain::model::{Item, Member, Team, TeamDeletePolicy};
use crate::domain::projections::{MemberDto, MemberProjection};

/// Member persistence and queries.
///
/// Every method runs on the connection or transaction it is given; none of
/// them opens a transaction of its own.
#[async_trait]
pub trait MembersRepository: Send + Sync {
    /// Insert when `member.id` is `None`, overwrite otherwise.
    async fn save<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        member: Member,
    ) -> Result<Member, DomainError>;

    async fn find_by_id<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        id: i64,
    ) -> Result<Option<Member>, DomainError>;

    async fn find_all<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
    ) -> Result<Vec<Member>, DomainError>;

    async fn delete<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        id: i64,
    ) -> Result<bool, DomainError>;

    async fn count<C: DbConnTrait + Send + Sync>(&self, conn: &C) -> Result<u64, DomainError>;

    /// Write `member` only if its `version` is still current; the stored
    /// version is bumped by one.
    async fn update_versioned<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        member: Member,
    ) -> Result<Member, DomainError>;

    /// Every member matching `query`'s filter, in its order.
    async fn search<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        query: &Query,
    ) -> Result<Vec<Member>, DomainError>;

    /// Rows matching `query`, holding only the fields it selected. Joined
    /// names such as `team.name` come back under flattened keys
    /// (`team_name`).
    async fn search_selected<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        query: &Query,
    ) -> Result<Vec<serde_json::Value>, DomainError>;

    /// Offset page over `query`'s filter with a total count.
    async fn find_page<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        query: &Query,
        request: &PageRequest,
    ) -> Result<Page<Member>, DomainError>;

    /// Keyset page; pass the returned cursors back through `query`.
    async fn find_cursor<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        query: &Query,
    ) -> Result<CursorPage<Member>, DomainError>;

    async fn find_by_username<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        username: &str,
    ) -> Result<Vec<Member>, DomainError>;

    async fn find_by_username_and_age_greater_than<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        username: &str,
        age: i64,
    ) -> Result<Vec<Member>, DomainError>;

    /// Exact match on both username and age.
    async fn find_user<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        username: &str,
        age: i64,
    ) -> Result<Vec<Member>, DomainError>;

    async fn find_username_list<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
    ) -> Result<Vec<String>, DomainError>;

    /// Members that belong to a team, with the team's name.
    async fn find_member_dto<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
    ) -> Result<Vec<MemberDto>, DomainError>;

    async fn find_by_names<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        names: &[String],
    ) -> Result<Vec<Member>, DomainError>;

    /// At most one member.
    ///
    /// # Errors
    /// `NonUniqueResult` when more than one member has `username`.
    async fn find_member_by_username<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        username: &str,
    ) -> Result<Option<Member>, DomainError>;

    async fn find_by_age<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        age: i64,
        request: &PageRequest,
    ) -> Result<Page<Member>, DomainError>;

    /// Add one to the age of every member aged `age` or older, in a single
    /// statement. Members loaded before the call are stale afterwards.
    async fn bulk_age_plus<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        age: i64,
    ) -> Result<u64, DomainError>;

    /// Members with their team loaded in the same statement.
    async fn find_entity_graph_by_username<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        username: &str,
    ) -> Result<Vec<(Member, Option<Team>)>, DomainError>;

    async fn find_lock_by_username<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        username: &str,
        mode: LockMode,
    ) -> Result<Vec<Member>, DomainError>;

    async fn find_by_example<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        example: &Example,
    ) -> Result<Vec<Member>, DomainError>;

    /// Members named `username`, shaped as `P`.
    async fn find_projections_by_username<P, C>(
        &self,
        conn: &C,
        username: &str,
    ) -> Result<Vec<P>, DomainError>
    where
        P: Projection + Send,
        C: DbConnTrait + Send + Sync;

    /// Paged listing produced by a hand-written statement.
    async fn find_by_native_projection<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        request: &PageRequest,
    ) -> Result<Page<MemberProjection>, DomainError>;

    /// Members of `team_id`, via the `member.team_id` index.
    async fn find_by_team<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        team_id: i64,
    ) -> Result<Vec<Member>, DomainError>;
}

/// Hand-written queries kept apart from the generated ones.
#[async_trait]
pub trait MemberCustomQueries: Send + Sync {
    async fn find_member_custom<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
    ) -> Result<Vec<Member>, DomainError>;
}

#[async_trait]
pub trait TeamsRepository: Send + Sync {
    async fn save<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        team: Team,
    ) -> Result<Team, DomainError>;

    async fn find_by_id<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        id: i64,
    ) -> Result<Option<Team>, DomainError>;

    async fn find_all<C: DbConnTrait + Send + Sync>(&self, conn: &C)
    -> Result<Vec<Team>, DomainError>;

    async fn count<C: DbConnTrait + Send + Sync>(&self, conn: &C) -> Result<u64, DomainError>;

    /// Delete the team, handling referencing members per `policy`.
    ///
    /// # Errors
    /// `Conflict` under [`TeamDeletePolicy::Restrict`] while members
    /// reference the team.
    async fn delete<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        id: i64,
        policy: TeamDeletePolicy,
    ) -> Result<bool, DomainError>;
}

#[async_trait]
pub trait ItemsRepository: Send + Sync {
    /// Stamps `created_at` when absent.
    async fn save<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        item: Item,
    ) -> Result<Item, DomainError>;

    async fn find_by_id<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        id: i64,
    ) -> Result<Option<Item>, DomainError>;

    async fn count<C: DbConnTrait + Send + Sync>(&self, conn: &C) -> Result<u64, DomainError>;
}
