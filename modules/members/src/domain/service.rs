use std::sync::Arc;

use repokit_db::{DbHandle, LockMode, TxConfig};
use repokit_query::{Page, PageRequest, Query};
use tracing::{debug, info, instrument};

use crate::domain::error::DomainError;
use crate::domain::model::{Member, Team, TeamDeletePolicy};
use crate::domain::repos::{MembersRepository, TeamsRepository};

/// Multi-step member and team operations, each in its own transaction.
pub struct MembersService<M: MembersRepository, T: TeamsRepository> {
    db: Arc<DbHandle>,
    members: Arc<M>,
    teams: Arc<T>,
}

impl<M: MembersRepository, T: TeamsRepository> Clone for MembersService<M, T> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            members: Arc::clone(&self.members),
            teams: Arc::clone(&self.teams),
        }
    }
}

impl<M, T> MembersService<M, T>
where
    M: MembersRepository + 'static,
    T: TeamsRepository + 'static,
{
    pub fn new(db: Arc<DbHandle>, members: Arc<M>, teams: Arc<T>) -> Self {
        Self { db, members, teams }
    }

    /// Save `team`, then every member of `roster` assigned to it. Nothing is
    /// kept if any save fails.
    ///
    /// # Errors
    /// Store failures of any step.
    #[instrument(skip(self, roster), fields(roster = roster.len()))]
    pub async fn register_team(
        &self,
        team: Team,
        roster: Vec<Member>,
    ) -> Result<(Team, Vec<Member>), DomainError> {
        let members = Arc::clone(&self.members);
        let teams = Arc::clone(&self.teams);

        let (team, saved) = self
            .db
            .transaction(TxConfig::default(), |tx| {
                Box::pin(async move {
                    let team = teams.save(tx, team).await?;
                    let mut saved = Vec::with_capacity(roster.len());
                    for mut member in roster {
                        member.change_team(&team);
                        saved.push(members.save(tx, member).await?);
                    }
                    Ok::<_, DomainError>((team, saved))
                })
            })
            .await?;

        info!(team_id = ?team.id, members = saved.len(), "team registered");
        Ok((team, saved))
    }

    /// # Errors
    /// `Conflict` under [`TeamDeletePolicy::Restrict`] while members still
    /// reference the team.
    #[instrument(skip(self))]
    pub async fn delete_team(&self, id: i64, policy: TeamDeletePolicy) -> Result<bool, DomainError> {
        let teams = Arc::clone(&self.teams);
        let deleted = self
            .db
            .transaction(TxConfig::default(), |tx| {
                Box::pin(async move { teams.delete(tx, id, policy).await })
            })
            .await?;
        Ok(deleted)
    }

    /// Move the member called `username` to `team_id`, holding a write lock on
    /// the member row and checking its version on write.
    ///
    /// # Errors
    /// `NotFound` for an unknown member or team, `NonUniqueResult` when the
    /// username is ambiguous, `Conflict` on a concurrent update.
    #[instrument(skip(self))]
    pub async fn transfer_member(&self, username: &str, team_id: i64) -> Result<Member, DomainError> {
        let members = Arc::clone(&self.members);
        let teams = Arc::clone(&self.teams);
        let username = username.to_owned();

        let moved = self
            .db
            .transaction(TxConfig::default(), |tx| {
                Box::pin(async move {
                    let team = teams
                        .find_by_id(tx, team_id)
                        .await?
                        .ok_or_else(|| DomainError::not_found("team", team_id))?;
                    let mut locked = members
                        .find_lock_by_username(tx, &username, LockMode::PessimisticWrite)
                        .await?;
                    if locked.len() > 1 {
                        return Err(DomainError::NonUniqueResult {
                            count: locked.len(),
                        });
                    }
                    let mut member = locked.pop().ok_or_else(|| DomainError::NotFound {
                        entity: "member",
                        id: username.clone(),
                    })?;
                    member.change_team(&team);
                    members.update_versioned(tx, member).await
                })
            })
            .await?;

        debug!(member_id = ?moved.id, team_id, "member transferred");
        Ok(moved)
    }

    /// Rename a member, failing when `expected_version` is stale.
    ///
    /// # Errors
    /// `NotFound` for an unknown id, `Conflict` when the stored version moved on.
    #[instrument(skip(self))]
    pub async fn rename_member(
        &self,
        id: i64,
        expected_version: i64,
        username: &str,
    ) -> Result<Member, DomainError> {
        let conn = self.db.conn();
        let mut member = self
            .members
            .find_by_id(conn, id)
            .await?
            .ok_or_else(|| DomainError::not_found("member", id))?;
        member.username = username.to_owned();
        member.version = expected_version;
        self.members.update_versioned(conn, member).await
    }

    /// Add one year to every member aged `from_age` or more.
    ///
    /// # Errors
    /// Store failures.
    #[instrument(skip(self))]
    pub async fn raise_ages(&self, from_age: i64) -> Result<u64, DomainError> {
        let affected = self.members.bulk_age_plus(self.db.conn(), from_age).await?;
        info!(affected, from_age, "ages raised");
        Ok(affected)
    }

    /// # Errors
    /// `NotFound` when nobody has `username`, `NonUniqueResult` when several do.
    pub async fn member_by_username(&self, username: &str) -> Result<Member, DomainError> {
        self.members
            .find_member_by_username(self.db.conn(), username)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "member",
                id: username.to_owned(),
            })
    }

    /// Members of a team, found through the team id index.
    ///
    /// # Errors
    /// `NotFound` for an unknown team.
    pub async fn team_members(&self, team_id: i64) -> Result<Vec<Member>, DomainError> {
        let conn = self.db.conn();
        if self.teams.find_by_id(conn, team_id).await?.is_none() {
            return Err(DomainError::not_found("team", team_id));
        }
        self.members.find_by_team(conn, team_id).await
    }

    /// # Errors
    /// Validation and store failures of the query.
    pub async fn list_members(
        &self,
        query: &Query,
        request: &PageRequest,
    ) -> Result<Page<Member>, DomainError> {
        let page = self
            .members
            .find_page(self.db.conn(), query, request)
            .await?;
        debug!(
            total = page.total_elements,
            returned = page.number_of_elements(),
            "listed members"
        );
        Ok(page)
    }
}
