#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use members::{
    Member, MembersRepository, Migrator, SeaItemsRepository, SeaMembersRepository,
    SeaTeamsRepository, Team, TeamsRepository,
};
use repokit_db::{DbConfig, DbHandle, StoreConfig};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fresh in-memory database with the members schema applied.
pub async fn inmem_db() -> Result<Arc<DbHandle>> {
    init_tracing();
    let db = DbHandle::connect(&DbConfig::default()).await?;
    Migrator::up(db.conn(), None).await?;
    Ok(Arc::new(db))
}

pub struct Repos {
    pub members: SeaMembersRepository,
    pub teams: SeaTeamsRepository,
    pub items: SeaItemsRepository,
}

pub fn repos() -> Repos {
    let cfg = StoreConfig::default();
    Repos {
        members: SeaMembersRepository::new(cfg.clone()).expect("member field map"),
        teams: SeaTeamsRepository::new(&cfg),
        items: SeaItemsRepository::new(&cfg),
    }
}

pub async fn save_team(repos: &Repos, conn: &DatabaseConnection, name: &str) -> Team {
    repos.teams.save(conn, Team::new(name)).await.unwrap()
}

pub async fn save_member(
    repos: &Repos,
    conn: &DatabaseConnection,
    username: &str,
    age: i64,
    team: Option<&Team>,
) -> Member {
    let mut member = Member::new(username).with_age(age);
    if let Some(team) = team {
        member.change_team(team);
    }
    repos.members.save(conn, member).await.unwrap()
}

/// teamA: m1 (10), m2 (20); teamB: m3 (30), m4 (40).
pub async fn seed_two_teams(repos: &Repos, conn: &DatabaseConnection) -> (Team, Team) {
    let team_a = save_team(repos, conn, "teamA").await;
    let team_b = save_team(repos, conn, "teamB").await;
    save_member(repos, conn, "m1", 10, Some(&team_a)).await;
    save_member(repos, conn, "m2", 20, Some(&team_a)).await;
    save_member(repos, conn, "m3", 30, Some(&team_b)).await;
    save_member(repos, conn, "m4", 40, Some(&team_b)).await;
    (team_a, team_b)
}

pub fn usernames(members: &[Member]) -> Vec<&str> {
    members.iter().map(|m| m.username.as_str()).collect()
}
