use std::sync::Arc;

use anyhow::Context;
use repokit_db::{DbHandle, RepoConfig};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::domain::service::MembersService;
use crate::infra::storage::migrations::Migrator;
use crate::infra::storage::{SeaItemsRepository, SeaMembersRepository, SeaTeamsRepository};

pub type DefaultMembersService = MembersService<SeaMembersRepository, SeaTeamsRepository>;

/// Wires the database, schema and repositories together.
pub struct MembersModule {
    db: Arc<DbHandle>,
    members: Arc<SeaMembersRepository>,
    items: Arc<SeaItemsRepository>,
    service: DefaultMembersService,
}

impl MembersModule {
    /// Connect, migrate and build the repositories.
    ///
    /// # Errors
    /// Returns an error when the database is unreachable or a migration fails.
    pub async fn init(config: &RepoConfig) -> anyhow::Result<Self> {
        info!("Initializing members module");

        let db = DbHandle::connect(&config.database)
            .await
            .context("failed to connect to the members database")?;
        Self::migrate(&db).await?;

        let db = Arc::new(db);
        let members = Arc::new(SeaMembersRepository::new(config.store.clone())?);
        let teams = Arc::new(SeaTeamsRepository::new(&config.store));
        let items = Arc::new(SeaItemsRepository::new(&config.store));
        let service = MembersService::new(Arc::clone(&db), Arc::clone(&members), teams);

        info!("Members module initialized");
        Ok(Self {
            db,
            members,
            items,
            service,
        })
    }

    /// # Errors
    /// Returns an error when a migration fails.
    pub async fn migrate(db: &DbHandle) -> anyhow::Result<()> {
        info!("Running members database migrations");
        Migrator::up(db.conn(), None)
            .await
            .context("members migrations failed")?;
        info!("Members database migrations completed");
        Ok(())
    }

    #[must_use]
    pub fn db(&self) -> &DbHandle {
        &self.db
    }

    #[must_use]
    pub fn members(&self) -> &SeaMembersRepository {
        &self.members
    }

    #[must_use]
    pub fn items(&self) -> &SeaItemsRepository {
        &self.items
    }

    #[must_use]
    pub fn service(&self) -> &DefaultMembersService {
        &self.service
    }
}
