use async_trait::async_trait;
use chrono::Utc;
use repokit_db::{DbConnTrait, RecordStore, SeaRecordStore, StoreConfig};

use super::mapper::ItemMapping;
use crate::domain::error::DomainError;
use crate::domain::model::Item;
use crate::domain::repos::ItemsRepository;

#[derive(Clone)]
pub struct SeaItemsRepository {
    store: SeaRecordStore<ItemMapping>,
}

impl SeaItemsRepository {
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            store: SeaRecordStore::new(config),
        }
    }
}

#[async_trait]
impl ItemsRepository for SeaItemsRepository {
    async fn save<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        mut item: Item,
    ) -> Result<Item, DomainError> {
        if item.created_at.is_none() {
            // An overwrite keeps the original creation time.
            let existing = match item.id {
                Some(id) => self.store.find_by_id(conn, id).await?,
                None => None,
            };
            item.created_at = Some(
                existing
                    .and_then(|e| e.created_at)
                    .unwrap_or_else(Utc::now),
            );
        }
        Ok(self.store.save(conn, item).await?)
    }

    async fn find_by_id<C: DbConnTrait + Send + Sync>(
        &self,
        conn: &C,
        id: i64,
    ) -> Result<Option<Item>, DomainError> {
        Ok(self.store.find_by_id(conn, id).await?)
    }

    async fn count<C: DbConnTrait + Send + Sync>(&self, conn: &C) -> Result<u64, DomainError> {
        Ok(self.store.count(conn).await?)
    }
}
