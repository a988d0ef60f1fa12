//! Lock hints for reads.
//!
//! Pessimistic modes become `FOR SHARE` / `FOR UPDATE` on backends that have
//! them; `SeaORM` drops the clause on `SQLite`, where the transaction's write
//! lock already serializes writers. Optimistic locking is a write-side
//! concern handled by [`crate::store::RecordStore::update_versioned`], so it
//! leaves the select untouched.

use sea_orm::{EntityTrait, QuerySelect, Select};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LockMode {
    #[default]
    None,
    Optimistic,
    PessimisticRead,
    PessimisticWrite,
}

impl LockMode {
    #[must_use]
    pub fn is_pessimistic(self) -> bool {
        matches!(self, LockMode::PessimisticRead | LockMode::PessimisticWrite)
    }
}

pub trait LockExt: Sized {
    #[must_use]
    fn with_lock(self, mode: LockMode) -> Self;
}

impl<E: EntityTrait> LockExt for Select<E> {
    fn with_lock(self, mode: LockMode) -> Self {
        match mode {
            LockMode::None | LockMode::Optimistic => self,
            LockMode::PessimisticRead => self.lock_shared(),
            LockMode::PessimisticWrite => self.lock_exclusive(),
        }
    }
}
