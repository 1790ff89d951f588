//! Persistence collaborator interface and the in-memory store.
//!
//! The engine never owns durable state. It reads and writes spaces,
//! accounts and treasures through [`Store`] and appends ledger records to
//! it. Each call is individually atomic; the engine provides cross-entity
//! consistency through its own locks.
//!
//! [`MemoryStore`] keeps everything in process behind `tokio` read-write
//! locks and is what tests and the load driver use.

use std::collections::HashMap;
use std::future::Future;

use hbm_ledger::Ledger;
use hbm_types::{LedgerRecord, Space, SpaceId, Treasure, TreasureId, UserAccount, UserId};
use tokio::sync::RwLock;

/// Errors raised by a persistence backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Key-value record store the engine persists through.
pub trait Store: Send + Sync {
    /// Fetch a space by id.
    fn load_space(
        &self,
        id: SpaceId,
    ) -> impl Future<Output = Result<Option<Space>, StoreError>> + Send;

    /// Insert or replace a space.
    fn save_space(&self, space: &Space) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fetch a user account.
    fn load_account(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<UserAccount>, StoreError>> + Send;

    /// Insert or replace a user account.
    fn save_account(
        &self,
        account: &UserAccount,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fetch a treasure by id.
    fn load_treasure(
        &self,
        id: TreasureId,
    ) -> impl Future<Output = Result<Option<Treasure>, StoreError>> + Send;

    /// Insert or replace a treasure.
    fn save_treasure(
        &self,
        treasure: &Treasure,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Append one ledger record. Records are never updated or removed.
    fn append_ledger(
        &self,
        record: &LedgerRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// All ledger records of a user, in append order.
    fn ledger_for(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<LedgerRecord>, StoreError>> + Send;
}

/// In-process [`Store`] backed by hash maps and an in-memory [`Ledger`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    spaces: RwLock<HashMap<SpaceId, Space>>,
    accounts: RwLock<HashMap<UserId, UserAccount>>,
    treasures: RwLock<HashMap<TreasureId, Treasure>>,
    ledger: RwLock<Ledger>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the full ledger, in append order.
    pub async fn ledger_snapshot(&self) -> Ledger {
        self.ledger.read().await.clone()
    }

    /// Number of ledger records appended so far.
    pub async fn ledger_len(&self) -> usize {
        self.ledger.read().await.len()
    }

    /// Number of stored spaces.
    pub async fn space_count(&self) -> usize {
        self.spaces.read().await.len()
    }
}

impl Store for MemoryStore {
    async fn load_space(&self, id: SpaceId) -> Result<Option<Space>, StoreError> {
        Ok(self.spaces.read().await.get(&id).cloned())
    }

    async fn save_space(&self, space: &Space) -> Result<(), StoreError> {
        self.spaces.write().await.insert(space.id, space.clone());
        Ok(())
    }

    async fn load_account(&self, user_id: UserId) -> Result<Option<UserAccount>, StoreError> {
        Ok(self.accounts.read().await.get(&user_id).cloned())
    }

    async fn save_account(&self, account: &UserAccount) -> Result<(), StoreError> {
        self.accounts
            .write()
            .await
            .insert(account.user_id, account.clone());
        Ok(())
    }

    async fn load_treasure(&self, id: TreasureId) -> Result<Option<Treasure>, StoreError> {
        Ok(self.treasures.read().await.get(&id).cloned())
    }

    async fn save_treasure(&self, treasure: &Treasure) -> Result<(), StoreError> {
        self.treasures
            .write()
            .await
            .insert(treasure.id, treasure.clone());
        Ok(())
    }

    async fn append_ledger(&self, record: &LedgerRecord) -> Result<(), StoreError> {
        self.ledger.write().await.append(record.clone());
        Ok(())
    }

    async fn ledger_for(&self, user_id: UserId) -> Result<Vec<LedgerRecord>, StoreError> {
        Ok(self
            .ledger
            .read()
            .await
            .records_by_actor(user_id)
            .into_iter()
            .cloned()
            .collect())
    }
}
