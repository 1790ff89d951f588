//! Fixtures shared by the engine integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use hbm_core::{CreateSpace, EngineConfig, GameEngine, MemoryStore, Store, StoreError};
use hbm_types::{LedgerRecord, Space, SpaceId, Treasure, TreasureId, UserAccount, UserId};

/// An engine over a fresh in-memory store with default tuning.
pub fn engine() -> GameEngine<MemoryStore> {
    GameEngine::new(MemoryStore::new(), EngineConfig::default())
}

/// Open an account for a new user.
pub async fn open_user<S: Store>(engine: &GameEngine<S>) -> UserId {
    let user = UserId::new();
    engine.open_account(user).await.expect("open account");
    user
}

/// Create a space owned by `creator`.
pub async fn open_space<S: Store>(
    engine: &GameEngine<S>,
    creator: UserId,
    initial_stability: Option<i64>,
) -> SpaceId {
    engine
        .create_space(CreateSpace {
            creator_id: creator,
            title: "Quiet Archive".to_owned(),
            content: "dust and shelves".to_owned(),
            initial_stability,
            ..CreateSpace::default()
        })
        .await
        .expect("create space")
        .id
}

/// Stored account of `user`.
pub async fn account<S: Store>(engine: &GameEngine<S>, user: UserId) -> UserAccount {
    engine
        .store()
        .load_account(user)
        .await
        .expect("load account")
        .expect("account exists")
}

/// A [`MemoryStore`] with switchable write failures, an optional budget
/// of ledger appends and an optional delay on space writes.
#[derive(Debug, Default)]
pub struct FailingStore {
    pub inner: MemoryStore,
    pub fail_append: AtomicBool,
    pub fail_save_space: AtomicBool,
    pub fail_save_treasure: AtomicBool,
    pub save_space_delay_ms: AtomicU64,
    append_budget: Mutex<Option<u64>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `count` more ledger appends succeed, then fail every one after.
    pub fn limit_appends(&self, count: u64) {
        *self.append_budget.lock().unwrap() = Some(count);
    }

    fn spend_append(&self) -> Result<(), StoreError> {
        let mut budget = self.append_budget.lock().unwrap();
        match *budget {
            Some(0) => Err(StoreError::Backend(
                "injected ledger append failure (budget spent)".to_owned(),
            )),
            Some(left) => {
                *budget = Some(left.saturating_sub(1));
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!("injected {what} failure")));
        }
        Ok(())
    }
}

impl Store for FailingStore {
    async fn load_space(&self, id: SpaceId) -> Result<Option<Space>, StoreError> {
        self.inner.load_space(id).await
    }

    async fn save_space(&self, space: &Space) -> Result<(), StoreError> {
        let delay = self.save_space_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Self::check(&self.fail_save_space, "space write")?;
        self.inner.save_space(space).await
    }

    async fn load_account(&self, user_id: UserId) -> Result<Option<UserAccount>, StoreError> {
        self.inner.load_account(user_id).await
    }

    async fn save_account(&self, account: &UserAccount) -> Result<(), StoreError> {
        self.inner.save_account(account).await
    }

    async fn load_treasure(&self, id: TreasureId) -> Result<Option<Treasure>, StoreError> {
        self.inner.load_treasure(id).await
    }

    async fn save_treasure(&self, treasure: &Treasure) -> Result<(), StoreError> {
        Self::check(&self.fail_save_treasure, "treasure write")?;
        self.inner.save_treasure(treasure).await
    }

    async fn append_ledger(&self, record: &LedgerRecord) -> Result<(), StoreError> {
        Self::check(&self.fail_append, "ledger append")?;
        self.spend_append()?;
        self.inner.append_ledger(record).await
    }

    async fn ledger_for(&self, user_id: UserId) -> Result<Vec<LedgerRecord>, StoreError> {
        self.inner.ledger_for(user_id).await
    }
}
