//! Infrastructure failures leave accounts, spaces and the ledger
//! consistent.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::missing_panics_doc
)]

mod common;

use std::sync::atomic::Ordering;

use common::{FailingStore, account, open_space, open_user};
use hbm_core::{EngineConfig, EngineError, ErrorKind, GameEngine, NewTreasure};
use hbm_types::{AccountKind, ChangeReason};

fn failing_engine(config: EngineConfig) -> GameEngine<FailingStore> {
    GameEngine::new(FailingStore::new(), config)
}

#[tokio::test]
async fn failed_append_restores_the_account() {
    let engine = failing_engine(EngineConfig::default());
    let user = open_user(&engine).await;
    engine.store().fail_append.store(true, Ordering::SeqCst);

    let err = engine
        .adjust_account(user, AccountKind::Energy, -10, ChangeReason::System)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
    assert_eq!(err.kind(), ErrorKind::Internal);

    assert_eq!(account(&engine, user).await.energy, 256);
    assert_eq!(engine.store().inner.ledger_len().await, 0);
}

#[tokio::test]
async fn failed_append_during_explore_changes_nothing() {
    let engine = failing_engine(EngineConfig::default());
    let user = open_user(&engine).await;
    let id = open_space(&engine, user, None).await;
    engine.store().fail_append.store(true, Ordering::SeqCst);

    assert!(engine.explore_space(id, user).await.is_err());

    let stored = account(&engine, user).await;
    assert_eq!(stored.energy, 256);
    assert_eq!(stored.experience, 0);
    let space = engine.space(id).await.unwrap();
    assert_eq!(space.turns_left, 10);
    assert_eq!(space.stability, 100);
}

#[tokio::test]
async fn failed_space_write_compensates_every_member() {
    let engine = failing_engine(EngineConfig::default());
    let team = [open_user(&engine).await, open_user(&engine).await];
    let id = open_space(&engine, team[0], None).await;
    engine.store().fail_save_space.store(true, Ordering::SeqCst);

    let err = engine.team_explore(id, &team).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    engine.store().fail_save_space.store(false, Ordering::SeqCst);

    let ledger = engine.store().inner.ledger_snapshot().await;
    for member in team {
        let stored = account(&engine, member).await;
        assert_eq!(stored.energy, 256);
        assert_eq!(stored.experience, 0);

        let records = ledger.records_by_actor(member);
        assert!(records.iter().any(|r| r.reason == ChangeReason::Rollback));
        assert!(engine.audit_account(member).await.is_ok());
    }
    assert_eq!(engine.space(id).await.unwrap().turns_left, 10);
}

#[tokio::test]
async fn failed_treasure_write_restores_space_and_energy() {
    let config = EngineConfig {
        treasure_use_energy_cost: 3,
        ..EngineConfig::default()
    };
    let engine = failing_engine(config);
    let owner = open_user(&engine).await;
    let id = open_space(&engine, owner, Some(40)).await;
    let item = engine
        .register_treasure(
            owner,
            NewTreasure {
                name: "Mirror".to_owned(),
                effect: "reflects decay".to_owned(),
                strength: 20,
                is_replica: false,
                deviation: 0,
            },
        )
        .await
        .unwrap();
    engine.store().fail_save_treasure.store(true, Ordering::SeqCst);

    assert!(engine.use_treasure(id, owner, item.id).await.is_err());

    assert_eq!(engine.space(id).await.unwrap().stability, 40);
    assert_eq!(account(&engine, owner).await.energy, 256);
    let stored = engine
        .store()
        .inner
        .ledger_snapshot()
        .await
        .last_balance(owner, AccountKind::Energy);
    assert_eq!(stored, Some(256));
    assert!(engine.audit_account(owner).await.is_ok());
}

#[tokio::test]
async fn failed_rollback_entry_still_restores_the_balance() {
    let engine = failing_engine(EngineConfig::default());
    let user = open_user(&engine).await;
    let id = open_space(&engine, user, None).await;
    // The energy debit lands, the experience credit and its rollback do not.
    engine.store().limit_appends(1);

    let err = engine.explore_space(id, user).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);

    let stored = account(&engine, user).await;
    assert_eq!(stored.energy, 256);
    assert_eq!(stored.experience, 0);
    assert_eq!(engine.space(id).await.unwrap().turns_left, 10);

    // The orphaned debit stays in the ledger and the audit reports it.
    assert_eq!(engine.store().inner.ledger_len().await, 1);
    assert!(matches!(
        engine.audit_account(user).await,
        Err(EngineError::AuditMismatch { .. })
    ));
}
