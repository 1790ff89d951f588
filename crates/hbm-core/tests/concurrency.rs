//! Concurrent actions: exclusion, independence of unrelated spaces and
//! bounded lock waits.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::missing_panics_doc
)]

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{FailingStore, account, open_space, open_user};
use futures::future::join_all;
use hbm_core::{EngineConfig, ErrorKind, GameEngine, MemoryStore};
use hbm_types::{AccountKind, ChangeReason};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_explores_lose_no_updates() {
    let config = EngineConfig {
        default_turns: 500,
        explore_turn_step: 1,
        explore_disturbance: 0,
        stable_heat_threshold: 1_000,
        ..EngineConfig::default()
    };
    let engine = Arc::new(GameEngine::new(MemoryStore::new(), config));
    let creator = open_user(&engine).await;
    let id = open_space(&engine, creator, None).await;

    let mut users = Vec::new();
    for _ in 0..40 {
        users.push(open_user(&engine).await);
    }

    let tasks = users.iter().map(|user| {
        let engine = Arc::clone(&engine);
        let user = *user;
        tokio::spawn(async move { engine.explore_space(id, user).await })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let space = engine.space(id).await.unwrap();
    assert_eq!(space.turns_left, 460);
    assert_eq!(space.heat, 40);
    for user in users {
        assert_eq!(account(&engine, user).await.energy, 252);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_debits_of_one_account_serialize() {
    let engine = Arc::new(GameEngine::new(MemoryStore::new(), EngineConfig::default()));
    let user = open_user(&engine).await;

    let tasks = (0..32).map(|_| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .adjust_account(user, AccountKind::Energy, -3, ChangeReason::System)
                .await
        })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    assert_eq!(account(&engine, user).await.energy, 256 - 96);
    let report = engine.audit_account(user).await.unwrap();
    assert_eq!(report.records, 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_teams_do_not_deadlock() {
    let config = EngineConfig {
        default_turns: 1_000,
        explore_turn_step: 1,
        explore_disturbance: 0,
        ..EngineConfig::default()
    };
    let engine = Arc::new(GameEngine::new(MemoryStore::new(), config));
    let a = open_user(&engine).await;
    let b = open_user(&engine).await;
    let c = open_user(&engine).await;
    let first = open_space(&engine, a, None).await;
    let second = open_space(&engine, b, None).await;

    let tasks = (0..24).map(|i| {
        let engine = Arc::clone(&engine);
        let (space, team) = if i % 2 == 0 {
            (first, vec![a, b, c])
        } else {
            (second, vec![c, b, a])
        };
        tokio::spawn(async move { engine.team_explore(space, &team).await })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    for user in [a, b, c] {
        assert_eq!(account(&engine, user).await.energy, 256 - 24 * 2);
        assert!(engine.audit_account(user).await.is_ok());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn held_space_lock_times_out_as_busy() {
    let config = EngineConfig {
        lock_timeout_ms: 30,
        ..EngineConfig::default()
    };
    let store = FailingStore::new();
    let engine = Arc::new(GameEngine::new(store, config));
    let slow = open_user(&engine).await;
    let waiting = open_user(&engine).await;
    let id = open_space(&engine, slow, None).await;
    engine
        .store()
        .save_space_delay_ms
        .store(300, Ordering::SeqCst);

    let holder = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.explore_space(id, slow).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = engine.explore_space(id, waiting).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);
    assert_eq!(account(&engine, waiting).await.energy, 256);

    holder.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_spaces_do_not_block_each_other() {
    let config = EngineConfig {
        lock_timeout_ms: 50,
        ..EngineConfig::default()
    };
    let engine = Arc::new(GameEngine::new(FailingStore::new(), config));
    let left_user = open_user(&engine).await;
    let right_user = open_user(&engine).await;
    let left = open_space(&engine, left_user, None).await;
    let right = open_space(&engine, right_user, None).await;
    engine
        .store()
        .save_space_delay_ms
        .store(200, Ordering::SeqCst);

    let a = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.explore_space(left, left_user).await })
    };
    let b = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.explore_space(right, right_user).await })
    };

    assert!(a.await.unwrap().is_ok());
    assert!(b.await.unwrap().is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ledger_replays_after_mixed_load() {
    let engine = Arc::new(GameEngine::new(MemoryStore::new(), EngineConfig::default()));
    let mut users = Vec::new();
    for _ in 0..6 {
        users.push(open_user(&engine).await);
    }
    let mut spaces = Vec::new();
    for user in &users {
        spaces.push(open_space(&engine, *user, Some(80)).await);
    }

    let tasks = (0..60).map(|i| {
        let engine = Arc::clone(&engine);
        let space = spaces[i % spaces.len()];
        let user = users[i % users.len()];
        let team = vec![users[(i + 1) % users.len()], users[(i + 2) % users.len()]];
        tokio::spawn(async move {
            match i % 3 {
                0 => engine.explore_space(space, user).await.map(|_| ()),
                1 => engine.team_explore(space, &team).await.map(|_| ()),
                _ => engine.solidify_space(space).await.map(|_| ()),
            }
        })
    });
    // Individual actions may be rejected; only the bookkeeping matters.
    for result in join_all(tasks).await {
        let _ = result.unwrap();
    }

    let ledger = engine.store().ledger_snapshot().await;
    for user in users {
        let stored = account(&engine, user).await;
        let report = engine.audit_account(user).await.unwrap();
        assert_eq!(report.energy, stored.energy);
        assert_eq!(report.experience, stored.experience);
        if let Some(balance) = ledger.last_balance(user, AccountKind::Energy) {
            assert_eq!(balance, u64::from(stored.energy));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_account_cannot_overspend_across_spaces() {
    let engine = Arc::new(GameEngine::new(MemoryStore::new(), EngineConfig::default()));
    let user = open_user(&engine).await;
    let mut spaces = Vec::new();
    for _ in 0..4 {
        spaces.push(open_space(&engine, user, None).await);
    }
    // Leave exactly one explore's worth of energy.
    engine
        .adjust_account(user, AccountKind::Energy, -252, ChangeReason::System)
        .await
        .unwrap();

    let tasks = spaces.iter().map(|id| {
        let engine = Arc::clone(&engine);
        let id = *id;
        tokio::spawn(async move { engine.explore_space(id, user).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ErrorKind::InsufficientResource);
    }
    assert_eq!(account(&engine, user).await.energy, 0);
    assert!(engine.audit_account(user).await.is_ok());
}
