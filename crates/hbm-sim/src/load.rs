//! Random concurrent workload against a shared engine.
//!
//! [`run`] seeds accounts, spaces and one treasure per user, then spawns
//! `workers` tokio tasks. Each task draws actions from its own seeded RNG,
//! so a run is reproducible up to scheduling order. Rejections are normal
//! and counted by [`ErrorKind`]; only infrastructure failures and audit
//! mismatches indicate a problem.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use futures::future::join_all;
use hbm_core::{CreateSpace, EngineError, ErrorKind, GameEngine, NewTreasure, Store};
use hbm_types::{SpaceId, TreasureId, UserId};
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::SimError;

/// Workload shape, read from the `load` section of `hbm-config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoadConfig {
    /// Accounts to open.
    #[serde(default = "default_users")]
    pub users: usize,
    /// Spaces to create.
    #[serde(default = "default_spaces")]
    pub spaces: usize,
    /// Concurrent worker tasks.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Actions each worker issues.
    #[serde(default = "default_actions_per_worker")]
    pub actions_per_worker: usize,
    /// Base RNG seed. Worker `i` uses `seed + i`.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            users: default_users(),
            spaces: default_spaces(),
            workers: default_workers(),
            actions_per_worker: default_actions_per_worker(),
            seed: default_seed(),
        }
    }
}

const fn default_users() -> usize {
    24
}
const fn default_spaces() -> usize {
    6
}
const fn default_workers() -> usize {
    8
}
const fn default_actions_per_worker() -> usize {
    200
}
const fn default_seed() -> u64 {
    7
}

/// What a run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Actions that succeeded.
    pub accepted: u64,
    /// Rejected actions bucketed by failure class.
    pub rejected: HashMap<ErrorKind, u64>,
    /// Accounts whose ledger replays to the stored balance.
    pub audited: usize,
    /// Accounts whose ledger does not.
    pub mismatched: Vec<UserId>,
}

impl LoadReport {
    fn merge(&mut self, other: WorkerTally) {
        self.accepted = self.accepted.saturating_add(other.accepted);
        for (kind, count) in other.rejected {
            let slot = self.rejected.entry(kind).or_insert(0);
            *slot = slot.saturating_add(count);
        }
    }

    /// Total rejected actions.
    pub fn rejected_total(&self) -> u64 {
        self.rejected.values().fold(0, |acc, n| acc.saturating_add(*n))
    }
}

#[derive(Debug, Default)]
struct WorkerTally {
    accepted: u64,
    rejected: HashMap<ErrorKind, u64>,
}

impl WorkerTally {
    fn record<T>(&mut self, result: Result<T, EngineError>) {
        match result {
            Ok(_) => self.accepted = self.accepted.saturating_add(1),
            Err(err) => {
                if err.kind() == ErrorKind::Internal {
                    warn!("action failed: {err}");
                }
                let slot = self.rejected.entry(err.kind()).or_insert(0);
                *slot = slot.saturating_add(1);
            }
        }
    }
}

/// Entities created before the workload starts.
#[derive(Debug, Clone)]
struct World {
    users: Vec<UserId>,
    spaces: Vec<SpaceId>,
    treasures: Vec<(UserId, TreasureId)>,
}

/// Seed the engine, run the workload, then audit every account.
///
/// # Errors
///
/// Returns [`SimError::Setup`] if seeding fails and [`SimError::Worker`]
/// if a task panics. Audit mismatches are reported in the result.
pub async fn run<S>(engine: &Arc<GameEngine<S>>, config: &LoadConfig) -> Result<LoadReport, SimError>
where
    S: Store + 'static,
{
    let world = Arc::new(seed_world(engine, config).await?);
    info!(
        users = world.users.len(),
        spaces = world.spaces.len(),
        treasures = world.treasures.len(),
        "world seeded"
    );

    let handles = (0..config.workers).map(|index| {
        let engine = Arc::clone(engine);
        let world = Arc::clone(&world);
        let seed = config.seed.wrapping_add(u64::try_from(index).unwrap_or(u64::MAX));
        let actions = config.actions_per_worker;
        tokio::spawn(async move { worker(&engine, &world, seed, actions).await })
    });

    let mut report = LoadReport::default();
    for joined in join_all(handles).await {
        report.merge(joined?);
    }

    for user in &world.users {
        match engine.audit_account(*user).await {
            Ok(audit) => {
                debug!(user = %user, records = audit.records, "account audited");
                report.audited = report.audited.saturating_add(1);
            }
            Err(err) => {
                warn!(user = %user, "audit failed: {err}");
                report.mismatched.push(*user);
            }
        }
    }
    Ok(report)
}

async fn seed_world<S: Store>(engine: &GameEngine<S>, config: &LoadConfig) -> Result<World, SimError> {
    let mut users = Vec::with_capacity(config.users);
    let mut treasures = Vec::with_capacity(config.users);
    for index in 0..config.users {
        let user = UserId::new();
        engine.open_account(user).await?;
        let magnitude = u32::try_from(index % 12).unwrap_or(0).saturating_add(4);
        let item = engine
            .register_treasure(
                user,
                NewTreasure {
                    name: format!("relic-{index}"),
                    effect: "restores stability".to_owned(),
                    strength: magnitude,
                    is_replica: index % 3 == 0,
                    deviation: i32::try_from(index % 5).unwrap_or(0).saturating_mul(10),
                },
            )
            .await?;
        users.push(user);
        treasures.push((user, item.id));
    }

    let mut spaces = Vec::with_capacity(config.spaces);
    for index in 0..config.spaces {
        let creator = index
            .checked_rem(users.len())
            .and_then(|slot| users.get(slot))
            .copied()
            .unwrap_or_default();
        let snapshot = engine
            .create_space(CreateSpace {
                creator_id: creator,
                title: format!("space-{index}"),
                ..CreateSpace::default()
            })
            .await?;
        spaces.push(snapshot.id);
    }

    Ok(World {
        users,
        spaces,
        treasures,
    })
}

async fn worker<S: Store>(engine: &GameEngine<S>, world: &World, seed: u64, actions: usize) -> WorkerTally {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut tally = WorkerTally::default();
    let max_team = engine.config().max_team_size.min(world.users.len());

    for _ in 0..actions {
        let Some(space) = world.spaces.choose(&mut rng).copied() else {
            break;
        };
        let roll: u32 = rng.random_range(0..100);
        match roll {
            0..40 => {
                if let Some(user) = world.users.choose(&mut rng).copied() {
                    tally.record(engine.explore_space(space, user).await);
                }
            }
            40..65 => {
                let size = rng.random_range(1..=max_team.max(1));
                let mut team = world.users.clone();
                team.shuffle(&mut rng);
                team.truncate(size);
                tally.record(engine.team_explore(space, &team).await);
            }
            65..80 => {
                if let Some((owner, treasure)) = world.treasures.choose(&mut rng).copied() {
                    tally.record(engine.use_treasure(space, owner, treasure).await);
                }
            }
            80..88 => tally.record(engine.solidify_space(space).await),
            88..95 => {
                if let Some(user) = world.users.choose(&mut rng).copied() {
                    let offset = TimeDelta::try_seconds(rng.random_range(0..=1_800));
                    let now = offset
                        .and_then(|span| Utc::now().checked_add_signed(span))
                        .unwrap_or_else(Utc::now);
                    tally.record(engine.recover_energy(user, now).await);
                }
            }
            _ => tally.record(engine.reset_space(space).await),
        }
    }
    tally
}
