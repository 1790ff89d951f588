//! The game session engine.
//!
//! [`GameEngine`] owns a [`Store`] handle and one [`LockRegistry`] per
//! entity kind. Every action runs the same way:
//!
//! 1. Validate the request.
//! 2. Lock the space, then the involved users in ascending id order, then
//!    the treasure.
//! 3. Load current state and plan every change with the pure rules in
//!    [`crate::space`], [`crate::accounts`] and [`crate::treasure`].
//! 4. Persist accounts (each with its ledger record), then the space,
//!    then the treasure. A failed write compensates everything already
//!    written and reports the error.
//!
//! A rejected action returns before step 4 and changes nothing.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use hbm_types::{
    AccountKind, ActionOutcome, ChangeReason, LedgerRecord, Space, SpaceId, SpaceSnapshot,
    SpaceType, Treasure, TreasureId, UserAccount, UserId,
};
use tracing::{debug, error, info, warn};

use crate::accounts::{self, Adjustment, AuditReport, ResourceAccounts};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::locks::LockRegistry;
use crate::space::{self, NewSpace};
use crate::store::Store;
use crate::treasure::{self, NewTreasure};

/// Request to open a new space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateSpace {
    /// Explicit id. A fresh id is generated when absent.
    pub id: Option<SpaceId>,
    /// User opening the space.
    pub creator_id: UserId,
    /// User credited with the content. Defaults to the creator.
    pub author_id: Option<UserId>,
    /// Display title.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Starting stability, clamped into `0..=100`.
    pub initial_stability: Option<i64>,
}

/// Space, account and treasure operations over a shared store.
#[derive(Debug)]
pub struct GameEngine<S> {
    store: S,
    config: EngineConfig,
    spaces: LockRegistry<SpaceId>,
    users: LockRegistry<UserId>,
    treasures: LockRegistry<TreasureId>,
}

impl<S: Store> GameEngine<S> {
    /// Create an engine over `store`.
    pub fn new(store: S, config: EngineConfig) -> Self {
        let timeout = config.lock_timeout();
        Self {
            store,
            config,
            spaces: LockRegistry::new("space", timeout),
            users: LockRegistry::new("account", timeout),
            treasures: LockRegistry::new("treasure", timeout),
        }
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Engine tuning.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Locked single-account operations.
    pub const fn accounts(&self) -> ResourceAccounts<'_, S> {
        ResourceAccounts::new(&self.store, &self.users, &self.config)
    }

    // -----------------------------------------------------------------------
    // Spaces
    // -----------------------------------------------------------------------

    /// Open a new `Temp` space.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SpaceAlreadyExists`] when the id is taken.
    pub async fn create_space(&self, request: CreateSpace) -> Result<SpaceSnapshot, EngineError> {
        let id = request.id.unwrap_or_default();
        let _space_guard = self.spaces.acquire(id).await?;
        if self.store.load_space(id).await?.is_some() {
            return Err(EngineError::SpaceAlreadyExists(id));
        }

        let space = space::create(
            NewSpace {
                id,
                creator_id: request.creator_id,
                author_id: request.author_id.unwrap_or(request.creator_id),
                title: request.title,
                content: request.content,
                initial_stability: request.initial_stability,
            },
            &self.config,
            Utc::now(),
        );
        self.store.save_space(&space).await?;

        info!(
            space = %space.id,
            creator = %space.creator_id,
            stability = space.stability,
            turns_left = space.turns_left,
            "space created"
        );
        Ok(SpaceSnapshot::from(&space))
    }

    /// Current state of a space.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SpaceNotFound`] for an unknown id.
    pub async fn space(&self, id: SpaceId) -> Result<SpaceSnapshot, EngineError> {
        self.load_space(id).await.map(|space| SpaceSnapshot::from(&space))
    }

    /// Explore a space alone.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SpaceExhausted`] without turns left,
    /// [`EngineError::InsufficientEnergy`] when the user cannot pay, or a
    /// lookup, lock or persistence error.
    pub async fn explore_space(
        &self,
        space_id: SpaceId,
        user_id: UserId,
    ) -> Result<ActionOutcome, EngineError> {
        self.explore(space_id, &[user_id], ChangeReason::Explore).await
    }

    /// Explore a space as a team.
    ///
    /// The disturbance scales with team size and the energy cost is split
    /// between members, rounded up. Every member must afford their share
    /// or nobody is charged.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidArgument`] for an empty, oversized or
    /// duplicated team, otherwise as [`Self::explore_space`].
    pub async fn team_explore(
        &self,
        space_id: SpaceId,
        user_ids: &[UserId],
    ) -> Result<ActionOutcome, EngineError> {
        self.validate_team(user_ids)?;
        self.explore(space_id, user_ids, ChangeReason::TeamExplore).await
    }

    /// Use a treasure on a space to restore its stability.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TreasureNotFound`] or
    /// [`EngineError::TreasureNotOwned`] when the user cannot use the
    /// treasure, or a lookup, lock or persistence error.
    pub async fn use_treasure(
        &self,
        space_id: SpaceId,
        user_id: UserId,
        treasure_id: TreasureId,
    ) -> Result<ActionOutcome, EngineError> {
        let now = Utc::now();
        let _space_guard = self.spaces.acquire(space_id).await?;
        let space = self.load_space(space_id).await?;
        let _user_guard = self.users.acquire(user_id).await?;
        let account = accounts::load(&self.store, user_id).await?;
        let _treasure_guard = self.treasures.acquire(treasure_id).await?;
        let item = treasure::load(&self.store, treasure_id).await?;

        let applied = treasure::apply_effect(&item, user_id, &self.config, now)?;
        let mut adjustments = Vec::new();
        if self.config.treasure_use_energy_cost > 0 {
            adjustments.push(accounts::plan(
                &account,
                AccountKind::Energy,
                i64::from(self.config.treasure_use_energy_cost).saturating_neg(),
                ChangeReason::TreasureUse,
            )?);
        }
        let next = space::restore(&space, applied.magnitude, now);

        self.persist(&space, &next, &adjustments, Some(&applied.treasure))
            .await?;

        debug!(
            space = %space_id,
            user = %user_id,
            treasure = %treasure_id,
            magnitude = applied.magnitude,
            stability = next.stability,
            "treasure used"
        );
        Ok(outcome(&next, &adjustments))
    }

    /// Fix a space permanently and reward its creator.
    ///
    /// Solidifying an already fixed space succeeds without changes. The
    /// reward is skipped with a warning when the creator has no account.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InsufficientStability`] below the threshold,
    /// or a lookup, lock or persistence error.
    pub async fn solidify_space(&self, space_id: SpaceId) -> Result<ActionOutcome, EngineError> {
        let now = Utc::now();
        let _space_guard = self.spaces.acquire(space_id).await?;
        let space = self.load_space(space_id).await?;

        let Some(next) = space::solidify(&space, &self.config, now)? else {
            debug!(space = %space_id, "space already fixed");
            return Ok(ActionOutcome::without_deltas(SpaceSnapshot::from(&space)));
        };

        let _creator_guard = self.users.acquire(space.creator_id).await?;
        let mut adjustments = Vec::new();
        if self.config.solidify_experience > 0 {
            match accounts::load(&self.store, space.creator_id).await {
                Ok(creator) => adjustments.push(accounts::plan(
                    &creator,
                    AccountKind::Experience,
                    experience_delta(self.config.solidify_experience)?,
                    ChangeReason::Solidify,
                )?),
                Err(EngineError::AccountNotFound(creator)) => {
                    warn!(space = %space_id, creator = %creator, "creator has no account, reward skipped");
                }
                Err(err) => return Err(err),
            }
        }

        self.persist(&space, &next, &adjustments, None).await?;

        info!(
            space = %space_id,
            from = space.space_type.as_str(),
            stability = space.stability,
            "space solidified"
        );
        Ok(outcome(&next, &adjustments))
    }

    /// Return a space to `Temp` with a fresh turn budget.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SpaceNotFound`] or a lock or persistence
    /// error.
    pub async fn reset_space(&self, space_id: SpaceId) -> Result<SpaceSnapshot, EngineError> {
        let _space_guard = self.spaces.acquire(space_id).await?;
        let space = self.load_space(space_id).await?;
        let next = space::reset(&space, &self.config, Utc::now());
        self.store.save_space(&next).await?;

        info!(
            space = %space_id,
            from = space.space_type.as_str(),
            turns_left = next.turns_left,
            "space reset"
        );
        Ok(SpaceSnapshot::from(&next))
    }

    // -----------------------------------------------------------------------
    // Accounts and treasures
    // -----------------------------------------------------------------------

    /// Open an account with full energy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AccountAlreadyExists`] if one exists.
    pub async fn open_account(&self, user_id: UserId) -> Result<UserAccount, EngineError> {
        self.accounts().open(user_id).await
    }

    /// Apply a single balance change outside of an action.
    ///
    /// # Errors
    ///
    /// See [`accounts::plan`].
    pub async fn adjust_account(
        &self,
        user_id: UserId,
        kind: AccountKind,
        delta: i64,
        reason: ChangeReason,
    ) -> Result<(u64, LedgerRecord), EngineError> {
        self.accounts().adjust(user_id, kind, delta, reason).await
    }

    /// Regenerate energy for the time elapsed up to `now`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AccountNotFound`] or a persistence error.
    pub async fn recover_energy(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<LedgerRecord>, EngineError> {
        self.accounts().recover_energy(user_id, now).await
    }

    /// Replay a user's ledger against the stored account.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AuditMismatch`] when they disagree.
    pub async fn audit_account(&self, user_id: UserId) -> Result<AuditReport, EngineError> {
        self.accounts().audit(user_id).await
    }

    /// Register a treasure for an existing account.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AccountNotFound`] for an unknown owner and
    /// [`EngineError::InvalidArgument`] for zero strength.
    pub async fn register_treasure(
        &self,
        owner: UserId,
        request: NewTreasure,
    ) -> Result<Treasure, EngineError> {
        let _owner_guard = self.users.acquire(owner).await?;
        accounts::load(&self.store, owner).await?;
        let item = treasure::register(owner, request, Utc::now())?;
        self.store.save_treasure(&item).await?;
        debug!(
            treasure = %item.id,
            owner = %owner,
            strength = item.strength,
            replica = item.is_replica,
            "treasure registered"
        );
        Ok(item)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn load_space(&self, id: SpaceId) -> Result<Space, EngineError> {
        self.store
            .load_space(id)
            .await?
            .ok_or(EngineError::SpaceNotFound(id))
    }

    fn validate_team(&self, user_ids: &[UserId]) -> Result<(), EngineError> {
        if user_ids.is_empty() {
            return Err(EngineError::InvalidArgument("team is empty".to_owned()));
        }
        if user_ids.len() > self.config.max_team_size {
            return Err(EngineError::InvalidArgument(format!(
                "team of {} exceeds the limit of {}",
                user_ids.len(),
                self.config.max_team_size
            )));
        }
        let distinct: BTreeSet<UserId> = user_ids.iter().copied().collect();
        if distinct.len() != user_ids.len() {
            return Err(EngineError::InvalidArgument(
                "team lists a member more than once".to_owned(),
            ));
        }
        Ok(())
    }

    async fn explore(
        &self,
        space_id: SpaceId,
        members: &[UserId],
        reason: ChangeReason,
    ) -> Result<ActionOutcome, EngineError> {
        let now = Utc::now();
        let _space_guard = self.spaces.acquire(space_id).await?;
        let space = self.load_space(space_id).await?;
        let next = space::explore(&space, members.len(), &self.config, now)?;

        let team: BTreeSet<UserId> = members.iter().copied().collect();
        let _user_guards = self.users.acquire_all(&team).await?;

        let cost = share_of_cost(self.config.explore_energy_cost, team.len());
        let mut adjustments = Vec::with_capacity(team.len().saturating_mul(2));
        for user in &team {
            let mut account = accounts::load(&self.store, *user).await?;
            if cost > 0 {
                let debit = accounts::plan(
                    &account,
                    AccountKind::Energy,
                    i64::from(cost).saturating_neg(),
                    reason,
                )?;
                account = debit.after.clone();
                adjustments.push(debit);
            }
            if self.config.explore_experience > 0 {
                adjustments.push(accounts::plan(
                    &account,
                    AccountKind::Experience,
                    experience_delta(self.config.explore_experience)?,
                    reason,
                )?);
            }
        }

        self.persist(&space, &next, &adjustments, None).await?;

        debug!(
            space = %space_id,
            explorers = team.len(),
            energy_each = cost,
            stability = next.stability,
            heat = next.heat,
            turns_left = next.turns_left,
            "space explored"
        );
        if space.space_type == SpaceType::Temp && next.space_type == SpaceType::Stable {
            info!(space = %space_id, heat = next.heat, "space promoted to stable");
        }
        Ok(outcome(&next, &adjustments))
    }

    /// Write an action's planned state. Accounts first, then the space,
    /// then the treasure. On failure every earlier write is undone.
    async fn persist(
        &self,
        before: &Space,
        after: &Space,
        adjustments: &[Adjustment],
        used: Option<&Treasure>,
    ) -> Result<(), EngineError> {
        accounts::commit_all(&self.store, adjustments).await?;

        if let Err(err) = self.store.save_space(after).await {
            warn!(space = %after.id, "space write failed, rolling back: {err}");
            accounts::compensate(&self.store, adjustments).await;
            return Err(err.into());
        }

        let Some(item) = used else {
            return Ok(());
        };
        if let Err(err) = self.store.save_treasure(item).await {
            warn!(treasure = %item.id, "treasure write failed, rolling back: {err}");
            if let Err(restore_err) = self.store.save_space(before).await {
                error!(space = %before.id, "failed to restore space: {restore_err}");
            }
            accounts::compensate(&self.store, adjustments).await;
            return Err(err.into());
        }
        Ok(())
    }
}

/// Energy each of `members` pays for an exploration costing `cost`,
/// rounded up so the team together pays at least the solo cost.
fn share_of_cost(cost: u32, members: usize) -> u32 {
    u32::try_from(members)
        .ok()
        .filter(|n| *n > 0)
        .map_or(cost, |n| cost.div_ceil(n))
}

fn experience_delta(amount: u64) -> Result<i64, EngineError> {
    i64::try_from(amount)
        .ok()
        .ok_or(EngineError::ArithmeticOverflow {
            context: "experience reward exceeds i64",
        })
}

fn outcome(space: &Space, adjustments: &[Adjustment]) -> ActionOutcome {
    ActionOutcome {
        space: SpaceSnapshot::from(space),
        deltas: adjustments.iter().map(Adjustment::delta).collect(),
    }
}
