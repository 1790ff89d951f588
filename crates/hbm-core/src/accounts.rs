//! Per-user energy and experience accounts.
//!
//! Adjustments are planned as pure values first ([`plan`]) and persisted
//! afterwards ([`commit`]), so an action can validate every member of a
//! team before touching any of them. Every committed adjustment writes
//! exactly one ledger record; if the record cannot be appended the account
//! write is undone.
//!
//! # Rules
//!
//! - Energy never goes below zero. A debit larger than the balance fails
//!   with `InsufficientEnergy`.
//! - Energy credits clamp at `max_energy`. The discarded overflow is not
//!   recorded; the record carries the applied delta.
//! - Experience only decreases through correction reasons
//!   (`System`, `Rollback`).
//!
//! Callers must hold the user's lock from [`LockRegistry`] across
//! plan and commit. [`ResourceAccounts`] does this for single-account
//! operations; the engine does it for actions.

use chrono::{DateTime, TimeDelta, Utc};
use hbm_ledger::{Ledger, RecordBuilder, ReplayResult};
use hbm_types::{AccountKind, ChangeReason, LedgerRecord, ResourceDelta, UserAccount, UserId};
use tracing::{debug, error, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::locks::LockRegistry;
use crate::store::Store;

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// A validated, not yet persisted balance change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjustment {
    /// Account state before the change.
    pub before: UserAccount,
    /// Account state after the change.
    pub after: UserAccount,
    /// The ledger record describing the change.
    pub record: LedgerRecord,
}

impl Adjustment {
    /// The typed delta reported back to callers.
    pub fn delta(&self) -> ResourceDelta {
        ResourceDelta::from(&self.record)
    }
}

/// Validate a change to one balance and compute the resulting account.
///
/// # Errors
///
/// Returns [`EngineError::InsufficientEnergy`] or
/// [`EngineError::InsufficientExperience`] when a debit exceeds the
/// balance, and [`EngineError::InvalidArgument`] for a negative experience
/// change under a gameplay reason.
pub fn plan(
    account: &UserAccount,
    kind: AccountKind,
    delta: i64,
    reason: ChangeReason,
) -> Result<Adjustment, EngineError> {
    let balance = account.balance(kind);
    let magnitude = delta.unsigned_abs();

    let applied = match kind {
        AccountKind::Energy => {
            if delta.is_negative() && magnitude > balance {
                return Err(EngineError::InsufficientEnergy {
                    user: account.user_id,
                    required: u32::try_from(magnitude).unwrap_or(u32::MAX),
                    available: account.energy,
                });
            }
            if delta.is_negative() {
                delta
            } else {
                let headroom = account.max_energy.saturating_sub(account.energy);
                delta.min(i64::from(headroom))
            }
        }
        AccountKind::Experience => {
            if delta.is_negative() && !reason.is_correction() {
                return Err(EngineError::InvalidArgument(format!(
                    "experience can only decrease through a correction, got {reason}"
                )));
            }
            if delta.is_negative() && magnitude > balance {
                return Err(EngineError::InsufficientExperience {
                    user: account.user_id,
                    required: magnitude,
                    available: balance,
                });
            }
            delta
        }
    };

    let record = RecordBuilder::new(account.user_id, kind, reason)
        .previous_balance(balance)
        .change(applied)
        .build()?;

    let mut after = account.clone();
    match kind {
        AccountKind::Energy => {
            after.energy = u32::try_from(record.resulting_balance)
                .ok()
                .ok_or(EngineError::ArithmeticOverflow {
                    context: "energy balance exceeds u32",
                })?;
        }
        AccountKind::Experience => after.experience = record.resulting_balance,
    }

    Ok(Adjustment {
        before: account.clone(),
        after,
        record,
    })
}

// ---------------------------------------------------------------------------
// Committing
// ---------------------------------------------------------------------------

/// Persist an adjustment: account first, then its ledger record.
///
/// If the ledger append fails the previous account state is restored and
/// the append error is returned.
///
/// # Errors
///
/// Returns [`EngineError::Store`] if either write fails.
pub async fn commit<S: Store>(store: &S, adjustment: &Adjustment) -> Result<(), EngineError> {
    store.save_account(&adjustment.after).await?;

    if let Err(err) = store.append_ledger(&adjustment.record).await {
        warn!(
            user = %adjustment.record.actor_id,
            account = ?adjustment.record.account,
            "ledger append failed, restoring account: {err}"
        );
        if let Err(restore_err) = store.save_account(&adjustment.before).await {
            error!(
                user = %adjustment.record.actor_id,
                "failed to restore account after ledger failure: {restore_err}"
            );
        }
        return Err(err.into());
    }

    debug!(
        user = %adjustment.record.actor_id,
        account = ?adjustment.record.account,
        change = adjustment.record.change_amount,
        balance = adjustment.record.resulting_balance,
        reason = %adjustment.record.reason,
        "balance adjusted"
    );
    Ok(())
}

/// Commit adjustments in order. If one fails, every adjustment already
/// committed is compensated before the error is returned.
///
/// # Errors
///
/// Returns the error of the first adjustment that failed to commit.
pub async fn commit_all<S: Store>(
    store: &S,
    adjustments: &[Adjustment],
) -> Result<(), EngineError> {
    for (done, adjustment) in adjustments.iter().enumerate() {
        if let Err(err) = commit(store, adjustment).await {
            compensate(store, adjustments.get(..done).unwrap_or_default()).await;
            return Err(err);
        }
    }
    Ok(())
}

/// Undo committed adjustments, newest first, with `Rollback` records.
///
/// The ledger stays append-only: each committed record is answered by an
/// opposite record, so replay reproduces the restored balance.
///
/// If the compensating record cannot be written either, the account is
/// restored to its state before the adjustment anyway. The original record
/// is then orphaned: it is logged at `error` and the next audit of the
/// user reports the mismatch. Balances are never left charged for a failed
/// action.
pub async fn compensate<S: Store>(store: &S, committed: &[Adjustment]) {
    for adjustment in committed.iter().rev() {
        match reverse(store, adjustment).await {
            Ok(()) => warn!(
                user = %adjustment.record.actor_id,
                record = %adjustment.record.id,
                "adjustment rolled back"
            ),
            Err(err) => {
                error!(
                    user = %adjustment.record.actor_id,
                    record = %adjustment.record.id,
                    account = ?adjustment.record.account,
                    change = adjustment.record.change_amount,
                    "rollback entry failed, restoring account and orphaning record: {err}"
                );
                if let Err(restore_err) = store.save_account(&adjustment.before).await {
                    error!(
                        user = %adjustment.record.actor_id,
                        "failed to restore account during rollback: {restore_err}"
                    );
                }
            }
        }
    }
}

/// Plan and commit the `Rollback` answer to one adjustment.
async fn reverse<S: Store>(store: &S, adjustment: &Adjustment) -> Result<(), EngineError> {
    let reversed = adjustment
        .record
        .change_amount
        .checked_neg()
        .ok_or(EngineError::ArithmeticOverflow {
            context: "rollback change negation",
        })?;
    let undo = plan(
        &adjustment.after,
        adjustment.record.account,
        reversed,
        ChangeReason::Rollback,
    )?;
    commit(store, &undo).await
}

/// Load an account or fail with [`EngineError::AccountNotFound`].
///
/// # Errors
///
/// Returns [`EngineError::AccountNotFound`] or [`EngineError::Store`].
pub async fn load<S: Store>(store: &S, user_id: UserId) -> Result<UserAccount, EngineError> {
    store
        .load_account(user_id)
        .await?
        .ok_or(EngineError::AccountNotFound(user_id))
}

// ---------------------------------------------------------------------------
// Single-account operations
// ---------------------------------------------------------------------------

/// Result of replaying a user's ledger against the stored account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    /// The audited user.
    pub user_id: UserId,
    /// Stored energy, confirmed by replay.
    pub energy: u32,
    /// Stored experience, confirmed by replay.
    pub experience: u64,
    /// Number of ledger records replayed.
    pub records: usize,
}

/// Locked operations on a single account.
#[derive(Debug)]
pub struct ResourceAccounts<'a, S> {
    store: &'a S,
    locks: &'a LockRegistry<UserId>,
    config: &'a EngineConfig,
}

impl<'a, S: Store> ResourceAccounts<'a, S> {
    /// Bind to a store, the user lock registry and engine tuning.
    pub const fn new(store: &'a S, locks: &'a LockRegistry<UserId>, config: &'a EngineConfig) -> Self {
        Self {
            store,
            locks,
            config,
        }
    }

    /// Open a fresh account with full energy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AccountAlreadyExists`] if the user has one.
    pub async fn open(&self, user_id: UserId) -> Result<UserAccount, EngineError> {
        let _guard = self.locks.acquire(user_id).await?;
        if self.store.load_account(user_id).await?.is_some() {
            return Err(EngineError::AccountAlreadyExists(user_id));
        }
        let account = UserAccount::new(user_id, self.config.default_max_energy, Utc::now());
        self.store.save_account(&account).await?;
        debug!(user = %user_id, energy = account.energy, "account opened");
        Ok(account)
    }

    /// Apply one change and return the new balance with its record.
    ///
    /// # Errors
    ///
    /// See [`plan`] and [`commit`].
    pub async fn adjust(
        &self,
        user_id: UserId,
        kind: AccountKind,
        delta: i64,
        reason: ChangeReason,
    ) -> Result<(u64, LedgerRecord), EngineError> {
        let _guard = self.locks.acquire(user_id).await?;
        let account = load(self.store, user_id).await?;
        let adjustment = plan(&account, kind, delta, reason)?;
        commit(self.store, &adjustment).await?;
        Ok((adjustment.record.resulting_balance, adjustment.record))
    }

    /// Restore energy for every recovery interval elapsed since the last
    /// recovery. Partial intervals carry over.
    ///
    /// Returns the record written, or `None` when nothing was restored.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AccountNotFound`] or a persistence error.
    pub async fn recover_energy(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<LedgerRecord>, EngineError> {
        let _guard = self.locks.acquire(user_id).await?;
        let mut account = load(self.store, user_id).await?;

        let intervals = elapsed_intervals(
            account.energy_recovery_at,
            now,
            self.config.recovery_interval_secs,
        );
        if intervals == 0 || self.config.recovery_amount == 0 {
            return Ok(None);
        }

        if account.energy >= account.max_energy {
            // Nothing to restore; do not bank intervals while full.
            account.energy_recovery_at = now;
            self.store.save_account(&account).await?;
            return Ok(None);
        }

        let gain = intervals.saturating_mul(u64::from(self.config.recovery_amount));
        let mut adjustment = plan(
            &account,
            AccountKind::Energy,
            i64::try_from(gain).unwrap_or(i64::MAX),
            ChangeReason::Recovery,
        )?;

        adjustment.after.energy_recovery_at = if adjustment.after.energy >= adjustment.after.max_energy {
            now
        } else {
            let consumed = intervals.saturating_mul(self.config.recovery_interval_secs);
            i64::try_from(consumed)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .and_then(|span| account.energy_recovery_at.checked_add_signed(span))
                .unwrap_or(now)
        };

        commit(self.store, &adjustment).await?;
        Ok(Some(adjustment.record))
    }

    /// Replay the user's ledger and confirm it reproduces the stored
    /// balances.
    ///
    /// The energy chain is checked link by link (accounts may be seeded
    /// below their cap); the experience chain must open at zero.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AuditMismatch`] on any disagreement.
    pub async fn audit(&self, user_id: UserId) -> Result<AuditReport, EngineError> {
        let _guard = self.locks.acquire(user_id).await?;
        let account = load(self.store, user_id).await?;
        let records = self.store.ledger_for(user_id).await?;

        let ledger: Ledger = records.into_iter().collect();

        check_chain(&account, &ledger, AccountKind::Energy, None)?;
        check_chain(&account, &ledger, AccountKind::Experience, Some(0))?;

        Ok(AuditReport {
            user_id,
            energy: account.energy,
            experience: account.experience,
            records: ledger.len(),
        })
    }
}

/// Whole recovery intervals between `since` and `now`.
fn elapsed_intervals(since: DateTime<Utc>, now: DateTime<Utc>, interval_secs: u64) -> u64 {
    let elapsed = now.signed_duration_since(since).num_seconds();
    u64::try_from(elapsed)
        .ok()
        .and_then(|secs| secs.checked_div(interval_secs))
        .unwrap_or(0)
}

fn check_chain(
    account: &UserAccount,
    ledger: &Ledger,
    kind: AccountKind,
    opening: Option<u64>,
) -> Result<(), EngineError> {
    match ledger.verify(account.user_id, kind, opening) {
        ReplayResult::Anomaly(anomaly) => Err(EngineError::AuditMismatch {
            user: account.user_id,
            account: kind,
            detail: anomaly.message,
        }),
        ReplayResult::Consistent {
            final_balance: Some(replayed),
        } if replayed != account.balance(kind) => Err(EngineError::AuditMismatch {
            user: account.user_id,
            account: kind,
            detail: format!(
                "ledger replays to {replayed}, account holds {}",
                account.balance(kind)
            ),
        }),
        ReplayResult::Consistent { .. } => Ok(()),
    }
}
