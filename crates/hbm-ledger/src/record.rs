//! Record construction and validation.
//!
//! The [`RecordBuilder`] derives `resulting_balance` from the previous
//! balance and the change rather than taking it as input, so a built
//! record always satisfies the replay law.

use chrono::Utc;

use hbm_types::{AccountKind, ChangeReason, LedgerRecord, LedgerRecordId, UserId};

use crate::LedgerError;

/// Builder for constructing validated [`LedgerRecord`] values.
///
/// # Examples
///
/// ```
/// use hbm_ledger::RecordBuilder;
/// use hbm_types::{AccountKind, ChangeReason, UserId};
///
/// let record = RecordBuilder::new(UserId::new(), AccountKind::Experience, ChangeReason::Explore)
///     .previous_balance(10)
///     .change(1)
///     .build();
///
/// assert_eq!(record.map(|r| r.resulting_balance).ok(), Some(11));
/// ```
#[derive(Debug)]
pub struct RecordBuilder {
    actor_id: UserId,
    account: AccountKind,
    reason: ChangeReason,
    previous_balance: Option<u64>,
    change: Option<i64>,
}

impl RecordBuilder {
    /// Start building a record for the given actor, account and reason.
    pub const fn new(actor_id: UserId, account: AccountKind, reason: ChangeReason) -> Self {
        Self {
            actor_id,
            account,
            reason,
            previous_balance: None,
            change: None,
        }
    }

    /// Set the balance before the change.
    #[must_use]
    pub const fn previous_balance(mut self, balance: u64) -> Self {
        self.previous_balance = Some(balance);
        self
    }

    /// Set the applied delta.
    #[must_use]
    pub const fn change(mut self, delta: i64) -> Self {
        self.change = Some(delta);
        self
    }

    /// Validate inputs and produce a [`LedgerRecord`].
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::MissingField`] if the balance or change is
    /// not set, [`LedgerError::NegativeBalance`] or
    /// [`LedgerError::BalanceOverflow`] if the change does not fit, and
    /// [`LedgerError::UncorrectedExperienceLoss`] for a negative
    /// experience change outside a correction reason.
    pub fn build(self) -> Result<LedgerRecord, LedgerError> {
        let previous = self
            .previous_balance
            .ok_or(LedgerError::MissingField("previous_balance"))?;
        let change = self.change.ok_or(LedgerError::MissingField("change"))?;

        if self.account == AccountKind::Experience
            && change.is_negative()
            && !self.reason.is_correction()
        {
            return Err(LedgerError::UncorrectedExperienceLoss {
                change,
                reason: self.reason,
            });
        }

        let resulting_balance = apply_change(self.account, previous, change)?;

        Ok(LedgerRecord {
            id: LedgerRecordId::new(),
            actor_id: self.actor_id,
            account: self.account,
            change_amount: change,
            resulting_balance,
            reason: self.reason,
            created_at: Utc::now(),
        })
    }
}

/// Apply a signed change to an unsigned balance with checked arithmetic.
///
/// # Errors
///
/// Returns [`LedgerError::NegativeBalance`] if the result would be below
/// zero, or [`LedgerError::BalanceOverflow`] if it would exceed `u64::MAX`.
pub const fn apply_change(
    account: AccountKind,
    previous: u64,
    change: i64,
) -> Result<u64, LedgerError> {
    let magnitude = change.unsigned_abs();
    if change.is_negative() {
        match previous.checked_sub(magnitude) {
            Some(balance) => Ok(balance),
            None => Err(LedgerError::NegativeBalance {
                account,
                previous,
                change,
            }),
        }
    } else {
        match previous.checked_add(magnitude) {
            Some(balance) => Ok(balance),
            None => Err(LedgerError::BalanceOverflow {
                account,
                previous,
                change,
            }),
        }
    }
}
