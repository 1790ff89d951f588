//! The in-memory ledger: an append-only log of balance changes.
//!
//! # Design
//!
//! - **Append-only**: records are never modified or deleted.
//! - **One record per adjustment**: the account layer appends exactly one
//!   record for every successful balance change.
//! - **Replayable**: each record carries the balance it produced.

use hbm_types::{AccountKind, LedgerRecord, UserId};

use crate::replay::{ReplayResult, verify_replay};

/// Append-only log of [`LedgerRecord`] values, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    records: Vec<LedgerRecord>,
}

impl Ledger {
    /// Create a new empty ledger.
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Return the number of records in the ledger.
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    /// Return whether the ledger has no records.
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record.
    pub fn append(&mut self, record: LedgerRecord) {
        tracing::trace!(
            actor = %record.actor_id,
            account = ?record.account,
            change = record.change_amount,
            balance = record.resulting_balance,
            "ledger append"
        );
        self.records.push(record);
    }

    /// Records of one user and account kind, in insertion order.
    pub fn records_for(&self, actor_id: UserId, account: AccountKind) -> Vec<&LedgerRecord> {
        self.records
            .iter()
            .filter(|r| r.actor_id == actor_id && r.account == account)
            .collect()
    }

    /// Records of one user across both account kinds.
    pub fn records_by_actor(&self, actor_id: UserId) -> Vec<&LedgerRecord> {
        self.records
            .iter()
            .filter(|r| r.actor_id == actor_id)
            .collect()
    }

    /// Most recent balance recorded for a user, if any record exists.
    pub fn last_balance(&self, actor_id: UserId, account: AccountKind) -> Option<u64> {
        self.records
            .iter()
            .rev()
            .find(|r| r.actor_id == actor_id && r.account == account)
            .map(|r| r.resulting_balance)
    }

    /// Replay a user's chain for one account kind.
    pub fn verify(
        &self,
        actor_id: UserId,
        account: AccountKind,
        opening_balance: Option<u64>,
    ) -> ReplayResult {
        verify_replay(opening_balance, self.records_for(actor_id, account))
    }
}

impl FromIterator<LedgerRecord> for Ledger {
    fn from_iter<I: IntoIterator<Item = LedgerRecord>>(records: I) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordBuilder;
    use hbm_types::ChangeReason;

    fn push(ledger: &mut Ledger, user: UserId, account: AccountKind, prev: u64, change: i64) {
        let reason = if account == AccountKind::Energy {
            ChangeReason::Explore
        } else {
            ChangeReason::System
        };
        if let Ok(record) = RecordBuilder::new(user, account, reason)
            .previous_balance(prev)
            .change(change)
            .build()
        {
            ledger.append(record);
        }
    }

    #[test]
    fn new_ledger_is_empty() {
        let ledger = Ledger::new();
        assert!(ledger.is_empty());
        assert_eq!(ledger.len(), 0);
    }

    #[test]
    fn records_for_filters_by_user_and_kind() {
        let mut ledger = Ledger::new();
        let alice = UserId::new();
        let bob = UserId::new();

        push(&mut ledger, alice, AccountKind::Energy, 256, -4);
        push(&mut ledger, alice, AccountKind::Experience, 0, 1);
        push(&mut ledger, bob, AccountKind::Energy, 256, -4);

        assert_eq!(ledger.records_for(alice, AccountKind::Energy).len(), 1);
        assert_eq!(ledger.records_by_actor(alice).len(), 2);
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn last_balance_tracks_latest_record() {
        let mut ledger = Ledger::new();
        let user = UserId::new();

        push(&mut ledger, user, AccountKind::Energy, 256, -4);
        push(&mut ledger, user, AccountKind::Energy, 252, -4);

        assert_eq!(ledger.last_balance(user, AccountKind::Energy), Some(248));
        assert_eq!(ledger.last_balance(user, AccountKind::Experience), None);
    }

    #[test]
    fn verify_consistent_chain() {
        let mut ledger = Ledger::new();
        let user = UserId::new();

        push(&mut ledger, user, AccountKind::Energy, 256, -4);
        push(&mut ledger, user, AccountKind::Energy, 252, 2);

        assert_eq!(
            ledger.verify(user, AccountKind::Energy, Some(256)),
            ReplayResult::Consistent {
                final_balance: Some(254)
            }
        );
    }

    #[test]
    fn collected_ledger_keeps_order() {
        let user = UserId::new();
        let mut source = Ledger::new();
        push(&mut source, user, AccountKind::Energy, 256, -4);
        push(&mut source, user, AccountKind::Energy, 252, -4);

        let ledger: Ledger = source.records_by_actor(user).into_iter().cloned().collect();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.last_balance(user, AccountKind::Energy), Some(248));
    }
}
