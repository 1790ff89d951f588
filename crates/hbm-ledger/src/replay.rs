//! Replay verification for a user's record chain.
//!
//! Every record states the balance it produced. Walking a user's records
//! in order, the balance each record implies *before* its change must
//! equal the balance the previous record produced:
//!
//! ```text
//! r[i].resulting_balance - r[i].change_amount == r[i-1].resulting_balance
//! ```
//!
//! The first record is checked against the opening balance when one is
//! known (experience always opens at zero; energy opens at the cap the
//! account was created with).

use hbm_types::LedgerRecord;

use crate::ReplayAnomaly;
use crate::record::apply_change;

/// The result of replaying one record chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayResult {
    /// Every record follows from its predecessor.
    Consistent {
        /// Balance after the last record, or the opening balance for an
        /// empty chain.
        final_balance: Option<u64>,
    },
    /// The chain is broken at the reported record.
    Anomaly(ReplayAnomaly),
}

/// Replay a chain of records belonging to one user and account kind.
///
/// Records from a different actor or account kind than the first record
/// are reported as an anomaly.
pub fn verify_replay<'a, I>(opening_balance: Option<u64>, records: I) -> ReplayResult
where
    I: IntoIterator<Item = &'a LedgerRecord>,
{
    let mut running = opening_balance;
    let mut owner = None;

    for record in records {
        let key = (record.actor_id, record.account);
        match owner {
            None => owner = Some(key),
            Some(expected) if expected != key => {
                return ReplayResult::Anomaly(anomaly(
                    record,
                    running.unwrap_or(0),
                    None,
                    "record belongs to a different chain".to_owned(),
                ));
            }
            Some(_) => {}
        }

        let implied = implied_previous(record);
        if let Some(expected) = running
            && implied != Some(expected)
        {
            let message = format!(
                "record {} implies previous balance {:?}, chain expected {expected}",
                record.id, implied
            );
            return ReplayResult::Anomaly(anomaly(record, expected, implied, message));
        }

        running = Some(record.resulting_balance);
    }

    ReplayResult::Consistent {
        final_balance: running,
    }
}

/// Balance the record implies before its change was applied.
fn implied_previous(record: &LedgerRecord) -> Option<u64> {
    let reversed = record.change_amount.checked_neg()?;
    apply_change(record.account, record.resulting_balance, reversed).ok()
}

fn anomaly(
    record: &LedgerRecord,
    expected_previous: u64,
    implied_previous: Option<u64>,
    message: String,
) -> ReplayAnomaly {
    tracing::warn!(
        actor = %record.actor_id,
        account = ?record.account,
        record = %record.id,
        "ledger replay anomaly: {message}"
    );
    ReplayAnomaly {
        actor_id: record.actor_id,
        account: record.account,
        record_id: record.id,
        expected_previous,
        implied_previous,
        message,
    }
}
