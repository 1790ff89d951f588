//! Append-only energy and experience ledger for the HBM space engine.
//!
//! Every balance change on a user account produces exactly one
//! [`LedgerRecord`](hbm_types::LedgerRecord). Records are never modified
//! or deleted; they are the sole audit trail for account balances.
//!
//! # Architecture
//!
//! - [`record`] -- The [`RecordBuilder`]: validated record construction.
//! - [`ledger`] -- The [`Ledger`]: in-memory append-only log.
//! - [`replay`] -- Replay verification of a user's record chain.
//!
//! # Replay Law
//!
//! For consecutive records `r[i-1]`, `r[i]` of one user and account kind:
//!
//! ```text
//! r[i].resulting_balance == r[i-1].resulting_balance + r[i].change_amount
//! ```
//!
//! A violation produces a [`ReplayAnomaly`]. The ledger never panics; it
//! returns errors.
//!
//! # Usage
//!
//! ```
//! use hbm_ledger::{Ledger, RecordBuilder, ReplayResult};
//! use hbm_types::{AccountKind, ChangeReason, UserId};
//!
//! let user = UserId::new();
//! let mut ledger = Ledger::new();
//!
//! let record = RecordBuilder::new(user, AccountKind::Energy, ChangeReason::Explore)
//!     .previous_balance(256)
//!     .change(-4)
//!     .build();
//! assert!(record.is_ok());
//! if let Ok(record) = record {
//!     assert_eq!(record.resulting_balance, 252);
//!     ledger.append(record);
//! }
//!
//! let chain = ledger.records_for(user, AccountKind::Energy);
//! assert!(matches!(
//!     hbm_ledger::replay::verify_replay(Some(256), chain),
//!     ReplayResult::Consistent { final_balance: Some(252) }
//! ));
//! ```

pub mod ledger;
pub mod record;
pub mod replay;

// Re-export primary types at crate root.
pub use ledger::Ledger;
pub use record::RecordBuilder;
pub use replay::ReplayResult;

use hbm_types::{AccountKind, ChangeReason, LedgerRecordId, UserId};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when building ledger records.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A required field was not set on the builder.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The change would drive the balance below zero.
    #[error("{account:?} balance {previous} cannot absorb change {change}")]
    NegativeBalance {
        /// Which balance.
        account: AccountKind,
        /// Balance before the change.
        previous: u64,
        /// The rejected change.
        change: i64,
    },

    /// The change would overflow the balance type.
    #[error("{account:?} balance overflow applying {change} to {previous}")]
    BalanceOverflow {
        /// Which balance.
        account: AccountKind,
        /// Balance before the change.
        previous: u64,
        /// The rejected change.
        change: i64,
    },

    /// Experience may only decrease through correction reasons.
    #[error("negative experience change {change} requires a correction reason, got {reason}")]
    UncorrectedExperienceLoss {
        /// The rejected change.
        change: i64,
        /// The non-correction reason supplied.
        reason: ChangeReason,
    },
}

// ---------------------------------------------------------------------------
// Anomaly type
// ---------------------------------------------------------------------------

/// A break in a user's record chain detected during replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayAnomaly {
    /// The user whose chain is broken.
    pub actor_id: UserId,
    /// Which balance.
    pub account: AccountKind,
    /// The first record that does not follow from its predecessor.
    pub record_id: LedgerRecordId,
    /// Balance the chain implied before this record.
    pub expected_previous: u64,
    /// Balance the record itself implies before its change.
    pub implied_previous: Option<u64>,
    /// Human-readable description.
    pub message: String,
}

impl core::fmt::Display for ReplayAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}
