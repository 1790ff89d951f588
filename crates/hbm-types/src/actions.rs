//! Typed results returned by engine actions.
//!
//! Every action resolves to either an [`ActionOutcome`] or a named error
//! kind in `hbm-core`, never a loose key/value map.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{AccountKind, ChangeReason, SpaceType};
use crate::ids::{SpaceId, UserId};
use crate::structs::{LedgerRecord, Space};

/// Read-only view of a space after an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SpaceSnapshot {
    /// The space.
    pub id: SpaceId,
    /// Lifecycle stage.
    pub space_type: SpaceType,
    /// Stability in `0..=100`.
    pub stability: u8,
    /// Accumulated heat.
    pub heat: u64,
    /// Remaining exploration budget.
    pub turns_left: u32,
    /// Creator of the space.
    pub creator_id: UserId,
    /// Author of the space content.
    pub author_id: UserId,
}

impl From<&Space> for SpaceSnapshot {
    fn from(space: &Space) -> Self {
        Self {
            id: space.id,
            space_type: space.space_type,
            stability: space.stability,
            heat: space.heat,
            turns_left: space.turns_left,
            creator_id: space.creator_id,
            author_id: space.author_id,
        }
    }
}

/// A balance change applied as part of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ResourceDelta {
    /// The user whose balance changed.
    pub user_id: UserId,
    /// Which balance changed.
    pub account: AccountKind,
    /// Applied delta.
    pub change_amount: i64,
    /// Balance after the change.
    pub resulting_balance: u64,
    /// Why the balance changed.
    pub reason: ChangeReason,
}

impl From<&LedgerRecord> for ResourceDelta {
    fn from(record: &LedgerRecord) -> Self {
        Self {
            user_id: record.actor_id,
            account: record.account,
            change_amount: record.change_amount,
            resulting_balance: record.resulting_balance,
            reason: record.reason,
        }
    }
}

/// The successful result of an engine action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ActionOutcome {
    /// State of the target space after the action.
    pub space: SpaceSnapshot,
    /// Every balance change the action applied, in ledger order.
    pub deltas: Vec<ResourceDelta>,
}

impl ActionOutcome {
    /// An outcome that changed no balances.
    pub const fn without_deltas(space: SpaceSnapshot) -> Self {
        Self {
            space,
            deltas: Vec::new(),
        }
    }
}
