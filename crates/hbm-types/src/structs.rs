//! Core entity structs for the HBM space engine.
//!
//! These are plain records. The rules that govern how they change live in
//! `hbm-core`; nothing here enforces invariants beyond the field types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{AccountKind, ChangeReason, SpaceType};
use crate::ids::{LedgerRecordId, SpaceId, TreasureId, UserId};

// ---------------------------------------------------------------------------
// User account
// ---------------------------------------------------------------------------

/// The subset of a user row the engine reads and writes.
///
/// `current_level` is derived from `experience` by the leveling table and
/// is not stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UserAccount {
    /// Owning user.
    pub user_id: UserId,
    /// Spendable energy, always within `0..=max_energy`.
    pub energy: u32,
    /// Energy cap.
    pub max_energy: u32,
    /// Accumulated experience.
    pub experience: u64,
    /// Instant from which the next regeneration interval is counted.
    pub energy_recovery_at: DateTime<Utc>,
}

impl UserAccount {
    /// A fresh account with a full energy bar and no experience.
    pub const fn new(user_id: UserId, max_energy: u32, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            energy: max_energy,
            max_energy,
            experience: 0,
            energy_recovery_at: now,
        }
    }

    /// Current balance of the given account kind.
    pub fn balance(&self, kind: AccountKind) -> u64 {
        match kind {
            AccountKind::Energy => u64::from(self.energy),
            AccountKind::Experience => self.experience,
        }
    }
}

// ---------------------------------------------------------------------------
// Space
// ---------------------------------------------------------------------------

/// A space: the shared entity players explore and stabilize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Space {
    /// Unique space identifier.
    pub id: SpaceId,
    /// Lifecycle stage.
    pub space_type: SpaceType,
    /// Display title.
    pub title: String,
    /// Body text written by the author.
    pub content: String,
    /// Health of the space, kept within `0..=100`.
    pub stability: u8,
    /// Accumulated activity. Never decreases.
    pub heat: u64,
    /// Remaining exploration budget.
    pub turns_left: u32,
    /// User who opened the space. Immutable.
    pub creator_id: UserId,
    /// User credited with the content. Immutable.
    pub author_id: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Treasure
// ---------------------------------------------------------------------------

/// An owned item that restores stability when used on a space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Treasure {
    /// Unique treasure identifier.
    pub id: TreasureId,
    /// Display name.
    pub name: String,
    /// Flavor text describing the effect.
    pub effect: String,
    /// Base effect magnitude, strictly positive.
    pub strength: u32,
    /// Replicas act at half strength.
    pub is_replica: bool,
    /// Percentage deviation from the nominal strength. Positive values
    /// weaken the effect, negative values amplify it.
    pub deviation: i32,
    /// Number of heat units gathered through use.
    pub heat: u64,
    /// Current owner.
    pub owner_id: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Ledger record
// ---------------------------------------------------------------------------

/// One immutable energy or experience change.
///
/// `resulting_balance` is the balance immediately after `change_amount`
/// was applied, so a user's records can be replayed to reconstruct the
/// account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LedgerRecord {
    /// Unique record identifier (time-ordered).
    pub id: LedgerRecordId,
    /// The user whose balance changed.
    pub actor_id: UserId,
    /// Which balance changed.
    pub account: AccountKind,
    /// Applied delta. Overflow discarded at the energy cap is not included.
    pub change_amount: i64,
    /// Balance after the change.
    pub resulting_balance: u64,
    /// Why the balance changed.
    pub reason: ChangeReason,
    /// Real-world timestamp.
    pub created_at: DateTime<Utc>,
}
