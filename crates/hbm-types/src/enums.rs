//! Enumeration types for the HBM space engine.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Space lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle stage of a space.
///
/// Stages are ordered: a space only moves forward
/// (`Temp` -> `Stable` -> `Fixed`) unless an administrator resets it.
/// `Fixed` spaces are public safe zones and have no outgoing transition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum SpaceType {
    /// Freshly created, still volatile.
    #[default]
    Temp,
    /// Has accumulated enough activity to persist.
    Stable,
    /// Solidified into a permanent public area.
    Fixed,
}

impl SpaceType {
    /// Whether a transition from `self` to `next` moves forward in the
    /// lifecycle.
    pub fn can_advance_to(self, next: Self) -> bool {
        next > self
    }

    /// Whether this stage has no outgoing transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Fixed)
    }

    /// Storage name of the stage (matches the `space_types` column enum).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Temp => "temp",
            Self::Stable => "stable",
            Self::Fixed => "fixed",
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Which per-user balance a ledger record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum AccountKind {
    /// Spendable energy (the `energy_logs` table).
    Energy,
    /// Accumulated experience (the `experience_logs` table).
    Experience,
}

/// Why a balance changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ChangeReason {
    /// Solo exploration of a space.
    Explore,
    /// Shared exploration by a team.
    TeamExplore,
    /// Activating a treasure on a space.
    TreasureUse,
    /// Reward for solidifying a space.
    Solidify,
    /// Time-based energy regeneration.
    Recovery,
    /// Manual correction issued by an operator.
    System,
    /// Compensating entry written when an action is rolled back.
    Rollback,
}

impl ChangeReason {
    /// Whether this reason may carry a negative experience delta.
    ///
    /// Gameplay sources only ever grant experience.
    pub const fn is_correction(self) -> bool {
        matches!(self, Self::System | Self::Rollback)
    }

    /// Storage name written to the `change_reason` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Explore => "explore",
            Self::TeamExplore => "team_explore",
            Self::TreasureUse => "treasure_use",
            Self::Solidify => "solidify",
            Self::Recovery => "recovery",
            Self::System => "system",
            Self::Rollback => "rollback",
        }
    }
}

impl core::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_only_advances_forward() {
        assert!(SpaceType::Temp.can_advance_to(SpaceType::Stable));
        assert!(SpaceType::Temp.can_advance_to(SpaceType::Fixed));
        assert!(SpaceType::Stable.can_advance_to(SpaceType::Fixed));
        assert!(!SpaceType::Fixed.can_advance_to(SpaceType::Temp));
        assert!(!SpaceType::Stable.can_advance_to(SpaceType::Stable));
    }

    #[test]
    fn fixed_is_terminal() {
        assert!(SpaceType::Fixed.is_terminal());
        assert!(!SpaceType::Temp.is_terminal());
    }

    #[test]
    fn space_type_serializes_lowercase() {
        let json = serde_json::to_string(&SpaceType::Fixed).unwrap_or_default();
        assert_eq!(json, "\"fixed\"");
    }

    #[test]
    fn only_system_and_rollback_are_corrections() {
        assert!(ChangeReason::System.is_correction());
        assert!(ChangeReason::Rollback.is_correction());
        assert!(!ChangeReason::Explore.is_correction());
        assert!(!ChangeReason::Solidify.is_correction());
    }
}
