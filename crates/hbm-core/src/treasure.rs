//! Treasure registration and effect computation.
//!
//! Effects are computed with [`Decimal`] so deviation percentages never go
//! through floating point. A treasure restores
//! `strength * (1 - deviation / 100)` stability, halved for replicas,
//! floored at zero and truncated to a whole number.

use chrono::{DateTime, Utc};
use hbm_types::{Treasure, TreasureId, UserId};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::store::Store;

/// Parameters for registering a treasure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTreasure {
    /// Display name.
    pub name: String,
    /// Flavor text.
    pub effect: String,
    /// Base magnitude. Must be positive.
    pub strength: u32,
    /// Whether this is a replica.
    pub is_replica: bool,
    /// Percentage deviation from nominal strength.
    pub deviation: i32,
}

/// A treasure after one use, with the stability it restores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEffect {
    /// Stability to add to the target space.
    pub magnitude: u32,
    /// The treasure with its heat updated.
    pub treasure: Treasure,
}

/// Build a treasure owned by `owner`.
///
/// # Errors
///
/// Returns [`EngineError::InvalidArgument`] when `strength` is zero.
pub fn register(owner: UserId, request: NewTreasure, now: DateTime<Utc>) -> Result<Treasure, EngineError> {
    if request.strength == 0 {
        return Err(EngineError::InvalidArgument(
            "treasure strength must be positive".to_owned(),
        ));
    }
    Ok(Treasure {
        id: TreasureId::new(),
        name: request.name,
        effect: request.effect,
        strength: request.strength,
        is_replica: request.is_replica,
        deviation: request.deviation,
        heat: 0,
        owner_id: owner,
        created_at: now,
        updated_at: now,
    })
}

/// Stability a treasure restores per use.
///
/// # Errors
///
/// Returns [`EngineError::ArithmeticOverflow`] if a decimal step overflows.
pub fn effect_magnitude(treasure: &Treasure) -> Result<u32, EngineError> {
    let overflow = |context| EngineError::ArithmeticOverflow { context };

    let deviation = Decimal::from(treasure.deviation)
        .checked_div(Decimal::ONE_HUNDRED)
        .ok_or_else(|| overflow("treasure deviation ratio"))?;
    let factor = Decimal::ONE
        .checked_sub(deviation)
        .ok_or_else(|| overflow("treasure deviation factor"))?;
    let mut value = Decimal::from(treasure.strength)
        .checked_mul(factor)
        .ok_or_else(|| overflow("treasure strength scaling"))?;
    if treasure.is_replica {
        value = value
            .checked_div(Decimal::TWO)
            .ok_or_else(|| overflow("replica halving"))?;
    }

    if value.is_sign_negative() {
        return Ok(0);
    }
    Ok(value.trunc().to_u32().unwrap_or(u32::MAX))
}

/// Use a treasure as `user`.
///
/// # Errors
///
/// Returns [`EngineError::TreasureNotOwned`] when `user` is not the owner.
pub fn apply_effect(
    treasure: &Treasure,
    user: UserId,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<AppliedEffect, EngineError> {
    if treasure.owner_id != user {
        return Err(EngineError::TreasureNotOwned {
            treasure: treasure.id,
            user,
        });
    }
    let magnitude = effect_magnitude(treasure)?;
    let mut used = treasure.clone();
    used.heat = treasure.heat.saturating_add(config.treasure_heat_per_use);
    used.updated_at = now;
    Ok(AppliedEffect {
        magnitude,
        treasure: used,
    })
}

/// Load a treasure or fail with [`EngineError::TreasureNotFound`].
///
/// # Errors
///
/// Returns [`EngineError::TreasureNotFound`] or [`EngineError::Store`].
pub async fn load<S: Store>(store: &S, id: TreasureId) -> Result<Treasure, EngineError> {
    store
        .load_treasure(id)
        .await?
        .ok_or(EngineError::TreasureNotFound(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn treasure(strength: u32, deviation: i32, is_replica: bool) -> Treasure {
        Treasure {
            id: TreasureId::new(),
            name: "Lantern".to_owned(),
            effect: "steadies the walls".to_owned(),
            strength,
            is_replica,
            deviation,
            heat: 0,
            owner_id: UserId::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn nominal_treasure_restores_full_strength() {
        assert_eq!(effect_magnitude(&treasure(10, 0, false)).ok(), Some(10));
    }

    #[test]
    fn replica_restores_half() {
        assert_eq!(effect_magnitude(&treasure(10, 0, true)).ok(), Some(5));
        assert_eq!(effect_magnitude(&treasure(7, 0, true)).ok(), Some(3));
    }

    #[test]
    fn deviation_scales_strength() {
        assert_eq!(effect_magnitude(&treasure(10, 25, false)).ok(), Some(7));
        assert_eq!(effect_magnitude(&treasure(10, -50, false)).ok(), Some(15));
    }

    #[test]
    fn large_deviation_floors_at_zero() {
        assert_eq!(effect_magnitude(&treasure(10, 150, false)).ok(), Some(0));
    }

    #[test]
    fn zero_strength_is_rejected() {
        let result = register(
            UserId::new(),
            NewTreasure {
                name: String::new(),
                effect: String::new(),
                strength: 0,
                is_replica: false,
                deviation: 0,
            },
            Utc::now(),
        );
        assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn use_by_stranger_is_rejected() {
        let config = EngineConfig::default();
        let item = treasure(10, 0, false);
        assert!(matches!(
            apply_effect(&item, UserId::new(), &config, Utc::now()),
            Err(EngineError::TreasureNotOwned { .. })
        ));
    }

    #[test]
    fn use_adds_heat_and_keeps_treasure() {
        let config = EngineConfig::default();
        let item = treasure(10, 0, false);
        let applied = apply_effect(&item, item.owner_id, &config, Utc::now()).ok();
        assert_eq!(applied.as_ref().map(|a| a.magnitude), Some(10));
        assert_eq!(applied.as_ref().map(|a| a.treasure.heat), Some(1));
        assert_eq!(applied.map(|a| a.treasure.id), Some(item.id));
    }
}
