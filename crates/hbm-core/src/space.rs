//! Space lifecycle rules.
//!
//! Every function here is pure: it takes the current [`Space`] and returns
//! the next one, leaving persistence to the engine. A rejected transition
//! returns an error and produces no new state, so callers can validate an
//! entire action before writing anything.
//!
//! Lifecycle: `Temp -> Stable -> Fixed`. `Temp` is promoted to `Stable`
//! once its heat reaches `stable_heat_threshold`; any non-fixed space is
//! fixed by [`solidify`]. [`reset`] is the single backwards transition.

use chrono::{DateTime, Utc};
use hbm_types::{Space, SpaceId, SpaceType, UserId};

use crate::config::EngineConfig;
use crate::error::EngineError;

/// Upper bound of space stability.
pub const MAX_STABILITY: u8 = 100;

/// Clamp an arbitrary stability value into `0..=100`.
pub fn clamp_stability(value: i64) -> u8 {
    u8::try_from(value.clamp(0, i64::from(MAX_STABILITY))).unwrap_or(MAX_STABILITY)
}

/// Parameters for a new space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSpace {
    /// Id to create the space under.
    pub id: SpaceId,
    /// User opening the space.
    pub creator_id: UserId,
    /// User credited with the content.
    pub author_id: UserId,
    /// Display title.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Requested starting stability, clamped. `None` uses the default.
    pub initial_stability: Option<i64>,
}

/// A fresh `Temp` space with the configured turn budget.
pub fn create(request: NewSpace, config: &EngineConfig, now: DateTime<Utc>) -> Space {
    let stability = request
        .initial_stability
        .map_or(config.default_stability, clamp_stability)
        .min(MAX_STABILITY);
    Space {
        id: request.id,
        space_type: SpaceType::Temp,
        title: request.title,
        content: request.content,
        stability,
        heat: 0,
        turns_left: config.default_turns,
        creator_id: request.creator_id,
        author_id: request.author_id,
        created_at: now,
        updated_at: now,
    }
}

/// Explore a space with `explorers` participants.
///
/// Consumes one turn step, lowers stability by the per-explorer
/// disturbance, raises heat per explorer and promotes a `Temp` space that
/// crosses the heat threshold.
///
/// # Errors
///
/// Returns [`EngineError::SpaceExhausted`] when no turns are left and
/// [`EngineError::InvalidArgument`] for an empty party.
pub fn explore(
    space: &Space,
    explorers: usize,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<Space, EngineError> {
    if space.turns_left == 0 {
        return Err(EngineError::SpaceExhausted(space.id));
    }
    let party = u32::try_from(explorers)
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| EngineError::InvalidArgument(format!("invalid party size {explorers}")))?;

    let disturbance = config.explore_disturbance.saturating_mul(party);
    let heat_gain = config.heat_per_explore.saturating_mul(u64::from(party));

    let mut next = space.clone();
    next.turns_left = space.turns_left.saturating_sub(config.explore_turn_step);
    next.stability = space
        .stability
        .saturating_sub(u8::try_from(disturbance).unwrap_or(u8::MAX));
    next.heat = space.heat.saturating_add(heat_gain);
    if next.space_type.can_advance_to(SpaceType::Stable)
        && next.heat >= config.stable_heat_threshold
    {
        next.space_type = SpaceType::Stable;
    }
    next.updated_at = now;
    Ok(next)
}

/// Raise stability by a treasure's magnitude, clamped at 100.
pub fn restore(space: &Space, magnitude: u32, now: DateTime<Utc>) -> Space {
    let mut next = space.clone();
    next.stability = space
        .stability
        .saturating_add(u8::try_from(magnitude).unwrap_or(u8::MAX))
        .min(MAX_STABILITY);
    next.updated_at = now;
    next
}

/// Fix a space permanently.
///
/// Returns `None` when the space is already fixed; that is a successful
/// no-op.
///
/// # Errors
///
/// Returns [`EngineError::InsufficientStability`] below the threshold.
pub fn solidify(
    space: &Space,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<Option<Space>, EngineError> {
    if space.space_type.is_terminal() {
        return Ok(None);
    }
    if space.stability < config.solidify_threshold {
        return Err(EngineError::InsufficientStability {
            space: space.id,
            stability: space.stability,
            threshold: config.solidify_threshold,
        });
    }
    let mut next = space.clone();
    next.space_type = SpaceType::Fixed;
    next.stability = MAX_STABILITY;
    next.updated_at = now;
    Ok(Some(next))
}

/// Return a space to `Temp` with a full turn budget. Heat and stability
/// are kept.
pub fn reset(space: &Space, config: &EngineConfig, now: DateTime<Utc>) -> Space {
    let mut next = space.clone();
    next.space_type = SpaceType::Temp;
    next.turns_left = config.default_turns;
    next.updated_at = now;
    next
}
