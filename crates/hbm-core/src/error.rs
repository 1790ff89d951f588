//! Error types for the `hbm-core` crate.
//!
//! Every engine operation returns [`EngineError`]. Callers that only need
//! to branch on the failure class use [`EngineError::kind`], which maps
//! each variant onto the closed [`ErrorKind`] set.

use hbm_ledger::LedgerError;
use hbm_types::{AccountKind, SpaceId, TreasureId, UserId};
use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// Failure class reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A space, treasure or account is absent or not owned by the actor.
    NotFound,
    /// The id is already taken.
    AlreadyExists,
    /// An energy or experience precondition is unmet.
    InsufficientResource,
    /// The space has no turns left.
    SpaceExhausted,
    /// The space is not stable enough to solidify.
    InsufficientStability,
    /// A lock could not be acquired in time.
    Busy,
    /// The request itself is malformed.
    InvalidArgument,
    /// Persistence or bookkeeping failure. The action was rolled back.
    Internal,
}

/// Errors that can occur during engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No space with this id exists.
    #[error("space not found: {0}")]
    SpaceNotFound(SpaceId),

    /// No account exists for this user.
    #[error("account not found: {0}")]
    AccountNotFound(UserId),

    /// No treasure with this id exists.
    #[error("treasure not found: {0}")]
    TreasureNotFound(TreasureId),

    /// The treasure exists but belongs to someone else.
    #[error("treasure {treasure} is not owned by {user}")]
    TreasureNotOwned {
        /// The treasure.
        treasure: TreasureId,
        /// The user who tried to use it.
        user: UserId,
    },

    /// A space with this id already exists.
    #[error("space already exists: {0}")]
    SpaceAlreadyExists(SpaceId),

    /// An account for this user already exists.
    #[error("account already exists: {0}")]
    AccountAlreadyExists(UserId),

    /// The user cannot pay the energy cost.
    #[error("user {user} needs {required} energy but has {available}")]
    InsufficientEnergy {
        /// The user.
        user: UserId,
        /// Energy the action costs.
        required: u32,
        /// Energy the user holds.
        available: u32,
    },

    /// A correction would drive experience below zero.
    #[error("user {user} cannot lose {required} experience, has {available}")]
    InsufficientExperience {
        /// The user.
        user: UserId,
        /// Experience the correction removes.
        required: u64,
        /// Experience the user holds.
        available: u64,
    },

    /// The space has no exploration turns left.
    #[error("space {0} is exhausted")]
    SpaceExhausted(SpaceId),

    /// The space is below the solidification threshold.
    #[error("space {space} has stability {stability}, needs {threshold} to solidify")]
    InsufficientStability {
        /// The space.
        space: SpaceId,
        /// Its current stability.
        stability: u8,
        /// The required stability.
        threshold: u8,
    },

    /// A lock was not acquired within the configured timeout.
    #[error("{resource} {key} is busy (waited {waited_ms} ms)")]
    Busy {
        /// What kind of entity was locked (`space`, `account`, `treasure`).
        resource: &'static str,
        /// The contended key.
        key: String,
        /// How long the action waited.
        waited_ms: u64,
    },

    /// The request is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Arithmetic overflow during a checked computation.
    #[error("arithmetic overflow: {context}")]
    ArithmeticOverflow {
        /// What was being computed.
        context: &'static str,
    },

    /// A ledger record could not be built.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The persistence collaborator failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Replaying the ledger does not reproduce the stored balance.
    #[error("audit mismatch for {user} {account:?}: {detail}")]
    AuditMismatch {
        /// The user.
        user: UserId,
        /// Which balance disagrees.
        account: AccountKind,
        /// What disagreed.
        detail: String,
    },
}

impl EngineError {
    /// The failure class of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::SpaceNotFound(_)
            | Self::AccountNotFound(_)
            | Self::TreasureNotFound(_)
            | Self::TreasureNotOwned { .. } => ErrorKind::NotFound,
            Self::SpaceAlreadyExists(_) | Self::AccountAlreadyExists(_) => {
                ErrorKind::AlreadyExists
            }
            Self::InsufficientEnergy { .. } | Self::InsufficientExperience { .. } => {
                ErrorKind::InsufficientResource
            }
            Self::SpaceExhausted(_) => ErrorKind::SpaceExhausted,
            Self::InsufficientStability { .. } => ErrorKind::InsufficientStability,
            Self::Busy { .. } => ErrorKind::Busy,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::ArithmeticOverflow { .. }
            | Self::Ledger(_)
            | Self::Store(_)
            | Self::AuditMismatch { .. } => ErrorKind::Internal,
        }
    }
}
