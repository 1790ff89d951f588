//! Shared type definitions for the HBM space engine.
//!
//! This crate is the single source of truth for the records the engine
//! reads, writes and returns. Types flow downstream to `TypeScript` via
//! `ts-rs` so the front end can render snapshots without a hand-written
//! schema.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for users, spaces, treasures, ledger records
//! - [`enums`] -- Space lifecycle stages, ledger account kinds, change reasons
//! - [`structs`] -- Persisted entities (accounts, spaces, treasures, ledger records)
//! - [`actions`] -- Typed action outcomes returned by the engine

pub mod actions;
pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use actions::{ActionOutcome, ResourceDelta, SpaceSnapshot};
pub use enums::{AccountKind, ChangeReason, SpaceType};
pub use ids::{LedgerRecordId, SpaceId, TreasureId, UserId};
pub use structs::{LedgerRecord, Space, Treasure, UserAccount};
