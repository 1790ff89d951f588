//! Space lifecycle, resource accounts and the game session engine.
//!
//! [`GameEngine`] is the entry point. It coordinates the pure rules in
//! [`space`], [`accounts`] and [`treasure`] under per-entity locks from
//! [`locks`] and writes through a [`Store`].
//!
//! # Modules
//!
//! - [`accounts`] -- Energy and experience adjustments with ledger records
//! - [`config`] -- Engine tuning loaded from `hbm-config.yaml`
//! - [`engine`] -- Actions: create, explore, team explore, use treasure, solidify
//! - [`error`] -- Engine error enum and its caller-facing kinds
//! - [`locks`] -- Per-key async mutex registry with bounded waits
//! - [`space`] -- Pure lifecycle transitions of a space
//! - [`store`] -- Persistence trait and the in-memory store
//! - [`treasure`] -- Treasure registration and effect magnitude

pub mod accounts;
pub mod config;
pub mod engine;
pub mod error;
pub mod locks;
pub mod space;
pub mod store;
pub mod treasure;

pub use accounts::{AuditReport, ResourceAccounts};
pub use config::{ConfigError, EngineConfig, HbmConfig};
pub use engine::{CreateSpace, GameEngine};
pub use error::{EngineError, ErrorKind};
pub use store::{MemoryStore, Store, StoreError};
pub use treasure::NewTreasure;
