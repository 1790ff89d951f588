//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Users, spaces, treasures and ledger records each get their own ID type
//! so they cannot be mixed up at compile time. New IDs use UUID v7
//! (time-ordered), which keeps ledger records naturally sortable.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Declares one `Uuid` newtype per listed name. Ids are minted with
/// [`Uuid::now_v7`] and print as the bare UUID.
macro_rules! uuid_ids {
    ($($(#[$doc:meta])* $name:ident;)+) => {$(
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Mint a fresh time-ordered id.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }
    )+};
}

uuid_ids! {
    /// A player account.
    UserId;
    /// A space.
    SpaceId;
    /// An owned treasure.
    TreasureId;
    /// One energy or experience ledger record.
    LedgerRecordId;
}
