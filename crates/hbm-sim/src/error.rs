//! Error types for the load driver binary.

/// Top-level error for the load driver.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: hbm_core::ConfigError,
    },

    /// The `load` section of the config file is malformed.
    #[error("load config error: {message}")]
    LoadConfig {
        /// Description of the failure.
        message: String,
    },

    /// Seeding accounts, spaces or treasures failed.
    #[error("setup error: {source}")]
    Setup {
        /// The underlying engine error.
        #[from]
        source: hbm_core::EngineError,
    },

    /// A worker task panicked or was cancelled.
    #[error("worker task failed: {source}")]
    Worker {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },

    /// At least one account failed its ledger audit.
    #[error("{count} account(s) failed the ledger audit")]
    AuditFailed {
        /// Number of failing accounts.
        count: usize,
    },
}
