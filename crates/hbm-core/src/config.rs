//! Configuration loading and typed config structures for the space engine.
//!
//! The canonical configuration lives in `hbm-config.yaml` at the project
//! root under an `engine:` key. Every field has a default, so an empty
//! file is valid.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is outside its allowed range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// The offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level file layout of `hbm-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HbmConfig {
    /// Engine tuning.
    #[serde(default)]
    pub engine: EngineConfig,
}

impl HbmConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `HBM_LOCK_TIMEOUT_MS` overrides `engine.lock_timeout_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Self::parse_with_env(yaml, |name| std::env::var(name).ok())
    }

    /// Parse, resolving overrides through `env` instead of the process
    /// environment.
    fn parse_with_env(
        yaml: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.engine.apply_env_overrides(env)?;
        config.engine.validate()?;
        Ok(config)
    }
}

/// Tuning for the game session engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// How long an action waits for a space, account or treasure lock
    /// before failing with `Busy`.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Exploration budget of a newly created space.
    #[serde(default = "default_turns")]
    pub default_turns: u32,

    /// Stability of a new space when the creator supplies none.
    #[serde(default = "default_stability")]
    pub default_stability: u8,

    /// Turns consumed by one exploration (solo or team).
    #[serde(default = "default_explore_turn_step")]
    pub explore_turn_step: u32,

    /// Energy one solo exploration costs. Teams split it.
    #[serde(default = "default_explore_energy_cost")]
    pub explore_energy_cost: u32,

    /// Stability lost per explorer.
    #[serde(default = "default_explore_disturbance")]
    pub explore_disturbance: u32,

    /// Heat gained per explorer.
    #[serde(default = "default_heat_per_explore")]
    pub heat_per_explore: u64,

    /// Experience granted to each explorer.
    #[serde(default = "default_explore_experience")]
    pub explore_experience: u64,

    /// Minimum stability a space needs to be solidified.
    #[serde(default = "default_solidify_threshold")]
    pub solidify_threshold: u8,

    /// Experience granted to the creator when a space is solidified.
    #[serde(default = "default_solidify_experience")]
    pub solidify_experience: u64,

    /// Heat at which a temporary space is promoted to stable.
    #[serde(default = "default_stable_heat_threshold")]
    pub stable_heat_threshold: u64,

    /// Largest team allowed in a single team exploration.
    #[serde(default = "default_max_team_size")]
    pub max_team_size: usize,

    /// Heat a treasure gains per use.
    #[serde(default = "default_treasure_heat_per_use")]
    pub treasure_heat_per_use: u64,

    /// Energy debited from the user when a treasure is used.
    #[serde(default)]
    pub treasure_use_energy_cost: u32,

    /// Energy cap of newly opened accounts.
    #[serde(default = "default_max_energy")]
    pub default_max_energy: u32,

    /// Energy restored per elapsed recovery interval.
    #[serde(default = "default_recovery_amount")]
    pub recovery_amount: u32,

    /// Length of one recovery interval in seconds.
    #[serde(default = "default_recovery_interval_secs")]
    pub recovery_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            default_turns: default_turns(),
            default_stability: default_stability(),
            explore_turn_step: default_explore_turn_step(),
            explore_energy_cost: default_explore_energy_cost(),
            explore_disturbance: default_explore_disturbance(),
            heat_per_explore: default_heat_per_explore(),
            explore_experience: default_explore_experience(),
            solidify_threshold: default_solidify_threshold(),
            solidify_experience: default_solidify_experience(),
            stable_heat_threshold: default_stable_heat_threshold(),
            max_team_size: default_max_team_size(),
            treasure_heat_per_use: default_treasure_heat_per_use(),
            treasure_use_energy_cost: 0,
            default_max_energy: default_max_energy(),
            recovery_amount: default_recovery_amount(),
            recovery_interval_secs: default_recovery_interval_secs(),
        }
    }
}

impl EngineConfig {
    /// Lock acquisition timeout as a [`Duration`].
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Override fields from environment variables when present.
    fn apply_env_overrides(
        &mut self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = env("HBM_LOCK_TIMEOUT_MS") {
            self.lock_timeout_ms = raw.parse().map_err(|e| ConfigError::Invalid {
                field: "lock_timeout_ms",
                reason: format!("HBM_LOCK_TIMEOUT_MS={raw}: {e}"),
            })?;
        }
        Ok(())
    }

    /// Reject values the engine cannot operate with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_stability > 100 {
            return Err(ConfigError::Invalid {
                field: "default_stability",
                reason: format!("{} exceeds 100", self.default_stability),
            });
        }
        if self.solidify_threshold > 100 {
            return Err(ConfigError::Invalid {
                field: "solidify_threshold",
                reason: format!("{} exceeds 100", self.solidify_threshold),
            });
        }
        if self.max_team_size == 0 {
            return Err(ConfigError::Invalid {
                field: "max_team_size",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.recovery_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "recovery_interval_secs",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

const fn default_lock_timeout_ms() -> u64 {
    2000
}
const fn default_turns() -> u32 {
    10
}
const fn default_stability() -> u8 {
    100
}
const fn default_explore_turn_step() -> u32 {
    2
}
const fn default_explore_energy_cost() -> u32 {
    4
}
const fn default_explore_disturbance() -> u32 {
    5
}
const fn default_heat_per_explore() -> u64 {
    1
}
const fn default_explore_experience() -> u64 {
    1
}
const fn default_solidify_threshold() -> u8 {
    60
}
const fn default_solidify_experience() -> u64 {
    10
}
const fn default_stable_heat_threshold() -> u64 {
    10
}
const fn default_max_team_size() -> usize {
    8
}
const fn default_treasure_heat_per_use() -> u64 {
    1
}
const fn default_max_energy() -> u32 {
    256
}
const fn default_recovery_amount() -> u32 {
    1
}
const fn default_recovery_interval_secs() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = HbmConfig::parse("{}").ok();
        assert_eq!(
            config.map(|c| c.engine.default_turns),
            Some(default_turns())
        );
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let yaml = "engine:\n  explore_turn_step: 3\n  solidify_threshold: 75\n";
        let config = HbmConfig::parse(yaml).map(|c| c.engine).unwrap_or_default();
        assert_eq!(config.explore_turn_step, 3);
        assert_eq!(config.solidify_threshold, 75);
        assert_eq!(config.default_max_energy, 256);
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let yaml = "engine:\n  solidify_threshold: 101\n";
        assert!(matches!(
            HbmConfig::parse(yaml),
            Err(ConfigError::Invalid {
                field: "solidify_threshold",
                ..
            })
        ));
    }

    #[test]
    fn zero_team_size_rejected() {
        let config = EngineConfig {
            max_team_size: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(matches!(
            HbmConfig::parse("engine: [not, a, map"),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn lock_timeout_converts_to_duration() {
        let config = EngineConfig::default();
        assert_eq!(config.lock_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn lock_timeout_env_override_applies_without_file_values() {
        let env = |name: &str| (name == "HBM_LOCK_TIMEOUT_MS").then(|| "350".to_owned());
        let config = HbmConfig::parse_with_env("{}", env).map(|c| c.engine).ok();
        assert_eq!(config.map(|c| c.lock_timeout_ms), Some(350));
    }

    #[test]
    fn malformed_lock_timeout_override_is_rejected() {
        let env = |_: &str| Some("soon".to_owned());
        assert!(matches!(
            HbmConfig::parse_with_env("{}", env),
            Err(ConfigError::Invalid {
                field: "lock_timeout_ms",
                ..
            })
        ));
    }
}
