//! Fleet Configuration Module
//!
//! Combines environment-backed runtime settings with the YAML scoring
//! configuration into one immutable value published at startup.
//!
//! ## Loading Order
//!
//! 1. Environment variables (paths, thresholds, feature flags)
//! 2. `risk_scoring.yaml` at the configured path (scoring coefficients)
//! 3. Built-in conservative defaults for anything missing
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! config::init(FleetConfig::load()?);
//!
//! // Anywhere in the codebase:
//! let min_hours = config::get().settings.gap_min_hours;
//! ```
//!
//! Reload is a whole-value swap (`config::reload()`); readers always see a
//! consistent snapshot and never block.

mod corridors;
mod risk;
mod settings;

pub use corridors::{
    load_corridor_definitions, load_intermediary_ports, CorridorDefinition, IntermediaryPort,
};
pub use risk::{
    AisClassConfig, BehavioralConfig, CorridorMultiplierConfig, DarkVesselConfig, DarkZoneConfig,
    FlagStateConfig, FleetAnalysisConfig, GapDurationConfig, GapFrequencyConfig,
    HuntScoringConfig, IdentityMergeConfig, LegitimacyConfig, MetadataConfig,
    MovementEnvelopeConfig, PiInsuranceConfig, PscDetentionConfig, RiskScoringConfig, ScoreBand,
    ScoreBandsConfig, SpeedAnomalyConfig, SpoofingSectionConfig, StsConfig,
    VesselAgeConfig, VesselSizeMultiplierConfig, WatchlistConfig,
};
pub use settings::Settings;

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

/// Configuration load errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("failed to parse {0}: {1}")]
    Yaml(PathBuf, #[source] serde_yaml::Error),
    #[error("invalid configuration in {0}: {1}")]
    Invalid(PathBuf, String),
}

/// Combined immutable configuration value.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub settings: Settings,
    pub risk: RiskScoringConfig,
    pub intermediary_ports: Vec<IntermediaryPort>,
}

impl FleetConfig {
    /// Load settings from the environment and scoring config from YAML.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Settings::from_env();
        let risk = RiskScoringConfig::load(&settings.risk_scoring_config)?;
        let intermediary_ports = load_intermediary_ports(&settings.laundering_config)?;
        Ok(Self {
            settings,
            risk,
            intermediary_ports,
        })
    }

    /// All-defaults configuration for tests.
    pub fn for_tests() -> Self {
        Self {
            settings: Settings::default(),
            risk: RiskScoringConfig::default(),
            intermediary_ports: Vec::new(),
        }
    }
}

/// Global configuration, published once and swapped atomically on reload.
static FLEET_CONFIG: OnceLock<ArcSwap<FleetConfig>> = OnceLock::new();

/// Publish the global configuration.
///
/// Calling more than once replaces the published value (same as `reload`).
pub fn init(config: FleetConfig) {
    match FLEET_CONFIG.get() {
        Some(cell) => cell.store(Arc::new(config)),
        None => {
            if FLEET_CONFIG.set(ArcSwap::from_pointee(config)).is_err() {
                tracing::warn!("config::init() raced another initializer - keeping existing value");
            }
        }
    }
}

/// Get a snapshot of the global configuration.
///
/// Falls back to built-in defaults when `init()` has not been called, so
/// library consumers and tests work without explicit setup.
pub fn get() -> Arc<FleetConfig> {
    match FLEET_CONFIG.get() {
        Some(cell) => cell.load_full(),
        None => {
            init(FleetConfig::for_tests());
            FLEET_CONFIG
                .get()
                .map_or_else(|| Arc::new(FleetConfig::for_tests()), |cell| cell.load_full())
        }
    }
}

/// Reload from disk and swap the published value. Readers holding the old
/// snapshot finish with it; new readers see the new value.
pub fn reload() -> Result<(), ConfigError> {
    let fresh = FleetConfig::load()?;
    init(fresh);
    tracing::info!("configuration reloaded");
    Ok(())
}

/// Check whether the configuration has been initialized.
pub fn is_initialized() -> bool {
    FLEET_CONFIG.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_without_init_returns_defaults() {
        let config = get();
        assert_eq!(config.settings.gap_min_hours, 2.0);
        assert_eq!(config.risk.score_bands.high_max, 75);
    }
}
