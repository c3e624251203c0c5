//! Runtime settings loaded from environment variables.
//!
//! Every numeric threshold and feature flag has a documented default so a
//! bare environment runs the full pipeline against local files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Runtime settings (environment-backed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory for the embedded database.
    pub database_path: PathBuf,
    /// Path to the risk scoring YAML (the single source of coefficients).
    pub risk_scoring_config: PathBuf,
    /// Path to the corridors YAML.
    pub corridors_config: PathBuf,
    /// Path to the route-laundering intermediary ports YAML.
    pub laundering_config: PathBuf,

    // Gap detection thresholds (hours)
    pub gap_min_hours: f64,
    pub gap_alert_hours: f64,

    // STS proximity
    pub sts_proximity_meters: f64,
    /// Minimum 15-minute windows of sustained proximity (8 = 2 hours).
    pub sts_min_windows: u32,
    /// Known bunkering vessels excluded from STS candidate pairs.
    pub bunkering_mmsi: Vec<String>,

    // Upload and query limits
    pub max_upload_size_mb: u64,
    pub max_query_limit: usize,

    // Feature flags
    pub feed_outage_detection_enabled: bool,
    pub stateless_mmsi_detection_enabled: bool,
    pub flag_hopping_detection_enabled: bool,
    pub imo_fraud_detection_enabled: bool,
    pub sparse_transmission_detection_enabled: bool,
    pub type_consistency_detection_enabled: bool,
    pub pi_cycling_detection_enabled: bool,
    pub route_laundering_detection_enabled: bool,
    pub route_laundering_lookback_days: i64,
    pub circle_spoof_detection_enabled: bool,
    pub sts_chain_detection_enabled: bool,
    pub dark_sts_detection_enabled: bool,
    pub coverage_quality_tagging_enabled: bool,
    pub fleet_analysis_enabled: bool,

    // Paid verification
    pub verification_monthly_budget_usd: f64,

    // External feeds
    pub gfw_api_token: Option<String>,
    pub aishub_username: Option<String>,
    pub kystverket_enabled: bool,
    pub kystverket_host: String,
    pub kystverket_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/radiancefleet.db"),
            risk_scoring_config: PathBuf::from("config/risk_scoring.yaml"),
            corridors_config: PathBuf::from("config/corridors.yaml"),
            laundering_config: PathBuf::from("config/laundering_intermediaries.yaml"),
            gap_min_hours: 2.0,
            gap_alert_hours: 6.0,
            sts_proximity_meters: 200.0,
            sts_min_windows: 8,
            bunkering_mmsi: Vec::new(),
            max_upload_size_mb: 500,
            max_query_limit: 500,
            feed_outage_detection_enabled: true,
            stateless_mmsi_detection_enabled: true,
            flag_hopping_detection_enabled: true,
            imo_fraud_detection_enabled: true,
            sparse_transmission_detection_enabled: true,
            type_consistency_detection_enabled: true,
            pi_cycling_detection_enabled: true,
            route_laundering_detection_enabled: true,
            route_laundering_lookback_days: 180,
            circle_spoof_detection_enabled: true,
            sts_chain_detection_enabled: true,
            dark_sts_detection_enabled: true,
            coverage_quality_tagging_enabled: true,
            fleet_analysis_enabled: true,
            verification_monthly_budget_usd: 500.0,
            gfw_api_token: None,
            aishub_username: None,
            kystverket_enabled: false,
            kystverket_host: "153.44.253.27".to_string(),
            kystverket_port: 5631,
        }
    }
}

impl Settings {
    /// Build settings from environment variables, falling back to defaults.
    ///
    /// Variable names match the struct fields uppercased (e.g.
    /// `GAP_MIN_HOURS`, `FEED_OUTAGE_DETECTION_ENABLED`,
    /// `RADIANCEFLEET_DB_PATH` for the database directory).
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            database_path: env_path("RADIANCEFLEET_DB_PATH", d.database_path),
            risk_scoring_config: env_path("RISK_SCORING_CONFIG", d.risk_scoring_config),
            corridors_config: env_path("CORRIDORS_CONFIG", d.corridors_config),
            laundering_config: env_path("LAUNDERING_CONFIG", d.laundering_config),
            gap_min_hours: env_parse("GAP_MIN_HOURS", d.gap_min_hours),
            gap_alert_hours: env_parse("GAP_ALERT_HOURS", d.gap_alert_hours),
            sts_proximity_meters: env_parse("STS_PROXIMITY_METERS", d.sts_proximity_meters),
            sts_min_windows: env_parse("STS_MIN_WINDOWS", d.sts_min_windows),
            bunkering_mmsi: env_list("BUNKERING_MMSI"),
            max_upload_size_mb: env_parse("MAX_UPLOAD_SIZE_MB", d.max_upload_size_mb),
            max_query_limit: env_parse("MAX_QUERY_LIMIT", d.max_query_limit),
            feed_outage_detection_enabled: env_flag(
                "FEED_OUTAGE_DETECTION_ENABLED",
                d.feed_outage_detection_enabled,
            ),
            stateless_mmsi_detection_enabled: env_flag(
                "STATELESS_MMSI_DETECTION_ENABLED",
                d.stateless_mmsi_detection_enabled,
            ),
            flag_hopping_detection_enabled: env_flag(
                "FLAG_HOPPING_DETECTION_ENABLED",
                d.flag_hopping_detection_enabled,
            ),
            imo_fraud_detection_enabled: env_flag(
                "IMO_FRAUD_DETECTION_ENABLED",
                d.imo_fraud_detection_enabled,
            ),
            sparse_transmission_detection_enabled: env_flag(
                "SPARSE_TRANSMISSION_DETECTION_ENABLED",
                d.sparse_transmission_detection_enabled,
            ),
            type_consistency_detection_enabled: env_flag(
                "TYPE_CONSISTENCY_DETECTION_ENABLED",
                d.type_consistency_detection_enabled,
            ),
            pi_cycling_detection_enabled: env_flag(
                "PI_CYCLING_DETECTION_ENABLED",
                d.pi_cycling_detection_enabled,
            ),
            route_laundering_detection_enabled: env_flag(
                "ROUTE_LAUNDERING_DETECTION_ENABLED",
                d.route_laundering_detection_enabled,
            ),
            route_laundering_lookback_days: env_parse(
                "ROUTE_LAUNDERING_LOOKBACK_DAYS",
                d.route_laundering_lookback_days,
            ),
            circle_spoof_detection_enabled: env_flag(
                "CIRCLE_SPOOF_DETECTION_ENABLED",
                d.circle_spoof_detection_enabled,
            ),
            sts_chain_detection_enabled: env_flag(
                "STS_CHAIN_DETECTION_ENABLED",
                d.sts_chain_detection_enabled,
            ),
            dark_sts_detection_enabled: env_flag(
                "DARK_STS_DETECTION_ENABLED",
                d.dark_sts_detection_enabled,
            ),
            coverage_quality_tagging_enabled: env_flag(
                "COVERAGE_QUALITY_TAGGING_ENABLED",
                d.coverage_quality_tagging_enabled,
            ),
            fleet_analysis_enabled: env_flag("FLEET_ANALYSIS_ENABLED", d.fleet_analysis_enabled),
            verification_monthly_budget_usd: env_parse(
                "VERIFICATION_MONTHLY_BUDGET_USD",
                d.verification_monthly_budget_usd,
            ),
            gfw_api_token: std::env::var("GFW_API_TOKEN").ok().filter(|s| !s.is_empty()),
            aishub_username: std::env::var("AISHUB_USERNAME").ok().filter(|s| !s.is_empty()),
            kystverket_enabled: env_flag("KYSTVERKET_ENABLED", d.kystverket_enabled),
            kystverket_host: std::env::var("KYSTVERKET_HOST").unwrap_or(d.kystverket_host),
            kystverket_port: env_parse("KYSTVERKET_PORT", d.kystverket_port),
        }
    }
}

fn env_path(name: &str, default: PathBuf) -> PathBuf {
    std::env::var(name).map_or(default, PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_list(name: &str) -> Vec<String> {
    std::env::var(name)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_documented_values() {
        let s = Settings::default();
        assert_eq!(s.gap_min_hours, 2.0);
        assert_eq!(s.sts_proximity_meters, 200.0);
        assert_eq!(s.sts_min_windows, 8);
        assert!(s.feed_outage_detection_enabled);
        assert_eq!(s.verification_monthly_budget_usd, 500.0);
    }
}
