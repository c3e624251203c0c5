//! Risk scoring configuration loaded from `risk_scoring.yaml`.
//!
//! The YAML file is the single source of scoring coefficients. Every section
//! is optional: a missing section deserializes to its conservative default so
//! a partial file still scores sensibly. Section names match §scoring of the
//! analyst documentation: gap_duration, dark_vessel, gap_frequency,
//! speed_anomaly, movement_envelope, spoofing, metadata, vessel_age,
//! flag_state, vessel_size_multiplier, watchlist, dark_zone, sts, behavioral,
//! legitimacy, corridor, score_bands, ais_class, pi_insurance, psc_detention,
//! identity_merge, hunt_scoring, fleet_analysis.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::CorridorType;

/// One risk band, classified from the final capped score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScoreBand::Low => "low",
            ScoreBand::Medium => "medium",
            ScoreBand::High => "high",
            ScoreBand::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GapDurationConfig {
    pub under_4h: i64,
    pub h4_to_8h: i64,
    pub h8_to_16h: i64,
    pub h16_to_24h: i64,
    pub over_24h: i64,
    /// Percent bonus applied when pre-gap SOG exceeds the class spike threshold.
    pub pre_gap_speed_spike_bonus_pct: i64,
}

impl Default for GapDurationConfig {
    fn default() -> Self {
        Self {
            under_4h: 5,
            h4_to_8h: 15,
            h8_to_16h: 25,
            h16_to_24h: 35,
            over_24h: 45,
            pre_gap_speed_spike_bonus_pct: 40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedAnomalyConfig {
    /// Pre-gap SOG spike threshold when the class is unknown, knots.
    pub spike_threshold_default_kn: f64,
    pub spike_threshold_vlcc_kn: f64,
    pub spike_threshold_suezmax_kn: f64,
    pub spike_threshold_aframax_kn: f64,
    pub spike_threshold_panamax_kn: f64,
}

impl Default for SpeedAnomalyConfig {
    fn default() -> Self {
        Self {
            spike_threshold_default_kn: 14.0,
            spike_threshold_vlcc_kn: 12.0,
            spike_threshold_suezmax_kn: 13.0,
            spike_threshold_aframax_kn: 14.0,
            spike_threshold_panamax_kn: 14.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementEnvelopeConfig {
    /// Ratio in (1.0, 1.05].
    pub ratio_above_1_0: i64,
    /// Ratio in (1.05, 1.1].
    pub ratio_above_1_05: i64,
    /// Ratio > 1.1 with the impossible-speed flag set.
    pub impossible_reappear: i64,
}

impl Default for MovementEnvelopeConfig {
    fn default() -> Self {
        Self {
            ratio_above_1_0: 10,
            ratio_above_1_05: 20,
            impossible_reappear: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GapFrequencyConfig {
    /// Rolling window for per-identity gap counting, days.
    pub window_days: i64,
    /// Points per additional gap beyond the first.
    pub per_gap_points: i64,
    /// Bound on the total frequency contribution.
    pub max_points: i64,
    /// Gap count at which the multi-gap bonus applies.
    pub multi_gap_threshold: u32,
    pub multi_gap_bonus: i64,
}

impl Default for GapFrequencyConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            per_gap_points: 5,
            max_points: 20,
            multi_gap_threshold: 3,
            multi_gap_bonus: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DarkVesselConfig {
    /// Search radius around the gap off/on position, nautical miles.
    pub match_radius_nm: f64,
    pub in_corridor: i64,
    pub outside_corridor: i64,
}

impl Default for DarkVesselConfig {
    fn default() -> Self {
        Self {
            match_radius_nm: 10.0,
            in_corridor: 35,
            outside_corridor: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DarkZoneConfig {
    /// Deduction applied inside known jamming zones (negative).
    pub jamming_zone_deduction: i64,
}

impl Default for DarkZoneConfig {
    fn default() -> Self {
        Self {
            jamming_zone_deduction: -10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Days since first MMSI sighting under which the identity counts as new.
    pub new_mmsi_days: i64,
    pub new_mmsi: i64,
    pub laid_up_30d: i64,
    pub laid_up_60d: i64,
    pub laid_up_in_sts_zone: i64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            new_mmsi_days: 30,
            new_mmsi: 20,
            laid_up_30d: 10,
            laid_up_60d: 15,
            laid_up_in_sts_zone: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VesselAgeConfig {
    /// 15-20 y bracket (KSE-calibrated; also applied beyond 20 y).
    pub age_15_20y: i64,
    /// 10-15 y bracket.
    pub age_10_15y: i64,
}

impl Default for VesselAgeConfig {
    fn default() -> Self {
        Self {
            age_15_20y: 12,
            age_10_15y: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagStateConfig {
    pub high_risk: i64,
    pub medium_risk: i64,
    pub low_risk: i64,
}

impl Default for FlagStateConfig {
    fn default() -> Self {
        Self {
            high_risk: 15,
            medium_risk: 5,
            low_risk: -5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AisClassConfig {
    /// Class B transponder on a tanker-sized hull.
    pub class_b_on_tanker: i64,
}

impl Default for AisClassConfig {
    fn default() -> Self {
        Self {
            class_b_on_tanker: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PiInsuranceConfig {
    pub lapsed: i64,
    /// Deduction for active IG-club coverage (negative).
    pub ig_club_deduction: i64,
}

impl Default for PiInsuranceConfig {
    fn default() -> Self {
        Self {
            lapsed: 15,
            ig_club_deduction: -5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PscDetentionConfig {
    pub detained_last_12m: i64,
    pub major_deficiency_each: i64,
    pub max_points: i64,
}

impl Default for PscDetentionConfig {
    fn default() -> Self {
        Self {
            detained_last_12m: 15,
            major_deficiency_each: 5,
            max_points: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchlistConfig {
    pub active_entry: i64,
    /// STS partner on OFAC/EU/KSE lists.
    pub sanctions_sts_association: i64,
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self {
            active_entry: 40,
            sanctions_sts_association: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StsConfig {
    /// One-shot addition for a linked STS event.
    pub linked_event: i64,
    /// Gap located inside an STS-tagged corridor.
    pub gap_in_sts_corridor: i64,
    /// Cap on the combined STS pathway.
    pub max_points: i64,
}

impl Default for StsConfig {
    fn default() -> Self {
        Self {
            linked_event: 25,
            gap_in_sts_corridor: 15,
            max_points: 40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoofingSectionConfig {
    /// Cap on the combined linked-anomaly pathway.
    pub linked_anomaly_cap: i64,
    /// Absorbed identity last seen at the gap position inside a dark zone.
    pub identity_swap_dark_zone: i64,
}

impl Default for SpoofingSectionConfig {
    fn default() -> Self {
        Self {
            linked_anomaly_cap: 55,
            identity_swap_dark_zone: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehavioralConfig {
    /// Russian port call within the voyage window.
    pub russian_port_call: i64,
    /// Composite: Russian port call AND the gap lies in an STS corridor.
    pub russian_port_call_sts_composite: i64,
    /// Voyage window for port-call lookback, days.
    pub voyage_window_days: i64,
    /// Sustained loitering run (≥ 12 qualifying buckets in a corridor).
    pub loiter_sustained: i64,
    /// Baseline loitering run.
    pub loiter_baseline: i64,
}

impl Default for BehavioralConfig {
    fn default() -> Self {
        Self {
            russian_port_call: 25,
            russian_port_call_sts_composite: 40,
            voyage_window_days: 30,
            loiter_sustained: 20,
            loiter_baseline: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LegitimacyConfig {
    /// Days without gaps required for the clean-history deduction.
    pub clean_history_days: i64,
    pub clean_history_deduction: i64,
    pub verified_eu_port_call_deduction: i64,
}

impl Default for LegitimacyConfig {
    fn default() -> Self {
        Self {
            clean_history_days: 30,
            clean_history_deduction: -10,
            verified_eu_port_call_deduction: -10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorridorMultiplierConfig {
    pub export_route: f64,
    pub sts_zone: f64,
    pub import_route: f64,
    pub anchorage_holding: f64,
    pub dark_zone: f64,
    /// Analyst-asserted reduction; must stay < 1.0.
    pub legitimate_trade_route: f64,
    /// No corridor associated.
    pub default: f64,
}

impl Default for CorridorMultiplierConfig {
    fn default() -> Self {
        Self {
            export_route: 1.5,
            sts_zone: 2.0,
            import_route: 1.3,
            anchorage_holding: 1.2,
            dark_zone: 1.4,
            legitimate_trade_route: 0.7,
            default: 1.0,
        }
    }
}

impl CorridorMultiplierConfig {
    pub fn for_type(&self, corridor_type: CorridorType) -> f64 {
        match corridor_type {
            CorridorType::ExportRoute => self.export_route,
            CorridorType::StsZone => self.sts_zone,
            CorridorType::ImportRoute => self.import_route,
            CorridorType::AnchorageHolding => self.anchorage_holding,
            CorridorType::DarkZone => self.dark_zone,
            CorridorType::LegitimateTradeRoute => self.legitimate_trade_route,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VesselSizeMultiplierConfig {
    /// DWT ≥ 200 000.
    pub vlcc: f64,
    /// 120 000 ≤ DWT < 200 000.
    pub suezmax: f64,
    /// 80 000 ≤ DWT < 120 000.
    pub aframax: f64,
    /// 60 000 ≤ DWT < 80 000.
    pub panamax: f64,
    pub default: f64,
}

impl Default for VesselSizeMultiplierConfig {
    fn default() -> Self {
        Self {
            vlcc: 1.5,
            suezmax: 1.35,
            aframax: 1.2,
            panamax: 1.1,
            default: 1.0,
        }
    }
}

impl VesselSizeMultiplierConfig {
    pub fn for_deadweight(&self, dwt: Option<f64>) -> f64 {
        match dwt {
            Some(d) if d >= 200_000.0 => self.vlcc,
            Some(d) if d >= 120_000.0 => self.suezmax,
            Some(d) if d >= 80_000.0 => self.aframax,
            Some(d) if d >= 60_000.0 => self.panamax,
            _ => self.default,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreBandsConfig {
    pub low_max: i64,
    pub medium_max: i64,
    pub high_max: i64,
}

impl Default for ScoreBandsConfig {
    fn default() -> Self {
        Self {
            low_max: 20,
            medium_max: 50,
            high_max: 75,
        }
    }
}

impl ScoreBandsConfig {
    pub fn classify(&self, score: i64) -> ScoreBand {
        if score <= self.low_max {
            ScoreBand::Low
        } else if score <= self.medium_max {
            ScoreBand::Medium
        } else if score <= self.high_max {
            ScoreBand::High
        } else {
            ScoreBand::Critical
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityMergeConfig {
    /// Candidates at or above this score merge without review.
    pub auto_merge_threshold: i64,
    /// Candidates at or above this score are queued for analyst review.
    pub review_threshold: i64,
    /// Track-end to track-start pairing window, days.
    pub window_days: i64,
    /// Require at least one identity anchor (IMO / callsign / name).
    pub require_identity_anchor: bool,
    pub proximity_points: i64,
    pub imo_match_points: i64,
    pub callsign_match_points: i64,
    pub name_similarity_points: i64,
    pub name_similarity_threshold: f64,
    pub type_dwt_points: i64,
    pub dwt_tolerance_pct: f64,
    pub fingerprint_bonus_max: i64,
}

impl Default for IdentityMergeConfig {
    fn default() -> Self {
        Self {
            auto_merge_threshold: 85,
            review_threshold: 60,
            window_days: 180,
            require_identity_anchor: true,
            proximity_points: 30,
            imo_match_points: 40,
            callsign_match_points: 25,
            name_similarity_points: 20,
            name_similarity_threshold: 85.0,
            type_dwt_points: 10,
            dwt_tolerance_pct: 15.0,
            fingerprint_bonus_max: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HuntScoringConfig {
    /// Minimum gap score before paid verification is considered.
    pub min_score_for_hunt: i64,
    pub satellite_candidate_bonus: i64,
}

impl Default for HuntScoringConfig {
    fn default() -> Self {
        Self {
            min_score_for_hunt: 76,
            satellite_candidate_bonus: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetAnalysisConfig {
    pub similarity_threshold: f64,
    pub min_cluster_size: usize,
    /// STS events within a cluster to raise a concentration alert.
    pub sts_concentration_threshold: usize,
    pub high_risk_avg_threshold: f64,
    /// Distinct flags within a cluster to raise a diversity alert.
    pub flag_diversity_threshold: usize,
}

impl Default for FleetAnalysisConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 85.0,
            min_cluster_size: 3,
            sts_concentration_threshold: 3,
            high_risk_avg_threshold: 50.0,
            flag_diversity_threshold: 3,
        }
    }
}

// ============================================================================
// Root
// ============================================================================

/// Root risk scoring configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskScoringConfig {
    pub gap_duration: GapDurationConfig,
    pub dark_vessel: DarkVesselConfig,
    pub gap_frequency: GapFrequencyConfig,
    pub speed_anomaly: SpeedAnomalyConfig,
    pub movement_envelope: MovementEnvelopeConfig,
    pub spoofing: SpoofingSectionConfig,
    pub metadata: MetadataConfig,
    pub vessel_age: VesselAgeConfig,
    pub flag_state: FlagStateConfig,
    pub vessel_size_multiplier: VesselSizeMultiplierConfig,
    pub watchlist: WatchlistConfig,
    pub dark_zone: DarkZoneConfig,
    pub sts: StsConfig,
    pub behavioral: BehavioralConfig,
    pub legitimacy: LegitimacyConfig,
    pub corridor: CorridorMultiplierConfig,
    pub score_bands: ScoreBandsConfig,
    pub ais_class: AisClassConfig,
    pub pi_insurance: PiInsuranceConfig,
    pub psc_detention: PscDetentionConfig,
    pub identity_merge: IdentityMergeConfig,
    pub hunt_scoring: HuntScoringConfig,
    pub fleet_analysis: FleetAnalysisConfig,
}

impl RiskScoringConfig {
    /// Load from a YAML file. A missing file degrades to defaults with a
    /// warning; a malformed file is an error.
    pub fn load(path: &Path) -> Result<Self, super::ConfigError> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "risk_scoring.yaml not found - using built-in defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| super::ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = serde_yaml::from_str(&contents)
            .map_err(|e| super::ConfigError::Yaml(path.to_path_buf(), e))?;
        config.validate(path)?;
        Ok(config)
    }

    /// Sanity-check loaded values: signals within [-50, 200], multipliers
    /// non-negative, legitimate-trade reduction below 1.
    fn validate(&self, path: &Path) -> Result<(), super::ConfigError> {
        let signals = [
            self.gap_duration.over_24h,
            self.movement_envelope.impossible_reappear,
            self.watchlist.active_entry,
            self.behavioral.russian_port_call_sts_composite,
            self.dark_zone.jamming_zone_deduction,
            self.legitimacy.clean_history_deduction,
        ];
        for v in signals {
            if !(-50..=200).contains(&v) {
                return Err(super::ConfigError::Invalid(
                    path.to_path_buf(),
                    format!("scoring signal {v} outside [-50, 200]"),
                ));
            }
        }
        let mults = [
            self.corridor.export_route,
            self.corridor.sts_zone,
            self.corridor.import_route,
            self.corridor.anchorage_holding,
            self.corridor.dark_zone,
            self.corridor.legitimate_trade_route,
            self.corridor.default,
            self.vessel_size_multiplier.vlcc,
            self.vessel_size_multiplier.default,
        ];
        for m in mults {
            if m < 0.0 {
                return Err(super::ConfigError::Invalid(
                    path.to_path_buf(),
                    format!("negative multiplier {m}"),
                ));
            }
        }
        if self.corridor.legitimate_trade_route >= 1.0 {
            return Err(super::ConfigError::Invalid(
                path.to_path_buf(),
                "legitimate_trade_route multiplier must reduce (< 1.0)".to_string(),
            ));
        }
        Ok(())
    }
}
