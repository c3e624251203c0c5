//! Shared enums: classification values stored on entities.
//!
//! String serialization matches the wire/DB values (`snake_case` unless the
//! upstream convention differs, e.g. AIS class letters).

use serde::{Deserialize, Serialize};

// ============================================================================
// Vessel classification
// ============================================================================

/// AIS transponder class.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
pub enum AisClass {
    A,
    B,
    #[serde(rename = "unknown")]
    #[default]
    Unknown,
}

impl std::fmt::Display for AisClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AisClass::A => write!(f, "A"),
            AisClass::B => write!(f, "B"),
            AisClass::Unknown => write!(f, "unknown"),
        }
    }
}

/// Flag-state risk category derived from the registry lists.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FlagRisk {
    HighRisk,
    MediumRisk,
    LowRisk,
    #[default]
    Unknown,
}

/// P&I insurance coverage status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PiStatus {
    Active,
    Lapsed,
    #[default]
    Unknown,
}

// ============================================================================
// Corridors
// ============================================================================

/// Analyst-assigned corridor type.
///
/// `LegitimateTradeRoute` is the only type that reduces scores (< 1.0×
/// multiplier). `AnchorageHolding` is deliberately NOT a reducing type —
/// some anchorages are STS waiting areas and need the STS multiplier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CorridorType {
    ExportRoute,
    StsZone,
    ImportRoute,
    AnchorageHolding,
    DarkZone,
    LegitimateTradeRoute,
}

impl CorridorType {
    /// Config key used to look up the corridor multiplier.
    pub fn config_key(&self) -> &'static str {
        match self {
            CorridorType::ExportRoute => "export_route",
            CorridorType::StsZone => "sts_zone",
            CorridorType::ImportRoute => "import_route",
            CorridorType::AnchorageHolding => "anchorage_holding",
            CorridorType::DarkZone => "dark_zone",
            CorridorType::LegitimateTradeRoute => "legitimate_trade_route",
        }
    }
}

/// Coverage quality tag attached to gap events for analyst context.
///
/// Metadata only — never an input to scoring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoverageQuality {
    Good,
    Moderate,
    Partial,
    Poor,
    None,
    #[default]
    Unknown,
}

// ============================================================================
// Alerts and anomalies
// ============================================================================

/// Analyst workflow state of an alert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    #[default]
    New,
    UnderReview,
    NeedsSatelliteCheck,
    Documented,
    Dismissed,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertStatus::New => "new",
            AlertStatus::UnderReview => "under_review",
            AlertStatus::NeedsSatelliteCheck => "needs_satellite_check",
            AlertStatus::Documented => "documented",
            AlertStatus::Dismissed => "dismissed",
        };
        write!(f, "{s}")
    }
}

/// Identity-fraud / track-manipulation anomaly type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SpoofingType {
    MmsiReuse,
    StatelessMmsi,
    FlagHopping,
    ImoFraud,
    FakePortCall,
    SparseTransmission,
    TypeDwtMismatch,
    PiCycling,
    RouteLaundering,
    CircleSpoof,
}

impl std::fmt::Display for SpoofingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SpoofingType::MmsiReuse => "mmsi_reuse",
            SpoofingType::StatelessMmsi => "stateless_mmsi",
            SpoofingType::FlagHopping => "flag_hopping",
            SpoofingType::ImoFraud => "imo_fraud",
            SpoofingType::FakePortCall => "fake_port_call",
            SpoofingType::SparseTransmission => "sparse_transmission",
            SpoofingType::TypeDwtMismatch => "type_dwt_mismatch",
            SpoofingType::PiCycling => "pi_cycling",
            SpoofingType::RouteLaundering => "route_laundering",
            SpoofingType::CircleSpoof => "circle_spoof",
        };
        write!(f, "{s}")
    }
}

/// How an STS transfer pair was established.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StsDetectionType {
    #[default]
    VisibleVisible,
    VisibleDark,
    DarkDark,
    Approaching,
    GfwEncounter,
}

/// Interpolation method used to build a movement envelope.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeMethod {
    Linear,
    Spline,
    Kalman,
}

// ============================================================================
// Identity resolution
// ============================================================================

/// Lifecycle state of a merge candidate pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MergeCandidateStatus {
    #[default]
    Pending,
    AutoMerged,
    AnalystMerged,
    Rejected,
}

// ============================================================================
// Confidence classification
// ============================================================================

/// Per-vessel dark-fleet confidence label.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
    Confirmed,
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConfidenceLevel::None => "NONE",
            ConfidenceLevel::Low => "LOW",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::High => "HIGH",
            ConfidenceLevel::Confirmed => "CONFIRMED",
        };
        write!(f, "{s}")
    }
}

/// Evidence category buckets used by the confidence classifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceCategory {
    AisGap,
    Spoofing,
    StsTransfer,
    IdentityChange,
    Loitering,
    FleetPattern,
    Watchlist,
}

impl std::fmt::Display for EvidenceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EvidenceCategory::AisGap => "AIS_GAP",
            EvidenceCategory::Spoofing => "SPOOFING",
            EvidenceCategory::StsTransfer => "STS_TRANSFER",
            EvidenceCategory::IdentityChange => "IDENTITY_CHANGE",
            EvidenceCategory::Loitering => "LOITERING",
            EvidenceCategory::FleetPattern => "FLEET_PATTERN",
            EvidenceCategory::Watchlist => "WATCHLIST",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spoofing_type_serialization() {
        let json = serde_json::to_string(&SpoofingType::MmsiReuse).unwrap();
        assert_eq!(json, "\"mmsi_reuse\"");
        let back: SpoofingType = serde_json::from_str("\"circle_spoof\"").unwrap();
        assert_eq!(back, SpoofingType::CircleSpoof);
    }

    #[test]
    fn test_alert_status_default_is_new() {
        assert_eq!(AlertStatus::default(), AlertStatus::New);
    }

    #[test]
    fn test_confidence_ordering() {
        assert!(ConfidenceLevel::Confirmed > ConfidenceLevel::High);
        assert!(ConfidenceLevel::High > ConfidenceLevel::Medium);
        assert!(ConfidenceLevel::Low > ConfidenceLevel::None);
    }

    #[test]
    fn test_ais_class_unknown_lowercase() {
        let json = serde_json::to_string(&AisClass::Unknown).unwrap();
        assert_eq!(json, "\"unknown\"");
    }
}
