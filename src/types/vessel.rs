//! Vessel identity and identity-change history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{AisClass, ConfidenceLevel, FlagRisk, PiStatus};

/// Store-assigned vessel identifier.
pub type VesselId = u64;

// ============================================================================
// Vessel
// ============================================================================

/// Canonical vessel identity.
///
/// Created at first AIS sight, never deleted. When an identity is absorbed
/// by a merge, `merged_into_vessel_id` points to the canonical vessel and
/// the row stays behind for provenance. A vessel can never be its own merge
/// target (enforced by the store).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vessel {
    pub vessel_id: VesselId,
    /// 9-digit MMSI, unique among non-absorbed vessels.
    pub mmsi: String,
    /// 7-digit IMO hull number ("IMO" prefix stripped at ingest).
    pub imo: Option<String>,
    pub name: Option<String>,
    /// ISO 3166-1 alpha-2 flag code.
    pub flag: Option<String>,
    pub vessel_type: Option<String>,
    pub deadweight: Option<f64>,
    pub year_built: Option<i32>,
    pub ais_class: AisClass,
    pub flag_risk_category: FlagRisk,
    pub pi_coverage_status: PiStatus,
    pub pi_club_name: Option<String>,
    pub psc_detained_last_12m: bool,
    pub psc_major_deficiencies_last_12m: u32,
    /// Set once at first ingestion, never updated. Enables new-MMSI scoring.
    pub mmsi_first_seen_utc: Option<DateTime<Utc>>,
    pub callsign: Option<String>,
    pub owner_name: Option<String>,
    pub manager_name: Option<String>,
    pub ais_source: Option<String>,
    pub vessel_laid_up_30d: bool,
    pub vessel_laid_up_60d: bool,
    pub vessel_laid_up_in_sts_zone: bool,
    /// Non-null when this identity has been absorbed into another vessel.
    pub merged_into_vessel_id: Option<VesselId>,
    pub last_ais_received_utc: Option<DateTime<Utc>>,
    pub dark_fleet_confidence: Option<ConfidenceLevel>,
    /// Category → points evidence map from the confidence classifier.
    pub confidence_evidence_json: Option<serde_json::Value>,
    pub analyst_verified: bool,
    pub updated_at: DateTime<Utc>,
}

impl Vessel {
    /// Minimal vessel as created by the ingest upsert.
    pub fn new(vessel_id: VesselId, mmsi: impl Into<String>, first_seen: DateTime<Utc>) -> Self {
        Self {
            vessel_id,
            mmsi: mmsi.into(),
            imo: None,
            name: None,
            flag: None,
            vessel_type: None,
            deadweight: None,
            year_built: None,
            ais_class: AisClass::Unknown,
            flag_risk_category: FlagRisk::Unknown,
            pi_coverage_status: PiStatus::Unknown,
            pi_club_name: None,
            psc_detained_last_12m: false,
            psc_major_deficiencies_last_12m: 0,
            mmsi_first_seen_utc: Some(first_seen),
            callsign: None,
            owner_name: None,
            manager_name: None,
            ais_source: None,
            vessel_laid_up_30d: false,
            vessel_laid_up_60d: false,
            vessel_laid_up_in_sts_zone: false,
            merged_into_vessel_id: None,
            last_ais_received_utc: None,
            dark_fleet_confidence: None,
            confidence_evidence_json: None,
            analyst_verified: false,
            updated_at: first_seen,
        }
    }

    /// True when this identity has been absorbed by a merge.
    pub fn is_absorbed(&self) -> bool {
        self.merged_into_vessel_id.is_some()
    }

    /// Vessel age in whole years at `now`, if `year_built` is known.
    pub fn age_years(&self, now: DateTime<Utc>) -> Option<i32> {
        use chrono::Datelike;
        self.year_built.map(|yb| now.year() - yb)
    }
}

// ============================================================================
// Vessel history
// ============================================================================

/// One recorded identity-field change (name, flag, vessel_type, ais_class,
/// owner_name, pi_club_name, ...).
///
/// Deduplicated at write time: an identical (field, old, new) within 24 h of
/// an existing row is ignored so re-imports don't inflate change counts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VesselHistory {
    pub history_id: u64,
    pub vessel_id: VesselId,
    pub field_changed: String,
    pub old_value: String,
    pub new_value: String,
    pub observed_at: DateTime<Utc>,
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_vessel_defaults() {
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let v = Vessel::new(1, "636017000", ts);
        assert_eq!(v.mmsi, "636017000");
        assert_eq!(v.mmsi_first_seen_utc, Some(ts));
        assert!(!v.is_absorbed());
        assert_eq!(v.ais_class, AisClass::Unknown);
    }

    #[test]
    fn test_age_years() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let mut v = Vessel::new(1, "636017000", now);
        v.year_built = Some(2001);
        assert_eq!(v.age_years(now), Some(24));
    }
}
