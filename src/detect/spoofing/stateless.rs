//! Stateless MMSI detection: vessels broadcasting unallocated, landlocked,
//! or micro-territory Maritime Identification Digits.
//!
//! A truly unallocated MID means the vessel operates outside any national
//! registry. Three tiers:
//!   1. unallocated MID          +35
//!   2. landlocked MID on tanker +20
//!   3. micro-territory MID      +10 (corroborating only)

use chrono::Utc;
use serde_json::json;

use crate::config;
use crate::registry::mid;
use crate::store::FleetStore;
use crate::types::{SpoofingAnomaly, SpoofingType, Vessel};

use super::SpoofingRunReport;

fn is_tanker(vessel: &Vessel) -> bool {
    vessel
        .vessel_type
        .as_deref()
        .is_some_and(|t| t.to_ascii_lowercase().contains("tanker"))
        || vessel.deadweight.is_some_and(|d| d >= 20_000.0)
}

pub fn detect_stateless_mmsi(store: &FleetStore) -> SpoofingRunReport {
    if !config::get().settings.stateless_mmsi_detection_enabled {
        return SpoofingRunReport::disabled();
    }

    let mut report = SpoofingRunReport::ok();
    let vessels = match store.active_vessels() {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "stateless MMSI detection could not list vessels");
            report.errors += 1;
            return report;
        }
    };

    let now = Utc::now();
    let mut tier_counts = [0usize; 3];

    for vessel in vessels {
        let Some(mid_value) = mid::extract_ship_mid(&vessel.mmsi) else {
            continue; // special MMSI forms are excluded from classification
        };
        report.vessels_checked += 1;

        let country = mid::mid_country(mid_value);
        let (tier, score) = if mid::is_unallocated_mid(mid_value) {
            (1u8, 35i64)
        } else if mid::is_landlocked_mid(mid_value) {
            if !is_tanker(&vessel) {
                continue;
            }
            (2, 20)
        } else if mid::is_micro_territory_mid(mid_value) {
            (3, 10)
        } else {
            continue;
        };

        let result = (|| -> crate::store::StoreResult<bool> {
            if store.has_anomaly_of_type(vessel.vessel_id, SpoofingType::StatelessMmsi)? {
                return Ok(false);
            }
            store.insert_anomaly(&SpoofingAnomaly {
                anomaly_id: store.next_id()?,
                vessel_id: vessel.vessel_id,
                anomaly_type: SpoofingType::StatelessMmsi,
                start_time_utc: now,
                end_time_utc: None,
                implied_speed_kn: None,
                plausibility_score: None,
                risk_score_component: score,
                evidence_json: json!({
                    "mid": mid_value,
                    "country": country,
                    "tier": tier,
                    "mmsi": vessel.mmsi,
                }),
                gap_event_id: None,
            })?;
            Ok(true)
        })();

        match result {
            Ok(true) => {
                report.anomalies_created += 1;
                tier_counts[usize::from(tier) - 1] += 1;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(mmsi = %vessel.mmsi, error = %e, "stateless MMSI write failed");
                report.errors += 1;
            }
        }
    }

    tracing::info!(
        total = report.anomalies_created,
        tier1 = tier_counts[0],
        tier2 = tier_counts[1],
        tier3 = tier_counts[2],
        vessels = report.vessels_checked,
        "stateless MMSI detection complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn vessel(id: u64, mmsi: &str, vessel_type: Option<&str>) -> Vessel {
        let mut v = Vessel::new(id, mmsi, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        v.vessel_type = vessel_type.map(String::from);
        v
    }

    #[test]
    fn test_unallocated_mid_tier1() {
        let store = FleetStore::temporary().unwrap();
        store.insert_vessel(&vessel(1, "600123456", None)).unwrap();
        let report = detect_stateless_mmsi(&store);
        assert_eq!(report.anomalies_created, 1);
        let a = &store.anomalies_for_vessel(1).unwrap()[0];
        assert_eq!(a.risk_score_component, 35);
        assert_eq!(a.evidence_json["tier"], 1);
    }

    #[test]
    fn test_landlocked_mid_only_flags_tankers() {
        let store = FleetStore::temporary().unwrap();
        // Mongolia (457) on a tanker and on an unclassified vessel.
        store
            .insert_vessel(&vessel(1, "457123456", Some("Crude Oil Tanker")))
            .unwrap();
        store.insert_vessel(&vessel(2, "457654321", None)).unwrap();
        let report = detect_stateless_mmsi(&store);
        assert_eq!(report.anomalies_created, 1);
        assert_eq!(store.anomalies_for_vessel(1).unwrap().len(), 1);
        assert!(store.anomalies_for_vessel(2).unwrap().is_empty());
        assert_eq!(
            store.anomalies_for_vessel(1).unwrap()[0].risk_score_component,
            20
        );
    }

    #[test]
    fn test_special_mmsi_forms_excluded() {
        let store = FleetStore::temporary().unwrap();
        store.insert_vessel(&vessel(1, "111600123", None)).unwrap(); // SAR aircraft
        store.insert_vessel(&vessel(2, "996001234", None)).unwrap(); // AtoN
        let report = detect_stateless_mmsi(&store);
        assert_eq!(report.anomalies_created, 0);
        assert_eq!(report.vessels_checked, 0);
    }

    #[test]
    fn test_allocated_mid_is_clean() {
        let store = FleetStore::temporary().unwrap();
        store
            .insert_vessel(&vessel(1, "636017000", Some("Crude Oil Tanker")))
            .unwrap();
        let report = detect_stateless_mmsi(&store);
        assert_eq!(report.anomalies_created, 0);
    }
}
