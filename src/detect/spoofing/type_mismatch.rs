//! Vessel type / DWT consistency detection.
//!
//! A hull above 5 000 DWT reporting a non-commercial AIS type (fishing,
//! pleasure, tug, SAR, ...) is physically impossible and indicates
//! deliberate misreporting (+25). A recent type change in the last 90 days
//! is suspicious on its own (+15) and corroborating when combined.

use chrono::{Duration, Utc};
use serde_json::json;

use crate::config;
use crate::store::{FleetStore, StoreResult};
use crate::types::{SpoofingAnomaly, SpoofingType, Vessel};

use super::SpoofingRunReport;

const LARGE_VESSEL_DWT: f64 = 5_000.0;
const TYPE_CHANGE_WINDOW_DAYS: i64 = 90;

/// AIS types that cannot apply to a hull above 5 000 DWT.
static NON_COMMERCIAL_TYPES: &[&str] = &[
    "fishing",
    "fishing vessel",
    "trawler",
    "pleasure craft",
    "pleasure",
    "yacht",
    "sailing",
    "sailing vessel",
    "recreational",
    "tug",
    "tugboat",
    "pilot vessel",
    "pilot",
    "search and rescue",
    "sar",
    "dredger",
    "dredging",
    "diving vessel",
    "diving",
    "military",
    "law enforcement",
    "medical transport",
    "reserved",
    "wing in ground",
    "wig",
];

fn is_non_commercial_type(vessel_type: Option<&str>) -> bool {
    vessel_type.is_some_and(|t| {
        let normalized = t.trim().to_ascii_lowercase();
        NON_COMMERCIAL_TYPES.contains(&normalized.as_str())
    })
}

pub fn detect_type_dwt_mismatch(store: &FleetStore) -> SpoofingRunReport {
    if !config::get().settings.type_consistency_detection_enabled {
        return SpoofingRunReport::disabled();
    }

    let mut report = SpoofingRunReport::ok();
    let vessels = match store.active_vessels() {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "type consistency detection could not list vessels");
            report.errors += 1;
            return report;
        }
    };

    for vessel in vessels {
        report.vessels_checked += 1;
        if let Err(e) = evaluate_vessel(store, &vessel, &mut report) {
            tracing::warn!(mmsi = %vessel.mmsi, error = %e, "type consistency scan failed");
            report.errors += 1;
        }
    }

    tracing::info!(
        anomalies = report.anomalies_created,
        vessels = report.vessels_checked,
        "vessel type consistency detection complete"
    );
    report
}

fn evaluate_vessel(
    store: &FleetStore,
    vessel: &Vessel,
    report: &mut SpoofingRunReport,
) -> StoreResult<()> {
    if store.has_anomaly_of_type(vessel.vessel_id, SpoofingType::TypeDwtMismatch)? {
        return Ok(());
    }

    let mismatch = vessel.deadweight.is_some_and(|d| d > LARGE_VESSEL_DWT)
        && is_non_commercial_type(vessel.vessel_type.as_deref());

    let cutoff = Utc::now() - Duration::days(TYPE_CHANGE_WINDOW_DAYS);
    let type_changes: Vec<_> = store
        .history_for_vessel(vessel.vessel_id)?
        .into_iter()
        .filter(|h| h.field_changed == "vessel_type" && h.observed_at >= cutoff)
        .collect();

    let (score, mut evidence) = match (mismatch, type_changes.is_empty()) {
        (true, true) => (
            25,
            json!({
                "reason": "type_dwt_mismatch",
                "deadweight": vessel.deadweight,
                "reported_type": vessel.vessel_type,
                "dwt_threshold": LARGE_VESSEL_DWT,
                "recent_type_change": false,
            }),
        ),
        (true, false) => (
            40,
            json!({
                "reason": "type_dwt_mismatch",
                "deadweight": vessel.deadweight,
                "reported_type": vessel.vessel_type,
                "dwt_threshold": LARGE_VESSEL_DWT,
                "recent_type_change": true,
            }),
        ),
        (false, false) => (
            15,
            json!({
                "reason": "recent_type_change",
                "recent_type_change": true,
            }),
        ),
        (false, true) => return Ok(()),
    };

    if !type_changes.is_empty() {
        evidence["type_changes"] = type_changes
            .iter()
            .map(|c| {
                json!({
                    "old_type": c.old_value,
                    "new_type": c.new_value,
                    "date": c.observed_at.to_rfc3339(),
                })
            })
            .collect();
    }

    let start = type_changes
        .first()
        .map_or_else(Utc::now, |c| c.observed_at);
    store.insert_anomaly(&SpoofingAnomaly {
        anomaly_id: store.next_id()?,
        vessel_id: vessel.vessel_id,
        anomaly_type: SpoofingType::TypeDwtMismatch,
        start_time_utc: start,
        end_time_utc: Some(Utc::now()),
        implied_speed_kn: None,
        plausibility_score: None,
        risk_score_component: score,
        evidence_json: evidence,
        gap_event_id: None,
    })?;
    report.anomalies_created += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn vessel(id: u64, mmsi: &str, vessel_type: Option<&str>, dwt: Option<f64>) -> Vessel {
        let mut v = Vessel::new(id, mmsi, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        v.vessel_type = vessel_type.map(String::from);
        v.deadweight = dwt;
        v
    }

    #[test]
    fn test_large_fishing_vessel_flagged() {
        let store = FleetStore::temporary().unwrap();
        store
            .insert_vessel(&vessel(1, "636017000", Some("Fishing"), Some(100_000.0)))
            .unwrap();
        let report = detect_type_dwt_mismatch(&store);
        assert_eq!(report.anomalies_created, 1);
        let a = &store.anomalies_for_vessel(1).unwrap()[0];
        assert_eq!(a.risk_score_component, 25);
    }

    #[test]
    fn test_recent_type_change_alone_scores_15() {
        let store = FleetStore::temporary().unwrap();
        store
            .insert_vessel(&vessel(1, "636017000", Some("Crude Oil Tanker"), Some(100_000.0)))
            .unwrap();
        store
            .record_history(
                1,
                "vessel_type",
                "Cargo",
                "Crude Oil Tanker",
                Utc::now() - Duration::days(10),
                "test",
            )
            .unwrap();
        let report = detect_type_dwt_mismatch(&store);
        assert_eq!(report.anomalies_created, 1);
        assert_eq!(
            store.anomalies_for_vessel(1).unwrap()[0].risk_score_component,
            15
        );
    }

    #[test]
    fn test_mismatch_plus_recent_change_scores_40() {
        let store = FleetStore::temporary().unwrap();
        store
            .insert_vessel(&vessel(1, "636017000", Some("Tug"), Some(80_000.0)))
            .unwrap();
        store
            .record_history(
                1,
                "vessel_type",
                "Crude Oil Tanker",
                "Tug",
                Utc::now() - Duration::days(5),
                "test",
            )
            .unwrap();
        let report = detect_type_dwt_mismatch(&store);
        assert_eq!(report.anomalies_created, 1);
        assert_eq!(
            store.anomalies_for_vessel(1).unwrap()[0].risk_score_component,
            40
        );
    }

    #[test]
    fn test_consistent_tanker_is_clean() {
        let store = FleetStore::temporary().unwrap();
        store
            .insert_vessel(&vessel(1, "636017000", Some("Crude Oil Tanker"), Some(300_000.0)))
            .unwrap();
        let report = detect_type_dwt_mismatch(&store);
        assert_eq!(report.anomalies_created, 0);
    }

    #[test]
    fn test_small_fishing_vessel_is_clean() {
        let store = FleetStore::temporary().unwrap();
        store
            .insert_vessel(&vessel(1, "257123456", Some("Fishing"), Some(800.0)))
            .unwrap();
        let report = detect_type_dwt_mismatch(&store);
        assert_eq!(report.anomalies_created, 0);
    }
}
