//! IMO fraud detection: duplicated or near-miss hull numbers.
//!
//! Mode A (simultaneous): the same checksum-valid IMO on two vessels that
//! both moved within 48 h while > 500 nm apart.
//! Mode B (near-miss): an IMO one digit away from a suspicious vessel's,
//! confirmed by at least 2 of {same type, DWT ±20%, other risk indicators}.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, Utc};
use serde_json::json;

use crate::config;
use crate::geo::haversine_nm;
use crate::store::{FleetStore, StoreResult};
use crate::types::{SpoofingAnomaly, SpoofingType, Vessel, VesselId};

use super::SpoofingRunReport;

const SIMULTANEOUS_DISTANCE_NM: f64 = 500.0;
const MOVEMENT_WINDOW_HOURS: i64 = 48;

/// Validate an IMO checksum: 7 digits, weighted sum of the first six
/// (weights 7..2) mod 10 equals the last digit.
pub fn validate_imo_checksum(imo: &str) -> bool {
    if imo.len() != 7 || !imo.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<u32> = imo.bytes().map(|b| u32::from(b - b'0')).collect();
    let weighted: u32 = digits[..6]
        .iter()
        .zip([7u32, 6, 5, 4, 3, 2])
        .map(|(d, w)| d * w)
        .sum();
    weighted % 10 == digits[6]
}

fn normalized_imo(vessel: &Vessel) -> Option<String> {
    let raw = vessel.imo.as_deref()?.trim();
    let stripped = raw
        .strip_prefix("IMO")
        .map_or(raw, str::trim_start)
        .trim()
        .to_string();
    if stripped.len() == 7 && stripped.bytes().all(|b| b.is_ascii_digit()) {
        Some(stripped)
    } else {
        None
    }
}

fn imo_differs_by_one(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.bytes().zip(b.bytes()).filter(|(x, y)| x != y).count() == 1
}

pub fn detect_imo_fraud(store: &FleetStore) -> SpoofingRunReport {
    if !config::get().settings.imo_fraud_detection_enabled {
        return SpoofingRunReport::disabled();
    }

    let mut report = SpoofingRunReport::ok();
    let result = (|| -> StoreResult<(usize, usize)> {
        let simultaneous = detect_simultaneous(store, &mut report)?;
        let near_miss = detect_near_miss(store, &mut report)?;
        Ok((simultaneous, near_miss))
    })();

    match result {
        Ok((simultaneous, near_miss)) => {
            tracing::info!(simultaneous, near_miss, "IMO fraud detection complete");
        }
        Err(e) => {
            tracing::error!(error = %e, "IMO fraud detection failed");
            report.errors += 1;
        }
    }
    report
}

fn has_recent_movement(store: &FleetStore, vessel_id: VesselId) -> StoreResult<bool> {
    let cutoff = Utc::now() - Duration::hours(MOVEMENT_WINDOW_HOURS);
    Ok(store
        .points_for_vessel_between(vessel_id, cutoff, Utc::now())?
        .iter()
        .any(|p| p.sog.is_some_and(|s| s > 0.5)))
}

fn detect_simultaneous(store: &FleetStore, report: &mut SpoofingRunReport) -> StoreResult<usize> {
    let vessels = store.active_vessels()?;
    let mut by_imo: HashMap<String, Vec<&Vessel>> = HashMap::new();
    for vessel in &vessels {
        if let Some(imo) = normalized_imo(vessel) {
            by_imo.entry(imo).or_default().push(vessel);
        }
    }

    let mut created = 0;
    for (imo, group) in &by_imo {
        if group.len() < 2 || !validate_imo_checksum(imo) {
            continue;
        }
        report.vessels_checked += group.len();

        for i in 0..group.len() {
            for j in (i + 1)..group.len() {
                let (v1, v2) = (group[i], group[j]);
                if !has_recent_movement(store, v1.vessel_id)?
                    || !has_recent_movement(store, v2.vessel_id)?
                {
                    continue;
                }
                let (Some(p1), Some(p2)) =
                    (store.last_point(v1.vessel_id)?, store.last_point(v2.vessel_id)?)
                else {
                    continue;
                };
                let distance = haversine_nm(p1.lat, p1.lon, p2.lat, p2.lon);
                if distance <= SIMULTANEOUS_DISTANCE_NM {
                    continue;
                }
                if store.has_anomaly_of_type(v1.vessel_id, SpoofingType::ImoFraud)? {
                    continue;
                }
                store.insert_anomaly(&SpoofingAnomaly {
                    anomaly_id: store.next_id()?,
                    vessel_id: v1.vessel_id,
                    anomaly_type: SpoofingType::ImoFraud,
                    start_time_utc: Utc::now(),
                    end_time_utc: None,
                    implied_speed_kn: None,
                    plausibility_score: None,
                    risk_score_component: 45,
                    evidence_json: json!({
                        "detection_type": "simultaneous",
                        "imo": imo,
                        "vessel_ids": [v1.vessel_id, v2.vessel_id],
                        "distance_nm": (distance * 10.0).round() / 10.0,
                    }),
                    gap_event_id: None,
                })?;
                created += 1;
                report.anomalies_created += 1;
            }
        }
    }
    Ok(created)
}

fn detect_near_miss(store: &FleetStore, report: &mut SpoofingRunReport) -> StoreResult<usize> {
    let suspicious_ids: HashSet<VesselId> = store
        .all_anomalies()?
        .iter()
        .map(|a| a.vessel_id)
        .collect();

    let vessels = store.active_vessels()?;
    let with_imo: Vec<(&Vessel, String)> = vessels
        .iter()
        .filter_map(|v| normalized_imo(v).map(|imo| (v, imo)))
        .collect();

    let mut created = 0;
    for (suspect, suspect_imo) in with_imo
        .iter()
        .filter(|(v, _)| suspicious_ids.contains(&v.vessel_id))
    {
        for (other, other_imo) in &with_imo {
            if other.vessel_id == suspect.vessel_id
                || !imo_differs_by_one(suspect_imo, other_imo)
            {
                continue;
            }

            let mut qualifying = Vec::new();
            if let (Some(a), Some(b)) = (&suspect.vessel_type, &other.vessel_type) {
                if a.eq_ignore_ascii_case(b) {
                    qualifying.push("same_vessel_type");
                }
            }
            if let (Some(a), Some(b)) = (suspect.deadweight, other.deadweight) {
                if a > 0.0 && (0.8..=1.2).contains(&(b / a)) {
                    qualifying.push("similar_dwt");
                }
            }
            if suspicious_ids.contains(&other.vessel_id) {
                qualifying.push("other_risk_indicators");
            }
            if qualifying.len() < 2 {
                continue;
            }
            if store.has_anomaly_of_type(suspect.vessel_id, SpoofingType::ImoFraud)? {
                continue;
            }

            store.insert_anomaly(&SpoofingAnomaly {
                anomaly_id: store.next_id()?,
                vessel_id: suspect.vessel_id,
                anomaly_type: SpoofingType::ImoFraud,
                start_time_utc: Utc::now(),
                end_time_utc: None,
                implied_speed_kn: None,
                plausibility_score: None,
                risk_score_component: 20,
                evidence_json: json!({
                    "detection_type": "near_miss",
                    "imo_a": suspect_imo,
                    "imo_b": other_imo,
                    "qualifying_criteria": qualifying,
                }),
                gap_event_id: None,
            })?;
            created += 1;
            report.anomalies_created += 1;
            break; // one near-miss per suspicious vessel
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AisClass;
    use chrono::TimeZone;

    fn vessel_with_imo(id: u64, mmsi: &str, imo: &str) -> Vessel {
        let mut v = Vessel::new(id, mmsi, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        v.imo = Some(imo.to_string());
        v
    }

    fn moving_point(vessel_id: u64, lat: f64, lon: f64) -> crate::types::AisPoint {
        crate::types::AisPoint {
            vessel_id,
            timestamp_utc: Utc::now() - Duration::hours(2),
            lat,
            lon,
            sog: Some(11.0),
            cog: Some(180.0),
            heading: None,
            nav_status: None,
            ais_class: AisClass::A,
            source: "terrestrial".into(),
        }
    }

    #[test]
    fn test_imo_checksum() {
        // 9074729: 9*7+0*6+7*5+4*4+7*3+2*2 = 63+0+35+16+21+4 = 139, 139 % 10 = 9.
        assert!(validate_imo_checksum("9074729"));
        assert!(!validate_imo_checksum("9074720"));
        assert!(!validate_imo_checksum("907472"));
        assert!(!validate_imo_checksum("907472a"));
    }

    #[test]
    fn test_simultaneous_imo_use() {
        let store = FleetStore::temporary().unwrap();
        store
            .insert_vessel(&vessel_with_imo(1, "636017000", "9074729"))
            .unwrap();
        store
            .insert_vessel(&vessel_with_imo(2, "273456789", "9074729"))
            .unwrap();
        // Both moving, ~1200 nm apart.
        store.insert_point(&moving_point(1, 55.0, 10.0)).unwrap();
        store.insert_point(&moving_point(2, 35.0, 10.0)).unwrap();

        let report = detect_imo_fraud(&store);
        assert_eq!(report.anomalies_created, 1);
        let a = &store.anomalies_for_vessel(1).unwrap()[0];
        assert_eq!(a.risk_score_component, 45);
        assert_eq!(a.evidence_json["detection_type"], "simultaneous");
    }

    #[test]
    fn test_nearby_twins_not_flagged() {
        let store = FleetStore::temporary().unwrap();
        store
            .insert_vessel(&vessel_with_imo(1, "636017000", "9074729"))
            .unwrap();
        store
            .insert_vessel(&vessel_with_imo(2, "273456789", "9074729"))
            .unwrap();
        // Both moving but only ~60 nm apart (data quality, not fraud).
        store.insert_point(&moving_point(1, 55.0, 10.0)).unwrap();
        store.insert_point(&moving_point(2, 56.0, 10.0)).unwrap();
        let report = detect_imo_fraud(&store);
        assert_eq!(report.anomalies_created, 0);
    }

    #[test]
    fn test_near_miss_needs_two_criteria() {
        let store = FleetStore::temporary().unwrap();
        let mut suspect = vessel_with_imo(1, "636017000", "9074729");
        suspect.vessel_type = Some("Crude Oil Tanker".into());
        suspect.deadweight = Some(100_000.0);
        store.insert_vessel(&suspect).unwrap();

        let mut twin = vessel_with_imo(2, "273456789", "9074728");
        twin.vessel_type = Some("Crude Oil Tanker".into());
        twin.deadweight = Some(105_000.0);
        store.insert_vessel(&twin).unwrap();

        // Mark vessel 1 as already suspicious via an unrelated anomaly.
        store
            .insert_anomaly(&SpoofingAnomaly {
                anomaly_id: 900,
                vessel_id: 1,
                anomaly_type: SpoofingType::SparseTransmission,
                start_time_utc: Utc::now(),
                end_time_utc: None,
                implied_speed_kn: None,
                plausibility_score: None,
                risk_score_component: 15,
                evidence_json: json!({}),
                gap_event_id: None,
            })
            .unwrap();

        let report = detect_imo_fraud(&store);
        assert_eq!(report.anomalies_created, 1);
        let anomalies = store.anomalies_for_vessel(1).unwrap();
        let fraud = anomalies
            .iter()
            .find(|a| a.anomaly_type == SpoofingType::ImoFraud)
            .unwrap();
        assert_eq!(fraud.risk_score_component, 20);
        assert_eq!(fraud.evidence_json["detection_type"], "near_miss");
    }
}
