//! Fake position / fake port call detection.
//!
//! Consecutive broadcasts implying > 25 kn over more than 1 nm and more than
//! 36 s are kinematically impossible for a laden tanker and mark a
//! manufactured track (e.g. a fabricated port visit). Scanning is read-only
//! and fans out across vessels; writes happen serially afterwards.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde_json::json;

use crate::geo::haversine_nm;
use crate::store::FleetStore;
use crate::types::{SpoofingAnomaly, SpoofingType, VesselId};

use super::SpoofingRunReport;

/// Max realistic speed for a tanker, knots.
const MAX_FEASIBLE_SPEED_KN: f64 = 25.0;
/// Below this distance the jump is GPS jitter, not spoofing.
const MIN_DISTANCE_NM: f64 = 1.0;
/// Below this interval the pair is a data race, not spoofing (36 s).
const MIN_INTERVAL_H: f64 = 0.01;

struct FakeJump {
    vessel_id: VesselId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    distance_nm: f64,
    time_diff_h: f64,
    implied_speed_kn: f64,
}

pub fn detect_fake_positions(store: &FleetStore) -> SpoofingRunReport {
    let mut report = SpoofingRunReport::ok();
    let vessels = match store.active_vessels() {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "fake position detection could not list vessels");
            report.errors += 1;
            return report;
        }
    };

    // Phase 1: read-only scan, parallel across vessels.
    let scan_results: Vec<Result<Vec<FakeJump>, crate::store::StoreError>> = vessels
        .par_iter()
        .map(|vessel| {
            let points = store.points_for_vessel(vessel.vessel_id)?;
            Ok(find_fake_jumps(vessel.vessel_id, &points))
        })
        .collect();

    // Phase 2: serial writes.
    let mut candidates = Vec::new();
    for result in scan_results {
        match result {
            Ok(jumps) => {
                if !jumps.is_empty() {
                    report.vessels_checked += 1;
                }
                candidates.extend(jumps);
            }
            Err(e) => {
                tracing::warn!(error = %e, "fake position scan failed");
                report.errors += 1;
            }
        }
    }

    for jump in candidates {
        let write = (|| -> crate::store::StoreResult<bool> {
            let already = store
                .anomalies_for_vessel(jump.vessel_id)?
                .iter()
                .any(|a| {
                    a.anomaly_type == SpoofingType::FakePortCall && a.start_time_utc == jump.start
                });
            if already {
                return Ok(false);
            }
            store.insert_anomaly(&SpoofingAnomaly {
                anomaly_id: store.next_id()?,
                vessel_id: jump.vessel_id,
                anomaly_type: SpoofingType::FakePortCall,
                start_time_utc: jump.start,
                end_time_utc: Some(jump.end),
                implied_speed_kn: Some(round1(jump.implied_speed_kn)),
                plausibility_score: None,
                risk_score_component: 40,
                evidence_json: json!({
                    "description": format!(
                        "Kinematically impossible: {:.1}nm in {:.2}h = {:.1}kn (max feasible: {MAX_FEASIBLE_SPEED_KN}kn)",
                        jump.distance_nm, jump.time_diff_h, jump.implied_speed_kn
                    ),
                    "distance_nm": round1(jump.distance_nm),
                    "time_diff_h": (jump.time_diff_h * 100.0).round() / 100.0,
                    "implied_speed_kn": round1(jump.implied_speed_kn),
                }),
                gap_event_id: None,
            })?;
            Ok(true)
        })();
        match write {
            Ok(true) => report.anomalies_created += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(vessel_id = jump.vessel_id, error = %e, "fake position write failed");
                report.errors += 1;
            }
        }
    }

    tracing::info!(
        anomalies = report.anomalies_created,
        vessels = report.vessels_checked,
        "fake position detection complete"
    );
    report
}

fn find_fake_jumps(vessel_id: VesselId, points: &[crate::types::AisPoint]) -> Vec<FakeJump> {
    let mut jumps = Vec::new();
    for pair in points.windows(2) {
        let (p1, p2) = (&pair[0], &pair[1]);
        let dt_h = (p2.timestamp_utc - p1.timestamp_utc).num_seconds() as f64 / 3600.0;
        if dt_h <= 0.0 || dt_h < MIN_INTERVAL_H {
            continue;
        }
        let dist_nm = haversine_nm(p1.lat, p1.lon, p2.lat, p2.lon);
        if dist_nm < MIN_DISTANCE_NM {
            continue;
        }
        let implied = dist_nm / dt_h;
        if implied <= MAX_FEASIBLE_SPEED_KN {
            continue;
        }
        jumps.push(FakeJump {
            vessel_id,
            start: p1.timestamp_utc,
            end: p2.timestamp_utc,
            distance_nm: dist_nm,
            time_diff_h: dt_h,
            implied_speed_kn: implied,
        });
    }
    jumps
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AisClass, AisPoint, Vessel};
    use chrono::{Duration, TimeZone, Utc};

    fn point(minutes: i64, lat: f64, lon: f64) -> AisPoint {
        AisPoint {
            vessel_id: 1,
            timestamp_utc: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minutes),
            lat,
            lon,
            sog: Some(10.0),
            cog: None,
            heading: None,
            nav_status: None,
            ais_class: AisClass::A,
            source: "csv_import".into(),
        }
    }

    fn seed(store: &FleetStore) {
        store
            .insert_vessel(&Vessel::new(
                1,
                "636017000",
                Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            ))
            .unwrap();
    }

    #[test]
    fn test_forty_nm_in_one_hour_is_fake() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        store.insert_point(&point(0, 55.0, 10.0)).unwrap();
        // 40 nm north in 60 min => 40 kn implied.
        store.insert_point(&point(60, 55.0 + 40.0 / 60.0, 10.0)).unwrap();

        let report = detect_fake_positions(&store);
        assert_eq!(report.anomalies_created, 1);
        let a = &store.anomalies_for_vessel(1).unwrap()[0];
        assert_eq!(a.anomaly_type, SpoofingType::FakePortCall);
        assert_eq!(a.risk_score_component, 40);
        let implied = a.implied_speed_kn.unwrap();
        assert!((implied - 40.0).abs() < 1.0, "implied {implied}");
    }

    #[test]
    fn test_gps_jitter_is_ignored() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        store.insert_point(&point(0, 55.0, 10.0)).unwrap();
        // 0.5 nm in 40 s: huge implied speed, but under the 1 nm floor.
        let mut p = point(0, 55.0 + 0.5 / 60.0, 10.0);
        p.timestamp_utc += Duration::seconds(40);
        store.insert_point(&p).unwrap();
        let report = detect_fake_positions(&store);
        assert_eq!(report.anomalies_created, 0);
    }

    #[test]
    fn test_normal_transit_is_clean() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        store.insert_point(&point(0, 55.0, 10.0)).unwrap();
        store.insert_point(&point(60, 55.2, 10.0)).unwrap(); // 12 kn
        let report = detect_fake_positions(&store);
        assert_eq!(report.anomalies_created, 0);
    }

    #[test]
    fn test_rerun_does_not_duplicate() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        store.insert_point(&point(0, 55.0, 10.0)).unwrap();
        store.insert_point(&point(60, 55.0 + 40.0 / 60.0, 10.0)).unwrap();
        detect_fake_positions(&store);
        let report = detect_fake_positions(&store);
        assert_eq!(report.anomalies_created, 0);
        assert_eq!(store.anomalies_for_vessel(1).unwrap().len(), 1);
    }
}
