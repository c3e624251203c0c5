//! MMSI cloning detection: simultaneous transmissions from distant locations.
//!
//! The same MMSI broadcast from two places shows up as consecutive points of
//! one vessel requiring impossible speed. Pairs within 1 h implying > 50 kn
//! become `MmsiReuse` anomalies.

use serde_json::json;

use crate::store::{FleetStore, StoreResult};
use crate::types::{AisPoint, SpoofingAnomaly, SpoofingType, Vessel};

use super::SpoofingRunReport;

/// Beyond any vessel capability.
const IMPOSSIBLE_SPEED_KN: f64 = 50.0;
/// Window for consecutive point comparison.
const WINDOW_SECONDS: i64 = 3600;

/// Score a cloning event by implied speed.
fn score_cloning(implied_speed_kn: f64) -> i64 {
    if implied_speed_kn >= 100.0 {
        55
    } else if implied_speed_kn >= 30.0 {
        40
    } else {
        25
    }
}

struct Jump {
    a: AisPoint,
    b: AisPoint,
    distance_nm: f64,
    implied_speed_kn: f64,
}

pub fn detect_mmsi_cloning(store: &FleetStore) -> SpoofingRunReport {
    let mut report = SpoofingRunReport::ok();
    let vessels = match store.active_vessels() {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "MMSI cloning detection could not list vessels");
            report.errors += 1;
            return report;
        }
    };

    for vessel in vessels {
        report.vessels_checked += 1;
        if let Err(e) = scan_vessel(store, &vessel, &mut report) {
            tracing::warn!(mmsi = %vessel.mmsi, error = %e, "MMSI cloning scan failed");
            report.errors += 1;
        }
    }

    tracing::info!(
        vessels = report.vessels_checked,
        anomalies = report.anomalies_created,
        "MMSI cloning detection complete"
    );
    report
}

fn scan_vessel(
    store: &FleetStore,
    vessel: &Vessel,
    report: &mut SpoofingRunReport,
) -> StoreResult<()> {
    let points = store.points_for_vessel(vessel.vessel_id)?;
    if points.len() < 2 {
        return Ok(());
    }

    for jump in find_impossible_jumps(&points) {
        // One anomaly per (vessel, start time); re-runs are no-ops.
        let already = store
            .anomalies_for_vessel(vessel.vessel_id)?
            .iter()
            .any(|a| {
                a.anomaly_type == SpoofingType::MmsiReuse
                    && a.start_time_utc == jump.a.timestamp_utc
            });
        if already {
            continue;
        }

        let anomaly = SpoofingAnomaly {
            anomaly_id: store.next_id()?,
            vessel_id: vessel.vessel_id,
            anomaly_type: SpoofingType::MmsiReuse,
            start_time_utc: jump.a.timestamp_utc,
            end_time_utc: Some(jump.b.timestamp_utc),
            implied_speed_kn: Some(round1(jump.implied_speed_kn)),
            plausibility_score: None,
            risk_score_component: score_cloning(jump.implied_speed_kn),
            evidence_json: json!({
                "detection_type": "mmsi_cloning",
                "point_a": {"lat": jump.a.lat, "lon": jump.a.lon},
                "point_b": {"lat": jump.b.lat, "lon": jump.b.lon},
                "distance_nm": round1(jump.distance_nm),
                "time_delta_seconds": (jump.b.timestamp_utc - jump.a.timestamp_utc).num_seconds(),
            }),
            gap_event_id: None,
        };
        store.insert_anomaly(&anomaly)?;
        report.anomalies_created += 1;
    }
    Ok(())
}

/// Consecutive point pairs requiring impossible speed within the window.
fn find_impossible_jumps(points: &[AisPoint]) -> Vec<Jump> {
    let mut jumps = Vec::new();
    for pair in points.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let delta_secs = (b.timestamp_utc - a.timestamp_utc).num_seconds();
        if delta_secs <= 0 || delta_secs > WINDOW_SECONDS {
            continue;
        }
        let distance_nm = crate::geo::haversine_nm(a.lat, a.lon, b.lat, b.lon);
        let speed = distance_nm / (delta_secs as f64 / 3600.0);
        if speed > IMPOSSIBLE_SPEED_KN {
            jumps.push(Jump {
                a: a.clone(),
                b: b.clone(),
                distance_nm,
                implied_speed_kn: speed,
            });
        }
    }
    jumps
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
