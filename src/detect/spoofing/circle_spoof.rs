//! Circle spoof detection: a manufactured track that stays in one spot.
//!
//! GNSS spoofing rigs commonly replay positions confined to a tight cluster
//! while the transponder keeps reporting way. Six hours of points inside a
//! ~0.01° cluster with sustained reported SOG ≥ 2 kn cannot be a real
//! drifting vessel.

use serde_json::json;

use crate::config;
use crate::geo::haversine_nm;
use crate::store::{FleetStore, StoreResult};
use crate::types::{AisPoint, SpoofingAnomaly, SpoofingType, Vessel};

use super::SpoofingRunReport;

/// Cluster radius bound, degrees (~0.6 nm at mid latitudes).
const CLUSTER_RADIUS_DEG: f64 = 0.01;
/// Minimum run duration, hours.
const MIN_DURATION_H: f64 = 6.0;
/// Minimum sustained reported SOG, knots.
const MIN_REPORTED_SOG_KN: f64 = 2.0;
/// Minimum points in the run.
const MIN_POINTS: usize = 8;

pub fn detect_circle_spoofing(store: &FleetStore) -> SpoofingRunReport {
    if !config::get().settings.circle_spoof_detection_enabled {
        return SpoofingRunReport::disabled();
    }

    let mut report = SpoofingRunReport::ok();
    let vessels = match store.active_vessels() {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "circle spoof detection could not list vessels");
            report.errors += 1;
            return report;
        }
    };

    for vessel in vessels {
        if let Err(e) = scan_vessel(store, &vessel, &mut report) {
            tracing::warn!(mmsi = %vessel.mmsi, error = %e, "circle spoof scan failed");
            report.errors += 1;
        }
    }

    tracing::info!(
        anomalies = report.anomalies_created,
        vessels = report.vessels_checked,
        "circle spoof detection complete"
    );
    report
}

fn scan_vessel(
    store: &FleetStore,
    vessel: &Vessel,
    report: &mut SpoofingRunReport,
) -> StoreResult<()> {
    let points = store.points_for_vessel(vessel.vessel_id)?;
    if points.len() < MIN_POINTS {
        return Ok(());
    }
    report.vessels_checked += 1;

    if store.has_anomaly_of_type(vessel.vessel_id, SpoofingType::CircleSpoof)? {
        return Ok(());
    }

    let Some(run) = find_spoofed_cluster(&points) else {
        return Ok(());
    };

    let duration_h =
        (run.last().map(|p| p.timestamp_utc).unwrap_or_default()
            - run.first().map(|p| p.timestamp_utc).unwrap_or_default())
        .num_seconds() as f64
            / 3600.0;
    let mean_sog =
        run.iter().filter_map(|p| p.sog).sum::<f64>() / run.iter().filter(|p| p.sog.is_some()).count().max(1) as f64;
    let center_lat = run.iter().map(|p| p.lat).sum::<f64>() / run.len() as f64;
    let center_lon = run.iter().map(|p| p.lon).sum::<f64>() / run.len() as f64;
    let max_excursion_nm = run
        .iter()
        .map(|p| haversine_nm(center_lat, center_lon, p.lat, p.lon))
        .fold(0.0f64, f64::max);

    // Reported motion over the run vs. actual confinement.
    let implied_travel_nm = mean_sog * duration_h;
    let plausibility = if implied_travel_nm > 0.0 {
        (max_excursion_nm * 2.0 / implied_travel_nm).min(1.0)
    } else {
        1.0
    };

    store.insert_anomaly(&SpoofingAnomaly {
        anomaly_id: store.next_id()?,
        vessel_id: vessel.vessel_id,
        anomaly_type: SpoofingType::CircleSpoof,
        start_time_utc: run.first().map(|p| p.timestamp_utc).unwrap_or_default(),
        end_time_utc: run.last().map(|p| p.timestamp_utc),
        implied_speed_kn: None,
        plausibility_score: Some((plausibility * 1000.0).round() / 1000.0),
        risk_score_component: 35,
        evidence_json: json!({
            "points_in_cluster": run.len(),
            "duration_h": (duration_h * 10.0).round() / 10.0,
            "mean_reported_sog_kn": (mean_sog * 10.0).round() / 10.0,
            "center": {"lat": center_lat, "lon": center_lon},
            "max_excursion_nm": (max_excursion_nm * 100.0).round() / 100.0,
            "implied_travel_nm": (implied_travel_nm * 10.0).round() / 10.0,
        }),
        gap_event_id: None,
    })?;
    report.anomalies_created += 1;
    Ok(())
}

/// Longest run of consecutive points confined to the cluster radius with
/// sustained reported SOG; `None` when no qualifying run exists.
fn find_spoofed_cluster(points: &[AisPoint]) -> Option<&[AisPoint]> {
    let mut best: Option<&[AisPoint]> = None;
    let mut run_start = 0usize;

    for i in 0..points.len() {
        let anchor = &points[run_start];
        let in_cluster = (points[i].lat - anchor.lat).abs() <= CLUSTER_RADIUS_DEG
            && (points[i].lon - anchor.lon).abs() <= CLUSTER_RADIUS_DEG;
        let moving = points[i].sog.is_some_and(|s| s >= MIN_REPORTED_SOG_KN);

        if in_cluster && moving {
            let candidate = &points[run_start..=i];
            if qualifies(candidate) && best.is_none_or(|b| candidate.len() > b.len()) {
                best = Some(candidate);
            }
        } else {
            run_start = i;
            // A stationary or out-of-cluster point restarts the run; the
            // anchor must itself be a moving point.
            if !moving {
                run_start = i + 1;
            }
        }
    }
    best
}

fn qualifies(run: &[AisPoint]) -> bool {
    if run.len() < MIN_POINTS {
        return false;
    }
    let duration_h = (run[run.len() - 1].timestamp_utc - run[0].timestamp_utc).num_seconds()
        as f64
        / 3600.0;
    duration_h >= MIN_DURATION_H
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AisClass;
    use chrono::{Duration, TimeZone, Utc};

    fn point(minutes: i64, lat: f64, lon: f64, sog: f64, cog: f64) -> AisPoint {
        AisPoint {
            vessel_id: 1,
            timestamp_utc: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minutes),
            lat,
            lon,
            sog: Some(sog),
            cog: Some(cog),
            heading: None,
            nav_status: None,
            ais_class: AisClass::A,
            source: "terrestrial".into(),
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
    fn test_clustered_moving_track_is_spoofed() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        // 12 points over 6 h confined to 0.01 deg, SOG ~4 kn, random COG.
        let cogs = [10.0, 95.0, 200.0, 310.0, 45.0, 120.0, 260.0, 350.0, 80.0, 175.0, 290.0, 30.0];
        for (i, cog) in cogs.iter().enumerate() {
            let jitter = (i as f64 * 0.0013) % 0.008;
            store
                .insert_point(&point(i as i64 * 33, 36.0 + jitter, 23.0 + jitter, 4.0, *cog))
                .unwrap();
        }
        let report = detect_circle_spoofing(&store);
        assert_eq!(report.anomalies_created, 1);
        let a = &store.anomalies_for_vessel(1).unwrap()[0];
        assert_eq!(a.anomaly_type, SpoofingType::CircleSpoof);
        assert!(a.plausibility_score.unwrap() < 0.5);
    }

    #[test]
    fn test_anchored_vessel_is_clean() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        // Confined but SOG ~0: genuinely anchored, loitering's business.
        for i in 0..12 {
            store
                .insert_point(&point(i * 32, 36.0, 23.0, 0.2, 0.0))
                .unwrap();
        }
        let report = detect_circle_spoofing(&store);
        assert_eq!(report.anomalies_created, 0);
    }

    #[test]
    fn test_real_transit_is_clean() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        // Moving at 4 kn and actually going somewhere.
        for i in 0..12i64 {
            store
                .insert_point(&point(i * 32, 36.0 + i as f64 * 0.035, 23.0, 4.0, 0.0))
                .unwrap();
        }
        let report = detect_circle_spoofing(&store);
        assert_eq!(report.anomalies_created, 0);
    }

    #[test]
    fn test_short_cluster_is_clean() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        // Confined and moving but only 2 h.
        for i in 0..8i64 {
            store
                .insert_point(&point(i * 15, 36.0, 23.0, 4.0, 45.0))
                .unwrap();
        }
        let report = detect_circle_spoofing(&store);
        assert_eq!(report.anomalies_created, 0);
    }
}
