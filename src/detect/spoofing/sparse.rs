//! Sparse transmission detection: vessels transmitting at the minimum legal
//! rate while underway, degrading tracking without creating formal gaps.
//!
//! Sliding 24 h windows over underway points (SOG > 3 kn). A window with at
//! least 4 underway hours and ≤ 2 points per underway hour is moderate
//! (+15); under 1 point per hour is severe (+25). The worst window wins.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use crate::config;
use crate::store::{FleetStore, StoreResult};
use crate::types::{AisPoint, SpoofingAnomaly, SpoofingType, Vessel};

use super::SpoofingRunReport;

const WINDOW_HOURS: i64 = 24;
const MODERATE_PTS_PER_HOUR: f64 = 2.0;
const SEVERE_PTS_PER_HOUR: f64 = 1.0;
const MIN_UNDERWAY_HOURS: f64 = 4.0;

struct SparseWindow {
    severity: &'static str,
    density: f64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    underway_hours: f64,
}

pub fn detect_sparse_transmission(store: &FleetStore) -> SpoofingRunReport {
    if !config::get().settings.sparse_transmission_detection_enabled {
        return SpoofingRunReport::disabled();
    }

    let mut report = SpoofingRunReport::ok();
    let vessels = match store.active_vessels() {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "sparse transmission detection could not list vessels");
            report.errors += 1;
            return report;
        }
    };

    for vessel in vessels {
        if let Err(e) = scan_vessel(store, &vessel, &mut report) {
            tracing::warn!(mmsi = %vessel.mmsi, error = %e, "sparse transmission scan failed");
            report.errors += 1;
        }
    }

    tracing::info!(
        anomalies = report.anomalies_created,
        vessels = report.vessels_checked,
        "sparse transmission detection complete"
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
    report.vessels_checked += 1;

    if store.has_anomaly_of_type(vessel.vessel_id, SpoofingType::SparseTransmission)? {
        return Ok(());
    }

    let Some(worst) = find_sparsest_window(&points) else {
        return Ok(());
    };

    let score = if worst.severity == "severe" { 25 } else { 15 };
    store.insert_anomaly(&SpoofingAnomaly {
        anomaly_id: store.next_id()?,
        vessel_id: vessel.vessel_id,
        anomaly_type: SpoofingType::SparseTransmission,
        start_time_utc: worst.start,
        end_time_utc: Some(worst.end),
        implied_speed_kn: None,
        plausibility_score: None,
        risk_score_component: score,
        evidence_json: json!({
            "severity": worst.severity,
            "avg_points_per_hour": (worst.density * 100.0).round() / 100.0,
            "underway_hours": (worst.underway_hours * 10.0).round() / 10.0,
            "window_hours": WINDOW_HOURS,
        }),
        gap_event_id: None,
    })?;
    report.anomalies_created += 1;
    Ok(())
}

/// The sparsest qualifying 24 h window, if any.
fn find_sparsest_window(points: &[AisPoint]) -> Option<SparseWindow> {
    let mut best: Option<SparseWindow> = None;

    for (i, start_point) in points.iter().enumerate() {
        let window_end = start_point.timestamp_utc + Duration::hours(WINDOW_HOURS);
        let window_points: Vec<&AisPoint> = points[i..]
            .iter()
            .take_while(|p| p.timestamp_utc <= window_end)
            .collect();
        if window_points.len() < 2 {
            continue;
        }

        let underway: Vec<&&AisPoint> =
            window_points.iter().filter(|p| p.is_underway()).collect();
        if underway.len() < 2 {
            continue;
        }

        let underway_start = underway[0].timestamp_utc;
        let underway_end = underway[underway.len() - 1].timestamp_utc;
        let underway_hours = (underway_end - underway_start).num_seconds() as f64 / 3600.0;
        if underway_hours < MIN_UNDERWAY_HOURS {
            continue;
        }

        let density = underway.len() as f64 / underway_hours;
        if density > MODERATE_PTS_PER_HOUR {
            continue;
        }
        let improves = best.as_ref().is_none_or(|b| density < b.density);
        if improves {
            best = Some(SparseWindow {
                severity: if density < SEVERE_PTS_PER_HOUR {
                    "severe"
                } else {
                    "moderate"
                },
                density,
                start: underway_start,
                end: underway_end,
                underway_hours,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AisClass;
    use chrono::TimeZone;

    fn underway_point(h_offset: f64) -> AisPoint {
        AisPoint {
            vessel_id: 1,
            timestamp_utc: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
                + Duration::minutes((h_offset * 60.0) as i64),
            lat: 55.0 + h_offset * 0.1,
            lon: 12.0,
            sog: Some(10.0),
            cog: Some(0.0),
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
    fn test_severe_sparsity() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        // 5 underway points over 8 hours: 0.625 pts/hour => severe.
        for h in [0.0, 2.0, 4.0, 6.0, 8.0] {
            store.insert_point(&underway_point(h)).unwrap();
        }
        let report = detect_sparse_transmission(&store);
        assert_eq!(report.anomalies_created, 1);
        let a = &store.anomalies_for_vessel(1).unwrap()[0];
        assert_eq!(a.risk_score_component, 25);
        assert_eq!(a.evidence_json["severity"], "severe");
    }

    #[test]
    fn test_moderate_sparsity() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        // 8 underway points over 5 hours: 1.6 pts/hour => moderate.
        for i in 0..8 {
            store.insert_point(&underway_point(i as f64 * 5.0 / 7.0)).unwrap();
        }
        let report = detect_sparse_transmission(&store);
        assert_eq!(report.anomalies_created, 1);
        let a = &store.anomalies_for_vessel(1).unwrap()[0];
        assert_eq!(a.risk_score_component, 15);
        assert_eq!(a.evidence_json["severity"], "moderate");
    }

    #[test]
    fn test_dense_track_is_clean() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        // 10-minute reporting over 6 hours: 6 pts/hour.
        for i in 0..37 {
            store.insert_point(&underway_point(i as f64 / 6.0)).unwrap();
        }
        let report = detect_sparse_transmission(&store);
        assert_eq!(report.anomalies_created, 0);
    }

    #[test]
    fn test_anchored_vessel_not_flagged() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        // Sparse but stationary: underway filter drops everything.
        for h in [0.0, 6.0, 12.0] {
            let mut p = underway_point(h);
            p.sog = Some(0.1);
            store.insert_point(&p).unwrap();
        }
        let report = detect_sparse_transmission(&store);
        assert_eq!(report.anomalies_created, 0);
    }
}
