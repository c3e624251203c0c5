//! Loitering and laid-up detection.
//!
//! Loitering: hourly-bucket median SOG per vessel; a bucket qualifies below
//! 0.5 kn and a run of ≥ 4 consecutive qualifying buckets emits a
//! `LoiteringEvent`. Runs of ≥ 12 buckets inside a corridor are sustained.
//!
//! Laid-up: daily median positions; ≥ 30 consecutive days confined to a
//! 0.033° box sets `vessel_laid_up_30d`, ≥ 60 days sets
//! `vessel_laid_up_60d`, and an STS-zone location sets
//! `vessel_laid_up_in_sts_zone`.

use std::collections::BTreeMap;

use chrono::{Duration, TimeZone, Utc};
use statrs::statistics::{Data, Median};

use crate::config;
use crate::store::{FleetStore, StoreResult};
use crate::types::{AisPoint, CorridorType, LoiteringEvent, Vessel};

/// Median SOG below which an hourly bucket qualifies as stationary.
const LOITER_SOG_KN: f64 = 0.5;
/// Minimum qualifying buckets for a loitering event.
const MIN_RUN_BUCKETS: usize = 4;
/// Buckets at which an in-corridor run becomes sustained.
const SUSTAINED_RUN_BUCKETS: usize = 12;
/// Gap linkage window around a loitering run, hours.
const GAP_LINK_WINDOW_H: i64 = 6;
/// Laid-up position confinement, degrees.
const LAID_UP_BOX_DEG: f64 = 0.033;

/// Loitering / laid-up step summary.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct LoiteringReport {
    pub vessels_scanned: usize,
    pub events_created: usize,
    pub laid_up_30d_flagged: usize,
    pub laid_up_60d_flagged: usize,
    pub errors: usize,
}

pub fn detect_loitering(store: &FleetStore) -> LoiteringReport {
    let mut report = LoiteringReport::default();
    let vessels = match store.active_vessels() {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "loitering detection could not list vessels");
            report.errors += 1;
            return report;
        }
    };

    for vessel in vessels {
        report.vessels_scanned += 1;
        if let Err(e) = scan_vessel(store, &vessel, &mut report) {
            tracing::warn!(mmsi = %vessel.mmsi, error = %e, "loitering scan failed");
            report.errors += 1;
        }
    }

    tracing::info!(
        vessels = report.vessels_scanned,
        events = report.events_created,
        laid_up_30d = report.laid_up_30d_flagged,
        laid_up_60d = report.laid_up_60d_flagged,
        "loitering detection complete"
    );
    report
}

fn scan_vessel(
    store: &FleetStore,
    vessel: &Vessel,
    report: &mut LoiteringReport,
) -> StoreResult<()> {
    let points = store.points_for_vessel(vessel.vessel_id)?;
    if points.len() < MIN_RUN_BUCKETS {
        return Ok(());
    }

    detect_loiter_runs(store, vessel, &points, report)?;
    detect_laid_up(store, vessel, &points, report)?;
    Ok(())
}

// ============================================================================
// Hourly loiter runs
// ============================================================================

struct HourBucket {
    hour: i64,
    median_sog: f64,
    points: Vec<(f64, f64)>,
}

fn hourly_buckets(points: &[AisPoint]) -> Vec<HourBucket> {
    let mut grouped: BTreeMap<i64, Vec<&AisPoint>> = BTreeMap::new();
    for point in points {
        grouped
            .entry(point.timestamp_utc.timestamp() / 3600)
            .or_default()
            .push(point);
    }
    grouped
        .into_iter()
        .map(|(hour, points)| {
            let sogs: Vec<f64> = points.iter().filter_map(|p| p.sog).collect();
            let median_sog = if sogs.is_empty() {
                f64::NAN
            } else {
                Data::new(sogs).median()
            };
            HourBucket {
                hour,
                median_sog,
                points: points.iter().map(|p| (p.lat, p.lon)).collect(),
            }
        })
        .collect()
}

fn detect_loiter_runs(
    store: &FleetStore,
    vessel: &Vessel,
    points: &[AisPoint],
    report: &mut LoiteringReport,
) -> StoreResult<()> {
    let buckets = hourly_buckets(points);
    let mut run: Vec<&HourBucket> = Vec::new();

    for bucket in &buckets {
        let qualifies = bucket.median_sog.is_finite() && bucket.median_sog < LOITER_SOG_KN;
        let consecutive = run.last().is_some_and(|last| bucket.hour == last.hour + 1);
        if qualifies && (run.is_empty() || consecutive) {
            run.push(bucket);
        } else {
            flush_run(store, vessel, &run, report)?;
            run.clear();
            if qualifies {
                run.push(bucket);
            }
        }
    }
    flush_run(store, vessel, &run, report)?;
    Ok(())
}

/// Persist one qualifying run as a loitering event (idempotent by start).
fn flush_run(
    store: &FleetStore,
    vessel: &Vessel,
    run: &[&HourBucket],
    report: &mut LoiteringReport,
) -> StoreResult<()> {
    if run.len() < MIN_RUN_BUCKETS {
        return Ok(());
    }
    let start = Utc
        .timestamp_opt(run[0].hour * 3600, 0)
        .single()
        .unwrap_or_default();
    if store.loitering_exists(vessel.vessel_id, start)? {
        return Ok(());
    }
    let end = Utc
        .timestamp_opt((run[run.len() - 1].hour + 1) * 3600, 0)
        .single()
        .unwrap_or_default();

    let all_positions: Vec<(f64, f64)> =
        run.iter().flat_map(|b| b.points.iter().copied()).collect();
    let mean_lat =
        all_positions.iter().map(|(lat, _)| lat).sum::<f64>() / all_positions.len() as f64;
    let mean_lon =
        all_positions.iter().map(|(_, lon)| lon).sum::<f64>() / all_positions.len() as f64;
    let median_sog = Data::new(
        run.iter()
            .map(|b| b.median_sog)
            .filter(|s| s.is_finite())
            .collect::<Vec<f64>>(),
    )
    .median();

    let corridor = store.corridor_for_point(mean_lat, mean_lon)?;
    let sustained = run.len() >= SUSTAINED_RUN_BUCKETS && corridor.is_some();
    let risk = config::get().risk.behavioral.clone();
    let score = if sustained {
        risk.loiter_sustained
    } else {
        risk.loiter_baseline
    };

    // Link surrounding gaps: the loiter-gap-loiter pattern is the
    // classic STS signature.
    let gaps = store.gap_events_for_vessel(vessel.vessel_id)?;
    let window = Duration::hours(GAP_LINK_WINDOW_H);
    let preceding = gaps
        .iter()
        .find(|g| g.gap_end_utc <= start && g.gap_end_utc >= start - window);
    let following = gaps
        .iter()
        .find(|g| g.gap_start_utc >= end && g.gap_start_utc <= end + window);

    store.insert_loitering_event(&LoiteringEvent {
        loitering_id: store.next_id()?,
        vessel_id: vessel.vessel_id,
        start_time_utc: start,
        end_time_utc: end,
        duration_hours: run.len() as f64,
        median_sog,
        mean_lat,
        mean_lon,
        corridor_id: corridor.map(|c| c.corridor_id),
        preceding_gap_id: preceding.map(|g| g.gap_event_id),
        following_gap_id: following.map(|g| g.gap_event_id),
        risk_score_component: score,
    })?;
    report.events_created += 1;
    Ok(())
}

// ============================================================================
// Laid-up detection
// ============================================================================

struct DayMedian {
    day: i64,
    lat: f64,
    lon: f64,
}

fn daily_medians(points: &[AisPoint]) -> Vec<DayMedian> {
    let mut grouped: BTreeMap<i64, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for point in points {
        let entry = grouped
            .entry(point.timestamp_utc.timestamp() / 86_400)
            .or_default();
        entry.0.push(point.lat);
        entry.1.push(point.lon);
    }
    grouped
        .into_iter()
        .map(|(day, (lats, lons))| DayMedian {
            day,
            lat: Data::new(lats).median(),
            lon: Data::new(lons).median(),
        })
        .collect()
}

fn detect_laid_up(
    store: &FleetStore,
    vessel: &Vessel,
    points: &[AisPoint],
    report: &mut LoiteringReport,
) -> StoreResult<()> {
    let medians = daily_medians(points);
    if medians.len() < 30 {
        return Ok(());
    }

    let mut best_run = 0usize;
    let mut best_center: Option<(f64, f64)> = None;
    let mut run_start = 0usize;
    let mut min_lat = f64::INFINITY;
    let mut max_lat = f64::NEG_INFINITY;
    let mut min_lon = f64::INFINITY;
    let mut max_lon = f64::NEG_INFINITY;

    for i in 0..medians.len() {
        let day = &medians[i];
        let consecutive = i == run_start
            || medians[i - 1].day + 1 == day.day;
        let new_min_lat = min_lat.min(day.lat);
        let new_max_lat = max_lat.max(day.lat);
        let new_min_lon = min_lon.min(day.lon);
        let new_max_lon = max_lon.max(day.lon);
        let confined = (new_max_lat - new_min_lat) <= LAID_UP_BOX_DEG
            && (new_max_lon - new_min_lon) <= LAID_UP_BOX_DEG;

        if consecutive && confined {
            min_lat = new_min_lat;
            max_lat = new_max_lat;
            min_lon = new_min_lon;
            max_lon = new_max_lon;
            let run_len = i - run_start + 1;
            if run_len > best_run {
                best_run = run_len;
                best_center = Some(((min_lat + max_lat) / 2.0, (min_lon + max_lon) / 2.0));
            }
        } else {
            run_start = i;
            min_lat = day.lat;
            max_lat = day.lat;
            min_lon = day.lon;
            max_lon = day.lon;
        }
    }

    if best_run < 30 {
        return Ok(());
    }

    let mut updated = store.vessel(vessel.vessel_id)?;
    updated.vessel_laid_up_30d = true;
    report.laid_up_30d_flagged += 1;
    if best_run >= 60 {
        updated.vessel_laid_up_60d = true;
        report.laid_up_60d_flagged += 1;
    }
    if let Some((lat, lon)) = best_center {
        let in_sts_zone = store
            .corridor_for_point(lat, lon)?
            .is_some_and(|c| c.corridor_type == CorridorType::StsZone);
        updated.vessel_laid_up_in_sts_zone = in_sts_zone;
    }
    store.update_vessel(&updated)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AisClass;

    fn point(vessel_id: u64, minutes: i64, lat: f64, lon: f64, sog: f64) -> AisPoint {
        AisPoint {
            vessel_id,
            timestamp_utc: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minutes),
            lat,
            lon,
            sog: Some(sog),
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
    fn test_five_hour_stationary_run() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        // Two points per hour for 5 hours, SOG ~0.2.
        for h in 0..5i64 {
            store.insert_point(&point(1, h * 60, 36.0, 23.0, 0.2)).unwrap();
            store.insert_point(&point(1, h * 60 + 30, 36.0001, 23.0001, 0.3)).unwrap();
        }
        let report = detect_loitering(&store);
        assert_eq!(report.events_created, 1);
        let events = store.loitering_for_vessel(1).unwrap();
        assert_eq!(events[0].duration_hours, 5.0);
        assert!(events[0].median_sog < 0.5);
        assert_eq!(events[0].risk_score_component, 8); // baseline
    }

    #[test]
    fn test_sustained_run_in_corridor_scores_higher() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        store
            .insert_corridor(&crate::types::Corridor {
                corridor_id: 7,
                name: "Laconian Gulf STS".into(),
                corridor_type: CorridorType::StsZone,
                geometry: "POLYGON((22.5 35.5, 23.5 35.5, 23.5 36.5, 22.5 36.5, 22.5 35.5))"
                    .into(),
                risk_weight: 2.0,
                is_jamming_zone: false,
            })
            .unwrap();
        for h in 0..14i64 {
            store.insert_point(&point(1, h * 60, 36.0, 23.0, 0.2)).unwrap();
        }
        let report = detect_loitering(&store);
        assert_eq!(report.events_created, 1);
        let event = &store.loitering_for_vessel(1).unwrap()[0];
        assert_eq!(event.corridor_id, Some(7));
        assert_eq!(event.risk_score_component, 20); // sustained
    }

    #[test]
    fn test_moving_vessel_is_clean() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        for h in 0..6i64 {
            store
                .insert_point(&point(1, h * 60, 36.0 + h as f64 * 0.2, 23.0, 12.0))
                .unwrap();
        }
        let report = detect_loitering(&store);
        assert_eq!(report.events_created, 0);
    }

    #[test]
    fn test_short_stop_is_clean() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        for h in 0..3i64 {
            store.insert_point(&point(1, h * 60, 36.0, 23.0, 0.2)).unwrap();
        }
        let report = detect_loitering(&store);
        assert_eq!(report.events_created, 0);
    }

    #[test]
    fn test_laid_up_30_days() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        // One point per day for 35 days, fixed anchorage.
        for d in 0..35i64 {
            store
                .insert_point(&point(1, d * 24 * 60, 36.001, 23.001, 0.1))
                .unwrap();
        }
        let report = detect_loitering(&store);
        assert_eq!(report.laid_up_30d_flagged, 1);
        assert_eq!(report.laid_up_60d_flagged, 0);
        let vessel = store.vessel(1).unwrap();
        assert!(vessel.vessel_laid_up_30d);
        assert!(!vessel.vessel_laid_up_60d);
    }

    #[test]
    fn test_laid_up_60_days_in_sts_zone() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        store
            .insert_corridor(&crate::types::Corridor {
                corridor_id: 7,
                name: "Laconian Gulf STS".into(),
                corridor_type: CorridorType::StsZone,
                geometry: "POLYGON((22.5 35.5, 23.5 35.5, 23.5 36.5, 22.5 36.5, 22.5 35.5))"
                    .into(),
                risk_weight: 2.0,
                is_jamming_zone: false,
            })
            .unwrap();
        for d in 0..65i64 {
            store
                .insert_point(&point(1, d * 24 * 60, 36.001, 23.001, 0.1))
                .unwrap();
        }
        detect_loitering(&store);
        let vessel = store.vessel(1).unwrap();
        assert!(vessel.vessel_laid_up_60d);
        assert!(vessel.vessel_laid_up_in_sts_zone);
    }

    #[test]
    fn test_wandering_vessel_not_laid_up() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        for d in 0..40i64 {
            store
                .insert_point(&point(1, d * 24 * 60, 36.0 + d as f64 * 0.05, 23.0, 0.1))
                .unwrap();
        }
        let report = detect_loitering(&store);
        assert_eq!(report.laid_up_30d_flagged, 0);
    }
}
