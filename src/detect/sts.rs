//! Ship-to-ship transfer detection.
//!
//! Proximity clustering on 15-minute windows: two vessels within the
//! configured proximity (default 200 m) for at least `sts_min_windows`
//! consecutive windows (default 8 = 2 h) form a VISIBLE_VISIBLE pair.
//! Additional modes: APPROACHING (convergent vector with short ETA),
//! VISIBLE_DARK (one broadcaster plus an unmatched satellite detection),
//! DARK_DARK (two satellite detections alone). Known bunkering vessels are
//! excluded from candidate pairs.

use chrono::{DateTime, Duration, Utc};

use crate::config;
use crate::geo::{bbox_around, haversine_meters, haversine_nm};
use crate::store::{FleetStore, StoreResult};
use crate::types::{AisPoint, StsDetectionType, StsTransferEvent, Vessel, VesselId};

/// Window width for proximity bucketing, minutes.
const WINDOW_MINUTES: i64 = 15;
/// Candidate-pair coarse filter: vessels whose tracks never come within
/// this range are skipped before windowing, nm.
const COARSE_RANGE_NM: f64 = 5.0;
/// ETA threshold for approaching-vector detection, minutes.
const APPROACHING_ETA_MINUTES: f64 = 60.0;
/// Search radius for dark counterpart detections, nm.
const DARK_PAIR_RADIUS_NM: f64 = 0.5;

/// STS detection step summary.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StsDetectionReport {
    pub pairs_examined: usize,
    pub events_created: usize,
    pub approaching_created: usize,
    pub dark_pairs_created: usize,
    pub errors: usize,
}

pub fn detect_sts_transfers(store: &FleetStore) -> StsDetectionReport {
    detect_sts_transfers_with(store, &config::get())
}

/// Detection against an explicit configuration snapshot.
pub fn detect_sts_transfers_with(
    store: &FleetStore,
    config: &config::FleetConfig,
) -> StsDetectionReport {
    let mut report = StsDetectionReport::default();

    let vessels = match store.active_vessels() {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "STS detection could not list vessels");
            report.errors += 1;
            return report;
        }
    };

    // Bunkering vessels provide legitimate alongside service.
    let candidates: Vec<&Vessel> = vessels
        .iter()
        .filter(|v| !config.settings.bunkering_mmsi.contains(&v.mmsi))
        .collect();

    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            report.pairs_examined += 1;
            if let Err(e) = examine_pair(store, config, candidates[i], candidates[j], &mut report)
            {
                tracing::warn!(
                    mmsi_1 = %candidates[i].mmsi,
                    mmsi_2 = %candidates[j].mmsi,
                    error = %e,
                    "STS pair examination failed"
                );
                report.errors += 1;
            }
        }
    }

    if let Err(e) = detect_visible_dark(store, &candidates, &mut report) {
        tracing::warn!(error = %e, "visible-dark STS detection failed");
        report.errors += 1;
    }
    if let Err(e) = detect_dark_dark(store, &mut report) {
        tracing::warn!(error = %e, "dark-dark STS detection failed");
        report.errors += 1;
    }

    tracing::info!(
        pairs = report.pairs_examined,
        events = report.events_created,
        approaching = report.approaching_created,
        dark_pairs = report.dark_pairs_created,
        "STS detection complete"
    );
    report
}

// ============================================================================
// Visible-visible proximity clustering
// ============================================================================

fn examine_pair(
    store: &FleetStore,
    config: &config::FleetConfig,
    v1: &Vessel,
    v2: &Vessel,
    report: &mut StsDetectionReport,
) -> StoreResult<()> {
    let points_1 = store.points_for_vessel(v1.vessel_id)?;
    let points_2 = store.points_for_vessel(v2.vessel_id)?;
    if points_1.is_empty() || points_2.is_empty() {
        return Ok(());
    }

    // Coarse filter on last known positions before the expensive windowing.
    let (last_1, last_2) = (&points_1[points_1.len() - 1], &points_2[points_2.len() - 1]);
    let track_gap_nm = haversine_nm(last_1.lat, last_1.lon, last_2.lat, last_2.lon);
    if track_gap_nm > COARSE_RANGE_NM
        && !tracks_ever_close(&points_1, &points_2, COARSE_RANGE_NM)
    {
        return Ok(());
    }

    let windows = proximity_windows(&points_1, &points_2);
    let qualifying_runs = consecutive_runs(
        &windows,
        config.settings.sts_proximity_meters,
        config.settings.sts_min_windows as usize,
    );

    for run in qualifying_runs {
        let start = run[0].window_start;
        let end = run[run.len() - 1].window_start + Duration::minutes(WINDOW_MINUTES);
        let mean_proximity =
            run.iter().map(|w| w.distance_m).sum::<f64>() / run.len() as f64;
        let mean_lat = run.iter().map(|w| w.mid_lat).sum::<f64>() / run.len() as f64;
        let mean_lon = run.iter().map(|w| w.mid_lon).sum::<f64>() / run.len() as f64;
        let corridor = store.corridor_for_point(mean_lat, mean_lon)?;

        let inserted = store.insert_sts_event(&StsTransferEvent {
            sts_id: store.next_id()?,
            vessel_1_id: Some(v1.vessel_id),
            vessel_2_id: Some(v2.vessel_id),
            dark_detection_id: None,
            dark_detection_id_2: None,
            detection_type: StsDetectionType::VisibleVisible,
            start_time_utc: start,
            end_time_utc: end,
            duration_minutes: (end - start).num_minutes(),
            mean_proximity_meters: Some(mean_proximity),
            mean_lat: Some(mean_lat),
            mean_lon: Some(mean_lon),
            corridor_id: corridor.map(|c| c.corridor_id),
            eta_minutes: None,
            risk_score_component: 0,
        })?;
        if inserted {
            report.events_created += 1;
        }
    }

    detect_approaching(store, v1, v2, last_1, last_2, report)?;
    Ok(())
}

fn tracks_ever_close(a: &[AisPoint], b: &[AisPoint], range_nm: f64) -> bool {
    // Sample both tracks; exhaustive product is unnecessary for a filter.
    let step_a = (a.len() / 32).max(1);
    let step_b = (b.len() / 32).max(1);
    a.iter().step_by(step_a).any(|pa| {
        b.iter()
            .step_by(step_b)
            .any(|pb| haversine_nm(pa.lat, pa.lon, pb.lat, pb.lon) <= range_nm)
    })
}

struct ProximityWindow {
    window_start: DateTime<Utc>,
    distance_m: f64,
    mid_lat: f64,
    mid_lon: f64,
}

/// Distance between the two vessels per shared 15-minute window.
fn proximity_windows(a: &[AisPoint], b: &[AisPoint]) -> Vec<ProximityWindow> {
    fn bucket(ts: DateTime<Utc>) -> i64 {
        ts.timestamp() / (WINDOW_MINUTES * 60)
    }

    let mut windows = Vec::new();
    let mut bi = 0usize;
    let mut ai = 0usize;
    while ai < a.len() && bi < b.len() {
        let ka = bucket(a[ai].timestamp_utc);
        let kb = bucket(b[bi].timestamp_utc);
        match ka.cmp(&kb) {
            std::cmp::Ordering::Less => ai += 1,
            std::cmp::Ordering::Greater => bi += 1,
            std::cmp::Ordering::Equal => {
                let pa = &a[ai];
                let pb = &b[bi];
                windows.push(ProximityWindow {
                    window_start: DateTime::<Utc>::from_timestamp(ka * WINDOW_MINUTES * 60, 0)
                        .unwrap_or(pa.timestamp_utc),
                    distance_m: haversine_meters(pa.lat, pa.lon, pb.lat, pb.lon),
                    mid_lat: (pa.lat + pb.lat) / 2.0,
                    mid_lon: (pa.lon + pb.lon) / 2.0,
                });
                // Advance past this bucket on both tracks.
                while ai < a.len() && bucket(a[ai].timestamp_utc) == ka {
                    ai += 1;
                }
                while bi < b.len() && bucket(b[bi].timestamp_utc) == kb {
                    bi += 1;
                }
            }
        }
    }
    windows
}

/// Runs of consecutive windows within the proximity threshold, each at
/// least `min_windows` long.
fn consecutive_runs(
    windows: &[ProximityWindow],
    proximity_m: f64,
    min_windows: usize,
) -> Vec<&[ProximityWindow]> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;

    for (i, w) in windows.iter().enumerate() {
        let close = w.distance_m <= proximity_m;
        let adjacent = i > 0
            && (w.window_start - windows[i - 1].window_start).num_minutes() == WINDOW_MINUTES;

        if close && start.is_some() && adjacent {
            continue; // run extends
        }
        // Run breaks here (distance, or a hole in the windows): flush it.
        if let Some(s) = start.take() {
            if i - s >= min_windows {
                runs.push(&windows[s..i]);
            }
        }
        if close {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        if windows.len() - s >= min_windows {
            runs.push(&windows[s..]);
        }
    }
    runs
}

// ============================================================================
// Approaching vector
// ============================================================================

fn detect_approaching(
    store: &FleetStore,
    v1: &Vessel,
    v2: &Vessel,
    last_1: &AisPoint,
    last_2: &AisPoint,
    report: &mut StsDetectionReport,
) -> StoreResult<()> {
    // Both recently seen, both underway, positions within coarse range.
    let time_skew = (last_1.timestamp_utc - last_2.timestamp_utc).abs();
    if time_skew > Duration::minutes(30) {
        return Ok(());
    }
    let dist_nm = haversine_nm(last_1.lat, last_1.lon, last_2.lat, last_2.lon);
    if dist_nm > COARSE_RANGE_NM || dist_nm < 0.1 {
        return Ok(());
    }
    let (Some(sog_1), Some(cog_1), Some(sog_2), Some(cog_2)) =
        (last_1.sog, last_1.cog, last_2.sog, last_2.cog)
    else {
        return Ok(());
    };
    if sog_1 < 0.5 && sog_2 < 0.5 {
        return Ok(());
    }

    // Closing speed along the bearing between the two vessels.
    let bearing_12 = crate::geo::initial_bearing_deg(last_1.lat, last_1.lon, last_2.lat, last_2.lon);
    let closing_1 = sog_1 * (cog_1 - bearing_12).to_radians().cos();
    let closing_2 = -sog_2 * (cog_2 - bearing_12).to_radians().cos();
    let closing_kn = closing_1 + closing_2;
    if closing_kn <= 0.5 {
        return Ok(());
    }

    let eta_minutes = dist_nm / closing_kn * 60.0;
    if eta_minutes > APPROACHING_ETA_MINUTES {
        return Ok(());
    }

    let start = last_1.timestamp_utc.max(last_2.timestamp_utc);
    let inserted = store.insert_sts_event(&StsTransferEvent {
        sts_id: store.next_id()?,
        vessel_1_id: Some(v1.vessel_id),
        vessel_2_id: Some(v2.vessel_id),
        dark_detection_id: None,
        dark_detection_id_2: None,
        detection_type: StsDetectionType::Approaching,
        start_time_utc: start,
        end_time_utc: start + Duration::minutes(eta_minutes as i64),
        duration_minutes: eta_minutes as i64,
        mean_proximity_meters: Some(dist_nm * 1852.0),
        mean_lat: Some((last_1.lat + last_2.lat) / 2.0),
        mean_lon: Some((last_1.lon + last_2.lon) / 2.0),
        corridor_id: store
            .corridor_for_point((last_1.lat + last_2.lat) / 2.0, (last_1.lon + last_2.lon) / 2.0)?
            .map(|c| c.corridor_id),
        eta_minutes: Some(eta_minutes as i64),
        risk_score_component: 0,
    })?;
    if inserted {
        report.approaching_created += 1;
    }
    Ok(())
}

// ============================================================================
// Dark pairings
// ============================================================================

/// One broadcasting vessel loitering next to an unmatched satellite
/// detection.
fn detect_visible_dark(
    store: &FleetStore,
    candidates: &[&Vessel],
    report: &mut StsDetectionReport,
) -> StoreResult<()> {
    for vessel in candidates {
        let points = store.points_for_vessel(vessel.vessel_id)?;
        for point in points.iter().filter(|p| p.sog.is_some_and(|s| s < 1.0)) {
            let detections = store.unmatched_dark_detections_near(
                point.lat,
                point.lon,
                DARK_PAIR_RADIUS_NM,
                point.timestamp_utc - Duration::hours(1),
                point.timestamp_utc + Duration::hours(1),
            )?;
            let Some(detection) = detections.first() else {
                continue;
            };
            let inserted = store.insert_sts_event(&StsTransferEvent {
                sts_id: store.next_id()?,
                vessel_1_id: Some(vessel.vessel_id),
                vessel_2_id: None,
                dark_detection_id: Some(detection.detection_id),
                dark_detection_id_2: None,
                detection_type: StsDetectionType::VisibleDark,
                start_time_utc: point.timestamp_utc,
                end_time_utc: detection.detection_time_utc.max(point.timestamp_utc),
                duration_minutes: (detection.detection_time_utc - point.timestamp_utc)
                    .num_minutes()
                    .abs(),
                mean_proximity_meters: Some(haversine_meters(
                    point.lat,
                    point.lon,
                    detection.detection_lat,
                    detection.detection_lon,
                )),
                mean_lat: Some((point.lat + detection.detection_lat) / 2.0),
                mean_lon: Some((point.lon + detection.detection_lon) / 2.0),
                corridor_id: store
                    .corridor_for_point(point.lat, point.lon)?
                    .map(|c| c.corridor_id),
                eta_minutes: None,
                risk_score_component: 0,
            })?;
            if inserted {
                report.dark_pairs_created += 1;
            }
            break; // one pairing per vessel per run
        }
    }
    Ok(())
}

/// Two unmatched satellite detections alongside each other with no AIS at
/// all.
fn detect_dark_dark(store: &FleetStore, report: &mut StsDetectionReport) -> StoreResult<()> {
    let detections = store.all_dark_detections()?;
    let unmatched: Vec<_> = detections.iter().filter(|d| d.is_unmatched()).collect();

    for i in 0..unmatched.len() {
        for j in (i + 1)..unmatched.len() {
            let (a, b) = (unmatched[i], unmatched[j]);
            let dt = (a.detection_time_utc - b.detection_time_utc).abs();
            if dt > Duration::hours(1) {
                continue;
            }
            let bbox = bbox_around(a.detection_lat, a.detection_lon, DARK_PAIR_RADIUS_NM);
            if !bbox.contains(b.detection_lat, b.detection_lon, 0.0) {
                continue;
            }
            let start = a.detection_time_utc.min(b.detection_time_utc);
            let inserted = store.insert_sts_event(&StsTransferEvent {
                sts_id: store.next_id()?,
                vessel_1_id: None,
                vessel_2_id: None,
                dark_detection_id: Some(a.detection_id),
                dark_detection_id_2: Some(b.detection_id),
                detection_type: StsDetectionType::DarkDark,
                start_time_utc: start,
                end_time_utc: a.detection_time_utc.max(b.detection_time_utc),
                duration_minutes: dt.num_minutes(),
                mean_proximity_meters: Some(haversine_meters(
                    a.detection_lat,
                    a.detection_lon,
                    b.detection_lat,
                    b.detection_lon,
                )),
                mean_lat: Some((a.detection_lat + b.detection_lat) / 2.0),
                mean_lon: Some((a.detection_lon + b.detection_lon) / 2.0),
                corridor_id: store
                    .corridor_for_point(a.detection_lat, a.detection_lon)?
                    .map(|c| c.corridor_id),
                eta_minutes: None,
                risk_score_component: 0,
            })?;
            if inserted {
                report.dark_pairs_created += 1;
            }
        }
    }
    Ok(())
}

/// Find vessels involved in STS relay chains and emit fleet alerts.
///
/// Builds a graph from STS events in the window, walks connected components
/// chronologically, and alerts on chains of 3+ vessels (3-hop +20,
/// 4+-hop +40) deduplicated by the sorted vessel-id set.
pub fn detect_sts_chains(store: &FleetStore) -> StoreResult<usize> {
    use std::collections::{HashMap, HashSet, VecDeque};

    if !config::get().settings.sts_chain_detection_enabled {
        return Ok(0);
    }

    let cutoff = Utc::now() - Duration::days(30);
    let mut events: Vec<StsTransferEvent> = store
        .all_sts_events()?
        .into_iter()
        .filter(|e| e.start_time_utc >= cutoff)
        .filter(|e| e.vessel_1_id.is_some() && e.vessel_2_id.is_some())
        .collect();
    events.sort_by_key(|e| e.start_time_utc);
    if events.is_empty() {
        return Ok(0);
    }

    // Undirected adjacency for component discovery.
    let mut adjacency: HashMap<VesselId, Vec<VesselId>> = HashMap::new();
    for event in &events {
        let (Some(a), Some(b)) = (event.vessel_1_id, event.vessel_2_id) else {
            continue;
        };
        adjacency.entry(a).or_default().push(b);
        adjacency.entry(b).or_default().push(a);
    }

    let mut visited: HashSet<VesselId> = HashSet::new();
    let mut alerts_created = 0;

    for &seed in adjacency.keys() {
        if visited.contains(&seed) {
            continue;
        }
        let mut component = HashSet::new();
        let mut queue = VecDeque::from([seed]);
        while let Some(current) = queue.pop_front() {
            if !component.insert(current) {
                continue;
            }
            visited.insert(current);
            for &next in adjacency.get(&current).into_iter().flatten() {
                if !component.contains(&next) {
                    queue.push_back(next);
                }
            }
        }
        if component.len() < 3 {
            continue;
        }

        let component_events: Vec<&StsTransferEvent> = events
            .iter()
            .filter(|e| {
                e.vessel_1_id.is_some_and(|v| component.contains(&v))
                    || e.vessel_2_id.is_some_and(|v| component.contains(&v))
            })
            .collect();
        let chain = build_chain(&component_events);
        if chain.len() < 3 {
            continue;
        }

        let score = if chain.len() >= 4 { 40 } else { 20 };
        let hops: Vec<serde_json::Value> = component_events
            .iter()
            .map(|e| {
                serde_json::json!({
                    "from_vessel_id": e.vessel_1_id,
                    "to_vessel_id": e.vessel_2_id,
                    "start_time": e.start_time_utc.to_rfc3339(),
                    "end_time": e.end_time_utc.to_rfc3339(),
                })
            })
            .collect();
        let intermediaries: Vec<VesselId> = chain[1..chain.len() - 1].to_vec();

        let mut sorted_chain = chain.clone();
        sorted_chain.sort_unstable();
        let inserted = store.insert_fleet_alert(&crate::types::FleetAlert {
            alert_id: store.next_id()?,
            owner_cluster_id: None,
            alert_type: "sts_relay_chain".to_string(),
            vessel_ids: sorted_chain,
            evidence_json: serde_json::json!({
                "subtype": "sts_relay_chain",
                "chain_length": chain.len(),
                "chain_vessel_ids": chain,
                "intermediary_vessel_ids": intermediaries,
                "hops": hops,
            }),
            risk_score_component: score,
            created_at: Utc::now(),
        })?;
        if inserted {
            alerts_created += 1;
        }
    }

    tracing::info!(alerts = alerts_created, "STS chain detection complete");
    Ok(alerts_created)
}

/// Walk time-ordered events, extending the chain from either end when a new
/// vessel connects to a chain endpoint.
fn build_chain(events: &[&StsTransferEvent]) -> Vec<VesselId> {
    let Some(first) = events.first() else {
        return Vec::new();
    };
    let (Some(a), Some(b)) = (first.vessel_1_id, first.vessel_2_id) else {
        return Vec::new();
    };
    let mut chain = vec![a, b];
    let mut used = vec![false; events.len()];
    used[0] = true;

    let mut changed = true;
    while changed {
        changed = false;
        for (i, event) in events.iter().enumerate() {
            if used[i] {
                continue;
            }
            let (Some(v1), Some(v2)) = (event.vessel_1_id, event.vessel_2_id) else {
                used[i] = true;
                continue;
            };
            let last = *chain.last().unwrap_or(&v1);
            let head = *chain.first().unwrap_or(&v1);
            if v1 == last && !chain.contains(&v2) {
                chain.push(v2);
            } else if v2 == last && !chain.contains(&v1) {
                chain.push(v1);
            } else if v2 == head && !chain.contains(&v1) {
                chain.insert(0, v1);
            } else if v1 == head && !chain.contains(&v2) {
                chain.insert(0, v2);
            } else {
                continue;
            }
            used[i] = true;
            changed = true;
        }
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AisClass;
    use chrono::TimeZone;

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

    fn seed_pair(store: &FleetStore) {
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        store.insert_vessel(&Vessel::new(1, "636017000", ts)).unwrap();
        store.insert_vessel(&Vessel::new(2, "273456789", ts)).unwrap();
    }

    #[test]
    fn test_two_hours_alongside_creates_event() {
        let store = FleetStore::temporary().unwrap();
        seed_pair(&store);
        // 10 windows of 15 min, ~100 m apart (0.0009 deg lat).
        for w in 0..10i64 {
            store.insert_point(&point(1, w * 15, 36.0, 23.0, 0.3)).unwrap();
            store.insert_point(&point(2, w * 15 + 1, 36.0009, 23.0, 0.2)).unwrap();
        }
        let report = detect_sts_transfers(&store);
        assert_eq!(report.events_created, 1);
        let events = store.all_sts_events().unwrap();
        assert_eq!(events[0].detection_type, StsDetectionType::VisibleVisible);
        assert!(events[0].mean_proximity_meters.unwrap() < 200.0);
        assert!(events[0].duration_minutes >= 120);
    }

    #[test]
    fn test_brief_passing_is_not_sts() {
        let store = FleetStore::temporary().unwrap();
        seed_pair(&store);
        // Only 3 windows together.
        for w in 0..3i64 {
            store.insert_point(&point(1, w * 15, 36.0, 23.0, 0.3)).unwrap();
            store.insert_point(&point(2, w * 15 + 1, 36.0009, 23.0, 0.2)).unwrap();
        }
        let report = detect_sts_transfers(&store);
        assert_eq!(report.events_created, 0);
    }

    #[test]
    fn test_distant_vessels_not_paired() {
        let store = FleetStore::temporary().unwrap();
        seed_pair(&store);
        for w in 0..10i64 {
            store.insert_point(&point(1, w * 15, 36.0, 23.0, 0.3)).unwrap();
            store.insert_point(&point(2, w * 15 + 1, 46.0, 13.0, 0.2)).unwrap();
        }
        let report = detect_sts_transfers(&store);
        assert_eq!(report.events_created, 0);
    }

    #[test]
    fn test_bunkering_vessel_excluded() {
        let mut config = crate::config::FleetConfig::for_tests();
        config.settings.bunkering_mmsi = vec!["273456789".to_string()];

        let store = FleetStore::temporary().unwrap();
        seed_pair(&store);
        for w in 0..10i64 {
            store.insert_point(&point(1, w * 15, 36.0, 23.0, 0.3)).unwrap();
            store.insert_point(&point(2, w * 15 + 1, 36.0009, 23.0, 0.2)).unwrap();
        }
        let report = detect_sts_transfers_with(&store, &config);
        assert_eq!(report.events_created, 0);
    }

    #[test]
    fn test_relay_chain_alert() {
        let store = FleetStore::temporary().unwrap();
        let ts = Utc::now() - Duration::days(3);
        for (id, mmsi) in [(1u64, "111111111"), (2, "222222222"), (3, "333333333"), (4, "444444444")] {
            store.insert_vessel(&Vessel::new(id, mmsi, ts)).unwrap();
        }
        // 1 -> 2 -> 3 -> 4 over three days.
        for (sts_id, v1, v2, day) in [(10u64, 1u64, 2u64, 0i64), (11, 2, 3, 1), (12, 3, 4, 2)] {
            store
                .insert_sts_event(&StsTransferEvent {
                    sts_id,
                    vessel_1_id: Some(v1),
                    vessel_2_id: Some(v2),
                    dark_detection_id: None,
                    dark_detection_id_2: None,
                    detection_type: StsDetectionType::VisibleVisible,
                    start_time_utc: ts + Duration::days(day),
                    end_time_utc: ts + Duration::days(day) + Duration::hours(2),
                    duration_minutes: 120,
                    mean_proximity_meters: Some(150.0),
                    mean_lat: Some(36.0),
                    mean_lon: Some(23.0),
                    corridor_id: None,
                    eta_minutes: None,
                    risk_score_component: 0,
                })
                .unwrap();
        }

        let alerts = detect_sts_chains(&store).unwrap();
        assert_eq!(alerts, 1);
        let fleet_alerts = store.all_fleet_alerts().unwrap();
        assert_eq!(fleet_alerts[0].alert_type, "sts_relay_chain");
        assert_eq!(fleet_alerts[0].vessel_ids, vec![1, 2, 3, 4]);
        assert_eq!(fleet_alerts[0].risk_score_component, 40); // 4-hop chain

        // Re-running does not duplicate.
        assert_eq!(detect_sts_chains(&store).unwrap(), 0);
    }
}
