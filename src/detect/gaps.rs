//! AIS transmission gap detection.
//!
//! Walks consecutive point pairs per vessel; a silence of at least
//! `gap_min_hours` with valid endpoints becomes an `AisGapEvent` with its
//! movement envelope. Gaps are stored unscored (`risk_score = 0`,
//! `status = New`); scoring is a separate phase.

use crate::config;
use crate::geo::haversine_nm;
use crate::store::{FleetStore, StoreResult};
use crate::types::{AisGapEvent, AisPoint, AlertStatus, CorridorType, Vessel};

use super::envelope::{build_envelope, GapEndpoints};

/// DWT-class maximum sustained speed, knots.
///
/// VLCC 14, Suezmax 15, Aframax/Panamax 15, general cargo 16, unknown 14
/// (conservative: a low bound inflates the plausibility ratio).
pub fn max_speed_kn(deadweight: Option<f64>) -> f64 {
    match deadweight {
        Some(dwt) if dwt >= 200_000.0 => 14.0,
        Some(dwt) if dwt >= 120_000.0 => 15.0,
        Some(dwt) if dwt >= 60_000.0 => 15.0,
        Some(_) => 16.0,
        None => 14.0,
    }
}

/// Ratio above which a reappearance is kinematically impossible.
const IMPOSSIBLE_RATIO: f64 = 1.1;

/// Gap detection step summary.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct GapDetectionReport {
    pub vessels_scanned: usize,
    pub gaps_created: usize,
    pub envelopes_created: usize,
    pub errors: usize,
}

/// Detect gaps for every non-absorbed vessel.
///
/// Per-vessel failures are counted, logged, and never abort the run.
pub fn detect_gaps(store: &FleetStore) -> GapDetectionReport {
    let mut report = GapDetectionReport::default();
    let vessels = match store.active_vessels() {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "gap detection could not list vessels");
            report.errors += 1;
            return report;
        }
    };

    for vessel in vessels {
        report.vessels_scanned += 1;
        if let Err(e) = detect_gaps_for_vessel(store, &vessel, &mut report) {
            tracing::warn!(mmsi = %vessel.mmsi, error = %e, "gap detection failed for vessel");
            report.errors += 1;
        }
    }

    tracing::info!(
        vessels = report.vessels_scanned,
        gaps = report.gaps_created,
        envelopes = report.envelopes_created,
        errors = report.errors,
        "gap detection complete"
    );
    report
}

fn detect_gaps_for_vessel(
    store: &FleetStore,
    vessel: &Vessel,
    report: &mut GapDetectionReport,
) -> StoreResult<()> {
    let config = config::get();
    let min_hours = config.settings.gap_min_hours;
    let points = store.points_for_vessel(vessel.vessel_id)?;
    if points.len() < 2 {
        return Ok(());
    }

    for pair in points.windows(2) {
        let (before, after) = (&pair[0], &pair[1]);
        let duration_secs = (after.timestamp_utc - before.timestamp_utc).num_seconds();
        if duration_secs <= 0 {
            continue;
        }
        let duration_h = duration_secs as f64 / 3600.0;
        if duration_h < min_hours {
            continue;
        }
        if store.gap_exists(vessel.vessel_id, before.timestamp_utc)? {
            continue;
        }

        let gap = build_gap_event(store, vessel, before, after, duration_secs)?;
        store.insert_gap_event(&gap)?;
        report.gaps_created += 1;

        let envelope = build_envelope(
            store.next_id()?,
            gap.gap_event_id,
            &GapEndpoints {
                start_lat: before.lat,
                start_lon: before.lon,
                end_lat: after.lat,
                end_lon: after.lon,
                start_sog: before.sog,
                start_cog: before.cog,
                end_sog: after.sog,
                end_cog: after.cog,
            },
            duration_h,
            max_speed_kn(vessel.deadweight),
        );
        store.insert_envelope(&envelope)?;
        report.envelopes_created += 1;
    }
    Ok(())
}

fn build_gap_event(
    store: &FleetStore,
    vessel: &Vessel,
    before: &AisPoint,
    after: &AisPoint,
    duration_secs: i64,
) -> StoreResult<AisGapEvent> {
    let duration_h = duration_secs as f64 / 3600.0;
    let actual_nm = haversine_nm(before.lat, before.lon, after.lat, after.lon);
    let max_nm = max_speed_kn(vessel.deadweight) * duration_h;
    let ratio = if max_nm > 0.0 {
        actual_nm / max_nm
    } else {
        f64::INFINITY
    };

    // Corridor association uses segment-bbox intersection: a transit through
    // a corridor must match even when neither endpoint lies inside it.
    let corridor =
        store.corridor_for_segment(before.lat, before.lon, after.lat, after.lon)?;

    // Dark-zone tagging is independent of which corridor claimed the gap.
    let dark_zone = store.all_corridors()?.into_iter().find(|c| {
        (c.is_jamming_zone || c.corridor_type == CorridorType::DarkZone)
            && crate::geo::parse_wkt_bbox(&c.geometry)
                .is_some_and(|b| b.intersects_segment(before.lat, before.lon, after.lat, after.lon))
    });

    Ok(AisGapEvent {
        gap_event_id: store.next_id()?,
        vessel_id: vessel.vessel_id,
        gap_start_utc: before.timestamp_utc,
        gap_end_utc: after.timestamp_utc,
        duration_minutes: duration_secs / 60,
        corridor_id: corridor.map(|c| c.corridor_id),
        risk_score: 0,
        risk_breakdown_json: None,
        status: AlertStatus::New,
        analyst_notes: None,
        impossible_speed_flag: ratio > IMPOSSIBLE_RATIO,
        velocity_plausibility_ratio: Some(ratio),
        max_plausible_distance_nm: Some(max_nm),
        actual_gap_distance_nm: Some(actual_nm),
        in_dark_zone: dark_zone.is_some(),
        dark_zone_id: dark_zone.map(|c| c.corridor_id),
        pre_gap_sog: before.sog,
        gap_off_lat: Some(before.lat),
        gap_off_lon: Some(before.lon),
        gap_on_lat: Some(after.lat),
        gap_on_lon: Some(after.lon),
        source: "local".to_string(),
        original_vessel_id: vessel.vessel_id,
        is_feed_outage: false,
        coverage_quality: None,
    })
}
