//! Sentinel-1 satellite check package generation.
//!
//! The system never renders imagery; it emits query packages — a bounding
//! box sized from the gap's movement envelope and a pre-filled Copernicus
//! Browser URL — for analyst review.

use chrono::Duration;
use serde_json::json;

use crate::geo::bbox_around;
use crate::store::{FleetStore, StoreResult};
use crate::types::{GapEventId, SatelliteCheck};

const COPERNICUS_BROWSER_BASE: &str = "https://browser.dataspace.copernicus.eu/";
/// Envelope radius used when the gap has no plausible-distance bound, nm.
const DEFAULT_RADIUS_NM: f64 = 50.0;

/// Build a Copernicus Browser URL centered on a position with a date range.
pub fn copernicus_url(center_lat: f64, center_lon: f64, date_from: &str, date_to: &str) -> String {
    format!(
        "{COPERNICUS_BROWSER_BASE}?zoom=7&lat={center_lat:.4}&lng={center_lon:.4}&dateFrom={date_from}&dateTo={date_to}&themeId=OCEAN"
    )
}

/// Prepare a satellite query package for a gap. Idempotent: an existing
/// check for the gap is returned as-is.
pub fn prepare_satellite_check(
    store: &FleetStore,
    gap_event_id: GapEventId,
) -> StoreResult<serde_json::Value> {
    let gap = store.gap_event(gap_event_id)?;

    if let Some(existing) = store.satellite_check_for_gap(gap_event_id)? {
        return Ok(json!({
            "sat_check_id": existing.sat_check_id,
            "copernicus_url": existing.copernicus_url,
            "already_exists": true,
        }));
    }

    // Search window pads the silence by an hour on each side.
    let time_from = gap.gap_start_utc - Duration::hours(1);
    let time_to = gap.gap_end_utc + Duration::hours(1);

    // Center on the off-position (or the envelope midpoint when both ends
    // are known).
    let (center_lat, center_lon) = match (
        gap.gap_off_lat.zip(gap.gap_off_lon),
        gap.gap_on_lat.zip(gap.gap_on_lon),
    ) {
        (Some((lat1, lon1)), Some((lat2, lon2))) => ((lat1 + lat2) / 2.0, (lon1 + lon2) / 2.0),
        (Some(position), None) | (None, Some(position)) => position,
        (None, None) => {
            return Err(crate::store::StoreError::Constraint(format!(
                "gap {gap_event_id} has no positions to target"
            )))
        }
    };

    let radius_nm = gap.max_plausible_distance_nm.unwrap_or(DEFAULT_RADIUS_NM);
    let bbox = bbox_around(center_lat, center_lon, radius_nm);
    let url = copernicus_url(
        center_lat,
        center_lon,
        &time_from.format("%Y-%m-%d").to_string(),
        &time_to.format("%Y-%m-%d").to_string(),
    );

    let check = SatelliteCheck {
        sat_check_id: store.next_id()?,
        gap_event_id,
        provider: "Sentinel-1".to_string(),
        query_time_window: format!("{}/{}", time_from.to_rfc3339(), time_to.to_rfc3339()),
        copernicus_url: url.clone(),
        review_status: "not_checked".to_string(),
    };
    store.insert_satellite_check(&check)?;
    store.audit("satellite", "prepare_check", "gap_event", gap_event_id);

    Ok(json!({
        "sat_check_id": check.sat_check_id,
        "copernicus_url": url,
        "bounding_box": {
            "min_lon": bbox.min_lon,
            "min_lat": bbox.min_lat,
            "max_lon": bbox.max_lon,
            "max_lat": bbox.max_lat,
        },
        "time_window": {
            "from": time_from.to_rfc3339(),
            "to": time_to.to_rfc3339(),
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AisGapEvent, AlertStatus, Vessel};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_copernicus_url_format() {
        let url = copernicus_url(56.1234, 19.5678, "2025-06-09", "2025-06-12");
        assert_eq!(
            url,
            "https://browser.dataspace.copernicus.eu/?zoom=7&lat=56.1234&lng=19.5678&dateFrom=2025-06-09&dateTo=2025-06-12&themeId=OCEAN"
        );
    }

    #[test]
    fn test_prepare_check_is_idempotent() {
        let store = FleetStore::temporary().unwrap();
        let start = Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap();
        store.insert_vessel(&Vessel::new(1, "636017000", start)).unwrap();
        store
            .insert_gap_event(&AisGapEvent {
                gap_event_id: 5,
                vessel_id: 1,
                gap_start_utc: start,
                gap_end_utc: start + Duration::hours(26),
                duration_minutes: 1560,
                corridor_id: None,
                risk_score: 80,
                risk_breakdown_json: None,
                status: AlertStatus::NeedsSatelliteCheck,
                analyst_notes: None,
                impossible_speed_flag: false,
                velocity_plausibility_ratio: None,
                max_plausible_distance_nm: Some(364.0),
                actual_gap_distance_nm: None,
                in_dark_zone: false,
                dark_zone_id: None,
                pre_gap_sog: None,
                gap_off_lat: Some(56.0),
                gap_off_lon: Some(19.0),
                gap_on_lat: Some(57.0),
                gap_on_lon: Some(21.0),
                source: "local".into(),
                original_vessel_id: 1,
                is_feed_outage: false,
                coverage_quality: None,
            })
            .unwrap();

        let package = prepare_satellite_check(&store, 5).unwrap();
        assert!(package["copernicus_url"]
            .as_str()
            .unwrap()
            .contains("themeId=OCEAN"));
        assert!(package["bounding_box"]["min_lat"].as_f64().unwrap() < 56.5);

        let again = prepare_satellite_check(&store, 5).unwrap();
        assert_eq!(again["already_exists"], true);
    }
}
