//! Global Fishing Watch adapters.
//!
//! Two contracts:
//!   1. The gaps events API (`public-global-gaps-events:latest`): JSON
//!      events with off/on positions, duration, distance, and implied
//!      speed. Imported as `AisGapEvent { source: "gfw" }`.
//!   2. The offline detections CSV (`detect_id, timestamp, lat, lon,
//!      vessel_length_m, vessel_score, vessel_type`): correlated against
//!      AIS within 2 nm / ±3 h; unmatched rows become
//!      `DarkVesselDetection`s.

use std::io::BufRead;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::config;
use crate::geo::haversine_nm;
use crate::net::{retry_request, FetchError, RetryPolicy};
use crate::store::{FleetStore, StoreResult};
use crate::types::{AisGapEvent, AlertStatus, DarkVesselDetection};
use crate::util::csv_split;

pub const GFW_GAPS_DATASET: &str = "public-global-gaps-events:latest";
const GFW_EVENTS_URL: &str = "https://gateway.api.globalfishingwatch.org/v3/events";

/// AIS correlation radius for detections, nm.
const AIS_MATCH_RADIUS_NM: f64 = 2.0;
/// AIS correlation window, hours.
const AIS_MATCH_WINDOW_H: i64 = 3;

// ============================================================================
// Gaps events API
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct GfwPosition {
    pub lat: f64,
    pub lon: f64,
}

/// One gap event row from the GFW events endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GfwGapEvent {
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub off_position: GfwPosition,
    pub on_position: GfwPosition,
    pub duration_hours: f64,
    pub distance_km: Option<f64>,
    pub implied_speed_knots: Option<f64>,
    /// Vessel MMSI as reported by GFW ("ssvid").
    pub ssvid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GfwEventsPage {
    entries: Vec<GfwGapEvent>,
}

/// Parse an events-endpoint payload.
pub fn parse_gap_events(payload: &str) -> Result<Vec<GfwGapEvent>, FetchError> {
    let page: GfwEventsPage =
        serde_json::from_str(payload).map_err(|e| FetchError::Body(e.to_string()))?;
    Ok(page.entries)
}

/// Import parsed GFW gap events for known vessels.
///
/// Events for MMSIs we have never seen are counted but not imported — a
/// gap without a vessel row has nothing to attach to.
pub fn import_gap_events(
    store: &FleetStore,
    events: &[GfwGapEvent],
) -> StoreResult<serde_json::Value> {
    let mut imported = 0usize;
    let mut unknown_vessel = 0usize;
    let mut duplicates = 0usize;

    for event in events {
        let Some(vessel) = event
            .ssvid
            .as_deref()
            .and_then(|mmsi| store.vessel_by_mmsi(mmsi).transpose())
            .transpose()?
        else {
            unknown_vessel += 1;
            continue;
        };
        let vessel = if vessel.is_absorbed() {
            store.canonical_vessel(vessel.vessel_id)?
        } else {
            vessel
        };

        if store.gap_exists(vessel.vessel_id, event.start)? {
            duplicates += 1;
            continue;
        }

        let distance_nm = event.distance_km.map(|km| km / 1.852);
        let max_nm =
            crate::detect::max_speed_kn(vessel.deadweight) * event.duration_hours;
        let ratio = distance_nm.map(|d| if max_nm > 0.0 { d / max_nm } else { f64::INFINITY });

        store.insert_gap_event(&AisGapEvent {
            gap_event_id: store.next_id()?,
            vessel_id: vessel.vessel_id,
            gap_start_utc: event.start,
            gap_end_utc: event.end,
            duration_minutes: (event.duration_hours * 60.0) as i64,
            corridor_id: store
                .corridor_for_segment(
                    event.off_position.lat,
                    event.off_position.lon,
                    event.on_position.lat,
                    event.on_position.lon,
                )?
                .map(|c| c.corridor_id),
            risk_score: 0,
            risk_breakdown_json: None,
            status: AlertStatus::New,
            analyst_notes: None,
            impossible_speed_flag: ratio.is_some_and(|r| r > 1.1),
            velocity_plausibility_ratio: ratio,
            max_plausible_distance_nm: Some(max_nm),
            actual_gap_distance_nm: distance_nm,
            in_dark_zone: false,
            dark_zone_id: None,
            pre_gap_sog: event.implied_speed_knots,
            gap_off_lat: Some(event.off_position.lat),
            gap_off_lon: Some(event.off_position.lon),
            gap_on_lat: Some(event.on_position.lat),
            gap_on_lon: Some(event.on_position.lon),
            source: "gfw".to_string(),
            original_vessel_id: vessel.vessel_id,
            is_feed_outage: false,
            coverage_quality: None,
        })?;
        imported += 1;
    }

    Ok(serde_json::json!({
        "imported": imported,
        "unknown_vessel": unknown_vessel,
        "duplicates": duplicates,
    }))
}

/// Live adapter polling the GFW events endpoint.
pub struct GfwGapsAdapter {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl GfwGapsAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            policy: RetryPolicy::default(),
        }
    }
}

impl Default for GfwGapsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::FeedAdapter for GfwGapsAdapter {
    fn name(&self) -> &'static str {
        "gfw_gaps"
    }

    async fn fetch(&self, store: &FleetStore) -> Result<serde_json::Value, FetchError> {
        let config = config::get();
        let Some(token) = config.settings.gfw_api_token.clone() else {
            tracing::info!("GFW_API_TOKEN not configured - skipping GFW gaps fetch");
            return Ok(serde_json::json!({ "skipped": "no token" }));
        };

        let response = retry_request(
            || {
                self.client
                    .get(GFW_EVENTS_URL)
                    .bearer_auth(&token)
                    .query(&[("datasets[0]", GFW_GAPS_DATASET), ("limit", "500")])
            },
            &self.policy,
        )
        .await?;
        let payload = response
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;
        let events = parse_gap_events(&payload)?;
        import_gap_events(store, &events).map_err(|e| FetchError::Body(e.to_string()))
    }
}

// ============================================================================
// Detections CSV
// ============================================================================

/// Import a GFW detections CSV, correlating against stored AIS.
pub fn import_detections_csv<R: BufRead>(
    store: &FleetStore,
    reader: R,
) -> StoreResult<serde_json::Value> {
    let mut lines = reader.lines();
    let Some(Ok(header_line)) = lines.next() else {
        return Ok(serde_json::json!({ "total": 0, "matched": 0, "dark": 0, "rejected": 0 }));
    };
    let headers: Vec<String> = csv_split(&header_line)
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let (Some(id_col), Some(ts_col), Some(lat_col), Some(lon_col)) = (
        column("detect_id"),
        column("timestamp"),
        column("lat"),
        column("lon"),
    ) else {
        return Err(crate::store::StoreError::Constraint(
            "GFW detections CSV missing required columns".to_string(),
        ));
    };
    let length_col = column("vessel_length_m");
    let score_col = column("vessel_score");
    let type_col = column("vessel_type");

    let mut total = 0usize;
    let mut matched = 0usize;
    let mut dark = 0usize;
    let mut rejected = 0usize;

    for line in lines {
        let Ok(line) = line else { continue };
        if line.trim().is_empty() {
            continue;
        }
        total += 1;
        let fields = csv_split(&line);
        let get = |i: usize| fields.get(i).map(|s| s.trim()).unwrap_or("");

        let (Ok(lat), Ok(lon)) = (get(lat_col).parse::<f64>(), get(lon_col).parse::<f64>())
        else {
            tracing::warn!(row = get(id_col), "rejected GFW detection: bad coordinates");
            rejected += 1;
            continue;
        };
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            tracing::warn!(row = get(id_col), lat, lon, "rejected GFW detection: out of range");
            rejected += 1;
            continue;
        }
        let Some(ts) = crate::ingest::parse_timestamp(get(ts_col)) else {
            tracing::warn!(row = get(id_col), "rejected GFW detection: bad timestamp");
            rejected += 1;
            continue;
        };

        // Correlate against AIS in the window.
        let window = Duration::hours(AIS_MATCH_WINDOW_H);
        let candidates = store.points_in_window(ts - window, ts + window)?;
        let matched_vessel = candidates
            .iter()
            .find(|p| haversine_nm(lat, lon, p.lat, p.lon) <= AIS_MATCH_RADIUS_NM)
            .map(|p| p.vessel_id);

        store.insert_dark_detection(&DarkVesselDetection {
            detection_id: store.next_id()?,
            scene_id: get(id_col).to_string(),
            detection_lat: lat,
            detection_lon: lon,
            detection_time_utc: ts,
            length_estimate_m: length_col.and_then(|i| get(i).parse().ok()),
            vessel_type_inferred: type_col.map(|i| get(i).to_string()).filter(|s| !s.is_empty()),
            model_confidence: score_col.and_then(|i| get(i).parse().ok()).unwrap_or(0.0),
            ais_match_attempted: true,
            ais_match_result: if matched_vessel.is_some() {
                "matched".to_string()
            } else {
                "unmatched".to_string()
            },
            matched_vessel_id: matched_vessel,
        })?;
        if matched_vessel.is_some() {
            matched += 1;
        } else {
            dark += 1;
        }
    }

    tracing::info!(total, matched, dark, rejected, "GFW detections import complete");
    Ok(serde_json::json!({
        "total": total,
        "matched": matched,
        "dark": dark,
        "rejected": rejected,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AisClass, AisPoint, Vessel};
    use chrono::TimeZone;
    use std::io::Cursor;

    #[test]
    fn test_parse_gap_events_payload() {
        let payload = r#"{
            "entries": [{
                "id": "gap-1",
                "start": "2025-06-01T00:00:00Z",
                "end": "2025-06-02T02:00:00Z",
                "offPosition": {"lat": 56.0, "lon": 19.0},
                "onPosition": {"lat": 57.0, "lon": 21.0},
                "durationHours": 26.0,
                "distanceKm": 165.0,
                "impliedSpeedKnots": 3.4,
                "ssvid": "636017000"
            }]
        }"#;
        let events = parse_gap_events(payload).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].ssvid.as_deref(), Some("636017000"));
        assert!((events[0].duration_hours - 26.0).abs() < 1e-9);
    }

    #[test]
    fn test_import_gap_events_for_known_vessel() {
        let store = FleetStore::temporary().unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        store.insert_vessel(&Vessel::new(1, "636017000", ts)).unwrap();

        let events = vec![GfwGapEvent {
            id: "gap-1".into(),
            start: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 6, 2, 2, 0, 0).unwrap(),
            off_position: GfwPosition { lat: 56.0, lon: 19.0 },
            on_position: GfwPosition { lat: 57.0, lon: 21.0 },
            duration_hours: 26.0,
            distance_km: Some(165.0),
            implied_speed_knots: Some(3.4),
            ssvid: Some("636017000".into()),
        }];
        let counts = import_gap_events(&store, &events).unwrap();
        assert_eq!(counts["imported"], 1);

        let gaps = store.gap_events_for_vessel(1).unwrap();
        assert_eq!(gaps[0].source, "gfw");
        assert_eq!(gaps[0].duration_minutes, 1560);
        // Re-import is a duplicate.
        let counts = import_gap_events(&store, &events).unwrap();
        assert_eq!(counts["duplicates"], 1);
    }

    #[test]
    fn test_detections_csv_correlation() {
        let store = FleetStore::temporary().unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        store.insert_vessel(&Vessel::new(1, "636017000", ts)).unwrap();
        store
            .insert_point(&AisPoint {
                vessel_id: 1,
                timestamp_utc: ts,
                lat: 56.0,
                lon: 19.0,
                sog: Some(8.0),
                cog: None,
                heading: None,
                nav_status: None,
                ais_class: AisClass::A,
                source: "terrestrial".into(),
            })
            .unwrap();

        let csv = "\
detect_id,timestamp,lat,lon,vessel_length_m,vessel_score,vessel_type\n\
d1,2025-06-01T12:30:00Z,56.01,19.01,240,0.95,tanker\n\
d2,2025-06-01T12:30:00Z,40.0,5.0,180,0.80,cargo\n\
d3,bad-timestamp,56.0,19.0,,,\n";
        let counts = import_detections_csv(&store, Cursor::new(csv)).unwrap();
        assert_eq!(counts["total"], 3);
        assert_eq!(counts["matched"], 1);
        assert_eq!(counts["dark"], 1);
        assert_eq!(counts["rejected"], 1);

        let detections = store.all_dark_detections().unwrap();
        assert_eq!(detections.len(), 2);
        assert!(detections.iter().any(|d| d.matched_vessel_id == Some(1)));
    }
}
