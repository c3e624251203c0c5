//! Port call detection and port resolution.
//!
//! A port call is a run of points within 3 nm of a known port with
//! SOG < 1 kn lasting at least 2 h. The resolver maps coordinates plus an
//! optional external name to a known port: geo-nearest within 10 nm, else
//! exact normalized name, else fuzzy ratio strictly above 80, else none.

use chrono::{DateTime, Utc};

use crate::geo::haversine_nm;
use crate::store::{FleetStore, StoreResult};
use crate::types::{Port, PortCall, Vessel};
use crate::util::textmatch;

/// Residence proximity to a port, nm.
const PORT_PROXIMITY_NM: f64 = 3.0;
/// SOG below which the vessel counts as moored.
const SOG_THRESHOLD_KN: f64 = 1.0;
/// Minimum residence duration, hours.
const MIN_DURATION_HOURS: f64 = 2.0;
/// Resolver search radius, nm.
const PORT_MATCH_RADIUS_NM: f64 = 10.0;
/// Resolver fuzzy-match floor (strictly above).
const FUZZY_THRESHOLD: f64 = 80.0;

/// Port-call step summary.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PortCallReport {
    pub vessels_processed: usize,
    pub port_calls_detected: usize,
    pub errors: usize,
}

pub fn detect_port_calls(store: &FleetStore) -> PortCallReport {
    let mut report = PortCallReport::default();
    let vessels = match store.active_vessels() {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "port call detection could not list vessels");
            report.errors += 1;
            return report;
        }
    };
    let ports = match store.all_ports() {
        Ok(p) => p.into_iter().filter(|p| p.major_port).collect::<Vec<_>>(),
        Err(e) => {
            tracing::error!(error = %e, "port call detection could not list ports");
            report.errors += 1;
            return report;
        }
    };
    if ports.is_empty() {
        return report;
    }

    for vessel in vessels {
        report.vessels_processed += 1;
        match detect_for_vessel(store, &vessel, &ports) {
            Ok(count) => report.port_calls_detected += count,
            Err(e) => {
                tracing::warn!(mmsi = %vessel.mmsi, error = %e, "port call scan failed");
                report.errors += 1;
            }
        }
    }

    tracing::info!(
        calls = report.port_calls_detected,
        vessels = report.vessels_processed,
        "port call detection complete"
    );
    report
}

fn detect_for_vessel(
    store: &FleetStore,
    vessel: &Vessel,
    ports: &[Port],
) -> StoreResult<usize> {
    let points = store.points_for_vessel(vessel.vessel_id)?;
    if points.len() < 2 {
        return Ok(0);
    }

    let mut calls = 0usize;
    let mut current: Option<(&Port, DateTime<Utc>, DateTime<Utc>)> = None;

    for point in &points {
        let moored = point.sog.is_some_and(|s| s < SOG_THRESHOLD_KN);
        let nearest = if moored {
            ports
                .iter()
                .find(|p| haversine_nm(point.lat, point.lon, p.lat, p.lon) <= PORT_PROXIMITY_NM)
        } else {
            None
        };

        match (nearest, &mut current) {
            (Some(port), Some((active, _start, end))) if active.port_id == port.port_id => {
                *end = point.timestamp_utc;
            }
            (Some(port), _) => {
                if let Some((port, start, end)) = current.take() {
                    calls += flush_call(store, vessel, port, start, end)?;
                }
                current = Some((port, point.timestamp_utc, point.timestamp_utc));
            }
            (None, _) => {
                if let Some((port, start, end)) = current.take() {
                    calls += flush_call(store, vessel, port, start, end)?;
                }
            }
        }
    }
    if let Some((port, start, end)) = current {
        calls += flush_call(store, vessel, port, start, end)?;
    }
    Ok(calls)
}

fn flush_call(
    store: &FleetStore,
    vessel: &Vessel,
    port: &Port,
    arrival: DateTime<Utc>,
    departure: DateTime<Utc>,
) -> StoreResult<usize> {
    let duration_h = (departure - arrival).num_seconds() as f64 / 3600.0;
    if duration_h < MIN_DURATION_HOURS {
        return Ok(0);
    }
    let inserted = store.insert_port_call(&PortCall {
        port_call_id: store.next_id()?,
        vessel_id: vessel.vessel_id,
        port_id: Some(port.port_id),
        raw_port_name: None,
        arrival_utc: arrival,
        departure_utc: Some(departure),
    })?;
    Ok(usize::from(inserted))
}

// ============================================================================
// Port resolver
// ============================================================================

/// Resolve coordinates plus an optional external name to a known port.
pub fn resolve_port(
    store: &FleetStore,
    lat: f64,
    lon: f64,
    port_name: Option<&str>,
) -> StoreResult<Option<Port>> {
    let ports = store.all_ports()?;
    if ports.is_empty() {
        return Ok(None);
    }

    // 1. Geo-nearest within radius.
    let nearest = ports
        .iter()
        .map(|p| (p, haversine_nm(lat, lon, p.lat, p.lon)))
        .filter(|(_, d)| *d < PORT_MATCH_RADIUS_NM)
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if let Some((port, _)) = nearest {
        return Ok(Some(port.clone()));
    }

    let Some(name) = port_name else {
        return Ok(None);
    };

    // 2. Exact normalized-name match.
    let normalized = textmatch::normalize_name(name);
    if let Some(port) = ports
        .iter()
        .find(|p| textmatch::normalize_name(&p.name) == normalized)
    {
        return Ok(Some(port.clone()));
    }

    // 3. Fuzzy match strictly above the threshold.
    let mut best: Option<(&Port, f64)> = None;
    for port in &ports {
        let score = textmatch::ratio(&normalized, &textmatch::normalize_name(&port.name));
        if score > FUZZY_THRESHOLD && best.is_none_or(|(_, b)| score > b) {
            best = Some((port, score));
        }
    }
    Ok(best.map(|(p, _)| p.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AisClass;
    use chrono::{Duration, TimeZone};

    fn port(id: u64, name: &str, lat: f64, lon: f64) -> Port {
        Port {
            port_id: id,
            name: name.into(),
            country: Some("NL".into()),
            lat,
            lon,
            major_port: true,
            is_russian_oil_terminal: false,
        }
    }

    fn point(minutes: i64, lat: f64, lon: f64, sog: f64) -> crate::types::AisPoint {
        crate::types::AisPoint {
            vessel_id: 1,
            timestamp_utc: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minutes),
            lat,
            lon,
            sog: Some(sog),
            cog: None,
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
        store.insert_port(&port(10, "Rotterdam", 51.95, 4.14)).unwrap();
    }

    #[test]
    fn test_three_hour_berth_creates_call() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        for m in (0..=180).step_by(30) {
            store.insert_point(&point(m, 51.951, 4.141, 0.2)).unwrap();
        }
        let report = detect_port_calls(&store);
        assert_eq!(report.port_calls_detected, 1);
        let calls = store.port_calls_for_vessel(1).unwrap();
        assert_eq!(calls[0].port_id, Some(10));
        assert!(calls[0].departure_utc.is_some());
    }

    #[test]
    fn test_brief_stop_not_a_call() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        for m in (0..=60).step_by(30) {
            store.insert_point(&point(m, 51.951, 4.141, 0.2)).unwrap();
        }
        let report = detect_port_calls(&store);
        assert_eq!(report.port_calls_detected, 0);
    }

    #[test]
    fn test_transit_past_port_not_a_call() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        for m in (0..=180).step_by(30) {
            store
                .insert_point(&point(m, 51.951, 4.0 + m as f64 * 0.002, 12.0))
                .unwrap();
        }
        let report = detect_port_calls(&store);
        assert_eq!(report.port_calls_detected, 0);
    }

    #[test]
    fn test_resolver_geo_nearest_wins() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        store.insert_port(&port(11, "Amsterdam", 52.40, 4.85)).unwrap();
        let resolved = resolve_port(&store, 51.96, 4.15, Some("Amsterdam")).unwrap();
        // Rotterdam is closer than the named Amsterdam.
        assert_eq!(resolved.unwrap().port_id, 10);
    }

    #[test]
    fn test_resolver_falls_back_to_name() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        // Far from every port: name matching kicks in.
        let resolved = resolve_port(&store, 30.0, -20.0, Some("ROTTERDAM")).unwrap();
        assert_eq!(resolved.unwrap().port_id, 10);
    }

    #[test]
    fn test_resolver_fuzzy_match() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        let resolved = resolve_port(&store, 30.0, -20.0, Some("Roterdam")).unwrap();
        assert_eq!(resolved.unwrap().port_id, 10);
    }

    #[test]
    fn test_resolver_none_when_nothing_matches() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        let resolved = resolve_port(&store, 30.0, -20.0, Some("Vladivostok")).unwrap();
        assert!(resolved.is_none());
    }
}
