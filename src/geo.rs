//! Geodesic and geometry utilities.
//!
//! Canonical haversine implementations shared by the gap, STS, and port
//! detectors, plus the WKT bounding-box subset of geometry handling used for
//! corridor association. All functions are pure; no I/O.

use std::sync::OnceLock;

use regex::Regex;

/// Earth mean radius in nautical miles.
pub const EARTH_RADIUS_NM: f64 = 3440.065;
/// Earth mean radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

// ============================================================================
// Great-circle distance
// ============================================================================

/// Great-circle distance in nautical miles between two WGS-84 coordinates.
pub fn haversine_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    haversine(lat1, lon1, lat2, lon2, EARTH_RADIUS_NM)
}

/// Great-circle distance in metres between two WGS-84 coordinates.
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    haversine(lat1, lon1, lat2, lon2, EARTH_RADIUS_M)
}

fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64, radius: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlam = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlam / 2.0).sin().powi(2);
    radius * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

// ============================================================================
// Bearing and destination
// ============================================================================

/// Initial bearing from point 1 to point 2, degrees true in [0, 360).
pub fn initial_bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let x = dlon.sin() * lat2_r.cos();
    let y = lat1_r.cos() * lat2_r.sin() - lat1_r.sin() * lat2_r.cos() * dlon.cos();
    (x.atan2(y).to_degrees() + 360.0) % 360.0
}

/// Destination point given start, bearing (degrees true), and distance in nm.
pub fn destination_point(lat: f64, lon: f64, bearing_deg: f64, distance_nm: f64) -> (f64, f64) {
    let d = distance_nm / EARTH_RADIUS_NM;
    let b = bearing_deg.to_radians();
    let lat_r = lat.to_radians();
    let lon_r = lon.to_radians();

    let lat2 = (lat_r.sin() * d.cos() + lat_r.cos() * d.sin() * b.cos()).asin();
    let lon2 = lon_r
        + (b.sin() * d.sin() * lat_r.cos()).atan2(d.cos() - lat_r.sin() * lat2.sin());
    (lat2.to_degrees(), lon2.to_degrees())
}

// ============================================================================
// WKT bounding boxes
// ============================================================================

/// Axis-aligned bounding box in WGS-84 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Point-in-bbox test with an optional tolerance in degrees.
    pub fn contains(&self, lat: f64, lon: f64, tolerance_deg: f64) -> bool {
        lat >= self.min_lat - tolerance_deg
            && lat <= self.max_lat + tolerance_deg
            && lon >= self.min_lon - tolerance_deg
            && lon <= self.max_lon + tolerance_deg
    }

    /// True when the straight segment (lat1,lon1)→(lat2,lon2) intersects the
    /// box. This is the corridor-association test: a transit through a
    /// corridor must match even when neither endpoint lies inside.
    pub fn intersects_segment(&self, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> bool {
        if self.contains(lat1, lon1, 0.0) || self.contains(lat2, lon2, 0.0) {
            return true;
        }
        // Liang-Barsky parametric clip in (lon, lat) space.
        let dx = lon2 - lon1;
        let dy = lat2 - lat1;
        let mut t0 = 0.0_f64;
        let mut t1 = 1.0_f64;
        let checks = [
            (-dx, lon1 - self.min_lon),
            (dx, self.max_lon - lon1),
            (-dy, lat1 - self.min_lat),
            (dy, self.max_lat - lat1),
        ];
        for (p, q) in checks {
            if p == 0.0 {
                if q < 0.0 {
                    return false;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return false;
                }
                if r > t0 {
                    t0 = r;
                }
            } else {
                if r < t0 {
                    return false;
                }
                if r < t1 {
                    t1 = r;
                }
            }
        }
        t0 <= t1
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

fn wkt_coord_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(-?\d+(?:\.\d+)?)\s+(-?\d+(?:\.\d+)?)").unwrap_or_else(|_| unreachable!())
    })
}

/// Extract the bounding box of a WKT POLYGON.
///
/// Only the coordinate list is interpreted (lon lat pairs); holes and
/// multi-ring geometries contribute to the same box. Returns `None` for
/// non-POLYGON or empty input.
pub fn parse_wkt_bbox(wkt: &str) -> Option<BoundingBox> {
    let trimmed = wkt.trim();
    if !trimmed.to_ascii_uppercase().starts_with("POLYGON") {
        return None;
    }

    let mut min_lon = f64::INFINITY;
    let mut min_lat = f64::INFINITY;
    let mut max_lon = f64::NEG_INFINITY;
    let mut max_lat = f64::NEG_INFINITY;
    let mut seen = false;

    for cap in wkt_coord_regex().captures_iter(trimmed) {
        let lon: f64 = cap[1].parse().ok()?;
        let lat: f64 = cap[2].parse().ok()?;
        min_lon = min_lon.min(lon);
        max_lon = max_lon.max(lon);
        min_lat = min_lat.min(lat);
        max_lat = max_lat.max(lat);
        seen = true;
    }

    if !seen {
        return None;
    }
    Some(BoundingBox {
        min_lon,
        min_lat,
        max_lon,
        max_lat,
    })
}

/// Bounding box around a center point with a radius in nautical miles.
///
/// `lat_delta = r/60`, `lon_delta = r/(60·cos(lat))`.
pub fn bbox_around(center_lat: f64, center_lon: f64, radius_nm: f64) -> BoundingBox {
    let lat_delta = radius_nm / 60.0;
    let cos_lat = center_lat.to_radians().cos().max(0.01);
    let lon_delta = radius_nm / (60.0 * cos_lat);
    BoundingBox {
        min_lon: center_lon - lon_delta,
        min_lat: center_lat - lat_delta,
        max_lon: center_lon + lon_delta,
        max_lat: center_lat + lat_delta,
    }
}
