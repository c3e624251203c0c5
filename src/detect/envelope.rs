//! Movement envelope interpolation.
//!
//! Three strategies keyed on gap duration:
//!   < 2 h   linear interpolation (2-point track)
//!   2-6 h   cubic Hermite spline using start/end SOG·COG (15 positions
//!           plus a buffered confidence ellipse)
//!   > 6 h   multi-scenario envelope (paths at 0.3/0.5/0.7/1.0× max speed
//!           with bearing offsets, convex-hull confidence polygon)

use crate::geo::{destination_point, haversine_nm, initial_bearing_deg};
use crate::types::{EnvelopeMethod, EnvelopePosition, GapEventId, MovementEnvelope};

/// Endpoint kinematics for envelope construction.
#[derive(Debug, Clone, Copy)]
pub struct GapEndpoints {
    pub start_lat: f64,
    pub start_lon: f64,
    pub end_lat: f64,
    pub end_lon: f64,
    pub start_sog: Option<f64>,
    pub start_cog: Option<f64>,
    pub end_sog: Option<f64>,
    pub end_cog: Option<f64>,
}

/// Buffer around the spline path for the confidence ellipse, nm.
const ELLIPSE_BUFFER_NM: f64 = 5.0;
/// Positions generated along a Hermite spline.
const HERMITE_POINTS: usize = 15;

/// Build the movement envelope for a gap.
///
/// `max_speed_kn` is the DWT-class maximum used for the plausible-distance
/// bound; `envelope_id` and `gap_event_id` are assigned by the caller.
pub fn build_envelope(
    envelope_id: u64,
    gap_event_id: GapEventId,
    endpoints: &GapEndpoints,
    duration_h: f64,
    max_speed_kn: f64,
) -> MovementEnvelope {
    let actual_nm = haversine_nm(
        endpoints.start_lat,
        endpoints.start_lon,
        endpoints.end_lat,
        endpoints.end_lon,
    );
    let max_plausible_nm = max_speed_kn * duration_h;
    let ratio = if max_plausible_nm > 0.0 {
        actual_nm / max_plausible_nm
    } else {
        f64::INFINITY
    };
    let heading = initial_bearing_deg(
        endpoints.start_lat,
        endpoints.start_lon,
        endpoints.end_lat,
        endpoints.end_lon,
    );

    let (method, positions, polygon) = if duration_h < 2.0 {
        let (positions, polygon) = interpolate_linear(endpoints, duration_h);
        (EnvelopeMethod::Linear, positions, polygon)
    } else if duration_h <= 6.0 {
        let (positions, polygon) = interpolate_hermite(endpoints, duration_h);
        (EnvelopeMethod::Spline, positions, polygon)
    } else {
        let (positions, polygon) = interpolate_scenarios(endpoints, duration_h, max_speed_kn);
        (EnvelopeMethod::Kalman, positions, polygon)
    };

    // Ellipse semi-axes: along-track bound and the cross-track buffer.
    let semi_major = (max_plausible_nm / 2.0).max(actual_nm / 2.0);
    let semi_minor = ELLIPSE_BUFFER_NM.max(semi_major * 0.2);

    MovementEnvelope {
        envelope_id,
        gap_event_id,
        method,
        max_plausible_distance_nm: max_plausible_nm,
        actual_gap_distance_nm: actual_nm,
        plausibility_ratio: ratio,
        semi_major_nm: Some(semi_major),
        semi_minor_nm: Some(semi_minor),
        heading_deg: Some(heading),
        confidence_polygon_wkt: polygon,
        interpolated_positions: positions,
    }
}

// ============================================================================
// Strategies
// ============================================================================

/// Linear interpolation for gaps < 2 h: the 2-point track.
fn interpolate_linear(
    endpoints: &GapEndpoints,
    duration_h: f64,
) -> (Vec<EnvelopePosition>, Option<String>) {
    (
        vec![
            EnvelopePosition {
                lat: endpoints.start_lat,
                lon: endpoints.start_lon,
                t_offset_h: 0.0,
            },
            EnvelopePosition {
                lat: endpoints.end_lat,
                lon: endpoints.end_lon,
                t_offset_h: duration_h,
            },
        ],
        None,
    )
}

/// Cubic Hermite spline for 2-6 h gaps.
///
/// Start/end position plus SOG×COG velocity vectors form the tangent
/// conditions. Velocity converts to degrees/h with 1° lat ≈ 60 nm and
/// 1° lon ≈ 60·cos(lat) nm.
fn interpolate_hermite(
    endpoints: &GapEndpoints,
    duration_h: f64,
) -> (Vec<EnvelopePosition>, Option<String>) {
    let mid_lat = (endpoints.start_lat + endpoints.end_lat) / 2.0;
    let cos_lat = mid_lat.to_radians().cos();
    let nm_per_deg_lat = 60.0;
    let nm_per_deg_lon = if cos_lat > 0.01 { 60.0 * cos_lat } else { 60.0 };

    let start_cog_r = endpoints.start_cog.unwrap_or(0.0).to_radians();
    let end_cog_r = endpoints.end_cog.unwrap_or(0.0).to_radians();
    let start_sog = endpoints.start_sog.unwrap_or(0.0);
    let end_sog = endpoints.end_sog.unwrap_or(0.0);

    // dy = SOG·cos(COG) is the lat component; dx = SOG·sin(COG) the lon one.
    let m0_lat = start_sog * start_cog_r.cos() / nm_per_deg_lat * duration_h;
    let m0_lon = start_sog * start_cog_r.sin() / nm_per_deg_lon * duration_h;
    let m1_lat = end_sog * end_cog_r.cos() / nm_per_deg_lat * duration_h;
    let m1_lon = end_sog * end_cog_r.sin() / nm_per_deg_lon * duration_h;

    let mut positions = Vec::with_capacity(HERMITE_POINTS);
    for i in 0..HERMITE_POINTS {
        let t = i as f64 / (HERMITE_POINTS - 1) as f64;
        let h00 = (1.0 + 2.0 * t) * (1.0 - t).powi(2);
        let h10 = t * (1.0 - t).powi(2);
        let h01 = t.powi(2) * (3.0 - 2.0 * t);
        let h11 = t.powi(2) * (t - 1.0);

        let lat = h00 * endpoints.start_lat + h10 * m0_lat + h01 * endpoints.end_lat + h11 * m1_lat;
        let lon = h00 * endpoints.start_lon + h10 * m0_lon + h01 * endpoints.end_lon + h11 * m1_lon;

        positions.push(EnvelopePosition {
            lat: round6(lat),
            lon: round6(lon),
            t_offset_h: round2(t * duration_h),
        });
    }

    let ellipse = buffered_bbox_wkt(&positions, ELLIPSE_BUFFER_NM);
    (positions, ellipse)
}

/// Multi-scenario envelope for gaps > 6 h.
///
/// Scenario paths at speed fractions 0.3/0.5/0.7/1.0 with bearing offsets
/// ±0.5 rad (converging toward the endpoint), plus the direct path; the
/// confidence polygon is the convex hull of every scenario point.
fn interpolate_scenarios(
    endpoints: &GapEndpoints,
    duration_h: f64,
    max_speed_kn: f64,
) -> (Vec<EnvelopePosition>, Option<String>) {
    const SPEED_FRACTIONS: [f64; 4] = [0.3, 0.5, 0.7, 1.0];
    const BEARING_OFFSETS_RAD: [f64; 3] = [-0.5, 0.0, 0.5];
    const STEPS: usize = 10;

    let bearing = initial_bearing_deg(
        endpoints.start_lat,
        endpoints.start_lon,
        endpoints.end_lat,
        endpoints.end_lon,
    );

    let mut all_points = Vec::new();
    for frac in SPEED_FRACTIONS {
        let speed = max_speed_kn * frac;
        for offset in BEARING_OFFSETS_RAD {
            for step in 0..=STEPS {
                let t = step as f64 / STEPS as f64;
                let dist = speed * duration_h * t;
                // Bearing deviation converges toward the endpoint.
                let b = bearing + offset.to_degrees() * (1.0 - t);
                let (lat, lon) =
                    destination_point(endpoints.start_lat, endpoints.start_lon, b, dist);
                all_points.push(EnvelopePosition {
                    lat: round6(lat),
                    lon: round6(lon),
                    t_offset_h: round2(t * duration_h),
                });
            }
        }
    }

    let (direct, _) = interpolate_linear(endpoints, duration_h);
    all_points.extend_from_slice(&direct);

    let hull = convex_hull_wkt(&all_points)
        .or_else(|| buffered_bbox_wkt(&all_points, ELLIPSE_BUFFER_NM));
    (direct, hull)
}

// ============================================================================
// Polygon helpers
// ============================================================================

/// Bounding box buffered by `buffer_nm`, as a WKT POLYGON. Adequate for map
/// rendering of the spline confidence region.
fn buffered_bbox_wkt(positions: &[EnvelopePosition], buffer_nm: f64) -> Option<String> {
    if positions.len() < 2 {
        return None;
    }
    let buffer_deg = buffer_nm / 60.0;
    let min_lat = positions.iter().map(|p| p.lat).fold(f64::INFINITY, f64::min) - buffer_deg;
    let max_lat = positions.iter().map(|p| p.lat).fold(f64::NEG_INFINITY, f64::max) + buffer_deg;
    let min_lon = positions.iter().map(|p| p.lon).fold(f64::INFINITY, f64::min) - buffer_deg;
    let max_lon = positions.iter().map(|p| p.lon).fold(f64::NEG_INFINITY, f64::max) + buffer_deg;
    Some(format!(
        "POLYGON(({min_lon} {min_lat}, {max_lon} {min_lat}, {max_lon} {max_lat}, {min_lon} {max_lat}, {min_lon} {min_lat}))"
    ))
}

/// Graham-scan convex hull of the scenario points, as WKT.
fn convex_hull_wkt(positions: &[EnvelopePosition]) -> Option<String> {
    let mut points: Vec<(f64, f64)> = positions.iter().map(|p| (p.lon, p.lat)).collect();
    points.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    points.dedup();
    if points.len() < 3 {
        return None;
    }

    let start = points
        .iter()
        .copied()
        .min_by(|a, b| {
            (a.1, a.0)
                .partial_cmp(&(b.1, b.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
    let mut rest: Vec<(f64, f64)> = points.into_iter().filter(|&p| p != start).collect();

    let polar = |p: (f64, f64)| (p.1 - start.1).atan2(p.0 - start.0);
    rest.sort_by(|&a, &b| {
        polar(a)
            .partial_cmp(&polar(b))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let cross = |o: (f64, f64), a: (f64, f64), b: (f64, f64)| {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    };

    let mut hull = vec![start];
    for p in rest {
        while hull.len() > 1 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    if hull.len() < 3 {
        return None;
    }
    hull.push(hull[0]);
    let coords: Vec<String> = hull.iter().map(|(x, y)| format!("{x} {y}")).collect();
    Some(format!("POLYGON(({}))", coords.join(", ")))
}

fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
