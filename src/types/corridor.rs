//! Geographic reference entities: corridors, ports, port calls, gap-rate
//! baselines, and satellite-derived dark vessel detections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::CorridorType;
use super::events::{CorridorId, GapEventId};
use super::vessel::VesselId;

// ============================================================================
// Corridors
// ============================================================================

/// Analyst-defined monitoring polygon (WGS-84).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Corridor {
    pub corridor_id: CorridorId,
    pub name: String,
    pub corridor_type: CorridorType,
    /// WKT POLYGON; bbox extraction is the supported geometry operation.
    pub geometry: String,
    pub risk_weight: f64,
    /// Known jamming zone: broad signal loss is expected here.
    pub is_jamming_zone: bool,
}

// ============================================================================
// Corridor gap baselines
// ============================================================================

/// Rolling 7-day gap counts per corridor with mean / P95 statistics.
///
/// Feed-outage detection uses `3 × p95_threshold` as its adaptive cluster
/// threshold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorridorGapBaseline {
    pub baseline_id: u64,
    pub corridor_id: CorridorId,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub gap_count: u32,
    pub mean_gap_count: Option<f64>,
    pub p95_threshold: Option<f64>,
}

// ============================================================================
// Ports and port calls
// ============================================================================

pub type PortId = u64;

/// Known port with point geometry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Port {
    pub port_id: PortId,
    pub name: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub major_port: bool,
    pub is_russian_oil_terminal: bool,
}

/// Derived port residence: ≤ 3 nm from a known port, SOG < 1 kn, ≥ 2 h.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortCall {
    pub port_call_id: u64,
    pub vessel_id: VesselId,
    pub port_id: Option<PortId>,
    /// Name as delivered by an external source when no port matched.
    pub raw_port_name: Option<String>,
    pub arrival_utc: DateTime<Utc>,
    pub departure_utc: Option<DateTime<Utc>>,
}

// ============================================================================
// Dark vessel detections
// ============================================================================

/// Satellite-detected vessel with no AIS correlate.
///
/// Imported from GFW detection CSVs; `ais_match_result` records the outcome
/// of the ±3 h / 2 nm correlation attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DarkVesselDetection {
    pub detection_id: u64,
    pub scene_id: String,
    pub detection_lat: f64,
    pub detection_lon: f64,
    pub detection_time_utc: DateTime<Utc>,
    pub length_estimate_m: Option<f64>,
    pub vessel_type_inferred: Option<String>,
    pub model_confidence: f64,
    pub ais_match_attempted: bool,
    /// "matched" | "unmatched".
    pub ais_match_result: String,
    pub matched_vessel_id: Option<VesselId>,
}

impl DarkVesselDetection {
    pub fn is_unmatched(&self) -> bool {
        self.ais_match_result == "unmatched"
    }
}

// ============================================================================
// Satellite checks
// ============================================================================

/// Sentinel-1 query package prepared for analyst review of a gap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SatelliteCheck {
    pub sat_check_id: u64,
    pub gap_event_id: GapEventId,
    pub provider: String,
    /// ISO interval "from/to".
    pub query_time_window: String,
    pub copernicus_url: String,
    /// "not_checked" | "candidate_scenes_found" | "reviewed".
    pub review_status: String,
}
