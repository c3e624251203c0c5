//! Detector-emitted event records: gaps, spoofing anomalies, STS transfers,
//! loitering runs, draught changes, and movement envelopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{
    AlertStatus, CoverageQuality, EnvelopeMethod, SpoofingType, StsDetectionType,
};
use super::vessel::VesselId;

pub type GapEventId = u64;
pub type AnomalyId = u64;
pub type StsId = u64;
pub type LoiteringId = u64;
pub type CorridorId = u64;

// ============================================================================
// AIS gap events
// ============================================================================

/// A detected AIS transmission silence.
///
/// Created by the gap detector with `risk_score = 0` and `status = New`;
/// scoring, analyst status updates, and merges are the only mutators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AisGapEvent {
    pub gap_event_id: GapEventId,
    pub vessel_id: VesselId,
    pub gap_start_utc: DateTime<Utc>,
    pub gap_end_utc: DateTime<Utc>,
    pub duration_minutes: i64,
    pub corridor_id: Option<CorridorId>,
    /// Capped at 100 by scoring.
    pub risk_score: i64,
    /// Ordered signal → points map; `_`-prefixed keys are bookkeeping.
    /// Stored as the serialized breakdown to preserve insertion order.
    pub risk_breakdown_json: Option<serde_json::Value>,
    pub status: AlertStatus,
    pub analyst_notes: Option<String>,
    /// True when `velocity_plausibility_ratio` > 1.1.
    pub impossible_speed_flag: bool,
    /// actual_distance / max_plausible_distance.
    pub velocity_plausibility_ratio: Option<f64>,
    pub max_plausible_distance_nm: Option<f64>,
    pub actual_gap_distance_nm: Option<f64>,
    pub in_dark_zone: bool,
    pub dark_zone_id: Option<CorridorId>,
    /// SOG of the last point before the gap, captured at detection time.
    pub pre_gap_sog: Option<f64>,
    /// Positions where AIS went off / came back on. Set from endpoints for
    /// local detections and from the event payload for GFW imports.
    pub gap_off_lat: Option<f64>,
    pub gap_off_lon: Option<f64>,
    pub gap_on_lat: Option<f64>,
    pub gap_on_lon: Option<f64>,
    /// "gfw" for imported gap events, "local" for our own detections.
    pub source: String,
    /// Identity that generated this gap; preserved through merges so
    /// per-identity gap frequency cannot inflate on merged vessels.
    pub original_vessel_id: VesselId,
    /// Set by the feed-outage detector; scoring skips these gaps.
    pub is_feed_outage: bool,
    /// Analyst context only — never an input to scoring.
    pub coverage_quality: Option<CoverageQuality>,
}

impl AisGapEvent {
    pub fn duration_hours(&self) -> f64 {
        self.duration_minutes as f64 / 60.0
    }
}

// ============================================================================
// Movement envelopes
// ============================================================================

/// One interpolated track position within a movement envelope.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EnvelopePosition {
    pub lat: f64,
    pub lon: f64,
    /// Offset from gap start, hours.
    pub t_offset_h: f64,
}

/// Plausible-position envelope computed for a gap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovementEnvelope {
    pub envelope_id: u64,
    pub gap_event_id: GapEventId,
    pub method: EnvelopeMethod,
    pub max_plausible_distance_nm: f64,
    pub actual_gap_distance_nm: f64,
    pub plausibility_ratio: f64,
    /// Semi-axes of the confidence ellipse, nautical miles.
    pub semi_major_nm: Option<f64>,
    pub semi_minor_nm: Option<f64>,
    /// Initial bearing start → end, degrees true.
    pub heading_deg: Option<f64>,
    /// Confidence polygon as WKT, when the method produces one.
    pub confidence_polygon_wkt: Option<String>,
    pub interpolated_positions: Vec<EnvelopePosition>,
}

// ============================================================================
// Spoofing anomalies
// ============================================================================

/// A detected identity-fraud or track-manipulation event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpoofingAnomaly {
    pub anomaly_id: AnomalyId,
    pub vessel_id: VesselId,
    pub anomaly_type: SpoofingType,
    pub start_time_utc: DateTime<Utc>,
    pub end_time_utc: Option<DateTime<Utc>>,
    pub implied_speed_kn: Option<f64>,
    pub plausibility_score: Option<f64>,
    pub risk_score_component: i64,
    /// Structured detection evidence.
    pub evidence_json: serde_json::Value,
    /// The gap this anomaly is most directly linked to, when one exists.
    /// Prevents double counting during scoring.
    pub gap_event_id: Option<GapEventId>,
}

// ============================================================================
// STS transfers
// ============================================================================

/// A detected ship-to-ship transfer pair.
///
/// Unique on `(vessel_1_id, vessel_2_id, start_time_utc)`. A `None` vessel
/// id means that side of the pair is a satellite-only dark detection
/// (`dark_detection_id` / `dark_detection_id_2` carry the reference).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StsTransferEvent {
    pub sts_id: StsId,
    pub vessel_1_id: Option<VesselId>,
    pub vessel_2_id: Option<VesselId>,
    pub dark_detection_id: Option<u64>,
    pub dark_detection_id_2: Option<u64>,
    pub detection_type: StsDetectionType,
    pub start_time_utc: DateTime<Utc>,
    pub end_time_utc: DateTime<Utc>,
    pub duration_minutes: i64,
    pub mean_proximity_meters: Option<f64>,
    pub mean_lat: Option<f64>,
    pub mean_lon: Option<f64>,
    pub corridor_id: Option<CorridorId>,
    /// ETA for approaching-vector detections, minutes.
    pub eta_minutes: Option<i64>,
    pub risk_score_component: i64,
}

impl StsTransferEvent {
    /// True when the given vessel is one of the pair.
    pub fn involves(&self, vessel_id: VesselId) -> bool {
        self.vessel_1_id == Some(vessel_id) || self.vessel_2_id == Some(vessel_id)
    }

    /// The other broadcasting vessel of the pair, if any.
    pub fn counterpart(&self, vessel_id: VesselId) -> Option<VesselId> {
        if self.vessel_1_id == Some(vessel_id) {
            self.vessel_2_id
        } else if self.vessel_2_id == Some(vessel_id) {
            self.vessel_1_id
        } else {
            None
        }
    }
}

// ============================================================================
// Loitering
// ============================================================================

/// A stationary run: consecutive hourly buckets with median SOG < 0.5 kn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoiteringEvent {
    pub loitering_id: LoiteringId,
    pub vessel_id: VesselId,
    pub start_time_utc: DateTime<Utc>,
    pub end_time_utc: DateTime<Utc>,
    pub duration_hours: f64,
    pub median_sog: f64,
    pub mean_lat: f64,
    pub mean_lon: f64,
    pub corridor_id: Option<CorridorId>,
    /// Gap immediately before / after the run, when one exists.
    pub preceding_gap_id: Option<GapEventId>,
    pub following_gap_id: Option<GapEventId>,
    pub risk_score_component: i64,
}

// ============================================================================
// Draught changes
// ============================================================================

/// Reported draught change between consecutive static broadcasts.
///
/// A significant draught increase without a port call corroborates a cargo
/// transfer at sea.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DraughtChangeEvent {
    pub draught_event_id: u64,
    pub vessel_id: VesselId,
    pub observed_at_utc: DateTime<Utc>,
    pub draught_before_m: f64,
    pub draught_after_m: f64,
    pub delta_m: f64,
    pub near_port: bool,
    pub linked_sts_id: Option<StsId>,
}
