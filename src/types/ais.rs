//! AIS position records: deduplicated points and raw rolling observations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::AisClass;
use super::vessel::VesselId;

// ============================================================================
// Source quality ranking
// ============================================================================

/// Feed quality ranking for dedup arbitration (higher = better).
///
/// When a duplicate `(vessel_id, timestamp)` arrives from a higher-quality
/// source the stored point is replaced; otherwise the new row is ignored.
pub fn source_quality(source: &str) -> u8 {
    match source {
        "csv_import" => 0,
        "terrestrial" => 1,
        "aisstream" => 2,
        "satellite" => 3,
        "exactearth" | "spire" => 4,
        _ => 0,
    }
}

// ============================================================================
// AisPoint
// ============================================================================

/// A single deduplicated AIS broadcast, owned by its vessel.
///
/// Sentinel values are resolved to `None` before construction:
/// SOG 102.3 kn, COG 360°, heading 511.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AisPoint {
    pub vessel_id: VesselId,
    pub timestamp_utc: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    /// Speed over ground, knots.
    pub sog: Option<f64>,
    /// Course over ground, degrees true.
    pub cog: Option<f64>,
    /// Heading, degrees true.
    pub heading: Option<f64>,
    /// ITU navigational status code (1 = at anchor).
    pub nav_status: Option<u8>,
    pub ais_class: AisClass,
    /// Feed of origin, see [`source_quality`].
    pub source: String,
}

impl AisPoint {
    /// True when the vessel is underway (SOG above the 3 kn threshold).
    pub fn is_underway(&self) -> bool {
        self.sog.is_some_and(|s| s > 3.0)
    }
}

// ============================================================================
// AisObservation
// ============================================================================

/// Raw multi-source observation kept 72 h for cross-receiver comparison.
///
/// Not deduplicated; the scheduled purge enforces the rolling window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AisObservation {
    pub observation_id: u64,
    pub vessel_id: VesselId,
    pub timestamp_utc: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub sog: Option<f64>,
    pub cog: Option<f64>,
    pub source: String,
    pub received_at_utc: DateTime<Utc>,
}

/// Rolling retention window for [`AisObservation`] rows, hours.
pub const OBSERVATION_RETENTION_HOURS: i64 = 72;
