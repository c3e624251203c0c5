//! Reference data: corridors, baselines, ports, port calls, dark vessel
//! detections, satellite checks, and CREA voyages.

use chrono::{DateTime, Duration, Utc};

use crate::geo::{haversine_nm, parse_wkt_bbox, BoundingBox};
use crate::types::{
    Corridor, CorridorGapBaseline, CorridorId, CreaVoyage, DarkVesselDetection, GapEventId, Port,
    PortCall, PortId, SatelliteCheck, VesselId,
};

use super::{be, decode, decode_all, encode, FleetStore, StoreError, StoreResult};

impl FleetStore {
    // ========================================================================
    // Corridors
    // ========================================================================

    pub fn insert_corridor(&self, corridor: &Corridor) -> StoreResult<()> {
        self.corridors
            .insert(be(corridor.corridor_id), encode(corridor)?)?;
        Ok(())
    }

    pub fn corridor(&self, corridor_id: CorridorId) -> StoreResult<Corridor> {
        self.corridors
            .get(be(corridor_id))?
            .map(|v| decode(&v))
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(format!("corridor {corridor_id}")))
    }

    pub fn all_corridors(&self) -> StoreResult<Vec<Corridor>> {
        decode_all(&self.corridors)
    }

    /// Corridor by name (idempotent seeding).
    pub fn corridor_by_name(&self, name: &str) -> StoreResult<Option<Corridor>> {
        Ok(self.all_corridors()?.into_iter().find(|c| c.name == name))
    }

    /// First corridor whose bbox intersects the straight-line gap path.
    ///
    /// Segment-intersection semantics, not endpoint containment: the
    /// diagnostic case is a transit through a corridor where neither
    /// endpoint lies inside.
    pub fn corridor_for_segment(
        &self,
        lat1: f64,
        lon1: f64,
        lat2: f64,
        lon2: f64,
    ) -> StoreResult<Option<Corridor>> {
        for corridor in self.all_corridors()? {
            if let Some(bbox) = parse_wkt_bbox(&corridor.geometry) {
                if bbox.intersects_segment(lat1, lon1, lat2, lon2) {
                    return Ok(Some(corridor));
                }
            }
        }
        Ok(None)
    }

    /// First corridor whose bbox contains the point.
    pub fn corridor_for_point(&self, lat: f64, lon: f64) -> StoreResult<Option<Corridor>> {
        for corridor in self.all_corridors()? {
            if let Some(bbox) = parse_wkt_bbox(&corridor.geometry) {
                if bbox.contains(lat, lon, 0.0) {
                    return Ok(Some(corridor));
                }
            }
        }
        Ok(None)
    }

    // ========================================================================
    // Corridor gap baselines
    // ========================================================================

    pub fn insert_baseline(&self, baseline: &CorridorGapBaseline) -> StoreResult<()> {
        self.baselines
            .insert(be(baseline.baseline_id), encode(baseline)?)?;
        Ok(())
    }

    pub fn update_baseline(&self, baseline: &CorridorGapBaseline) -> StoreResult<()> {
        self.insert_baseline(baseline)
    }

    pub fn all_baselines(&self) -> StoreResult<Vec<CorridorGapBaseline>> {
        decode_all(&self.baselines)
    }

    pub fn baselines_for_corridor(
        &self,
        corridor_id: CorridorId,
    ) -> StoreResult<Vec<CorridorGapBaseline>> {
        Ok(decode_all::<CorridorGapBaseline>(&self.baselines)?
            .into_iter()
            .filter(|b| b.corridor_id == corridor_id)
            .collect())
    }

    /// Baseline window covering `at` for a corridor.
    pub fn baseline_at(
        &self,
        corridor_id: CorridorId,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<CorridorGapBaseline>> {
        Ok(self
            .baselines_for_corridor(corridor_id)?
            .into_iter()
            .find(|b| b.window_start <= at && b.window_end > at))
    }

    /// Remove all baselines for a corridor (recomputation).
    pub fn clear_baselines_for_corridor(&self, corridor_id: CorridorId) -> StoreResult<usize> {
        let rows = self.baselines_for_corridor(corridor_id)?;
        let count = rows.len();
        for row in rows {
            self.baselines.remove(be(row.baseline_id))?;
        }
        Ok(count)
    }

    // ========================================================================
    // Ports
    // ========================================================================

    pub fn insert_port(&self, port: &Port) -> StoreResult<()> {
        self.ports.insert(be(port.port_id), encode(port)?)?;
        Ok(())
    }

    pub fn all_ports(&self) -> StoreResult<Vec<Port>> {
        decode_all(&self.ports)
    }

    pub fn port(&self, port_id: PortId) -> StoreResult<Port> {
        self.ports
            .get(be(port_id))?
            .map(|v| decode(&v))
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(format!("port {port_id}")))
    }

    // ========================================================================
    // Port calls
    // ========================================================================

    /// Insert a port call, deduplicating same-port arrivals within ±24 h.
    ///
    /// Returns `false` when deduplicated away.
    pub fn insert_port_call(&self, call: &PortCall) -> StoreResult<bool> {
        let window = Duration::hours(24);
        let duplicate = self
            .port_calls_for_vessel(call.vessel_id)?
            .iter()
            .any(|existing| {
                existing.port_id == call.port_id
                    && (existing.arrival_utc - call.arrival_utc).abs() <= window
            });
        if duplicate {
            return Ok(false);
        }
        self.port_calls
            .insert(be(call.port_call_id), encode(call)?)?;
        Ok(true)
    }

    pub fn port_calls_for_vessel(&self, vessel_id: VesselId) -> StoreResult<Vec<PortCall>> {
        let mut calls: Vec<PortCall> = decode_all::<PortCall>(&self.port_calls)?
            .into_iter()
            .filter(|c| c.vessel_id == vessel_id)
            .collect();
        calls.sort_by_key(|c| c.arrival_utc);
        Ok(calls)
    }

    /// Port calls for a vessel arriving at or after `since`.
    pub fn port_calls_for_vessel_since(
        &self,
        vessel_id: VesselId,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<PortCall>> {
        Ok(self
            .port_calls_for_vessel(vessel_id)?
            .into_iter()
            .filter(|c| c.arrival_utc >= since)
            .collect())
    }

    // ========================================================================
    // Dark vessel detections
    // ========================================================================

    pub fn insert_dark_detection(&self, detection: &DarkVesselDetection) -> StoreResult<()> {
        self.dark_detections
            .insert(be(detection.detection_id), encode(detection)?)?;
        Ok(())
    }

    pub fn all_dark_detections(&self) -> StoreResult<Vec<DarkVesselDetection>> {
        decode_all(&self.dark_detections)
    }

    /// Unmatched detections within `radius_nm` of a position and inside the
    /// time window.
    pub fn unmatched_dark_detections_near(
        &self,
        lat: f64,
        lon: f64,
        radius_nm: f64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<DarkVesselDetection>> {
        Ok(self
            .all_dark_detections()?
            .into_iter()
            .filter(|d| {
                d.is_unmatched()
                    && d.detection_time_utc >= from
                    && d.detection_time_utc <= to
                    && haversine_nm(lat, lon, d.detection_lat, d.detection_lon) <= radius_nm
            })
            .collect())
    }

    /// Unmatched detections inside a bbox and time window (dark STS pairing).
    pub fn unmatched_dark_detections_in_bbox(
        &self,
        bbox: &BoundingBox,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<DarkVesselDetection>> {
        Ok(self
            .all_dark_detections()?
            .into_iter()
            .filter(|d| {
                d.is_unmatched()
                    && d.detection_time_utc >= from
                    && d.detection_time_utc <= to
                    && bbox.contains(d.detection_lat, d.detection_lon, 0.0)
            })
            .collect())
    }

    // ========================================================================
    // Satellite checks
    // ========================================================================

    pub fn insert_satellite_check(&self, check: &SatelliteCheck) -> StoreResult<()> {
        self.satellite_checks
            .insert(be(check.sat_check_id), encode(check)?)?;
        Ok(())
    }

    pub fn satellite_check_for_gap(
        &self,
        gap_event_id: GapEventId,
    ) -> StoreResult<Option<SatelliteCheck>> {
        Ok(decode_all::<SatelliteCheck>(&self.satellite_checks)?
            .into_iter()
            .find(|c| c.gap_event_id == gap_event_id))
    }

    // ========================================================================
    // CREA voyages
    // ========================================================================

    pub fn insert_crea_voyage(&self, voyage: &CreaVoyage) -> StoreResult<()> {
        self.crea_voyages
            .insert(be(voyage.voyage_id), encode(voyage)?)?;
        Ok(())
    }

    pub fn crea_voyages_for_imo(&self, imo: &str) -> StoreResult<Vec<CreaVoyage>> {
        Ok(decode_all::<CreaVoyage>(&self.crea_voyages)?
            .into_iter()
            .filter(|v| v.imo.as_deref() == Some(imo))
            .collect())
    }
}
